//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL behind the
//! `DatabasePool` trait object. Schema is managed by the code-embedded
//! migrations in [`migrations`]; data access goes through [`repositories`].
//!
//! ```ignore
//! use gamestudy::config::DatabaseConfig;
//! use gamestudy::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

/// Whether any error in the chain is a unique-constraint violation.
///
/// Repositories wrap driver errors with context, so the whole chain is
/// inspected rather than just the outermost error.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[tokio::test]
    async fn test_unique_violation_detected_through_context() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE t (name TEXT NOT NULL UNIQUE)")
            .await
            .unwrap();
        pool.execute("INSERT INTO t (name) VALUES ('a')").await.unwrap();

        let err = sqlx::query("INSERT INTO t (name) VALUES ('a')")
            .execute(pool.as_sqlite().unwrap())
            .await
            .context("Failed to insert")
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_other_errors_are_not_unique_violations() {
        let err = anyhow::anyhow!("something else");
        assert!(!is_unique_violation(&err));

        let err = anyhow::Error::new(sqlx::Error::RowNotFound).context("lookup");
        assert!(!is_unique_violation(&err));
    }
}
