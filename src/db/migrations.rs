//! Database migrations module
//!
//! Code-based migrations embedded as SQL strings, one body per driver, so the
//! binary carries its own schema.
//!
//! ```ignore
//! use gamestudy::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Applied versions are recorded in the `_migrations` table.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{MySqlPool, SqlitePool};

use super::{Backend, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                auth_uid VARCHAR(64) UNIQUE,
                username VARCHAR(100) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL,
                display_name VARCHAR(100),
                avatar_url TEXT,
                bio TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                auth_uid VARCHAR(64) UNIQUE,
                username VARCHAR(100) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL,
                display_name VARCHAR(100),
                avatar_url TEXT,
                bio TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            ) DEFAULT CHARSET = utf8mb4;
            CREATE INDEX idx_users_email ON users(email);
        "#,
    },
    // Tag names are unique regardless of case.
    Migration {
        version: 2,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                color VARCHAR(7) NOT NULL DEFAULT '#5271ff',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name_nocase ON tags(name COLLATE NOCASE);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci NOT NULL,
                color VARCHAR(7) NOT NULL DEFAULT '#5271ff',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY idx_tags_name (name)
            ) DEFAULT CHARSET = utf8mb4;
        "#,
    },
    Migration {
        version: 3,
        name: "create_articles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                excerpt TEXT,
                thumbnail_url TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'published'
                    CHECK (status IN ('draft', 'published')),
                likes_count INTEGER NOT NULL DEFAULT 0,
                views_count INTEGER NOT NULL DEFAULT 0,
                author_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_articles_author_id ON articles(author_id);
            CREATE INDEX IF NOT EXISTS idx_articles_status_updated ON articles(status, updated_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL,
                content MEDIUMTEXT NOT NULL,
                excerpt TEXT,
                thumbnail_url TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'published',
                likes_count BIGINT NOT NULL DEFAULT 0,
                views_count BIGINT NOT NULL DEFAULT 0,
                author_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id),
                CHECK (status IN ('draft', 'published'))
            ) DEFAULT CHARSET = utf8mb4;
            CREATE INDEX idx_articles_author_id ON articles(author_id);
            CREATE INDEX idx_articles_status_updated ON articles(status, updated_at);
        "#,
    },
    // The surrogate id records the order tags were attached in.
    Migration {
        version: 4,
        name: "create_article_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS article_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                UNIQUE (article_id, tag_id),
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_article_tags_tag_id ON article_tags(tag_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS article_tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                article_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                UNIQUE KEY uq_article_tags (article_id, tag_id),
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_article_tags_tag_id ON article_tags(tag_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_likes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                article_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, article_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_likes_article_id ON likes(article_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS likes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                article_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_likes (user_id, article_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_likes_article_id ON likes(article_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_bookmarks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                article_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, article_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_bookmarks_article_id ON bookmarks(article_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                article_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_bookmarks (user_id, article_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_bookmarks_article_id ON bookmarks(article_id);
        "#,
    },
];

impl Migration {
    fn statements(&self, driver: DatabaseDriver) -> Vec<&'static str> {
        let body = match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        };
        split_sql_statements(body)
    }
}

/// Whether one migration has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i32,
    pub name: &'static str,
    pub applied: bool,
}

/// Apply every migration not yet recorded in `_migrations`.
///
/// Returns how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let pending: Vec<&Migration> = {
        let applied = applied_versions(pool).await?;
        MIGRATIONS
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .collect()
    };

    if pending.is_empty() {
        tracing::debug!("Schema is up to date");
        return Ok(0);
    }

    for migration in &pending {
        tracing::info!("Applying migration {:03}_{}", migration.version, migration.name);
        let result = match pool.backend() {
            Backend::Sqlite(p) => apply_sqlite(p, migration).await,
            Backend::Mysql(p) => apply_mysql(p, migration).await,
        };
        result.with_context(|| {
            format!("Migration {:03}_{} failed", migration.version, migration.name)
        })?;
    }

    tracing::info!("Applied {} migration(s)", pending.len());
    Ok(pending.len())
}

/// Every known migration with its applied flag, in order
pub async fn status(pool: &DynDatabasePool) -> Result<Vec<MigrationStatus>> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .map(|m| MigrationStatus {
            version: m.version,
            name: m.name,
            applied: applied.contains(&m.version),
        })
        .collect())
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    Ok(status(pool).await?.iter().filter(|s| !s.applied).count())
}

/// Versions recorded in `_migrations`, creating the table on first use
async fn applied_versions(pool: &DynDatabasePool) -> Result<BTreeSet<i32>> {
    let versions: BTreeSet<i32> = match pool.backend() {
        Backend::Sqlite(p) => {
            sqlx::query(SQLITE_LEDGER).execute(p).await?;
            sqlx::query_scalar::<_, i64>("SELECT version FROM _migrations")
                .fetch_all(p)
                .await?
                .into_iter()
                .filter_map(|v| i32::try_from(v).ok())
                .collect()
        }
        Backend::Mysql(p) => {
            sqlx::query(MYSQL_LEDGER).execute(p).await?;
            sqlx::query_scalar::<_, i32>("SELECT version FROM _migrations")
                .fetch_all(p)
                .await?
                .into_iter()
                .collect()
        }
    };
    Ok(versions)
}

const SQLITE_LEDGER: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

const MYSQL_LEDGER: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

// SQLite runs DDL transactionally, so a failed migration leaves no trace.
async fn apply_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in migration.statements(DatabaseDriver::Sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Statement failed: {}", preview(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// MySQL commits DDL implicitly, so statements run one by one on the pool.
async fn apply_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in migration.statements(DatabaseDriver::Mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Statement failed: {}", preview(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

/// First line of a statement, capped for error messages
fn preview(sql: &str) -> String {
    let first = sql.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let mut out: String = first.chars().take(80).collect();
    if first.chars().count() > 80 || sql.trim().lines().count() > 1 {
        out.push_str(" ...");
    }
    out
}

/// Split a migration body on `;`, dropping blank and comment-only pieces
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| {
            stmt.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .collect()
}
