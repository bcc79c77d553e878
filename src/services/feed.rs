//! Feed filtering
//!
//! The feed is fetched in full (every article the viewer may see) and then
//! narrowed here by a search term and a tag filter. The "その他" (other)
//! bucket holds articles carrying none of the configured main tags.

use crate::models::ArticleWithMeta;
use std::collections::HashSet;

/// Tag value selecting the "other" bucket
pub const OTHER_TAG: &str = "その他";

/// Tag filter state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    /// No tag restriction
    #[default]
    All,
    /// Articles with no main tag, including untagged ones
    Other,
    /// Articles carrying a tag with exactly this name (case-sensitive)
    Exact(String),
}

impl TagFilter {
    /// A missing or blank value means no restriction. Any other value is
    /// taken verbatim, so `"Roblox "` does not select `Roblox`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => TagFilter::All,
            Some(blank) if blank.trim().is_empty() => TagFilter::All,
            Some(OTHER_TAG) => TagFilter::Other,
            Some(name) => TagFilter::Exact(name.to_string()),
        }
    }
}

/// The configured main tag allowlist
#[derive(Debug, Clone, Default)]
pub struct MainTags(HashSet<String>);

impl MainTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Whether the article carries at least one main tag
    pub fn any_in(&self, article: &ArticleWithMeta) -> bool {
        article.tag_names().any(|name| self.contains(name))
    }
}

/// Search term plus tag filter, AND-combined
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    /// Lowercased search term; `None` matches everything
    search: Option<String>,
    tag: TagFilter,
}

impl FeedFilter {
    pub fn new(search: Option<&str>, tag: Option<&str>) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Self {
            search,
            tag: TagFilter::parse(tag),
        }
    }

    pub fn tag(&self) -> &TagFilter {
        &self.tag
    }

    pub fn matches(&self, article: &ArticleWithMeta, main_tags: &MainTags) -> bool {
        self.matches_search(article) && self.matches_tag(article, main_tags)
    }

    fn matches_search(&self, article: &ArticleWithMeta) -> bool {
        let Some(term) = &self.search else {
            return true;
        };
        article.article.title.to_lowercase().contains(term)
            || article
                .article
                .excerpt
                .as_deref()
                .is_some_and(|excerpt| excerpt.to_lowercase().contains(term))
    }

    fn matches_tag(&self, article: &ArticleWithMeta, main_tags: &MainTags) -> bool {
        match &self.tag {
            TagFilter::All => true,
            TagFilter::Other => !main_tags.any_in(article),
            TagFilter::Exact(name) => article.has_tag(name),
        }
    }
}

/// Keep the articles matching `filter`, preserving order
pub fn apply(
    articles: Vec<ArticleWithMeta>,
    filter: &FeedFilter,
    main_tags: &MainTags,
) -> Vec<ArticleWithMeta> {
    articles
        .into_iter()
        .filter(|article| filter.matches(article, main_tags))
        .collect()
}



#[cfg(test)]
mod property_tests {
    use super::test_support::article;
    use super::*;
    use proptest::prelude::*;

    const TAG_POOL: &[&str] = &[
        "Roblox",
        "Roblox Studio",
        "3DCG",
        "Lua",
        "レベルデザイン",
        "roblox",
        "Blender",
        "Unity",
        "Shader",
    ];

    fn main_tags() -> MainTags {
        MainTags::new(["Roblox", "Roblox Studio", "3DCG", "Lua", "レベルデザイン"])
    }

    fn tag_sets() -> impl Strategy<Value = Vec<Vec<&'static str>>> {
        prop::collection::vec(
            prop::sample::subsequence(TAG_POOL.to_vec(), 0..=4),
            0..20,
        )
    }

    fn build(tag_sets: &[Vec<&str>]) -> Vec<ArticleWithMeta> {
        tag_sets
            .iter()
            .enumerate()
            .map(|(i, tags)| article(i as i64 + 1, "title", None, tags))
            .collect()
    }

    proptest! {
        #[test]
        fn other_bucket_is_disjoint_from_main_tags(sets in tag_sets()) {
            let main = main_tags();
            let result = apply(build(&sets), &FeedFilter::new(None, Some(OTHER_TAG)), &main);

            for article in &result {
                prop_assert!(article.tag_names().all(|name| !main.contains(name)));
            }

            let expected = sets
                .iter()
                .filter(|tags| tags.iter().all(|t| !main.contains(t)))
                .count();
            prop_assert_eq!(result.len(), expected);
        }

        #[test]
        fn exact_filter_returns_only_tagged_articles(
            sets in tag_sets(),
            pick in prop::sample::select(TAG_POOL.to_vec()),
        ) {
            let result = apply(build(&sets), &FeedFilter::new(None, Some(pick)), &main_tags());

            let expected = sets.iter().filter(|tags| tags.contains(&pick)).count();
            prop_assert_eq!(result.len(), expected);
            for article in &result {
                prop_assert!(article.has_tag(pick));
            }
        }
    }
}
