//! Data access over the SQLite pool.
//!
//! Repositories borrow the pool for the duration of a call. Reads skip
//! soft-deleted rows; writes that touch an entity and its `article_tag`
//! associations run in one transaction.

pub mod articles;
pub mod tags;
pub mod users;

pub use articles::{ArticleChanges, ArticleFilter, ArticleRepo, ArticleWithTags, NewArticle, TagRef};
pub use tags::{NewTag, TagChanges, TagFilter, TagRepo};
pub use users::UserRepo;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A referenced tag does not exist or is soft-deleted.
    #[error("unknown tag: {0}")]
    UnknownTag(i64),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 10;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(Self::DEFAULT_SIZE).clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Renders ids as a JSON array for `json_each(?)` binds.
pub(crate) fn id_list(ids: &[i64]) -> String {
    let parts: Vec<String> = ids.iter().map(i64::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// Sorted, de-duplicated copy of `ids`.
pub(crate) fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
