//! Persisted entities.
//!
//! Every table carries `id`, `created_at`, `updated_at` and a nullable
//! `deleted_at`; a row with `deleted_at` set is soft-deleted and invisible to
//! the API.

pub mod article;
pub mod article_tag;
pub mod tag;
pub mod user;

pub use article::Article;
pub use article_tag::ArticleTag;
pub use tag::Tag;
pub use user::User;

/// Binary flag used by `Tag::status`, `Article::state` and `ArticleTag::state`.
pub const STATE_DISABLED: i64 = 0;
pub const STATE_ENABLED: i64 = 1;
