//! Request and response shapes for the HTTP API.
//!
//! Request structs declare their field constraints with `validator`; handlers
//! only see values that passed them.

pub mod article;
pub mod tag;
pub mod upload;
pub mod user;

use serde::Serialize;

use crate::error::AppResult;

pub use article::{ArticleCreateRequest, ArticleListQuery, ArticleResponse, ArticleUpdateRequest};
pub use tag::{TagCreateRequest, TagListQuery, TagResponse, TagUpdateRequest};
pub use upload::UploadResponse;
pub use user::UserResponse;

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Constraint check run by the request extractors before a handler sees the value.
pub trait Check {
    fn check(&self) -> AppResult<()>;
}
