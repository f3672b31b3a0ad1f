use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Check;
use crate::error::{AppError, AppResult};
use crate::models::STATE_ENABLED;
use crate::repo::{ArticleChanges, ArticleFilter, ArticleWithTags, NewArticle, TagRef};

/// Every tag id must name a row, so it has to be positive.
fn check_tag_ids(ids: Option<&[i64]>) -> AppResult<()> {
    match ids.and_then(|ids| ids.iter().find(|id| **id < 1)) {
        Some(bad) => Err(AppError::field("tag_ids", "range", format!("tag id must be >= 1, got {}", bad))),
        None => Ok(()),
    }
}

/// `POST /api/v1/article`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ArticleCreateRequest {
    #[validate(required, length(min = 2, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[validate(required, length(min = 1))]
    pub content: Option<String>,
    #[validate(length(max = 255))]
    pub cover_image_url: Option<String>,
    #[validate(range(min = 0, max = 1, message = "state must be 0 or 1"))]
    pub state: Option<i64>,
    #[validate(required, length(min = 2, max = 100))]
    pub created_by: Option<String>,
    #[validate(length(max = 32))]
    pub tag_ids: Option<Vec<i64>>,
}

impl Check for ArticleCreateRequest {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_tag_ids(self.tag_ids.as_deref())
    }
}

impl ArticleCreateRequest {
    /// Call after [`Check::check`].
    pub fn into_new_article(self) -> NewArticle {
        NewArticle {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            cover_image_url: self.cover_image_url.unwrap_or_default(),
            state: self.state.unwrap_or(STATE_ENABLED),
            created_by: self.created_by.unwrap_or_default(),
            tag_ids: self.tag_ids.unwrap_or_default(),
        }
    }
}

/// `PUT /api/v1/article/{id}`. Absent fields are left unchanged; a present
/// `tag_ids` replaces the article's tag set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ArticleUpdateRequest {
    #[validate(length(min = 2, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(length(max = 255))]
    pub cover_image_url: Option<String>,
    #[validate(range(min = 0, max = 1, message = "state must be 0 or 1"))]
    pub state: Option<i64>,
    #[validate(length(min = 2, max = 100))]
    pub updated_by: Option<String>,
    #[validate(length(max = 32))]
    pub tag_ids: Option<Vec<i64>>,
}

impl Check for ArticleUpdateRequest {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        check_tag_ids(self.tag_ids.as_deref())
    }
}

impl From<ArticleUpdateRequest> for ArticleChanges {
    fn from(req: ArticleUpdateRequest) -> Self {
        ArticleChanges {
            title: req.title,
            description: req.description,
            content: req.content,
            cover_image_url: req.cover_image_url,
            state: req.state,
            updated_by: req.updated_by,
            tag_ids: req.tag_ids,
        }
    }
}

/// `GET /api/v1/article` query string.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ArticleListQuery {
    #[validate(range(min = 1))]
    pub tag_id: Option<i64>,
    #[validate(range(min = 0, max = 1, message = "state must be 0 or 1"))]
    pub state: Option<i64>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<u32>,
}

impl Check for ArticleListQuery {
    fn check(&self) -> AppResult<()> {
        Ok(self.validate()?)
    }
}

impl ArticleListQuery {
    pub fn filter(&self) -> ArticleFilter {
        ArticleFilter { state: self.state, tag_id: self.tag_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub cover_image_url: String,
    pub state: i64,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<TagRef>,
}

impl From<ArticleWithTags> for ArticleResponse {
    fn from(src: ArticleWithTags) -> Self {
        let a = src.article;
        ArticleResponse {
            id: a.id,
            title: a.title,
            description: a.description,
            content: a.content,
            cover_image_url: a.cover_image_url,
            state: a.state,
            created_by: a.created_by,
            updated_by: a.updated_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
            tags: src.tags,
        }
    }
}
