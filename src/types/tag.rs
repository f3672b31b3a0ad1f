use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Check;
use crate::error::AppResult;
use crate::models::Tag;
use crate::repo::{NewTag, TagChanges, TagFilter};

/// `POST /api/v1/tag`. Every field is required.
///
/// `name` is also accepted under the key `title`, which older clients send.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TagCreateRequest {
    #[serde(alias = "title")]
    #[validate(required, length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(required, length(min = 2, max = 100))]
    pub created_by: Option<String>,
    #[validate(required, length(min = 2, max = 100))]
    pub updated_by: Option<String>,
}

impl Check for TagCreateRequest {
    fn check(&self) -> AppResult<()> {
        Ok(self.validate()?)
    }
}

impl TagCreateRequest {
    /// Call after `validate()`; the `required` checks guarantee every field is set.
    pub fn into_new_tag(self) -> NewTag {
        NewTag {
            name: self.name.unwrap_or_default(),
            created_by: self.created_by.unwrap_or_default(),
            updated_by: self.updated_by.unwrap_or_default(),
        }
    }
}

/// `PUT /api/v1/tag/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TagUpdateRequest {
    #[serde(default, alias = "title")]
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 1, message = "status must be 0 or 1"))]
    pub status: Option<i64>,
    #[serde(default)]
    #[validate(length(min = 2, max = 100))]
    pub created_by: Option<String>,
    #[serde(default)]
    #[validate(length(min = 2, max = 100))]
    pub updated_by: Option<String>,
}

impl Check for TagUpdateRequest {
    fn check(&self) -> AppResult<()> {
        Ok(self.validate()?)
    }
}

impl From<TagUpdateRequest> for TagChanges {
    fn from(req: TagUpdateRequest) -> Self {
        TagChanges {
            name: req.name,
            status: req.status,
            created_by: req.created_by,
            updated_by: req.updated_by,
        }
    }
}

/// `GET /api/v1/tag` query string.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TagListQuery {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 1, message = "status must be 0 or 1"))]
    pub status: Option<i64>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<u32>,
}

impl Check for TagListQuery {
    fn check(&self) -> AppResult<()> {
        Ok(self.validate()?)
    }
}

impl TagListQuery {
    pub fn filter(&self) -> TagFilter {
        TagFilter { name: self.name.clone(), status: self.status }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub status: i64,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        TagResponse {
            id: tag.id,
            name: tag.name,
            status: tag.status,
            created_by: tag.created_by,
            updated_by: tag.updated_by,
            created_at: tag.created_at,
            updated_at: tag.updated_at,
        }
    }
}
