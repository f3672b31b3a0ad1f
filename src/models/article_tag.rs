use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article-to-tag association (table `article_tag`).
///
/// `created_by` is a name while `updated_by` is a numeric user id; both are
/// stored as found in the existing schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleTag {
    pub id: i64,
    pub article_id: i64,
    pub tag_id: i64,
    /// 1 while the association is live, 0 once detached.
    pub state: i64,
    pub created_by: String,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
