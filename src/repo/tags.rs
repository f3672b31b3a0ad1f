use chrono::Utc;
use sqlx::SqlitePool;
use tracing::Instrument;

use super::{Page, RepoResult};
use crate::db::query_span;
use crate::models::Tag;

macro_rules! tag_columns {
    () => {
        "id, name, status, created_by, updated_by, created_at, updated_at, deleted_at"
    };
}

const GET: &str = concat!("SELECT ", tag_columns!(), " FROM tag WHERE id = ?1 AND deleted_at IS NULL");

const INSERT: &str = concat!(
    "INSERT INTO tag (name, status, created_by, updated_by, created_at, updated_at) ",
    "VALUES (?1, 0, ?2, ?3, ?4, ?4) RETURNING ",
    tag_columns!()
);

// NULL binds leave the column untouched.
const UPDATE: &str = concat!(
    "UPDATE tag SET name = COALESCE(?1, name), status = COALESCE(?2, status), ",
    "created_by = COALESCE(?3, created_by), updated_by = COALESCE(?4, updated_by), updated_at = ?5 ",
    "WHERE id = ?6 AND deleted_at IS NULL RETURNING ",
    tag_columns!()
);

const SOFT_DELETE: &str = "UPDATE tag SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL";

const DETACH_ALL: &str =
    "UPDATE article_tag SET state = 0, updated_at = ?1, deleted_at = ?1 WHERE tag_id = ?2 AND deleted_at IS NULL";

const LIST: &str = concat!(
    "SELECT ",
    tag_columns!(),
    " FROM tag WHERE deleted_at IS NULL AND (?1 IS NULL OR name = ?1) AND (?2 IS NULL OR status = ?2) ",
    "ORDER BY id LIMIT ?3 OFFSET ?4"
);

const COUNT: &str =
    "SELECT COUNT(*) FROM tag WHERE deleted_at IS NULL AND (?1 IS NULL OR name = ?1) AND (?2 IS NULL OR status = ?2)";

const LIVE_ARTICLE_IDS: &str =
    "SELECT article_id FROM article_tag WHERE tag_id = ?1 AND state = 1 AND deleted_at IS NULL ORDER BY article_id";

#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub created_by: String,
    pub updated_by: String,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TagChanges {
    pub name: Option<String>,
    pub status: Option<i64>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub name: Option<String>,
    pub status: Option<i64>,
}

pub struct TagRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TagRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> RepoResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(GET)
            .bind(id)
            .fetch_optional(self.pool)
            .instrument(query_span(GET))
            .await?;
        Ok(tag)
    }

    /// Inserts a tag with status 0.
    pub async fn create(&self, new: NewTag) -> RepoResult<Tag> {
        let tag = sqlx::query_as::<_, Tag>(INSERT)
            .bind(new.name)
            .bind(new.created_by)
            .bind(new.updated_by)
            .bind(Utc::now())
            .fetch_one(self.pool)
            .instrument(query_span(INSERT))
            .await?;
        Ok(tag)
    }

    /// Applies `changes` to a live tag. `Ok(None)` when it does not exist or is deleted.
    pub async fn update(&self, id: i64, changes: TagChanges) -> RepoResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(UPDATE)
            .bind(changes.name)
            .bind(changes.status)
            .bind(changes.created_by)
            .bind(changes.updated_by)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(self.pool)
            .instrument(query_span(UPDATE))
            .await?;
        Ok(tag)
    }

    /// Soft-deletes the tag and detaches it from every article.
    ///
    /// Returns `false` when there was no live tag with that id.
    pub async fn delete(&self, id: i64) -> RepoResult<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(SOFT_DELETE)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span(SOFT_DELETE))
            .await?;
        if res.rows_affected() == 0 {
            return Ok(false);
        }

        let detached = sqlx::query(DETACH_ALL)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span(DETACH_ALL))
            .await?;
        tx.commit().await?;

        tracing::debug!(tag_id = id, associations = detached.rows_affected(), "tag soft-deleted");
        Ok(true)
    }

    pub async fn list(&self, filter: &TagFilter, page: Page) -> RepoResult<(Vec<Tag>, i64)> {
        let items = sqlx::query_as::<_, Tag>(LIST)
            .bind(filter.name.as_deref())
            .bind(filter.status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .instrument(query_span(LIST))
            .await?;
        let total: i64 = sqlx::query_scalar(COUNT)
            .bind(filter.name.as_deref())
            .bind(filter.status)
            .fetch_one(self.pool)
            .instrument(query_span(COUNT))
            .await?;
        Ok((items, total))
    }

    /// Ids of articles with a live association to `tag_id`.
    pub async fn article_ids(&self, tag_id: i64) -> RepoResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(LIVE_ARTICLE_IDS)
            .bind(tag_id)
            .fetch_all(self.pool)
            .instrument(query_span(LIVE_ARTICLE_IDS))
            .await?;
        Ok(ids)
    }
}
