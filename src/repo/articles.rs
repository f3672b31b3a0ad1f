use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::Instrument;

use super::{dedup_ids, id_list, Page, RepoError, RepoResult};
use crate::db::query_span;
use crate::models::{Article, ArticleTag};

macro_rules! article_columns {
    () => {
        "id, title, description, content, cover_image_url, state, created_by, updated_by, created_at, updated_at, deleted_at"
    };
}

const GET: &str = concat!("SELECT ", article_columns!(), " FROM article WHERE id = ?1 AND deleted_at IS NULL");

const INSERT: &str = concat!(
    "INSERT INTO article (title, description, content, cover_image_url, state, created_by, updated_by, created_at, updated_at) ",
    "VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?7) RETURNING ",
    article_columns!()
);

const UPDATE: &str = concat!(
    "UPDATE article SET title = COALESCE(?1, title), description = COALESCE(?2, description), ",
    "content = COALESCE(?3, content), cover_image_url = COALESCE(?4, cover_image_url), ",
    "state = COALESCE(?5, state), updated_by = COALESCE(?6, updated_by), updated_at = ?7 ",
    "WHERE id = ?8 AND deleted_at IS NULL RETURNING ",
    article_columns!()
);

const SOFT_DELETE: &str = "UPDATE article SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL";

const LIST: &str = concat!(
    "SELECT ",
    article_columns!(),
    " FROM article a WHERE a.deleted_at IS NULL AND (?1 IS NULL OR a.state = ?1) ",
    "AND (?2 IS NULL OR EXISTS (SELECT 1 FROM article_tag atg WHERE atg.article_id = a.id ",
    "AND atg.tag_id = ?2 AND atg.state = 1 AND atg.deleted_at IS NULL)) ",
    "ORDER BY a.id DESC LIMIT ?3 OFFSET ?4"
);

const COUNT: &str = concat!(
    "SELECT COUNT(*) FROM article a WHERE a.deleted_at IS NULL AND (?1 IS NULL OR a.state = ?1) ",
    "AND (?2 IS NULL OR EXISTS (SELECT 1 FROM article_tag atg WHERE atg.article_id = a.id ",
    "AND atg.tag_id = ?2 AND atg.state = 1 AND atg.deleted_at IS NULL))"
);

const LIVE_TAG_IDS: &str =
    "SELECT id FROM tag WHERE deleted_at IS NULL AND id IN (SELECT value FROM json_each(?1)) ORDER BY id";

const TAGS_FOR_ARTICLES: &str = concat!(
    "SELECT atg.article_id AS article_id, t.id AS id, t.name AS name FROM article_tag atg ",
    "JOIN tag t ON t.id = atg.tag_id ",
    "WHERE atg.article_id IN (SELECT value FROM json_each(?1)) AND atg.state = 1 ",
    "AND atg.deleted_at IS NULL AND t.deleted_at IS NULL ORDER BY atg.article_id, t.id"
);

const ATTACH: &str = concat!(
    "INSERT INTO article_tag (article_id, tag_id, state, created_by, updated_by, created_at, updated_at) ",
    "VALUES (?1, ?2, 1, ?3, 0, ?4, ?4)"
);

const DETACH_ONE: &str = concat!(
    "UPDATE article_tag SET state = 0, updated_at = ?1, deleted_at = ?1 ",
    "WHERE article_id = ?2 AND tag_id = ?3 AND deleted_at IS NULL"
);

const DETACH_ALL: &str =
    "UPDATE article_tag SET state = 0, updated_at = ?1, deleted_at = ?1 WHERE article_id = ?2 AND deleted_at IS NULL";

const ASSOCIATIONS: &str = concat!(
    "SELECT id, article_id, tag_id, state, created_by, updated_by, created_at, updated_at, deleted_at ",
    "FROM article_tag WHERE article_id = ?1 ORDER BY id"
);

const ATTACHED_TAG_IDS: &str =
    "SELECT tag_id FROM article_tag WHERE article_id = ?1 AND deleted_at IS NULL ORDER BY tag_id";

/// Tag summary embedded in article responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow)]
struct ArticleTagRow {
    article_id: i64,
    id: i64,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleWithTags {
    pub article: Article,
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub description: String,
    pub content: String,
    pub cover_image_url: String,
    pub state: i64,
    pub created_by: String,
    pub tag_ids: Vec<i64>,
}

/// Partial update. `tag_ids: Some(..)` replaces the association set.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub state: Option<i64>,
    pub updated_by: Option<String>,
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub state: Option<i64>,
    pub tag_id: Option<i64>,
}

pub struct ArticleRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ArticleRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> RepoResult<Option<ArticleWithTags>> {
        let mut conn = self.pool.acquire().await?;
        let article = sqlx::query_as::<_, Article>(GET)
            .bind(id)
            .fetch_optional(&mut *conn)
            .instrument(query_span(GET))
            .await?;
        match article {
            Some(article) => {
                let tags = load_tags(&mut conn, article.id).await?;
                Ok(Some(ArticleWithTags { article, tags }))
            }
            None => Ok(None),
        }
    }

    /// Inserts the article and its associations in one transaction.
    ///
    /// Fails with [`RepoError::UnknownTag`], leaving nothing written, when a
    /// tag id does not name a live tag.
    pub async fn create(&self, new: NewArticle) -> RepoResult<ArticleWithTags> {
        let now = Utc::now();
        let tag_ids = dedup_ids(&new.tag_ids);
        let mut tx = self.pool.begin().await?;

        // Write first: a deferred transaction that reads before its first write
        // cannot wait out a concurrent writer and fails with SQLITE_BUSY.
        let article = sqlx::query_as::<_, Article>(INSERT)
            .bind(new.title)
            .bind(new.description)
            .bind(new.content)
            .bind(new.cover_image_url)
            .bind(new.state)
            .bind(&new.created_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .instrument(query_span(INSERT))
            .await?;
        ensure_live_tags(&mut tx, &tag_ids).await?;

        for tag_id in &tag_ids {
            attach(&mut tx, article.id, *tag_id, &new.created_by, now).await?;
        }

        let tags = load_tags(&mut tx, article.id).await?;
        tx.commit().await?;
        Ok(ArticleWithTags { article, tags })
    }

    /// Applies `changes` to a live article. `Ok(None)` when it does not exist or is deleted.
    pub async fn update(&self, id: i64, changes: ArticleChanges) -> RepoResult<Option<ArticleWithTags>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let wanted = changes.tag_ids.as_deref().map(dedup_ids);
        let article = sqlx::query_as::<_, Article>(UPDATE)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.content)
            .bind(changes.cover_image_url)
            .bind(changes.state)
            .bind(changes.updated_by)
            .bind(now)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(query_span(UPDATE))
            .await?;
        let Some(article) = article else {
            return Ok(None);
        };

        if let Some(wanted) = wanted {
            ensure_live_tags(&mut tx, &wanted).await?;
            sync_tags(&mut tx, &article, &wanted, now).await?;
        }

        let tags = load_tags(&mut tx, article.id).await?;
        tx.commit().await?;
        Ok(Some(ArticleWithTags { article, tags }))
    }

    /// Soft-deletes the article and detaches all of its tags.
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

        sqlx::query(DETACH_ALL)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span(DETACH_ALL))
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Every association row of the article, detached ones included, oldest first.
    pub async fn associations(&self, article_id: i64) -> RepoResult<Vec<ArticleTag>> {
        let rows = sqlx::query_as::<_, ArticleTag>(ASSOCIATIONS)
            .bind(article_id)
            .fetch_all(self.pool)
            .instrument(query_span(ASSOCIATIONS))
            .await?;
        Ok(rows)
    }

    pub async fn list(&self, filter: &ArticleFilter, page: Page) -> RepoResult<(Vec<ArticleWithTags>, i64)> {
        let mut conn = self.pool.acquire().await?;
        let articles = sqlx::query_as::<_, Article>(LIST)
            .bind(filter.state)
            .bind(filter.tag_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *conn)
            .instrument(query_span(LIST))
            .await?;
        let total: i64 = sqlx::query_scalar(COUNT)
            .bind(filter.state)
            .bind(filter.tag_id)
            .fetch_one(&mut *conn)
            .instrument(query_span(COUNT))
            .await?;

        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        let mut by_article: HashMap<i64, Vec<TagRef>> = HashMap::new();
        if !ids.is_empty() {
            let rows = sqlx::query_as::<_, ArticleTagRow>(TAGS_FOR_ARTICLES)
                .bind(id_list(&ids))
                .fetch_all(&mut *conn)
                .instrument(query_span(TAGS_FOR_ARTICLES))
                .await?;
            for row in rows {
                by_article.entry(row.article_id).or_default().push(TagRef { id: row.id, name: row.name });
            }
        }

        let items = articles
            .into_iter()
            .map(|article| {
                let tags = by_article.remove(&article.id).unwrap_or_default();
                ArticleWithTags { article, tags }
            })
            .collect();
        Ok((items, total))
    }
}

async fn load_tags(conn: &mut SqliteConnection, article_id: i64) -> Result<Vec<TagRef>, sqlx::Error> {
    let rows = sqlx::query_as::<Sqlite, ArticleTagRow>(TAGS_FOR_ARTICLES)
        .bind(id_list(&[article_id]))
        .fetch_all(&mut *conn)
        .instrument(query_span(TAGS_FOR_ARTICLES))
        .await?;
    Ok(rows.into_iter().map(|r| TagRef { id: r.id, name: r.name }).collect())
}

async fn ensure_live_tags(conn: &mut SqliteConnection, tag_ids: &[i64]) -> RepoResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let live: BTreeSet<i64> = sqlx::query_scalar::<_, i64>(LIVE_TAG_IDS)
        .bind(id_list(tag_ids))
        .fetch_all(&mut *conn)
        .instrument(query_span(LIVE_TAG_IDS))
        .await?
        .into_iter()
        .collect();
    match tag_ids.iter().find(|id| !live.contains(id)) {
        Some(missing) => Err(RepoError::UnknownTag(*missing)),
        None => Ok(()),
    }
}

async fn attach(
    conn: &mut SqliteConnection,
    article_id: i64,
    tag_id: i64,
    created_by: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(ATTACH)
        .bind(article_id)
        .bind(tag_id)
        .bind(created_by)
        .bind(now)
        .execute(&mut *conn)
        .instrument(query_span(ATTACH))
        .await?;
    Ok(())
}

/// Makes the live association set of `article` equal `wanted`.
async fn sync_tags(
    conn: &mut SqliteConnection,
    article: &Article,
    wanted: &[i64],
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let current: BTreeSet<i64> = sqlx::query_scalar::<_, i64>(ATTACHED_TAG_IDS)
        .bind(article.id)
        .fetch_all(&mut *conn)
        .instrument(query_span(ATTACHED_TAG_IDS))
        .await?
        .into_iter()
        .collect();
    let wanted: BTreeSet<i64> = wanted.iter().copied().collect();

    for removed in current.difference(&wanted) {
        sqlx::query(DETACH_ONE)
            .bind(now)
            .bind(article.id)
            .bind(*removed)
            .execute(&mut *conn)
            .instrument(query_span(DETACH_ONE))
            .await?;
    }
    for added in wanted.difference(&current) {
        attach(conn, article.id, *added, &article.updated_by, now).await?;
    }
    Ok(())
}
