use sqlx::SqlitePool;
use tracing::Instrument;

use super::RepoResult;
use crate::db::query_span;
use crate::models::User;

const GET: &str = r#"SELECT id, username, nickname, email, state, created_at, updated_at, deleted_at
    FROM "user" WHERE id = ?1 AND deleted_at IS NULL"#;

/// Users are read-only through the API; rows are provisioned out of band.
pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(GET)
            .bind(id)
            .fetch_optional(self.pool)
            .instrument(query_span(GET))
            .await?;
        Ok(user)
    }
}
