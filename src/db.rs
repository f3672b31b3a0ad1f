use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::Span;

use crate::config::{self, DatabaseConfig};

/// A span for one SQL statement: carries the literal statement and a server span kind.
pub fn query_span(sql: &'static str) -> Span {
    tracing::debug_span!(target: "blog::sql", "Query", sql = sql, otel.kind = "server")
}

/// Opens the SQLite pool described by `cfg`, creating the database file if missing.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    if cfg.driver != "sqlite" {
        return Err(anyhow::anyhow!("unsupported database driver: {}", cfg.driver));
    }
    config::ensure_sqlite_parent_dir(&cfg.source)?;

    let options = SqliteConnectOptions::from_str(&cfg.source)
        .map_err(|e| anyhow::anyhow!("invalid database.source {:?}: {}", cfg.source, e))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Best-effort tuning; a failure here only costs performance.
                if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await {
                    tracing::warn!("Failed to set temp_store: {}", e);
                }
                if let Err(e) = sqlx::query("PRAGMA cache_size=-16384;").execute(&mut *conn).await {
                    tracing::warn!("Failed to set cache_size: {}", e);
                }
                Ok(())
            })
        })
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("failed opening connection to {}: {}", cfg.source, e))?;

    Ok(pool)
}

/// Options for [`migrate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Drop columns that exist in the database but not in the model. Destructive.
    pub drop_columns: bool,
}

struct TableSchema {
    name: &'static str,
    create: &'static str,
    columns: &'static [&'static str],
}

const TABLES: &[TableSchema] = &[
    TableSchema {
        name: "user",
        create: r#"CREATE TABLE IF NOT EXISTS "user" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            nickname TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            state INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT NULL
        )"#,
        columns: &["id", "username", "nickname", "email", "state", "created_at", "updated_at", "deleted_at"],
    },
    TableSchema {
        name: "tag",
        create: r#"CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0 CHECK (status IN (0, 1)),
            created_by TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT NULL
        )"#,
        columns: &["id", "name", "status", "created_by", "updated_by", "created_at", "updated_at", "deleted_at"],
    },
    TableSchema {
        name: "article",
        create: r#"CREATE TABLE IF NOT EXISTS article (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            cover_image_url TEXT NOT NULL DEFAULT '',
            state INTEGER NOT NULL DEFAULT 1 CHECK (state IN (0, 1)),
            created_by TEXT NOT NULL,
            updated_by TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT NULL
        )"#,
        columns: &[
            "id",
            "title",
            "description",
            "content",
            "cover_image_url",
            "state",
            "created_by",
            "updated_by",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    },
    TableSchema {
        name: "article_tag",
        create: r#"CREATE TABLE IF NOT EXISTS article_tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            state INTEGER NOT NULL DEFAULT 1 CHECK (state IN (0, 1)),
            created_by TEXT NOT NULL DEFAULT '',
            updated_by INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT NULL,
            FOREIGN KEY(article_id) REFERENCES article(id),
            FOREIGN KEY(tag_id) REFERENCES tag(id)
        )"#,
        columns: &[
            "id",
            "article_id",
            "tag_id",
            "state",
            "created_by",
            "updated_by",
            "created_at",
            "updated_at",
            "deleted_at",
        ],
    },
];

const INDEXES: &[(&str, &str)] = &[
    ("uq_user_username", r#"CREATE UNIQUE INDEX IF NOT EXISTS uq_user_username ON "user"(username)"#),
    ("idx_tag_name", "CREATE INDEX IF NOT EXISTS idx_tag_name ON tag(name)"),
    ("idx_article_state", "CREATE INDEX IF NOT EXISTS idx_article_state ON article(state, deleted_at)"),
    // One live association per (article, tag); soft-deleted rows do not count.
    (
        "uq_article_tag_live",
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_article_tag_live ON article_tag(article_id, tag_id) WHERE deleted_at IS NULL",
    ),
    ("idx_article_tag_tag", "CREATE INDEX IF NOT EXISTS idx_article_tag_tag ON article_tag(tag_id, deleted_at)"),
];

/// Brings the schema in line with the model.
///
/// Creates missing tables and indexes. Columns the model does not know are
/// dropped only with `opts.drop_columns`; otherwise they are reported and kept.
pub async fn migrate(pool: &SqlitePool, opts: MigrateOptions) -> anyhow::Result<()> {
    for table in TABLES {
        sqlx::query(table.create)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("failed creating table {}: {}", table.name, e))?;
    }

    for (name, stmt) in INDEXES {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("failed creating index {}: {}", name, e))?;
    }

    for table in TABLES {
        let existing = table_columns(pool, table.name).await?;
        let known: HashSet<&str> = table.columns.iter().copied().collect();
        for column in existing.iter().filter(|c| !known.contains(c.as_str())) {
            if opts.drop_columns {
                tracing::warn!(table = table.name, column = %column, "dropping column absent from model");
                let stmt = format!(r#"ALTER TABLE "{}" DROP COLUMN "{}""#, table.name, column.replace('"', "\"\""));
                sqlx::query(&stmt)
                    .execute(pool)
                    .await
                    .map_err(|e| anyhow::anyhow!("failed dropping {}.{}: {}", table.name, column, e))?;
            } else {
                tracing::warn!(table = table.name, column = %column, "column absent from model kept (drop_columns disabled)");
            }
        }
    }

    tracing::info!(drop_columns = opts.drop_columns, "schema migration finished");
    Ok(())
}

/// Column names of `table` in declaration order.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM pragma_table_info(?1)")
        .bind(table)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get::<String, _>("name")).collect())
}
