//! SQLite implementation of the shadow store

use super::traits::{slugify, ShadowError, ShadowStore, ShadowTopic, SyncLogEntry, SyncType};
use crate::topics::models::Topic;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    graph_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    level INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    slug TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_synced TEXT
);
CREATE INDEX IF NOT EXISTS idx_topics_level ON topics(level);
CREATE INDEX IF NOT EXISTS idx_topics_parent ON topics(parent_id);

CREATE TABLE IF NOT EXISTS topic_tags (
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (topic_id, tag)
);

CREATE TABLE IF NOT EXISTS topic_sync_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sync_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    success INTEGER NOT NULL DEFAULT 0,
    records_processed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_sync_logs_started ON topic_sync_logs(started_at);
";

const TOPIC_COLUMNS: &str = "id, graph_id, title, description, level, parent_id, slug, \
                             is_active, created_at, updated_at, last_synced";

const SYNC_COLUMNS: &str =
    "id, sync_type, started_at, completed_at, success, records_processed, error_message";

/// Shadow store over a single SQLite connection.
///
/// The connection sits behind a mutex and every call runs on the blocking
/// pool, so the store can be shared as `Arc<dyn ShadowStore>` without
/// stalling runtime workers. Writes are serialised through the one connection.
pub struct SqliteShadowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteShadowStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShadowError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory database, lost on drop
    pub fn in_memory() -> Result<Self, ShadowError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ShadowError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, ShadowError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, ShadowError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| ShadowError::Lock)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| ShadowError::Task(e.to_string()))?
    }

    /// Run a topic SELECT (`TOPIC_COLUMNS` first) and attach tags to every row
    fn query_topics(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ShadowTopic>, ShadowError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, TopicRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let tags = load_tags(conn, row.key)?;
                row.into_shadow(tags)
            })
            .collect()
    }

    fn query_syncs(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SyncLogEntry>, ShadowError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, SyncRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SyncRow::into_entry).collect()
    }

    fn upsert_blocking(conn: &mut Connection, topic: &Topic) -> Result<ShadowTopic, ShadowError> {
        let now = now_timestamp();
        let title = if topic.title.is_empty() {
            topic.id.as_str()
        } else {
            topic.title.as_str()
        };

        let tx = conn.transaction()?;
        let slug = assign_slug(&tx, &topic.id)?;
        let key: i64 = tx.query_row(
            "INSERT INTO topics
                 (graph_id, title, description, level, parent_id, slug, is_active,
                  created_at, updated_at, last_synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7, ?7)
             ON CONFLICT(graph_id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 level = excluded.level,
                 parent_id = excluded.parent_id,
                 is_active = 1,
                 updated_at = excluded.updated_at,
                 last_synced = excluded.last_synced
             RETURNING id",
            params![
                topic.id,
                title,
                topic.description,
                topic.level,
                topic.parent,
                slug,
                now
            ],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM topic_tags WHERE topic_id = ?1", params![key])?;
        {
            let mut insert =
                tx.prepare("INSERT OR IGNORE INTO topic_tags (topic_id, tag) VALUES (?1, ?2)")?;
            for tag in &topic.tags {
                insert.execute(params![key, tag])?;
            }
        }
        tx.commit()?;

        let sql = format!("SELECT {} FROM topics WHERE id = ?1", TOPIC_COLUMNS);
        Self::query_topics(conn, &sql, params![key])?
            .into_iter()
            .next()
            .ok_or(ShadowError::Database(rusqlite::Error::QueryReturnedNoRows))
    }
}

#[async_trait]
impl ShadowStore for SqliteShadowStore {
    async fn upsert_topic(&self, topic: &Topic) -> Result<ShadowTopic, ShadowError> {
        let topic = topic.clone();
        self.with_conn(move |conn| Self::upsert_blocking(conn, &topic))
            .await
    }

    async fn get_topic(&self, graph_id: &str) -> Result<Option<ShadowTopic>, ShadowError> {
        let graph_id = graph_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM topics WHERE graph_id = ?1", TOPIC_COLUMNS);
            Ok(Self::query_topics(conn, &sql, params![graph_id])?
                .into_iter()
                .next())
        })
        .await
    }

    async fn get_topic_by_slug(&self, slug: &str) -> Result<Option<ShadowTopic>, ShadowError> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM topics WHERE slug = ?1 AND is_active = 1",
                TOPIC_COLUMNS
            );
            Ok(Self::query_topics(conn, &sql, params![slug])?
                .into_iter()
                .next())
        })
        .await
    }

    async fn list_topics(&self) -> Result<Vec<ShadowTopic>, ShadowError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM topics WHERE is_active = 1 ORDER BY level, title",
                TOPIC_COLUMNS
            );
            Self::query_topics(conn, &sql, params![])
        })
        .await
    }

    async fn count_topics(&self) -> Result<usize, ShadowError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM topics WHERE is_active = 1",
                params![],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })
        .await
    }

    async fn search_topics(&self, term: &str) -> Result<Vec<ShadowTopic>, ShadowError> {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM topics
                 WHERE is_active = 1
                   AND (lower(title) LIKE ?1 ESCAPE '\\' OR lower(description) LIKE ?1 ESCAPE '\\')
                 ORDER BY level, title",
                TOPIC_COLUMNS
            );
            Self::query_topics(conn, &sql, params![pattern])
        })
        .await
    }

    async fn start_sync(&self, sync_type: SyncType) -> Result<i64, ShadowError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO topic_sync_logs (sync_type, started_at) VALUES (?1, ?2)",
                params![sync_type.as_str(), now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn complete_sync(
        &self,
        log_id: i64,
        success: bool,
        records_processed: usize,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError> {
        let error_message = error_message.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE topic_sync_logs
                 SET completed_at = ?2, success = ?3, records_processed = ?4, error_message = ?5
                 WHERE id = ?1",
                params![
                    log_id,
                    now_timestamp(),
                    success,
                    records_processed as i64,
                    error_message
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn last_successful_sync(
        &self,
        sync_type: SyncType,
    ) -> Result<Option<SyncLogEntry>, ShadowError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM topic_sync_logs
                 WHERE sync_type = ?1 AND success = 1 AND completed_at IS NOT NULL
                 ORDER BY completed_at DESC, id DESC LIMIT 1",
                SYNC_COLUMNS
            );
            Ok(Self::query_syncs(conn, &sql, params![sync_type.as_str()])?
                .into_iter()
                .next())
        })
        .await
    }

    async fn recent_syncs(
        &self,
        limit: usize,
        successful_only: bool,
    ) -> Result<Vec<SyncLogEntry>, ShadowError> {
        self.with_conn(move |conn| {
            let filter = if successful_only { "WHERE success = 1" } else { "" };
            let sql = format!(
                "SELECT {} FROM topic_sync_logs {} ORDER BY started_at DESC, id DESC LIMIT ?1",
                SYNC_COLUMNS, filter
            );
            Self::query_syncs(conn, &sql, params![limit as i64])
        })
        .await
    }
}

/// Slug for `graph_id`: the existing row's slug if there is one, otherwise
/// the first free one of `base`, `base-2`, `base-3`, ...
fn assign_slug(tx: &Transaction<'_>, graph_id: &str) -> Result<String, ShadowError> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT slug FROM topics WHERE graph_id = ?1",
            params![graph_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(slug) = existing {
        return Ok(slug);
    }

    let base = slugify(graph_id);
    let mut candidate = base.clone();
    let mut suffix = 2u32;
    loop {
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM topics WHERE slug = ?1)",
            params![candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
}

struct TopicRow {
    key: i64,
    graph_id: String,
    title: String,
    description: String,
    level: u32,
    parent_id: Option<String>,
    slug: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
    last_synced: Option<String>,
}

impl TopicRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            graph_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            level: row.get(4)?,
            parent_id: row.get(5)?,
            slug: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            last_synced: row.get(10)?,
        })
    }

    fn into_shadow(self, tags: Vec<String>) -> Result<ShadowTopic, ShadowError> {
        Ok(ShadowTopic {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            last_synced: self.last_synced.as_deref().map(parse_timestamp).transpose()?,
            graph_id: self.graph_id,
            title: self.title,
            description: self.description,
            level: self.level,
            parent_id: self.parent_id,
            slug: self.slug,
            tags,
            is_active: self.is_active,
        })
    }
}

struct SyncRow {
    id: i64,
    sync_type: String,
    started_at: String,
    completed_at: Option<String>,
    success: bool,
    records_processed: i64,
    error_message: Option<String>,
}

impl SyncRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sync_type: row.get(1)?,
            started_at: row.get(2)?,
            completed_at: row.get(3)?,
            success: row.get(4)?,
            records_processed: row.get(5)?,
            error_message: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<SyncLogEntry, ShadowError> {
        Ok(SyncLogEntry {
            id: self.id,
            sync_type: self.sync_type.parse()?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            success: self.success,
            records_processed: self.records_processed.max(0) as usize,
            error_message: self.error_message,
        })
    }
}

fn load_tags(conn: &Connection, key: i64) -> Result<Vec<String>, ShadowError> {
    let mut stmt = conn.prepare("SELECT tag FROM topic_tags WHERE topic_id = ?1 ORDER BY rowid")?;
    let tags = stmt
        .query_map(params![key], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ShadowError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ShadowError::InvalidTimestamp(format!("{}: {}", value, e)))
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
