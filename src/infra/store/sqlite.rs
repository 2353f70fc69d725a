//! SQLite-backed entry store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{sort_for_status, EntryStore, StoreError};
use crate::core::entry::{Entry, EntryId, EntryStatus};

const NEXT_NUMBER_KEY: &str = "next_post_number";

const SELECT_ENTRY: &str = "SELECT id, text, status, post_number, scheduled_time, post_id, \
                            created_at, denied_at FROM entries";

/// Entry store persisted in a single SQLite file.
///
/// Statements run on tokio's blocking pool; the connection is shared behind a
/// mutex so they execute one at a time.
pub struct SqliteEntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    /// Open (or create) the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        create_schema(&conn)?;

        tracing::info!(path = %path.display(), "sqlite entry store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
    }
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            status TEXT NOT NULL,
            post_number INTEGER,
            scheduled_time TEXT,
            post_id TEXT,
            created_at TEXT NOT NULL,
            denied_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_entries_status ON entries(status);
        CREATE INDEX IF NOT EXISTS idx_entries_number ON entries(post_number);

        CREATE TABLE IF NOT EXISTS counters (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Entry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RawEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawEntry::into_entry).collect()
}

/// Row as stored, before text columns are decoded.
struct RawEntry {
    id: String,
    text: String,
    status: String,
    post_number: Option<i64>,
    scheduled_time: Option<String>,
    post_id: Option<String>,
    created_at: String,
    denied_at: Option<String>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            status: row.get(2)?,
            post_number: row.get(3)?,
            scheduled_time: row.get(4)?,
            post_id: row.get(5)?,
            created_at: row.get(6)?,
            denied_at: row.get(7)?,
        })
    }

    fn into_entry(self) -> Result<Entry, StoreError> {
        let id: EntryId = self
            .id
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("entry id `{}`: {e}", self.id)))?;
        let status: EntryStatus = self.status.parse().map_err(StoreError::Corrupt)?;
        let post_number = self
            .post_number
            .map(|n| {
                u64::try_from(n).map_err(|_| StoreError::Corrupt(format!("post number {n}")))
            })
            .transpose()?;
        Ok(Entry {
            id,
            text: self.text,
            status,
            post_number,
            scheduled_time: self.scheduled_time.as_deref().map(parse_time).transpose()?,
            post_id: self.post_id,
            created_at: parse_time(&self.created_at)?,
            denied_at: self.denied_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp `{raw}`: {e}")))
}

fn to_sql_number(number: Option<u64>) -> Result<Option<i64>, StoreError> {
    number
        .map(|n| i64::try_from(n).map_err(|_| StoreError::Backend(format!("post number {n} too large"))))
        .transpose()
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn insert(&self, entry: &Entry) -> Result<(), StoreError> {
        let number = to_sql_number(entry.post_number)?;
        let entry = entry.clone();
        self.blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO entries
                    (id, text, status, post_number, scheduled_time, post_id, created_at, denied_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.to_string(),
                    entry.text,
                    entry.status.as_str(),
                    number,
                    entry.scheduled_time.map(|t| t.to_rfc3339()),
                    entry.post_id,
                    entry.created_at.to_rfc3339(),
                    entry.denied_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(entry.id));
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        self.blocking(move |conn| {
            conn.query_row(
                &format!("{SELECT_ENTRY} WHERE id = ?1"),
                params![id.to_string()],
                RawEntry::from_row,
            )
            .optional()?
            .map(RawEntry::into_entry)
            .transpose()
        })
        .await
    }

    async fn update(&self, entry: &Entry) -> Result<(), StoreError> {
        let number = to_sql_number(entry.post_number)?;
        let entry = entry.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE entries SET text = ?2, status = ?3, post_number = ?4,
                    scheduled_time = ?5, post_id = ?6, denied_at = ?7
                 WHERE id = ?1",
                params![
                    entry.id.to_string(),
                    entry.text,
                    entry.status.as_str(),
                    number,
                    entry.scheduled_time.map(|t| t.to_rfc3339()),
                    entry.post_id,
                    entry.denied_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::Missing(entry.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: EntryId) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            let removed =
                conn.execute("DELETE FROM entries WHERE id = ?1", params![id.to_string()])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<Entry>, StoreError> {
        let mut entries = self
            .blocking(move |conn| {
                query_entries(
                    conn,
                    &format!("{SELECT_ENTRY} WHERE status = ?1"),
                    params![status.as_str()],
                )
            })
            .await?;
        sort_for_status(&mut entries, status);
        Ok(entries)
    }

    async fn list_numbered_above(&self, number: u64) -> Result<Vec<Entry>, StoreError> {
        let floor = to_sql_number(Some(number))?;
        self.blocking(move |conn| {
            query_entries(
                conn,
                &format!(
                    "{SELECT_ENTRY} WHERE status IN ('scheduled', 'published')
                     AND post_number > ?1 ORDER BY post_number ASC"
                ),
                params![floor],
            )
        })
        .await
    }

    async fn load_next_number(&self) -> Result<Option<u64>, StoreError> {
        let value: Option<i64> = self
            .blocking(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM counters WHERE key = ?1",
                        params![NEXT_NUMBER_KEY],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        value
            .map(|v| u64::try_from(v).map_err(|_| StoreError::Corrupt(format!("counter {v}"))))
            .transpose()
    }

    async fn save_next_number(&self, next: u64) -> Result<(), StoreError> {
        let value = to_sql_number(Some(next))?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO counters (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![NEXT_NUMBER_KEY, value],
            )?;
            Ok(())
        })
        .await
    }
}
