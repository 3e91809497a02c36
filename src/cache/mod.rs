//! Durable key-value store for user-supplied datasets.
//!
//! Entries live in a single SQLite file that is opened lazily on first use
//! and reused for the life of the cache. If the file cannot be opened the
//! cache keeps entries in memory instead and reports itself as unsupported.
//! No operation returns an error: failures resolve to `false`, `None` or an
//! empty list and are logged under the `cache` domain.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::logging::{log, log_cache_failure, obj, v_str, ts_epoch_ms, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// JSON array of records for one year
    Dataset,
    /// JSON object holding the national context
    Context,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Dataset => "dataset",
            ContentType::Context => "context",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "context" => ContentType::Context,
            _ => ContentType::Dataset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub name: String,
    pub contents: String,
    pub content_type: ContentType,
    /// Epoch milliseconds of the last write
    pub updated_at: u64,
    /// SHA-256 of `contents`, hex encoded
    pub digest: String,
}

impl StoredEntry {
    pub fn new(name: &str, contents: &str, content_type: ContentType) -> Self {
        Self {
            name: name.to_string(),
            contents: contents.to_string(),
            content_type,
            updated_at: ts_epoch_ms(),
            digest: content_digest(contents),
        }
    }
}

pub fn content_digest(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hex::encode(hasher.finalize())
}

/// Asynchronous key-value persistence. Implementations never fail outward.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// True when entries survive a restart.
    async fn is_supported(&self) -> bool;
    async fn save(&self, name: &str, contents: &str, content_type: ContentType) -> bool;
    async fn load(&self, name: &str) -> Option<StoredEntry>;
    /// Every stored entry, ordered by name.
    async fn list(&self) -> Vec<StoredEntry>;
    async fn remove(&self, name: &str) -> bool;
    async fn clear(&self) -> bool;
}

enum Backend {
    Sqlite(Arc<Mutex<Connection>>),
    Memory(Mutex<BTreeMap<String, StoredEntry>>),
}

pub struct LocalCache {
    path: Option<PathBuf>,
    backend: OnceCell<Backend>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    name TEXT PRIMARY KEY,
    contents TEXT NOT NULL,
    content_type TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    digest TEXT NOT NULL
);";

fn open_sqlite(path: PathBuf) -> Result<Connection> {
    let conn = Connection::open(&path).with_context(|| format!("open {}", path.display()))?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEntry> {
    let content_type: String = row.get(2)?;
    let updated_at: i64 = row.get(3)?;
    Ok(StoredEntry {
        name: row.get(0)?,
        contents: row.get(1)?,
        content_type: ContentType::parse(&content_type),
        updated_at: updated_at.max(0) as u64,
        digest: row.get(4)?,
    })
}

async fn with_conn<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock().map_err(|_| anyhow!("cache connection poisoned"))?;
        f(&guard)
    })
    .await
    .context("cache task panicked")?
}

impl LocalCache {
    /// Cache backed by the SQLite file at `path`. An empty path keeps
    /// everything in memory.
    pub fn new(path: &str) -> Self {
        let path = if path.trim().is_empty() { None } else { Some(PathBuf::from(path)) };
        Self { path, backend: OnceCell::new() }
    }

    pub fn in_memory() -> Self {
        Self::new("")
    }

    async fn backend(&self) -> &Backend {
        self.backend
            .get_or_init(|| async {
                let Some(path) = self.path.clone() else {
                    return Backend::Memory(Mutex::new(BTreeMap::new()));
                };
                let opened = tokio::task::spawn_blocking(move || open_sqlite(path))
                    .await
                    .map_err(anyhow::Error::from)
                    .and_then(|r| r);
                match opened {
                    Ok(conn) => {
                        log(Level::Debug, Domain::Cache, "cache_open", obj(&[("backend", v_str("sqlite"))]));
                        Backend::Sqlite(Arc::new(Mutex::new(conn)))
                    }
                    Err(err) => {
                        log_cache_failure("open", None, &err);
                        Backend::Memory(Mutex::new(BTreeMap::new()))
                    }
                }
            })
            .await
    }

    fn settle<T>(&self, op: &str, name: Option<&str>, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(err) => {
                log_cache_failure(op, name, &err);
                None
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for LocalCache {
    async fn is_supported(&self) -> bool {
        matches!(self.backend().await, Backend::Sqlite(_))
    }

    async fn save(&self, name: &str, contents: &str, content_type: ContentType) -> bool {
        let entry = StoredEntry::new(name, contents, content_type);
        let result = match self.backend().await {
            Backend::Sqlite(conn) => {
                with_conn(conn, move |c| {
                    c.execute(
                        "INSERT OR REPLACE INTO entries (name, contents, content_type, updated_at, digest)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            entry.name,
                            entry.contents,
                            entry.content_type.as_str(),
                            entry.updated_at as i64,
                            entry.digest
                        ],
                    )?;
                    Ok(())
                })
                .await
            }
            Backend::Memory(map) => lock_memory(map).map(|mut m| {
                m.insert(entry.name.clone(), entry);
            }),
        };
        self.settle("save", Some(name), result).is_some()
    }

    async fn load(&self, name: &str) -> Option<StoredEntry> {
        let key = name.to_string();
        let result = match self.backend().await {
            Backend::Sqlite(conn) => {
                with_conn(conn, move |c| {
                    let entry = c
                        .query_row(
                            "SELECT name, contents, content_type, updated_at, digest FROM entries WHERE name = ?1",
                            params![key],
                            row_to_entry,
                        )
                        .optional()?;
                    Ok(entry)
                })
                .await
            }
            Backend::Memory(map) => lock_memory(map).map(|m| m.get(&key).cloned()),
        };
        self.settle("load", Some(name), result).flatten()
    }

    async fn list(&self) -> Vec<StoredEntry> {
        let result = match self.backend().await {
            Backend::Sqlite(conn) => {
                with_conn(conn, |c| {
                    let mut stmt = c.prepare(
                        "SELECT name, contents, content_type, updated_at, digest FROM entries ORDER BY name",
                    )?;
                    let rows = stmt.query_map([], row_to_entry)?;
                    let mut out = Vec::new();
                    for row in rows {
                        out.push(row?);
                    }
                    Ok(out)
                })
                .await
            }
            Backend::Memory(map) => lock_memory(map).map(|m| m.values().cloned().collect()),
        };
        self.settle("list", None, result).unwrap_or_default()
    }

    async fn remove(&self, name: &str) -> bool {
        let key = name.to_string();
        let result = match self.backend().await {
            Backend::Sqlite(conn) => {
                with_conn(conn, move |c| {
                    c.execute("DELETE FROM entries WHERE name = ?1", params![key])?;
                    Ok(())
                })
                .await
            }
            Backend::Memory(map) => lock_memory(map).map(|mut m| {
                m.remove(&key);
            }),
        };
        self.settle("remove", Some(name), result).is_some()
    }

    async fn clear(&self) -> bool {
        let result = match self.backend().await {
            Backend::Sqlite(conn) => {
                with_conn(conn, |c| {
                    c.execute("DELETE FROM entries", [])?;
                    Ok(())
                })
                .await
            }
            Backend::Memory(map) => lock_memory(map).map(|mut m| m.clear()),
        };
        self.settle("clear", None, result).is_some()
    }
}

fn lock_memory(
    map: &Mutex<BTreeMap<String, StoredEntry>>,
) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredEntry>>> {
    map.lock().map_err(|_| anyhow!("memory cache poisoned"))
}
