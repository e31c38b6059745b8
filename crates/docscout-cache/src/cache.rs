use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Row counts reported by `stats()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub documents: usize,
    pub expired: usize,
    pub queries: usize,
}

/// Document cache using SQLite + FTS5
///
/// Values are stored as JSON keyed by `(source, key)`. Each value also gets
/// an FTS5 row so offline searches can run against cached text. Entries
/// older than the TTL are invisible to reads and removed by
/// `purge_expired`.
pub struct DocumentCache {
    conn: Mutex<Connection>,
    ttl: Option<Duration>,
}

impl DocumentCache {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl: None,
        })
    }

    /// Expire entries after `hours`; 0 or a span too large to represent keeps entries forever
    pub fn with_ttl(mut self, hours: u64) -> Self {
        self.ttl = match i64::try_from(hours).ok().and_then(Duration::try_hours) {
            Some(ttl) if hours > 0 => Some(ttl),
            Some(_) => None,
            None => {
                warn!("TTL of {} hours is out of range, entries will not expire", hours);
                None
            }
        };
        self
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                source TEXT NOT NULL,
                key TEXT NOT NULL,
                data TEXT NOT NULL,
                cached_at INTEGER NOT NULL,
                UNIQUE(source, key)
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts
                USING fts5(source UNINDEXED, key UNINDEXED, body);
            CREATE TABLE IF NOT EXISTS queries (
                namespace TEXT NOT NULL,
                query TEXT NOT NULL,
                keys TEXT NOT NULL,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY(namespace, query)
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Oldest `cached_at` still considered fresh
    fn fresh_since(&self) -> i64 {
        match self.ttl {
            Some(ttl) => Utc::now()
                .checked_sub_signed(ttl)
                .map_or(i64::MIN, |since| since.timestamp()),
            None => i64::MIN,
        }
    }

    /// Insert or replace a value together with its searchable text
    pub fn set<T: Serialize>(&self, source: &str, key: &str, value: &T, body: &str) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let now = Utc::now().timestamp();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (source, key, data, cached_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source, key) DO UPDATE SET data = excluded.data, cached_at = excluded.cached_at",
            params![source, key, data, now],
        )?;
        tx.execute(
            "DELETE FROM documents_fts WHERE source = ?1 AND key = ?2",
            params![source, key],
        )?;
        tx.execute(
            "INSERT INTO documents_fts (source, key, body) VALUES (?1, ?2, ?3)",
            params![source, key, body],
        )?;
        tx.commit()?;

        debug!("Cached {}:{}", source, key);
        Ok(())
    }

    /// Fetch a fresh value
    pub fn get<T: DeserializeOwned>(&self, source: &str, key: &str) -> Result<T> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE source = ?1 AND key = ?2 AND cached_at >= ?3",
                params![source, key, self.fresh_since()],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(CacheError::NotFound(format!("{}:{}", source, key))),
        }
    }

    /// Full-text search over cached values, best match first
    pub fn search<T: DeserializeOwned>(&self, query: &str, limit: usize) -> Result<Vec<T>> {
        let fts_query = fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT d.data FROM documents_fts f
             JOIN documents d ON d.source = f.source AND d.key = f.key
             WHERE documents_fts MATCH ?1 AND d.cached_at >= ?2
             ORDER BY bm25(documents_fts)
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![fts_query, self.fresh_since(), limit as i64],
            |row| row.get::<_, String>(0),
        )?;

        let mut results = Vec::new();
        for data in rows {
            results.push(serde_json::from_str(&data?)?);
        }
        Ok(results)
    }

    /// Remember which keys a query produced
    pub fn set_query_results(&self, namespace: &str, query: &str, keys: &[String]) -> Result<()> {
        let keys = serde_json::to_string(keys)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queries (namespace, query, keys, cached_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, query) DO UPDATE SET keys = excluded.keys, cached_at = excluded.cached_at",
            params![namespace, query, keys, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Keys a fresh query entry points to
    pub fn query_results(&self, namespace: &str, query: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let keys: Option<String> = conn
            .query_row(
                "SELECT keys FROM queries WHERE namespace = ?1 AND query = ?2 AND cached_at >= ?3",
                params![namespace, query, self.fresh_since()],
                |row| row.get(0),
            )
            .optional()?;

        match keys {
            Some(keys) => Ok(serde_json::from_str(&keys)?),
            None => Err(CacheError::NotFound(format!("{}?{}", namespace, query))),
        }
    }

    /// Delete entries older than the TTL, returning how many documents went
    pub fn purge_expired(&self) -> Result<usize> {
        let since = self.fresh_since();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM documents_fts WHERE rowid IN (
                SELECT f.rowid FROM documents_fts f
                JOIN documents d ON d.source = f.source AND d.key = f.key
                WHERE d.cached_at < ?1)",
            params![since],
        )?;
        let removed = tx.execute("DELETE FROM documents WHERE cached_at < ?1", params![since])?;
        tx.execute("DELETE FROM queries WHERE cached_at < ?1", params![since])?;
        tx.commit()?;

        debug!("Purged {} expired documents", removed);
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM documents; DELETE FROM documents_fts; DELETE FROM queries;",
        )?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let since = self.fresh_since();
        let conn = self.lock()?;
        let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        let expired: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE cached_at < ?1",
            params![since],
            |r| r.get(0),
        )?;
        let queries: i64 = conn.query_row("SELECT COUNT(*) FROM queries", [], |r| r.get(0))?;

        Ok(CacheStats {
            documents: documents as usize,
            expired: expired as usize,
            queries: queries as usize,
        })
    }

    #[cfg(test)]
    fn backdate(&self, source: &str, key: &str, hours: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE documents SET cached_at = cached_at - ?1 WHERE source = ?2 AND key = ?3",
            params![hours * 3600, source, key],
        )?;
        Ok(())
    }
}

/// Quote every word so user text can't inject FTS5 syntax, then OR them
fn fts_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(" OR ")
}
