use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;

/// A cached (or synthesized) response body with just enough metadata to
/// replay it faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn ok(content_type: &str, body: Bytes) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The two named cache partitions. Each is versioned; entries from a
/// superseded version are never served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Shell,
    Runtime,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Shell => "shell",
            Partition::Runtime => "runtime",
        }
    }
}

/// SQLite-backed cache partitions keyed by full request URL. Per-key
/// put/get/delete are single statements, so no locking beyond the shared
/// connection handle is needed.
#[derive(Clone)]
pub struct CacheStore {
    db: Arc<Mutex<Connection>>,
    version: String,
}

impl CacheStore {
    pub fn open<P: AsRef<Path>>(path: P, version: &str) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        Self::with_connection(db, version)
    }

    pub fn open_in_memory(version: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, version)
    }

    fn with_connection(db: Connection, version: &str) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                partition TEXT NOT NULL,
                version TEXT NOT NULL,
                key TEXT NOT NULL,
                status INTEGER NOT NULL,
                content_type TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (partition, version, key)
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            version: version.to_string(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up an entry in the current version of a partition.
    pub async fn get(&self, partition: Partition, key: &str) -> Result<Option<CachedResponse>> {
        let db = self.db.lock().await;
        let row = db
            .query_row(
                "SELECT status, content_type, body FROM cache_entries \
                 WHERE partition = ?1 AND version = ?2 AND key = ?3",
                params![partition.as_str(), self.version, key],
                |row| {
                    Ok(CachedResponse {
                        status: row.get(0)?,
                        content_type: row.get(1)?,
                        body: Bytes::from(row.get::<_, Vec<u8>>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub async fn put(&self, partition: Partition, key: &str, response: &CachedResponse) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO cache_entries \
             (partition, version, key, status, content_type, body) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                partition.as_str(),
                self.version,
                key,
                response.status,
                response.content_type,
                response.body.as_ref(),
            ],
        )?;
        Ok(())
    }

    pub async fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "DELETE FROM cache_entries WHERE partition = ?1 AND version = ?2 AND key = ?3",
            params![partition.as_str(), self.version, key],
        )?;
        Ok(())
    }

    /// Delete every partition whose version differs from the current one.
    /// Returns the `name-version` labels that were purged.
    pub async fn purge_stale(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;

        let mut purged = Vec::new();
        {
            let mut stmt = db.prepare(
                "SELECT DISTINCT partition, version FROM cache_entries WHERE version != ?1",
            )?;
            let rows = stmt.query_map(params![self.version], |row| {
                let partition: String = row.get(0)?;
                let version: String = row.get(1)?;
                Ok(format!("{}-{}", partition, version))
            })?;
            for row in rows {
                purged.push(row?);
            }
        }

        db.execute(
            "DELETE FROM cache_entries WHERE version != ?1",
            params![self.version],
        )?;
        Ok(purged)
    }

    /// Full purge across all partitions and versions.
    pub async fn clear_all(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }

    /// Entry counts per `name-version` label, for status output.
    pub async fn stats(&self) -> Result<Vec<(String, u64)>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT partition || '-' || version, COUNT(*) FROM cache_entries \
             GROUP BY partition, version ORDER BY 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }
}
