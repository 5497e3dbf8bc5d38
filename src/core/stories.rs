use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tracing::warn;

use crate::core::api::types::StoryData;

/// Serialized stories up to this size are stored inline in SQLite; larger
/// payloads spill to a file on disk with a pointer row.
const INLINE_LIMIT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoredStory {
    pub story_id: String,
    pub name: String,
    pub saved_at: Option<String>,
}

/// Local persistence for downloaded stories. SQLite is the fast path; a
/// failed inline write falls back to the spill file automatically.
pub struct StoryStore {
    db: Arc<Mutex<Connection>>,
    spill_dir: PathBuf,
    inline_limit: usize,
}

impl StoryStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = Connection::open(dir.join("stories.db"))?;
        Self::with_connection(db, dir.join("spill"), INLINE_LIMIT_BYTES)
    }

    fn with_connection(db: Connection, spill_dir: PathBuf, inline_limit: usize) -> Result<Self> {
        std::fs::create_dir_all(&spill_dir)?;
        db.execute(
            "CREATE TABLE IF NOT EXISTS stories (
                story_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                payload TEXT,
                spill_path TEXT,
                saved_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            spill_dir,
            inline_limit,
        })
    }

    pub async fn save(&self, story_id: &str, name: &str, data: &StoryData) -> Result<()> {
        let serialized = serde_json::to_string(data)?;

        if serialized.len() <= self.inline_limit {
            let inline = {
                let db = self.db.lock().await;
                db.execute(
                    "INSERT OR REPLACE INTO stories (story_id, name, payload, spill_path) \
                     VALUES (?1, ?2, ?3, NULL)",
                    params![story_id, name, serialized],
                )
            };
            match inline {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(story_id, "Inline story write failed, spilling to disk: {}", e);
                }
            }
        }

        let path = self.spill_path(story_id);
        tokio::fs::write(&path, &serialized)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO stories (story_id, name, payload, spill_path) \
             VALUES (?1, ?2, NULL, ?3)",
            params![story_id, name, path.to_string_lossy()],
        )?;
        Ok(())
    }

    pub async fn load(&self, story_id: &str) -> Result<Option<(String, StoryData)>> {
        let row = {
            let db = self.db.lock().await;
            db.query_row(
                "SELECT name, payload, spill_path FROM stories WHERE story_id = ?1",
                params![story_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((name, payload, spill_path)) = row else {
            return Ok(None);
        };

        let serialized = match (payload, spill_path) {
            (Some(inline), _) => inline,
            (None, Some(path)) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read spilled story at {}", path))?,
            (None, None) => return Err(anyhow!("Story {} has no payload or spill path", story_id)),
        };

        let data: StoryData = serde_json::from_str(&serialized)?;
        Ok(Some((name, data)))
    }

    pub async fn list(&self) -> Result<Vec<StoredStory>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT story_id, name, saved_at FROM stories ORDER BY saved_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredStory {
                story_id: row.get(0)?,
                name: row.get(1)?,
                saved_at: row.get(2)?,
            })
        })?;

        let mut stories = Vec::new();
        for row in rows {
            stories.push(row?);
        }
        Ok(stories)
    }

    pub async fn remove(&self, story_id: &str) -> Result<()> {
        let spill = {
            let db = self.db.lock().await;
            let path: Option<Option<String>> = db
                .query_row(
                    "SELECT spill_path FROM stories WHERE story_id = ?1",
                    params![story_id],
                    |row| row.get(0),
                )
                .optional()?;
            db.execute("DELETE FROM stories WHERE story_id = ?1", params![story_id])?;
            path.flatten()
        };

        if let Some(path) = spill {
            let _ = tokio::fs::remove_file(&path).await;
        }
        Ok(())
    }

    fn spill_path(&self, story_id: &str) -> PathBuf {
        // Hex keeps arbitrary ids filesystem-safe.
        self.spill_dir
            .join(format!("{}.json", hex::encode(story_id.as_bytes())))
    }
}
