//! SQLite-backed long-term memory.
//!
//! Campaign knowledge and anything else that must survive restarts lands
//! here. The connection is wrapped in a `Mutex` because rusqlite connections
//! are not `Sync`; each operation takes the lock briefly on a blocking-safe
//! scale (single-row statements).

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

use leadflow_core::{MemoryEntry, MemoryError, MemoryKind, MemoryProvider, MemoryQuery};

const BACKEND: &str = "sqlite";

/// Persistent memory provider backed by a single SQLite database file.
pub struct SqliteProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProvider {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| MemoryError::ConnectionFailed {
                backend: BACKEND,
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| MemoryError::ConnectionFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        Self::initialize(conn)
    }

    /// Open an in-memory database. Test use only; data is lost on drop.
    pub fn in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory().map_err(|e| MemoryError::ConnectionFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS memory_entries (
                id        TEXT PRIMARY KEY,
                kind      TEXT NOT NULL,
                content   TEXT NOT NULL,
                metadata  TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_memory_kind ON memory_entries(kind);
            CREATE INDEX IF NOT EXISTS idx_memory_timestamp ON memory_entries(timestamp);
            "#,
        )
        .map_err(|e| MemoryError::ConnectionFailed {
            backend: BACKEND,
            reason: format!("migration failed: {e}"),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, MemoryError> {
        self.conn.lock().map_err(|_| MemoryError::ConnectionFailed {
            backend: BACKEND,
            reason: "connection mutex poisoned".to_string(),
        })
    }

    fn row_to_entry(
        id: String,
        kind: String,
        content: String,
        metadata: String,
        timestamp: String,
    ) -> Result<MemoryEntry, MemoryError> {
        let kind = MemoryKind::from_str(&kind).ok_or_else(|| MemoryError::Serialization {
            backend: BACKEND,
            reason: format!("unknown memory kind '{kind}'"),
        })?;
        let metadata = serde_json::from_str(&metadata).map_err(|e| MemoryError::Serialization {
            backend: BACKEND,
            reason: format!("bad metadata JSON: {e}"),
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| MemoryError::Serialization {
                backend: BACKEND,
                reason: format!("bad timestamp: {e}"),
            })?
            .with_timezone(&Utc);

        Ok(MemoryEntry {
            id,
            content,
            metadata,
            timestamp,
            kind,
        })
    }
}

#[async_trait]
impl MemoryProvider for SqliteProvider {
    async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        let metadata = serde_json::to_string(&entry.metadata).map_err(|e| {
            MemoryError::Serialization {
                backend: BACKEND,
                reason: e.to_string(),
            }
        })?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO memory_entries (id, kind, content, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.kind.as_str(),
                entry.content,
                metadata,
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| MemoryError::StoreFailed {
            backend: BACKEND,
            id: entry.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn retrieve(
        &self,
        query: &MemoryQuery,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let conn = self.lock()?;

        let (sql, kind_param) = match query.kind {
            Some(kind) => (
                "SELECT id, kind, content, metadata, timestamp FROM memory_entries
                 WHERE kind = ?1 ORDER BY timestamp DESC",
                Some(kind.as_str()),
            ),
            None => (
                "SELECT id, kind, content, metadata, timestamp FROM memory_entries
                 ORDER BY timestamp DESC",
                None,
            ),
        };

        let mut stmt = conn.prepare(sql).map_err(|e| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String, String, String)> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        };

        let rows = match kind_param {
            Some(kind) => stmt.query_map(params![kind], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;

        // Metadata filters are applied in Rust since metadata is stored as a
        // JSON blob; rows arrive newest-first so we can stop at the limit.
        let mut entries = Vec::new();
        for row in rows {
            let (id, kind, content, metadata, timestamp) =
                row.map_err(|e| MemoryError::RetrieveFailed {
                    backend: BACKEND,
                    reason: e.to_string(),
                })?;
            let entry = Self::row_to_entry(id, kind, content, metadata, timestamp)?;
            if entry.matches(query) {
                entries.push(entry);
                if entries.len() >= limit {
                    break;
                }
            }
        }
        Ok(entries)
    }

    async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError> {
        let conn = self.lock()?;
        let affected = conn
            .execute("DELETE FROM memory_entries WHERE id = ?1", params![entry_id])
            .map_err(|e| MemoryError::DeleteFailed {
                backend: BACKEND,
                id: entry_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(affected > 0)
    }

    async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError> {
        let conn = self.lock()?;
        let result = match kind {
            Some(kind) => conn.execute(
                "DELETE FROM memory_entries WHERE kind = ?1",
                params![kind.as_str()],
            ),
            None => conn.execute("DELETE FROM memory_entries", []),
        };
        result.map_err(|e| MemoryError::ClearFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        kind: Option<MemoryKind>,
    ) -> Result<usize, MemoryError> {
        // RFC 3339 timestamps in UTC compare correctly as strings.
        let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Micros, true);

        let conn = self.lock()?;
        let result = match kind {
            Some(kind) => conn.execute(
                "DELETE FROM memory_entries WHERE timestamp < ?1 AND kind = ?2",
                params![cutoff, kind.as_str()],
            ),
            None => conn.execute(
                "DELETE FROM memory_entries WHERE timestamp < ?1",
                params![cutoff],
            ),
        };
        result.map_err(|e| MemoryError::ClearFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn round_trips_entries_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");

        let provider = SqliteProvider::open(&path).unwrap();
        let entry = MemoryEntry::conversation("s1", "agent", "hello", "hi there");
        let id = entry.id.clone();
        provider.store(entry).await.unwrap();
        drop(provider);

        let provider = SqliteProvider::open(&path).unwrap();
        let results = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert!(results[0].content.contains("hello"));
    }

    #[tokio::test]
    async fn store_same_id_replaces() {
        let provider = SqliteProvider::in_memory().unwrap();
        let mut entry = MemoryEntry::conversation("s1", "agent", "v1", "a");
        entry.id = "fixed".to_string();
        provider.store(entry.clone()).await.unwrap();
        entry.content = "v2".to_string();
        provider.store(entry).await.unwrap();

        let results = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "v2");
    }

    #[tokio::test]
    async fn retrieve_applies_metadata_filter_and_limit() {
        let provider = SqliteProvider::in_memory().unwrap();
        for i in 0..4 {
            let mut metrics = HashMap::new();
            metrics.insert("open_rate".to_string(), serde_json::json!(0.1 * i as f64));
            provider
                .store(MemoryEntry::campaign(
                    &format!("c{i}"),
                    if i % 2 == 0 { "email" } else { "social" },
                    &metrics,
                    &[],
                ))
                .await
                .unwrap();
        }

        let query = MemoryQuery::kind(MemoryKind::Campaign).with_filter("campaign_type", "email");
        let results = provider.retrieve(&query, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].metadata.get("campaign_type").map(String::as_str),
            Some("email")
        );
    }

    #[tokio::test]
    async fn delete_older_than_uses_cutoff() {
        let provider = SqliteProvider::in_memory().unwrap();

        let mut old = MemoryEntry::conversation("s1", "agent", "stale", "x");
        old.timestamp = Utc::now() - chrono::Duration::days(30);
        provider.store(old).await.unwrap();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "fresh", "y"))
            .await
            .unwrap();

        let deleted = provider
            .delete_older_than(Utc::now() - chrono::Duration::days(7), None)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].content.contains("fresh"));
    }

    #[tokio::test]
    async fn clear_by_kind() {
        let provider = SqliteProvider::in_memory().unwrap();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "a", "b"))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::campaign("c1", "email", &HashMap::new(), &[]))
            .await
            .unwrap();

        provider.clear(Some(MemoryKind::Conversation)).await.unwrap();

        let conversations = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 10)
            .await
            .unwrap();
        assert!(conversations.is_empty());

        let campaigns = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Campaign), 10)
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
    }
}
