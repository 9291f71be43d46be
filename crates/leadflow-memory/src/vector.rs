//! Vector store for semantic recall.
//!
//! Embeddings live in a SQLite table alongside the entry they describe;
//! similarity search is a full scan with cosine scoring. That is plenty for
//! the thousands of conversation and campaign records this system holds,
//! and keeps the storage story down to one file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

use leadflow_core::{MemoryEntry, MemoryError, MemoryKind, MemoryProvider, MemoryQuery};

use crate::embedding::Embedder;

const BACKEND: &str = "vector";

/// Cosine similarity between two vectors. Returns 0.0 when either vector has
/// zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An entry paired with its embedding, as stored.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub entry: MemoryEntry,
    pub vector: Vec<f32>,
}

/// A search result with its similarity score.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub entry: MemoryEntry,
    pub score: f32,
}

/// SQLite-backed vector table. Synchronous; async callers go through
/// [`VectorProvider`] or wrap calls themselves.
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl VectorStore {
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

            CREATE TABLE IF NOT EXISTS vector_entries (
                id        TEXT PRIMARY KEY,
                vector    BLOB NOT NULL,
                content   TEXT NOT NULL,
                kind      TEXT NOT NULL,
                metadata  TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_vector_kind ON vector_entries(kind);
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

    /// Insert or replace a record.
    pub fn upsert(&self, record: &VectorRecord) -> Result<(), MemoryError> {
        let vector = bincode::serialize(&record.vector).map_err(|e| {
            MemoryError::Serialization {
                backend: BACKEND,
                reason: format!("vector encode failed: {e}"),
            }
        })?;
        let metadata = serde_json::to_string(&record.entry.metadata).map_err(|e| {
            MemoryError::Serialization {
                backend: BACKEND,
                reason: e.to_string(),
            }
        })?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO vector_entries (id, vector, content, kind, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.entry.id,
                vector,
                record.entry.content,
                record.entry.kind.as_str(),
                metadata,
                record
                    .entry
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| MemoryError::StoreFailed {
            backend: BACKEND,
            id: record.entry.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn scan<F>(&self, kind: Option<&str>, mut visit: F) -> Result<(), MemoryError>
    where
        F: FnMut(VectorRecord) -> Result<(), MemoryError>,
    {
        let conn = self.lock()?;
        let (sql, kind_param) = match kind {
            Some(kind) => (
                "SELECT id, vector, content, kind, metadata, timestamp FROM vector_entries
                 WHERE kind = ?1",
                Some(kind),
            ),
            None => (
                "SELECT id, vector, content, kind, metadata, timestamp FROM vector_entries",
                None,
            ),
        };
        let mut stmt = conn.prepare(sql).map_err(|e| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;

        type Row = (String, Vec<u8>, String, String, String, String);
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<Row> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        };

        let rows = match kind_param {
            Some(kind) => stmt.query_map(params![kind], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;

        for row in rows {
            let (id, vector, content, kind, metadata, timestamp) =
                row.map_err(|e| MemoryError::RetrieveFailed {
                    backend: BACKEND,
                    reason: e.to_string(),
                })?;

            let vector: Vec<f32> =
                bincode::deserialize(&vector).map_err(|e| MemoryError::Serialization {
                    backend: BACKEND,
                    reason: format!("vector decode failed: {e}"),
                })?;
            let kind = MemoryKind::from_str(&kind).ok_or_else(|| MemoryError::Serialization {
                backend: BACKEND,
                reason: format!("unknown memory kind '{kind}'"),
            })?;
            let metadata: HashMap<String, String> =
                serde_json::from_str(&metadata).map_err(|e| MemoryError::Serialization {
                    backend: BACKEND,
                    reason: format!("bad metadata JSON: {e}"),
                })?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| MemoryError::Serialization {
                    backend: BACKEND,
                    reason: format!("bad timestamp: {e}"),
                })?
                .with_timezone(&Utc);

            visit(VectorRecord {
                entry: MemoryEntry {
                    id,
                    content,
                    metadata,
                    timestamp,
                    kind,
                },
                vector,
            })?;
        }
        Ok(())
    }

    /// Rank stored entries against `query_vector` by cosine similarity.
    /// Results below `min_score` are dropped; the rest come back best-first.
    pub fn search(
        &self,
        query_vector: &[f32],
        min_score: f32,
        limit: usize,
        kind: Option<&str>,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<VectorHit>, MemoryError> {
        let mut hits = Vec::new();
        self.scan(kind, |record| {
            let matches_filters = filters
                .iter()
                .all(|(k, v)| record.entry.metadata.get(k) == Some(v));
            if matches_filters {
                let score = cosine_similarity(query_vector, &record.vector);
                if score >= min_score {
                    hits.push(VectorHit {
                        entry: record.entry,
                        score,
                    });
                }
            }
            Ok(())
        })?;

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// List entries without scoring, newest first. Serves queries that have
    /// filters but no text.
    pub fn list(
        &self,
        kind: Option<&str>,
        filters: &HashMap<String, String>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut entries = Vec::new();
        self.scan(kind, |record| {
            let matches_filters = filters
                .iter()
                .all(|(k, v)| record.entry.metadata.get(k) == Some(v));
            if matches_filters {
                entries.push(record.entry);
            }
            Ok(())
        })?;

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize, MemoryError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM vector_entries", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(|e| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })
    }

    pub fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let conn = self.lock()?;
        let affected = conn
            .execute("DELETE FROM vector_entries WHERE id = ?1", params![id])
            .map_err(|e| MemoryError::DeleteFailed {
                backend: BACKEND,
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(affected > 0)
    }

    pub fn clear(&self, kind: Option<&str>) -> Result<(), MemoryError> {
        let conn = self.lock()?;
        let result = match kind {
            Some(kind) => conn.execute("DELETE FROM vector_entries WHERE kind = ?1", params![kind]),
            None => conn.execute("DELETE FROM vector_entries", []),
        };
        result.map_err(|e| MemoryError::ClearFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Memory provider that embeds entry content on write and serves semantic
/// queries on read.
pub struct VectorProvider {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorProvider {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Semantic search returning scored hits rather than bare entries.
    pub fn search_scored(
        &self,
        text: &str,
        min_score: f32,
        limit: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<VectorHit>, MemoryError> {
        let query_vector = self.embedder.embed(text);
        self.store.search(
            &query_vector,
            min_score,
            limit,
            kind.map(|k| k.as_str()),
            &HashMap::new(),
        )
    }
}

#[async_trait]
impl MemoryProvider for VectorProvider {
    async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        let vector = self.embedder.embed(&entry.content);
        self.store.upsert(&VectorRecord { entry, vector })
    }

    async fn retrieve(
        &self,
        query: &MemoryQuery,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let kind = query.kind.map(|k| k.as_str());
        match &query.text {
            Some(text) => {
                let query_vector = self.embedder.embed(text);
                let hits = self
                    .store
                    .search(&query_vector, 0.0, limit, kind, &query.filters)?;
                Ok(hits
                    .into_iter()
                    .filter(|hit| hit.score > 0.0)
                    .map(|hit| hit.entry)
                    .collect())
            }
            None => self.store.list(kind, &query.filters, limit),
        }
    }

    async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError> {
        self.store.delete(entry_id)
    }

    async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError> {
        self.store.clear(kind.map(|k| k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn provider() -> VectorProvider {
        VectorProvider::new(
            Arc::new(VectorStore::in_memory().unwrap()),
            Arc::new(HashEmbedder::default()),
        )
    }

    #[test]
    fn cosine_similarity_handles_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[tokio::test]
    async fn semantic_search_ranks_related_content_first() {
        let provider = provider();
        provider
            .store(MemoryEntry::conversation(
                "s1",
                "agent",
                "how do I improve email subject lines",
                "keep them under 50 characters",
            ))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::conversation(
                "s1",
                "agent",
                "what is our quarterly revenue target",
                "ask finance",
            ))
            .await
            .unwrap();

        let query = MemoryQuery::text("email subject line advice")
            .with_kind(MemoryKind::Conversation);
        let results = provider.retrieve(&query, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("subject lines"));
    }

    #[tokio::test]
    async fn query_without_text_lists_by_filters() {
        let provider = provider();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "a", "b"))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::conversation("s2", "agent", "c", "d"))
            .await
            .unwrap();

        let query = MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", "s1");
        let results = provider.retrieve(&query, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("User: a"));
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = Arc::new(VectorStore::in_memory().unwrap());
        let embedder = HashEmbedder::default();

        let mut entry = MemoryEntry::conversation("s1", "agent", "first", "x");
        entry.id = "fixed".to_string();
        let vector = embedder.embed(&entry.content);
        store.upsert(&VectorRecord { entry: entry.clone(), vector }).unwrap();

        entry.content = "second".to_string();
        let vector = embedder.embed(&entry.content);
        store.upsert(&VectorRecord { entry, vector }).unwrap();

        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_by_kind_and_delete() {
        let provider = provider();
        let entry = MemoryEntry::conversation("s1", "agent", "a", "b");
        let id = entry.id.clone();
        provider.store(entry).await.unwrap();
        provider
            .store(MemoryEntry::campaign(
                "c1",
                "email",
                &HashMap::new(),
                &[],
            ))
            .await
            .unwrap();

        assert!(provider.delete(&id).await.unwrap());
        assert!(!provider.delete(&id).await.unwrap());

        provider.clear(Some(MemoryKind::Campaign)).await.unwrap();
        let remaining = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Campaign), 10)
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
