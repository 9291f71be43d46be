//! SQLite persistence for knowledge documents and their embeddings.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

use leadflow_core::{KnowledgeError, MemoryError};
use leadflow_memory::cosine_similarity;

use crate::base::KnowledgeHit;
use crate::document::{DocumentType, KnowledgeDocument};

const BACKEND: &str = "knowledge";

fn storage_err(reason: String) -> KnowledgeError {
    KnowledgeError::Storage(MemoryError::ConnectionFailed {
        backend: BACKEND,
        reason,
    })
}

/// Document table with one embedding per row. Search scans and scores in
/// Rust; the corpus is small (tens to low hundreds of documents).
pub(crate) struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_err(format!("failed to create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(|e| storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    pub(crate) fn in_memory() -> Result<Self, KnowledgeError> {
        let conn = Connection::open_in_memory().map_err(|e| storage_err(e.to_string()))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, KnowledgeError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS knowledge_documents (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                content       TEXT NOT NULL,
                document_type TEXT NOT NULL,
                category      TEXT NOT NULL,
                tags          TEXT NOT NULL,
                metadata      TEXT NOT NULL,
                vector        BLOB NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_knowledge_category
                ON knowledge_documents(category);
            CREATE INDEX IF NOT EXISTS idx_knowledge_type
                ON knowledge_documents(document_type);
            "#,
        )
        .map_err(|e| storage_err(format!("migration failed: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, KnowledgeError> {
        self.conn
            .lock()
            .map_err(|_| storage_err("connection mutex poisoned".to_string()))
    }

    pub(crate) fn upsert(
        &self,
        document: &KnowledgeDocument,
        vector: &[f32],
    ) -> Result<(), KnowledgeError> {
        let tags = serde_json::to_string(&document.tags)
            .map_err(|e| storage_err(format!("tags encode failed: {e}")))?;
        let metadata = serde_json::to_string(&document.metadata)
            .map_err(|e| storage_err(format!("metadata encode failed: {e}")))?;
        let vector = bincode::serialize(vector)
            .map_err(|e| storage_err(format!("vector encode failed: {e}")))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO knowledge_documents
             (id, title, content, document_type, category, tags, metadata, vector,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                document.id,
                document.title,
                document.content,
                document.document_type.as_str(),
                document.category,
                tags,
                metadata,
                vector,
                document
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
                document
                    .updated_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| {
            KnowledgeError::Storage(MemoryError::StoreFailed {
                backend: BACKEND,
                id: document.id.clone(),
                reason: e.to_string(),
            })
        })?;
        Ok(())
    }

    pub(crate) fn count(&self) -> Result<usize, KnowledgeError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM knowledge_documents", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(|e| storage_err(e.to_string()))
    }

    fn scan(
        &self,
        category: Option<&str>,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<(KnowledgeDocument, Vec<f32>)>, KnowledgeError> {
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT id, title, content, document_type, category, tags, metadata, vector,
                    created_at, updated_at
             FROM knowledge_documents WHERE 1=1",
        );
        let mut bindings: Vec<String> = Vec::new();
        if let Some(category) = category {
            sql.push_str(" AND category = ?");
            sql.push_str(&(bindings.len() + 1).to_string());
            bindings.push(category.to_string());
        }
        if let Some(ty) = document_type {
            sql.push_str(" AND document_type = ?");
            sql.push_str(&(bindings.len() + 1).to_string());
            bindings.push(ty.as_str().to_string());
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| storage_err(e.to_string()))?;

        type Row = (
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            Vec<u8>,
            String,
            String,
        );
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bindings.iter()), |row| {
                Ok::<Row, rusqlite::Error>((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })
            .map_err(|e| storage_err(e.to_string()))?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, title, content, ty, category, tags, metadata, vector, created, updated) =
                row.map_err(|e| storage_err(e.to_string()))?;

            let document_type = DocumentType::from_str(&ty)
                .ok_or_else(|| storage_err(format!("unknown document type '{ty}'")))?;
            let tags: Vec<String> = serde_json::from_str(&tags)
                .map_err(|e| storage_err(format!("bad tags JSON: {e}")))?;
            let metadata: HashMap<String, String> = serde_json::from_str(&metadata)
                .map_err(|e| storage_err(format!("bad metadata JSON: {e}")))?;
            let vector: Vec<f32> = bincode::deserialize(&vector)
                .map_err(|e| storage_err(format!("vector decode failed: {e}")))?;
            let created_at = parse_timestamp(&created)?;
            let updated_at = parse_timestamp(&updated)?;

            documents.push((
                KnowledgeDocument {
                    id,
                    title,
                    content,
                    document_type,
                    category,
                    tags,
                    metadata,
                    created_at,
                    updated_at,
                },
                vector,
            ));
        }
        Ok(documents)
    }

    /// Score all matching documents against `query_vector`, best first.
    pub(crate) fn search(
        &self,
        query_vector: &[f32],
        category: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        let mut hits: Vec<KnowledgeHit> = self
            .scan(category, document_type)?
            .into_iter()
            .map(|(document, vector)| KnowledgeHit {
                relevance_score: cosine_similarity(query_vector, &vector),
                document,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// List matching documents newest-first without scoring.
    pub(crate) fn list(
        &self,
        category: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        let mut documents: Vec<KnowledgeDocument> = self
            .scan(category, document_type)?
            .into_iter()
            .map(|(document, _)| document)
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.truncate(limit);
        Ok(documents
            .into_iter()
            .map(|document| KnowledgeHit {
                document,
                relevance_score: 0.0,
            })
            .collect())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, KnowledgeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| storage_err(format!("bad timestamp: {e}")))
}
