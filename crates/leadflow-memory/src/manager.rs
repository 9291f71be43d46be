//! Layered memory manager.
//!
//! Three layers with different lifetimes:
//!
//! - short-term: recent conversations, expiring (Redis or in-process)
//! - long-term: campaign outcomes, persistent (SQLite)
//! - vector: semantic index over both kinds of entries
//!
//! Writes fan out to the owning layer plus the vector index; a write counts
//! as successful if at least one layer accepted it. Reads route to whichever
//! layer serves the access pattern.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use leadflow_core::{MemoryEntry, MemoryError, MemoryKind, MemoryProvider, MemoryQuery};

use crate::in_memory::InMemoryProvider;

#[cfg(feature = "sqlite")]
use leadflow_core::Settings;

/// Coordinates the short-term, long-term, and vector memory layers.
#[derive(Clone)]
pub struct MemoryManager {
    short_term: Arc<dyn MemoryProvider>,
    long_term: Arc<dyn MemoryProvider>,
    vector: Arc<dyn MemoryProvider>,
}

impl MemoryManager {
    pub fn new(
        short_term: Arc<dyn MemoryProvider>,
        long_term: Arc<dyn MemoryProvider>,
        vector: Arc<dyn MemoryProvider>,
    ) -> Self {
        Self {
            short_term,
            long_term,
            vector,
        }
    }

    /// All layers in-process. Nothing survives the process; meant for tests
    /// and offline runs.
    pub fn in_process() -> Self {
        Self::new(
            Arc::new(InMemoryProvider::new()),
            Arc::new(InMemoryProvider::new()),
            Arc::new(InMemoryProvider::new()),
        )
    }

    /// Build the layer stack described by `settings`.
    ///
    /// A Redis connection failure is not fatal: the short-term layer falls
    /// back to the in-process provider so agents keep working without
    /// history persistence.
    #[cfg(feature = "sqlite")]
    pub async fn from_settings(settings: &Settings) -> Result<Self, MemoryError> {
        use leadflow_core::MemoryBackend;

        use crate::embedding::HashEmbedder;
        use crate::sqlite::SqliteProvider;
        use crate::vector::{VectorProvider, VectorStore};

        let short_term: Arc<dyn MemoryProvider> = match settings.memory.short_term_backend {
            MemoryBackend::Redis => {
                #[cfg(feature = "redis")]
                {
                    match crate::redis::RedisProvider::connect(&settings.database.redis_url).await {
                        Ok(provider) => Arc::new(provider),
                        Err(e) => {
                            warn!(
                                error = %e,
                                "redis unavailable, short-term memory falling back in-process"
                            );
                            Arc::new(InMemoryProvider::new())
                        }
                    }
                }
                #[cfg(not(feature = "redis"))]
                {
                    warn!("redis support not compiled in, short-term memory is in-process");
                    Arc::new(InMemoryProvider::new())
                }
            }
            MemoryBackend::Sqlite => Arc::new(SqliteProvider::open(short_term_db_path(
                &settings.database.database_path,
            ))?),
            MemoryBackend::InMemory => Arc::new(InMemoryProvider::new()),
        };

        let long_term = Arc::new(SqliteProvider::open(&settings.database.database_path)?);

        let store = Arc::new(VectorStore::open(&settings.database.vector_db_path)?);
        let embedder = Arc::new(HashEmbedder::new(settings.memory.embedding_dimensions));
        let vector = Arc::new(VectorProvider::new(store, embedder));

        Ok(Self::new(short_term, long_term, vector))
    }

    /// Write to the owning layer and the vector index concurrently. Succeeds
    /// if either layer stored the entry.
    async fn dual_store(
        &self,
        primary: &Arc<dyn MemoryProvider>,
        layer: &'static str,
        entry: MemoryEntry,
    ) -> Result<(), MemoryError> {
        let id = entry.id.clone();
        let (primary_res, vector_res) =
            tokio::join!(primary.store(entry.clone()), self.vector.store(entry));

        match (primary_res, vector_res) {
            (Ok(()), Ok(())) => {
                debug!(id = %id, layer, "stored entry in both layers");
                Ok(())
            }
            (Ok(()), Err(e)) => {
                warn!(id = %id, error = %e, "vector index rejected entry");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(id = %id, layer, error = %e, "primary layer rejected entry");
                Ok(())
            }
            (Err(primary_err), Err(vector_err)) => Err(MemoryError::AllLayersFailed {
                id,
                reason: format!("{layer}: {primary_err}; vector: {vector_err}"),
            }),
        }
    }

    /// Record a user/agent exchange in short-term memory and the vector
    /// index.
    pub async fn store_conversation(
        &self,
        session_id: &str,
        agent_name: &str,
        user_input: &str,
        agent_response: &str,
    ) -> Result<(), MemoryError> {
        let entry = MemoryEntry::conversation(session_id, agent_name, user_input, agent_response);
        self.dual_store(&self.short_term, "short_term", entry).await
    }

    /// Like [`store_conversation`](Self::store_conversation), with extra
    /// metadata merged into the entry.
    pub async fn store_conversation_with(
        &self,
        session_id: &str,
        agent_name: &str,
        user_input: &str,
        agent_response: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), MemoryError> {
        let entry = MemoryEntry::conversation(session_id, agent_name, user_input, agent_response)
            .with_metadata(metadata);
        self.dual_store(&self.short_term, "short_term", entry).await
    }

    /// Record a campaign outcome in long-term memory and the vector index.
    pub async fn store_campaign(
        &self,
        campaign_id: &str,
        campaign_type: &str,
        metrics: &HashMap<String, serde_json::Value>,
        lessons: &[String],
    ) -> Result<(), MemoryError> {
        let entry = MemoryEntry::campaign(campaign_id, campaign_type, metrics, lessons);
        self.dual_store(&self.long_term, "long_term", entry).await
    }

    /// Conversations semantically similar to `text`, best match first.
    pub async fn similar_conversations(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let query = MemoryQuery::text(text).with_kind(MemoryKind::Conversation);
        self.vector.retrieve(&query, limit).await
    }

    /// Campaign records from long-term memory, optionally filtered by type.
    pub async fn campaign_insights(
        &self,
        campaign_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut query = MemoryQuery::kind(MemoryKind::Campaign);
        if let Some(campaign_type) = campaign_type {
            query = query.with_filter("campaign_type", campaign_type);
        }
        self.long_term.retrieve(&query, limit).await
    }

    /// Recent exchanges for one session, newest first.
    pub async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let query =
            MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", session_id);
        self.short_term.retrieve(&query, limit).await
    }

    /// Semantic search across the vector index, any kind unless restricted.
    pub async fn semantic_search(
        &self,
        text: &str,
        kind: Option<MemoryKind>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let mut query = MemoryQuery::text(text);
        if let Some(kind) = kind {
            query = query.with_kind(kind);
        }
        self.vector.retrieve(&query, limit).await
    }

    /// Delete conversations older than `days` from the short-term layer.
    /// Returns how many entries were removed.
    pub async fn cleanup_old_conversations(&self, days: i64) -> Result<usize, MemoryError> {
        let cutoff = Utc::now() - Duration::days(days);
        let deleted = self
            .short_term
            .delete_older_than(cutoff, Some(MemoryKind::Conversation))
            .await?;
        if deleted > 0 {
            debug!(deleted, days, "cleaned up old conversations");
        }
        Ok(deleted)
    }

    /// Clear every layer. Destructive; used by the CLI reset command.
    pub async fn clear_all(&self) -> Result<(), MemoryError> {
        self.short_term.clear(None).await?;
        self.long_term.clear(None).await?;
        self.vector.clear(None).await?;
        Ok(())
    }
}

/// Sibling path for the short-term database when SQLite backs both layers,
/// so the two stores never share a file.
#[cfg(feature = "sqlite")]
fn short_term_db_path(long_term_path: &str) -> std::path::PathBuf {
    let path = std::path::Path::new(long_term_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "leadflow".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db".to_string());
    path.with_file_name(format!("{stem}_short_term.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl MemoryProvider for FailingProvider {
        async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
            Err(MemoryError::StoreFailed {
                backend: "failing",
                id: entry.id,
                reason: "down".into(),
            })
        }

        async fn retrieve(
            &self,
            _query: &MemoryQuery,
            _limit: usize,
        ) -> Result<Vec<MemoryEntry>, MemoryError> {
            Err(MemoryError::RetrieveFailed {
                backend: "failing",
                reason: "down".into(),
            })
        }

        async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError> {
            Err(MemoryError::DeleteFailed {
                backend: "failing",
                id: entry_id.to_string(),
                reason: "down".into(),
            })
        }

        async fn clear(&self, _kind: Option<MemoryKind>) -> Result<(), MemoryError> {
            Err(MemoryError::ClearFailed {
                backend: "failing",
                reason: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn conversation_flows_to_history_and_search() {
        let manager = MemoryManager::in_process();
        manager
            .store_conversation("s1", "MarketingExpert", "plan a launch", "start with the ICP")
            .await
            .unwrap();

        let history = manager.conversation_history("s1", 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].content.contains("plan a launch"));

        let similar = manager.similar_conversations("launch plan", 5).await.unwrap();
        assert_eq!(similar.len(), 1);
    }

    #[tokio::test]
    async fn campaign_insights_filter_by_type() {
        let manager = MemoryManager::in_process();
        let metrics = HashMap::from([("open_rate".to_string(), serde_json::json!(0.31))]);
        manager
            .store_campaign("c1", "email_outreach", &metrics, &["shorter is better".into()])
            .await
            .unwrap();
        manager
            .store_campaign("c2", "social", &HashMap::new(), &[])
            .await
            .unwrap();

        let insights = manager
            .campaign_insights(Some("email_outreach"), 10)
            .await
            .unwrap();
        assert_eq!(insights.len(), 1);
        assert!(insights[0].content.contains("shorter is better"));

        let all = manager.campaign_insights(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn write_survives_one_failed_layer() {
        let manager = MemoryManager::new(
            Arc::new(FailingProvider),
            Arc::new(InMemoryProvider::new()),
            Arc::new(InMemoryProvider::new()),
        );

        manager
            .store_conversation("s1", "agent", "hi", "hello")
            .await
            .unwrap();

        let similar = manager.similar_conversations("hi", 5).await.unwrap();
        assert_eq!(similar.len(), 1);
    }

    #[tokio::test]
    async fn write_fails_when_all_layers_fail() {
        let manager = MemoryManager::new(
            Arc::new(FailingProvider),
            Arc::new(InMemoryProvider::new()),
            Arc::new(FailingProvider),
        );

        let err = manager
            .store_conversation("s1", "agent", "hi", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::AllLayersFailed { .. }));
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_conversations() {
        let short_term = Arc::new(InMemoryProvider::new());
        let manager = MemoryManager::new(
            short_term.clone(),
            Arc::new(InMemoryProvider::new()),
            Arc::new(InMemoryProvider::new()),
        );

        let mut old = MemoryEntry::conversation("s1", "agent", "old", "x");
        old.timestamp = Utc::now() - Duration::days(10);
        short_term.store(old).await.unwrap();
        manager
            .store_conversation("s1", "agent", "fresh", "y")
            .await
            .unwrap();

        let deleted = manager.cleanup_old_conversations(7).await.unwrap();
        assert_eq!(deleted, 1);

        let history = manager.conversation_history("s1", 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].content.contains("fresh"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn short_term_path_is_a_sibling_file() {
        let path = short_term_db_path("./data/leadflow.db");
        assert_eq!(path, std::path::Path::new("./data/leadflow_short_term.db"));
    }
}
