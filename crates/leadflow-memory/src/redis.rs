//! Redis-backed short-term memory.
//!
//! Entries are stored as JSON strings under `leadflow:{kind}:{id}`, with a
//! per-kind index set so retrieval does not need `SCAN`. Conversation
//! entries expire after 24 hours; the index is lazily pruned as expired ids
//! are encountered.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use leadflow_core::{MemoryEntry, MemoryError, MemoryKind, MemoryProvider, MemoryQuery};

const BACKEND: &str = "redis";
const KEY_PREFIX: &str = "leadflow";
const CONVERSATION_TTL_SECS: u64 = 86_400;

/// Short-term memory provider over a Redis connection manager.
///
/// The manager reconnects automatically and is cheap to clone, so each
/// operation works on its own clone.
#[derive(Clone)]
pub struct RedisProvider {
    conn: ConnectionManager,
}

impl RedisProvider {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, MemoryError> {
        let client = redis::Client::open(url).map_err(|e| MemoryError::ConnectionFailed {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| MemoryError::ConnectionFailed {
                backend: BACKEND,
                reason: e.to_string(),
            })?;
        Ok(Self { conn })
    }

    fn entry_key(kind: MemoryKind, id: &str) -> String {
        format!("{KEY_PREFIX}:{kind}:{id}")
    }

    fn index_key(kind: MemoryKind) -> String {
        format!("{KEY_PREFIX}:index:{kind}")
    }
}

#[async_trait]
impl MemoryProvider for RedisProvider {
    async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        let payload = serde_json::to_string(&entry).map_err(|e| MemoryError::Serialization {
            backend: BACKEND,
            reason: e.to_string(),
        })?;
        let key = Self::entry_key(entry.kind, &entry.id);
        let mut conn = self.conn.clone();

        let store_err = |e: redis::RedisError| MemoryError::StoreFailed {
            backend: BACKEND,
            id: entry.id.clone(),
            reason: e.to_string(),
        };

        // Conversations are transient; everything else stays until cleared.
        match entry.kind {
            MemoryKind::Conversation => {
                let _: () = conn
                    .set_ex(&key, payload, CONVERSATION_TTL_SECS)
                    .await
                    .map_err(store_err)?;
            }
            _ => {
                let _: () = conn.set(&key, payload).await.map_err(store_err)?;
            }
        }

        let _: () = conn
            .sadd(Self::index_key(entry.kind), &entry.id)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn retrieve(
        &self,
        query: &MemoryQuery,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        // Without a kind there is no index to consult.
        let Some(kind) = query.kind else {
            return Ok(Vec::new());
        };

        let mut conn = self.conn.clone();
        let retrieve_err = |e: redis::RedisError| MemoryError::RetrieveFailed {
            backend: BACKEND,
            reason: e.to_string(),
        };

        let ids: Vec<String> = conn
            .smembers(Self::index_key(kind))
            .await
            .map_err(retrieve_err)?;

        let mut entries = Vec::new();
        for id in ids {
            let payload: Option<String> = conn
                .get(Self::entry_key(kind, &id))
                .await
                .map_err(retrieve_err)?;

            match payload {
                Some(payload) => {
                    let entry: MemoryEntry =
                        serde_json::from_str(&payload).map_err(|e| MemoryError::Serialization {
                            backend: BACKEND,
                            reason: e.to_string(),
                        })?;
                    if entry.matches(query) {
                        entries.push(entry);
                    }
                }
                None => {
                    // Entry expired; drop the stale index member.
                    debug!(id = %id, kind = %kind, "pruning expired index member");
                    let _: () = conn
                        .srem(Self::index_key(kind), &id)
                        .await
                        .map_err(retrieve_err)?;
                }
            }
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError> {
        let mut conn = self.conn.clone();
        let delete_err = |e: redis::RedisError| MemoryError::DeleteFailed {
            backend: BACKEND,
            id: entry_id.to_string(),
            reason: e.to_string(),
        };

        for &kind in MemoryKind::all() {
            let removed: u64 = conn
                .del(Self::entry_key(kind, entry_id))
                .await
                .map_err(delete_err)?;
            if removed > 0 {
                let _: () = conn
                    .srem(Self::index_key(kind), entry_id)
                    .await
                    .map_err(delete_err)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError> {
        let mut conn = self.conn.clone();
        let clear_err = |e: redis::RedisError| MemoryError::ClearFailed {
            backend: BACKEND,
            reason: e.to_string(),
        };

        let kinds: Vec<MemoryKind> = match kind {
            Some(kind) => vec![kind],
            None => MemoryKind::all().to_vec(),
        };

        for kind in kinds {
            let ids: Vec<String> = conn
                .smembers(Self::index_key(kind))
                .await
                .map_err(clear_err)?;
            for id in ids {
                let _: () = conn
                    .del(Self::entry_key(kind, &id))
                    .await
                    .map_err(clear_err)?;
            }
            let _: () = conn.del(Self::index_key(kind)).await.map_err(clear_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/15".to_string())
    }

    #[tokio::test]
    #[ignore = "requires a local Redis server"]
    async fn store_retrieve_delete_round_trip() {
        let provider = RedisProvider::connect(&test_url()).await.unwrap();
        provider.clear(None).await.unwrap();

        let entry = MemoryEntry::conversation("redis-test", "agent", "hi", "hello");
        let id = entry.id.clone();
        provider.store(entry).await.unwrap();

        let query =
            MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", "redis-test");
        let results = provider.retrieve(&query, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);

        assert!(provider.delete(&id).await.unwrap());
        assert!(!provider.delete(&id).await.unwrap());

        provider.clear(None).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a local Redis server"]
    async fn retrieve_without_kind_is_empty() {
        let provider = RedisProvider::connect(&test_url()).await.unwrap();
        let results = provider
            .retrieve(&MemoryQuery::text("anything"), 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
