//! In-process memory backend.
//!
//! HashMap behind an async RwLock. Used as the test double and as the
//! fallback short-term layer when Redis is unreachable or not compiled in.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use leadflow_core::{MemoryEntry, MemoryError, MemoryKind, MemoryProvider, MemoryQuery};

/// Volatile memory provider. Entries live until dropped or cleared.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, across all kinds.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryProvider {
    async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        self.entries.write().await.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn retrieve(
        &self,
        query: &MemoryQuery,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        let mut matched: Vec<MemoryEntry> = entries
            .values()
            .filter(|entry| entry.matches(query))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError> {
        Ok(self.entries.write().await.remove(entry_id).is_some())
    }

    async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        match kind {
            Some(kind) => entries.retain(|_, entry| entry.kind != kind),
            None => entries.clear(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_retrieve_by_kind() {
        let provider = InMemoryProvider::new();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "hi", "hello"))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::campaign(
                "c1",
                "email_outreach",
                &HashMap::new(),
                &[],
            ))
            .await
            .unwrap();

        let conversations = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 10)
            .await
            .unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].kind, MemoryKind::Conversation);
    }

    #[tokio::test]
    async fn retrieve_is_newest_first_and_bounded() {
        let provider = InMemoryProvider::new();
        for i in 0..5 {
            let mut entry = MemoryEntry::conversation("s1", "agent", &format!("msg {i}"), "ok");
            entry.timestamp = chrono::Utc::now() + chrono::Duration::seconds(i);
            provider.store(entry).await.unwrap();
        }

        let results = provider
            .retrieve(&MemoryQuery::kind(MemoryKind::Conversation), 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].content.contains("msg 4"));
        assert!(results[0].timestamp >= results[1].timestamp);
        assert!(results[1].timestamp >= results[2].timestamp);
    }

    #[tokio::test]
    async fn metadata_filters_narrow_results() {
        let provider = InMemoryProvider::new();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "a", "b"))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::conversation("s2", "agent", "c", "d"))
            .await
            .unwrap();

        let query = MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", "s2");
        let results = provider.retrieve(&query, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("User: c"));
    }

    #[tokio::test]
    async fn delete_reports_whether_entry_existed() {
        let provider = InMemoryProvider::new();
        let entry = MemoryEntry::conversation("s1", "agent", "a", "b");
        let id = entry.id.clone();
        provider.store(entry).await.unwrap();

        assert!(provider.delete(&id).await.unwrap());
        assert!(!provider.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn clear_by_kind_leaves_other_kinds() {
        let provider = InMemoryProvider::new();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "a", "b"))
            .await
            .unwrap();
        provider
            .store(MemoryEntry::campaign("c1", "email", &HashMap::new(), &[]))
            .await
            .unwrap();

        provider.clear(Some(MemoryKind::Conversation)).await.unwrap();
        assert_eq!(provider.len().await, 1);

        provider.clear(None).await.unwrap();
        assert!(provider.is_empty().await);
    }

    #[tokio::test]
    async fn delete_older_than_removes_stale_entries() {
        let provider = InMemoryProvider::new();

        let mut old = MemoryEntry::conversation("s1", "agent", "old", "x");
        old.timestamp = chrono::Utc::now() - chrono::Duration::days(10);
        provider.store(old).await.unwrap();
        provider
            .store(MemoryEntry::conversation("s1", "agent", "fresh", "y"))
            .await
            .unwrap();

        let cutoff = chrono::Utc::now() - chrono::Duration::days(7);
        let deleted = provider
            .delete_older_than(cutoff, Some(MemoryKind::Conversation))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(provider.len().await, 1);
    }
}
