//! # Memory Types
//!
//! The shared memory model: timestamped entries tagged with a kind, a query
//! shape for filtering and semantic search, and the async provider trait
//! every storage backend implements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;

/// Category of a stored memory entry.
///
/// Conversation entries are short-lived interaction records; campaign entries
/// are long-lived outcome records that feed future recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Conversation,
    Campaign,
}

impl MemoryKind {
    /// Stable string form used in storage keys and columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Conversation => "conversation",
            MemoryKind::Campaign => "campaign",
        }
    }

    /// Parse the stable string form.
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "conversation" => Some(MemoryKind::Conversation),
            "campaign" => Some(MemoryKind::Campaign),
            _ => None,
        }
    }

    /// All known kinds, in storage-scan order.
    pub fn all() -> &'static [MemoryKind] {
        &[MemoryKind::Conversation, MemoryKind::Campaign]
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single stored memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier. Constructors append a UUID so ids never collide.
    pub id: String,

    /// Free-form text content. This is what semantic backends embed.
    pub content: String,

    /// Exact-match metadata (session ids, agent names, campaign types).
    pub metadata: HashMap<String, String>,

    /// Creation time, stored as RFC 3339 by persistent backends.
    pub timestamp: DateTime<Utc>,

    /// Entry category.
    pub kind: MemoryKind,
}

impl MemoryEntry {
    /// Create a conversation entry for a user/agent exchange.
    ///
    /// The session id and agent name are recorded in metadata so the
    /// short-term layer can filter history per session.
    pub fn conversation(
        session_id: &str,
        agent_name: &str,
        user_input: &str,
        agent_response: &str,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("session_id".to_string(), session_id.to_string());
        metadata.insert("agent_name".to_string(), agent_name.to_string());

        Self {
            id: format!("{}_{}", session_id, Uuid::new_v4()),
            content: format!("User: {user_input}\nAgent: {agent_response}"),
            metadata,
            timestamp: Utc::now(),
            kind: MemoryKind::Conversation,
        }
    }

    /// Create a campaign entry recording outcome metrics and lessons.
    pub fn campaign(
        campaign_id: &str,
        campaign_type: &str,
        metrics: &HashMap<String, serde_json::Value>,
        lessons: &[String],
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("campaign_id".to_string(), campaign_id.to_string());
        metadata.insert("campaign_type".to_string(), campaign_type.to_string());

        let metrics_text = metrics
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id: format!("campaign_{}_{}", campaign_id, Uuid::new_v4()),
            content: format!(
                "Campaign: {campaign_type}\nMetrics: {metrics_text}\nLessons: {}",
                lessons.join("; ")
            ),
            metadata,
            timestamp: Utc::now(),
            kind: MemoryKind::Campaign,
        }
    }

    /// Attach extra metadata, merging over the constructor-set fields.
    pub fn with_metadata(mut self, extra: HashMap<String, String>) -> Self {
        self.metadata.extend(extra);
        self
    }

    /// Check whether this entry matches a query's kind and metadata filters.
    ///
    /// Semantic text matching is the vector backend's job; this only covers
    /// the exact-match portion of a query.
    pub fn matches(&self, query: &MemoryQuery) -> bool {
        if let Some(kind) = query.kind
            && self.kind != kind
        {
            return false;
        }
        query
            .filters
            .iter()
            .all(|(key, value)| self.metadata.get(key) == Some(value))
    }
}

/// Query shape accepted by all memory providers.
///
/// `text` is only meaningful to semantic backends; key-value backends ignore
/// it and apply the kind and metadata filters.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub kind: Option<MemoryKind>,
    pub text: Option<String>,
    pub filters: HashMap<String, String>,
}

impl MemoryQuery {
    /// Query for all entries of one kind.
    pub fn kind(kind: MemoryKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Semantic query over entry content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Restrict the query to one kind.
    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Add an exact-match metadata filter.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Storage backend for memory entries.
///
/// Implementations must return entries newest-first from `retrieve` and never
/// exceed the requested limit.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Store a memory entry. Storing the same id twice replaces the entry.
    async fn store(&self, entry: MemoryEntry) -> Result<(), MemoryError>;

    /// Retrieve entries matching the query, newest first, up to `limit`.
    async fn retrieve(
        &self,
        query: &MemoryQuery,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// Delete an entry by id. Returns whether an entry was removed.
    async fn delete(&self, entry_id: &str) -> Result<bool, MemoryError>;

    /// Clear entries of one kind, or everything when `kind` is `None`.
    async fn clear(&self, kind: Option<MemoryKind>) -> Result<(), MemoryError>;

    /// Delete entries older than `cutoff`, optionally restricted to one kind.
    /// Returns the number of entries removed.
    ///
    /// The default scans via `retrieve` and deletes one by one; backends with
    /// timestamp indexes should override this.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        kind: Option<MemoryKind>,
    ) -> Result<usize, MemoryError> {
        let query = match kind {
            Some(kind) => MemoryQuery::kind(kind),
            None => MemoryQuery::default(),
        };
        let entries = self.retrieve(&query, usize::MAX).await?;

        let mut deleted = 0;
        for entry in entries {
            if entry.timestamp < cutoff && self.delete(&entry.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_entry_carries_session_metadata() {
        let entry = MemoryEntry::conversation("sess-1", "MarketingExpert", "hi", "hello");
        assert_eq!(entry.kind, MemoryKind::Conversation);
        assert_eq!(entry.metadata.get("session_id").map(String::as_str), Some("sess-1"));
        assert_eq!(
            entry.metadata.get("agent_name").map(String::as_str),
            Some("MarketingExpert")
        );
        assert!(entry.content.starts_with("User: hi"));
        assert!(entry.id.starts_with("sess-1_"));
    }

    #[test]
    fn campaign_entry_formats_metrics_and_lessons() {
        let mut metrics = HashMap::new();
        metrics.insert("open_rate".to_string(), serde_json::json!(0.42));
        let lessons = vec!["shorter subjects win".to_string()];

        let entry = MemoryEntry::campaign("c1", "email_outreach", &metrics, &lessons);
        assert_eq!(entry.kind, MemoryKind::Campaign);
        assert!(entry.content.contains("Campaign: email_outreach"));
        assert!(entry.content.contains("open_rate: 0.42"));
        assert!(entry.content.contains("shorter subjects win"));
        assert_eq!(
            entry.metadata.get("campaign_type").map(String::as_str),
            Some("email_outreach")
        );
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = MemoryEntry::conversation("s", "a", "x", "y");
        let b = MemoryEntry::conversation("s", "a", "x", "y");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn matches_applies_kind_and_filters() {
        let entry = MemoryEntry::conversation("sess-1", "MarketingExpert", "hi", "hello");

        let q = MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", "sess-1");
        assert!(entry.matches(&q));

        let q = MemoryQuery::kind(MemoryKind::Campaign);
        assert!(!entry.matches(&q));

        let q = MemoryQuery::kind(MemoryKind::Conversation).with_filter("session_id", "other");
        assert!(!entry.matches(&q));
    }

    #[test]
    fn kind_round_trips_through_string_form() {
        for kind in MemoryKind::all() {
            assert_eq!(MemoryKind::from_str(kind.as_str()), Some(*kind));
        }
        assert_eq!(MemoryKind::from_str("vector"), None);
    }

    #[test]
    fn entry_serializes_to_json() {
        let entry = MemoryEntry::conversation("s", "a", "x", "y");
        let json = serde_json::to_string(&entry).unwrap();
        let back: MemoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.kind, entry.kind);
        assert_eq!(back.content, entry.content);
    }
}
