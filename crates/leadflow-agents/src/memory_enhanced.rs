//! Memory capabilities shared by all agents.

use std::collections::HashMap;

use async_trait::async_trait;

use leadflow_core::{MemoryEntry, MemoryError};
use leadflow_memory::MemoryManager;

/// How many interactions the formatted conversation context covers.
const CONTEXT_INTERACTIONS: usize = 5;

/// How many campaign entries feed into the wisdom summary.
const WISDOM_INSIGHTS: usize = 3;

/// Memory mixin for agents: interaction recall, conversation context, and
/// campaign learnings backed by a [`MemoryManager`].
#[async_trait]
pub trait MemoryEnhanced {
    fn memory(&self) -> &MemoryManager;

    fn agent_name(&self) -> &str;

    fn session_id(&self) -> &str;

    /// Record a user/agent exchange with optional context metadata.
    async fn remember_interaction(
        &self,
        user_input: &str,
        response: &str,
        context: HashMap<String, String>,
    ) -> Result<(), MemoryError> {
        self.memory()
            .store_conversation_with(
                self.session_id(),
                self.agent_name(),
                user_input,
                response,
                context,
            )
            .await
    }

    /// Past interactions semantically similar to `query`, best match first.
    async fn recall_similar(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        self.memory().similar_conversations(query, limit).await
    }

    /// Recent session history rendered as prompt context, oldest first.
    async fn conversation_context(&self, limit: usize) -> Result<String, MemoryError> {
        let history = self
            .memory()
            .conversation_history(self.session_id(), limit)
            .await?;
        if history.is_empty() {
            return Ok("No previous conversation history.".to_string());
        }

        // History arrives newest first; render the most recent interactions
        // in chronological order.
        let lines: Vec<String> = history
            .into_iter()
            .take(CONTEXT_INTERACTIONS)
            .rev()
            .map(|entry| entry.content)
            .collect();
        Ok(lines.join("\n"))
    }

    /// Store outcome metrics and lessons from a campaign.
    async fn learn_from_campaign(
        &self,
        campaign_id: &str,
        campaign_type: &str,
        metrics: &HashMap<String, serde_json::Value>,
        lessons: &[String],
    ) -> Result<(), MemoryError> {
        self.memory()
            .store_campaign(campaign_id, campaign_type, metrics, lessons)
            .await
    }

    /// Summarize lessons from previous campaigns of the given type.
    async fn campaign_wisdom(&self, campaign_type: Option<&str>) -> Result<String, MemoryError> {
        let insights = self.memory().campaign_insights(campaign_type, 10).await?;
        if insights.is_empty() {
            return Ok("No previous campaign insights available.".to_string());
        }

        let mut lines = vec!["Previous campaign insights:".to_string()];
        for entry in insights.iter().take(WISDOM_INSIGHTS) {
            let lessons = lessons_from_entry(entry);
            if lessons.is_empty() {
                continue;
            }
            lines.push(format!(
                "- {}: {}",
                campaign_type.unwrap_or("Campaign"),
                lessons[..lessons.len().min(2)].join(", ")
            ));
        }
        Ok(lines.join("\n"))
    }
}

/// Pull the lessons list back out of a campaign entry's content.
fn lessons_from_entry(entry: &MemoryEntry) -> Vec<String> {
    entry
        .content
        .lines()
        .find_map(|line| line.strip_prefix("Lessons: "))
        .map(|lessons| {
            lessons
                .split("; ")
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
