//! RAG retrieval: turns knowledge search results into prompt-ready text.

use std::sync::Arc;

use leadflow_core::KnowledgeError;

use crate::base::MarketingKnowledgeBase;

const CONTEXT_HITS: usize = 3;
const CONTEXT_PREVIEW_CHARS: usize = 500;
const GUIDANCE_PREVIEW_CHARS: usize = 300;
const TEMPLATE_LIMIT: usize = 5;

/// A template offered to an agent, trimmed to what prompts need.
#[derive(Debug, Clone)]
pub struct TemplateSuggestion {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Renders knowledge base results into context blocks for LLM prompts.
pub struct RagRetriever {
    knowledge_base: Arc<MarketingKnowledgeBase>,
}

impl RagRetriever {
    pub fn new(knowledge_base: Arc<MarketingKnowledgeBase>) -> Self {
        Self { knowledge_base }
    }

    /// Relevant knowledge for a query, rendered as titled excerpts and
    /// accumulated until `max_context_length` characters.
    pub fn context_for_query(
        &self,
        query: &str,
        max_context_length: usize,
    ) -> Result<String, KnowledgeError> {
        let hits = self.knowledge_base.search(query, None, None, CONTEXT_HITS)?;
        if hits.is_empty() {
            return Ok("No relevant knowledge found.".to_string());
        }

        let mut parts = Vec::new();
        let mut current_length = 0;
        for hit in hits {
            let part = format!(
                "**{}** ({}):\n{}\n",
                hit.document.title,
                hit.document.category,
                preview(&hit.document.content, CONTEXT_PREVIEW_CHARS),
            );
            if current_length + part.len() > max_context_length {
                break;
            }
            current_length += part.len();
            parts.push(part);
        }
        Ok(parts.join("\n"))
    }

    /// Best-practice excerpts for a topic.
    pub fn best_practice_guidance(&self, topic: &str) -> Result<String, KnowledgeError> {
        let practices = self.knowledge_base.best_practices(topic, 3)?;
        if practices.is_empty() {
            return Ok(format!("No specific best practices found for {topic}."));
        }

        let guidance = practices
            .iter()
            .map(|hit| {
                format!(
                    "**{}**:\n{}",
                    hit.document.title,
                    preview(&hit.document.content, GUIDANCE_PREVIEW_CHARS),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(guidance)
    }

    /// Templates available in a category.
    pub fn template_suggestions(
        &self,
        category: &str,
    ) -> Result<Vec<TemplateSuggestion>, KnowledgeError> {
        let templates = self.knowledge_base.templates(category, TEMPLATE_LIMIT)?;
        Ok(templates
            .into_iter()
            .map(|hit| TemplateSuggestion {
                title: hit.document.title,
                content: hit.document.content,
                tags: hit.document.tags,
            })
            .collect())
    }

    /// Append a knowledge context section to a prompt.
    pub fn enhance_prompt(
        &self,
        base_prompt: &str,
        knowledge_query: &str,
        max_knowledge_chars: usize,
    ) -> Result<String, KnowledgeError> {
        let knowledge_context = self.context_for_query(knowledge_query, max_knowledge_chars)?;
        Ok(format!(
            "{base_prompt}\n\n\
             **Relevant Knowledge Context:**\n\
             {knowledge_context}\n\n\
             Use the above knowledge context to inform your response while \
             maintaining accuracy and relevance."
        ))
    }
}

/// First `max_chars` characters of `text`, with a trailing ellipsis when
/// truncated. Cuts on a char boundary.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
