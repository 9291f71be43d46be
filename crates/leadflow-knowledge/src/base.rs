//! Marketing knowledge base with semantic search.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use leadflow_core::KnowledgeError;
use leadflow_memory::Embedder;

use crate::document::{DocumentType, KnowledgeDocument};
use crate::store::DocumentStore;

/// A search result with its similarity score.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub document: KnowledgeDocument,
    pub relevance_score: f32,
}

/// Semantic store of marketing domain knowledge.
///
/// Documents are embedded from `"{title} {content}"` on write; search embeds
/// the query and ranks by cosine similarity. An empty query lists by the
/// filters alone, newest first.
pub struct MarketingKnowledgeBase {
    store: DocumentStore,
    embedder: Arc<dyn Embedder>,
}

impl MarketingKnowledgeBase {
    pub fn open<P: AsRef<Path>>(
        path: P,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, KnowledgeError> {
        Ok(Self {
            store: DocumentStore::open(path)?,
            embedder,
        })
    }

    /// Volatile knowledge base for tests.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, KnowledgeError> {
        Ok(Self {
            store: DocumentStore::in_memory()?,
            embedder,
        })
    }

    /// Add a document, replacing any existing document with the same title
    /// and content. Returns the document id.
    pub fn add_document(
        &self,
        title: &str,
        content: &str,
        document_type: DocumentType,
        category: &str,
        tags: Vec<String>,
        metadata: HashMap<String, String>,
    ) -> Result<String, KnowledgeError> {
        if title.trim().is_empty() {
            return Err(KnowledgeError::InvalidDocument {
                reason: "title is empty".to_string(),
            });
        }
        if content.trim().is_empty() {
            return Err(KnowledgeError::InvalidDocument {
                reason: "content is empty".to_string(),
            });
        }

        let document =
            KnowledgeDocument::new(title, content, document_type, category, tags, metadata);
        let vector = self.embedder.embed(&format!("{title} {content}"));
        self.store.upsert(&document, &vector)?;

        info!(title, category, %document_type, "added knowledge document");
        Ok(document.id)
    }

    /// Semantic search with optional category and type filters.
    pub fn search(
        &self,
        query: &str,
        category: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        if query.trim().is_empty() {
            return self.store.list(category, document_type, limit);
        }
        let query_vector = self.embedder.embed(query);
        self.store
            .search(&query_vector, category, document_type, limit)
    }

    /// All documents in one category, newest first.
    pub fn by_category(&self, category: &str, limit: usize) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        self.search("", Some(category), None, limit)
    }

    /// Best-practice documents most relevant to a topic.
    pub fn best_practices(&self, topic: &str, limit: usize) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        self.search(topic, None, Some(DocumentType::BestPractice), limit)
    }

    /// Template documents in one category.
    pub fn templates(&self, category: &str, limit: usize) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        self.search("", Some(category), Some(DocumentType::Template), limit)
    }

    /// Record the outcome of a completed campaign as a case study so future
    /// recommendations can draw on it.
    pub fn add_campaign_learnings(
        &self,
        campaign_type: &str,
        what_worked: &[String],
        what_didnt_work: &[String],
        metrics: &HashMap<String, serde_json::Value>,
        recommendations: &[String],
    ) -> Result<String, KnowledgeError> {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let metric_lines = metrics
            .iter()
            .map(|(k, v)| format!("- {k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let content = format!(
            "Campaign Learnings - {campaign_type}\n\n\
             What Worked:\n{}\n\n\
             What Didn't Work:\n{}\n\n\
             Key Metrics:\n{metric_lines}\n\n\
             Recommendations for Future:\n{}",
            bullets(what_worked),
            bullets(what_didnt_work),
            bullets(recommendations),
        );

        self.add_document(
            &format!("Campaign Learnings: {campaign_type}"),
            &content,
            DocumentType::CaseStudy,
            "campaign_learnings",
            vec![
                "learnings".to_string(),
                campaign_type.to_string(),
                "metrics".to_string(),
            ],
            HashMap::from([("campaign_type".to_string(), campaign_type.to_string())]),
        )
    }

    /// Number of stored documents.
    pub fn count(&self) -> Result<usize, KnowledgeError> {
        self.store.count()
    }

    /// Load the core marketing knowledge when the base is empty. Returns how
    /// many documents were seeded.
    pub fn seed_defaults(&self) -> Result<usize, KnowledgeError> {
        if self.store.count()? > 0 {
            return Ok(0);
        }

        let defaults = default_documents();
        let seeded = defaults.len();
        for (title, content, document_type, category, tags) in defaults {
            self.add_document(
                title,
                content,
                document_type,
                category,
                tags.iter().map(|t| t.to_string()).collect(),
                HashMap::new(),
            )?;
        }
        info!(seeded, "seeded default marketing knowledge");
        Ok(seeded)
    }
}

type DefaultDocument = (
    &'static str,
    &'static str,
    DocumentType,
    &'static str,
    &'static [&'static str],
);

fn default_documents() -> Vec<DefaultDocument> {
    vec![
        (
            "Email Subject Line Best Practices",
            "Effective email subject lines:\n\
             - Keep under 50 characters for mobile optimization\n\
             - Use personalization tokens (name, company)\n\
             - Create urgency without being spammy\n\
             - A/B test different approaches\n\
             - Avoid spam trigger words (FREE, URGENT, GUARANTEED)\n\
             - Use numbers and specific benefits\n\
             - Ask questions to increase engagement\n\
             - Examples: \"Quick question about [Company]\", \"5 ways to improve [specific metric]\"",
            DocumentType::BestPractice,
            "email_marketing",
            &["subject_lines", "email", "personalization"],
        ),
        (
            "Lead Qualification Framework (BANT)",
            "BANT qualification criteria:\n\
             - Budget: Does the prospect have allocated budget?\n\
             - Authority: Are you speaking with the decision maker?\n\
             - Need: Is there a genuine business need?\n\
             - Timeline: When do they plan to make a decision?\n\n\
             Modern alternatives include MEDDIC, SPICED, and GPCTBA/C&I.\n\
             Use discovery questions to uncover these elements naturally.",
            DocumentType::Guide,
            "lead_qualification",
            &["BANT", "qualification", "discovery"],
        ),
        (
            "B2B Personalization Strategies",
            "Effective B2B personalization approaches:\n\
             - Company-specific research: Recent news, funding, expansions\n\
             - Technology stack personalization: Reference their current tools\n\
             - Industry-specific pain points: Common challenges in their sector\n\
             - Role-based messaging: Tailor to their specific job function\n\
             - Mutual connections: Leverage LinkedIn networks\n\
             - Recent company triggers: Job postings, press releases, events\n\n\
             Tools: Apollo for data, BuiltWith for tech stack, news feeds for triggers.",
            DocumentType::Template,
            "personalization",
            &["B2B", "personalization", "research"],
        ),
        (
            "ICP Development Framework",
            "Ideal Customer Profile (ICP) development process:\n\
             1. Analyze best customers: Revenue, retention, satisfaction\n\
             2. Identify firmographic data: Company size, industry, location\n\
             3. Determine technographic data: Current tools and tech stack\n\
             4. Map behavioral patterns: Buying process, decision timeline\n\
             5. Define pain points: Specific challenges they face\n\
             6. Validate with data: Use analytics to confirm assumptions\n\n\
             Key metrics: Customer lifetime value, time to close, churn rate.",
            DocumentType::Guide,
            "target_audience",
            &["ICP", "targeting", "segmentation"],
        ),
        (
            "Multi-touch Campaign Sequences",
            "Effective multi-touch campaign structure:\n\n\
             Touch 1: Introduction + Value proposition\n\
             Touch 2: Social proof + case study (3-5 days later)\n\
             Touch 3: Educational content + insights (1 week later)\n\
             Touch 4: Specific offer + CTA (1 week later)\n\
             Touch 5: Breakup email + final value (2 weeks later)\n\n\
             Channel mix: Email primary, LinkedIn secondary, phone for high-value prospects.\n\
             Personalize each touch based on engagement with previous messages.",
            DocumentType::Template,
            "campaign_sequence",
            &["sequences", "multi-touch", "cadence"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_memory::HashEmbedder;

    fn base() -> MarketingKnowledgeBase {
        MarketingKnowledgeBase::in_memory(Arc::new(HashEmbedder::default())).unwrap()
    }

    #[test]
    fn seed_defaults_loads_five_documents_once() {
        let base = base();
        assert_eq!(base.seed_defaults().unwrap(), 5);
        assert_eq!(base.count().unwrap(), 5);
        assert_eq!(base.seed_defaults().unwrap(), 0);
        assert_eq!(base.count().unwrap(), 5);
    }

    #[test]
    fn search_ranks_topically_relevant_documents_first() {
        let base = base();
        base.seed_defaults().unwrap();

        let hits = base.search("email subject lines", None, None, 3).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].document.title, "Email Subject Line Best Practices");
        assert!(hits[0].relevance_score > 0.0);
    }

    #[test]
    fn empty_query_lists_by_filters() {
        let base = base();
        base.seed_defaults().unwrap();

        let hits = base.by_category("personalization", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.title, "B2B Personalization Strategies");

        let templates = base.templates("campaign_sequence", 5).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(
            templates[0].document.document_type,
            DocumentType::Template
        );
    }

    #[test]
    fn best_practices_filter_by_type() {
        let base = base();
        base.seed_defaults().unwrap();

        let hits = base.best_practices("subject lines", 3).unwrap();
        assert!(!hits.is_empty());
        assert!(hits
            .iter()
            .all(|hit| hit.document.document_type == DocumentType::BestPractice));
    }

    #[test]
    fn re_adding_same_document_does_not_duplicate() {
        let base = base();
        base.add_document(
            "Title",
            "Content",
            DocumentType::Guide,
            "general",
            vec![],
            HashMap::new(),
        )
        .unwrap();
        base.add_document(
            "Title",
            "Content",
            DocumentType::Guide,
            "general",
            vec![],
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(base.count().unwrap(), 1);
    }

    #[test]
    fn blank_documents_are_rejected() {
        let base = base();
        let err = base
            .add_document("", "content", DocumentType::Guide, "c", vec![], HashMap::new())
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidDocument { .. }));
    }

    #[test]
    fn campaign_learnings_become_a_case_study() {
        let base = base();
        let metrics = HashMap::from([("open_rate".to_string(), serde_json::json!(0.35))]);
        base.add_campaign_learnings(
            "email_outreach",
            &["personalized openers".to_string()],
            &["generic CTAs".to_string()],
            &metrics,
            &["lead with the prospect's tech stack".to_string()],
        )
        .unwrap();

        let hits = base.by_category("campaign_learnings", 10).unwrap();
        assert_eq!(hits.len(), 1);
        let doc = &hits[0].document;
        assert_eq!(doc.document_type, DocumentType::CaseStudy);
        assert!(doc.content.contains("What Worked:"));
        assert!(doc.content.contains("- personalized openers"));
        assert!(doc.content.contains("open_rate: 0.35"));
        assert!(doc.tags.contains(&"email_outreach".to_string()));
    }
}
