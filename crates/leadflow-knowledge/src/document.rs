//! Knowledge document model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of knowledge a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BestPractice,
    CaseStudy,
    Template,
    Guide,
}

impl DocumentType {
    /// Stable string form used in storage columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BestPractice => "best_practice",
            DocumentType::CaseStudy => "case_study",
            DocumentType::Template => "template",
            DocumentType::Guide => "guide",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "best_practice" => Some(DocumentType::BestPractice),
            "case_study" => Some(DocumentType::CaseStudy),
            "template" => Some(DocumentType::Template),
            "guide" => Some(DocumentType::Guide),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured knowledge document.
///
/// Ids are content-addressed: re-adding the same title and content replaces
/// the existing document instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub document_type: DocumentType,
    /// Topic bucket, e.g. "email_marketing" or "lead_qualification".
    pub category: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeDocument {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        document_type: DocumentType,
        category: impl Into<String>,
        tags: Vec<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        let title = title.into();
        let content = content.into();
        let now = Utc::now();

        Self {
            id: document_id(&title, &content),
            title,
            content,
            document_type,
            category: category.into(),
            tags,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Content-addressed document id: hex SHA-256 of `"{title}_{content}"`.
pub fn document_id(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"_");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_for_same_title_and_content() {
        let a = KnowledgeDocument::new(
            "Subject Lines",
            "keep them short",
            DocumentType::BestPractice,
            "email_marketing",
            vec![],
            HashMap::new(),
        );
        let b = KnowledgeDocument::new(
            "Subject Lines",
            "keep them short",
            DocumentType::BestPractice,
            "email_marketing",
            vec![],
            HashMap::new(),
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn id_changes_with_content() {
        assert_ne!(document_id("t", "one"), document_id("t", "two"));
        assert_ne!(document_id("a", "x"), document_id("b", "x"));
    }

    #[test]
    fn document_type_round_trips() {
        for ty in [
            DocumentType::BestPractice,
            DocumentType::CaseStudy,
            DocumentType::Template,
            DocumentType::Guide,
        ] {
            assert_eq!(DocumentType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(DocumentType::from_str("memo"), None);
    }
}
