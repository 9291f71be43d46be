//! # Leadflow Knowledge
//!
//! Marketing domain knowledge base with retrieval-augmented generation:
//!
//! - [`KnowledgeDocument`] - typed documents (best practices, case studies,
//!   templates, guides)
//! - [`MarketingKnowledgeBase`] - semantic storage and search, seeded with
//!   core marketing knowledge
//! - [`RagRetriever`] - renders search results into prompt-ready context

pub mod base;
pub mod document;
pub mod retriever;
mod store;

pub use base::{KnowledgeHit, MarketingKnowledgeBase};
pub use document::{DocumentType, KnowledgeDocument};
pub use retriever::{RagRetriever, TemplateSuggestion};
