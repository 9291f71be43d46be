//! # Leadflow Agents
//!
//! LLM-backed marketing agents. The [`ChatModel`] trait abstracts the
//! completion provider ([`OpenAiChat`] talks to any OpenAI-compatible API),
//! [`MemoryEnhanced`] layers interaction recall and campaign learnings over a
//! `MemoryManager`, and [`MarketingExpert`] combines both with the knowledge
//! base for campaign strategy, personalization, and performance analysis.

pub mod llm;
pub mod marketing_expert;
pub mod memory_enhanced;

pub use llm::{ChatCompletion, ChatMessage, ChatModel, OpenAiChat, TokenUsage};
pub use marketing_expert::{
    CampaignBrief, CampaignStrategy, ContactProfile, MarketingExpert, MarketingInsights,
    PerformanceAnalysis, PersonalizationPlan, ResearchData, SubjectLineOptimization, TouchSequence,
};
pub use memory_enhanced::MemoryEnhanced;
