//! # Leadflow Core
//!
//! Core traits and types shared across the Leadflow marketing automation
//! workspace: memory entries and the provider trait, configuration loaded
//! from the environment, the toolkit seam, and the error types every other
//! crate builds on.

pub mod config;
pub mod error;
pub mod memory;
pub mod toolkit;

pub use config::{
    DatabaseSettings, LlmSettings, MarketingApiSettings, MemoryBackend, MemorySettings, Settings,
};
pub use error::{AgentError, KnowledgeError, LlmError, MemoryError, ToolkitError};
pub use memory::{MemoryEntry, MemoryKind, MemoryProvider, MemoryQuery};
pub use toolkit::Toolkit;
