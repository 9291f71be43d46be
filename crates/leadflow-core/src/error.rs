//! # Error Types
//!
//! Domain-specific error enums for the Leadflow workspace. Each concern
//! (memory, knowledge, toolkits, LLM access, agents) carries its own enum
//! with structured context so callers can react to specific failures instead
//! of parsing strings.

use thiserror::Error;

/// Errors raised by memory providers and the memory manager.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Failed to store a memory entry.
    #[error("Failed to store entry '{id}' in {backend}: {reason}")]
    StoreFailed {
        backend: &'static str,
        id: String,
        reason: String,
    },

    /// Failed to retrieve memory entries.
    #[error("Failed to retrieve entries from {backend}: {reason}")]
    RetrieveFailed {
        backend: &'static str,
        reason: String,
    },

    /// Failed to delete a memory entry.
    #[error("Failed to delete entry '{id}' from {backend}: {reason}")]
    DeleteFailed {
        backend: &'static str,
        id: String,
        reason: String,
    },

    /// Failed to clear memory entries.
    #[error("Failed to clear {backend}: {reason}")]
    ClearFailed {
        backend: &'static str,
        reason: String,
    },

    /// Could not establish or configure a backend connection.
    #[error("Failed to connect to {backend}: {reason}")]
    ConnectionFailed {
        backend: &'static str,
        reason: String,
    },

    /// Entry could not be serialized or deserialized.
    #[error("Serialization failed in {backend}: {reason}")]
    Serialization {
        backend: &'static str,
        reason: String,
    },

    /// All layers of a dual-write rejected the entry.
    #[error("All memory layers failed to store entry '{id}': {reason}")]
    AllLayersFailed { id: String, reason: String },
}

/// Errors raised by the knowledge base and RAG retriever.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Underlying vector storage failed.
    #[error("Knowledge storage failed: {0}")]
    Storage(#[from] MemoryError),

    /// A document failed validation before indexing.
    #[error("Invalid knowledge document: {reason}")]
    InvalidDocument { reason: String },
}

/// Errors raised by the third-party API toolkits.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// The API key for a service is not configured.
    #[error("{service} API key not configured")]
    MissingApiKey { service: &'static str },

    /// The HTTP request could not be sent or timed out.
    #[error("{service} request to '{endpoint}' failed: {reason}")]
    RequestFailed {
        service: &'static str,
        endpoint: String,
        reason: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned status {status} for '{endpoint}'")]
    UnexpectedStatus {
        service: &'static str,
        endpoint: String,
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode {service} response from '{endpoint}': {reason}")]
    DecodeFailed {
        service: &'static str,
        endpoint: String,
        reason: String,
    },

    /// The requested resource does not exist upstream.
    #[error("{service} has no data for '{resource}'")]
    NotFound {
        service: &'static str,
        resource: String,
    },
}

/// Errors raised by LLM providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key available for the configured provider.
    #[error("LLM API key not configured")]
    MissingApiKey,

    /// The completion request failed at the transport level.
    #[error("LLM request failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider answered with a non-success status.
    #[error("LLM provider returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The completion response had no usable content.
    #[error("LLM response missing content: {reason}")]
    EmptyResponse { reason: String },
}

/// Errors raised by agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
}
