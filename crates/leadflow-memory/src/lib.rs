//! # Leadflow Memory
//!
//! Storage backends for the layered memory subsystem:
//!
//! - [`InMemoryProvider`] - HashMap-backed store for tests and fallback
//! - `RedisProvider` - short-term store with conversation TTL (feature `redis`)
//! - `SqliteProvider` - persistent long-term store (feature `sqlite`)
//! - `VectorProvider` - semantic store over a SQLite vector table (feature `sqlite`)
//!
//! plus the [`MemoryManager`] that fans writes out across layers and routes
//! retrieval to the right backend.

pub mod embedding;
pub mod in_memory;
pub mod manager;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod vector;

pub use embedding::{Embedder, HashEmbedder};
pub use in_memory::InMemoryProvider;
pub use manager::MemoryManager;

#[cfg(feature = "redis")]
pub use redis::RedisProvider;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteProvider;

#[cfg(feature = "sqlite")]
pub use vector::{VectorHit, VectorProvider, VectorRecord, VectorStore, cosine_similarity};
