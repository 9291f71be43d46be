//! # Configuration
//!
//! Environment-driven settings with nested sections per concern. Values come
//! from process environment variables (a `.env` file is loaded by the CLI
//! before settings are read) with sensible defaults for local development.

use std::collections::HashMap;
use std::env;

/// Which backend serves the short-term memory layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBackend {
    Redis,
    Sqlite,
    InMemory,
}

impl MemoryBackend {
    fn from_env_value(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "redis" => MemoryBackend::Redis,
            "sqlite" => MemoryBackend::Sqlite,
            _ => MemoryBackend::InMemory,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub default_model_id: String,
    pub default_temperature: f32,
    pub max_context_length: usize,
    pub base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            default_model_id: "gpt-4o-mini".to_string(),
            default_temperature: 0.7,
            max_context_length: 8000,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Marketing and sales API configuration.
#[derive(Debug, Clone)]
pub struct MarketingApiSettings {
    pub apollo_api_key: Option<String>,
    pub hubspot_api_key: Option<String>,
    pub builtwith_api_key: Option<String>,
    /// Requests per minute for Apollo calls.
    pub apollo_rate_limit: u32,
    /// Requests per minute for HubSpot calls.
    pub hubspot_rate_limit: u32,
}

impl Default for MarketingApiSettings {
    fn default() -> Self {
        Self {
            apollo_api_key: None,
            hubspot_api_key: None,
            builtwith_api_key: None,
            apollo_rate_limit: 100,
            hubspot_rate_limit: 100,
        }
    }
}

/// Database and storage configuration.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub redis_url: String,
    pub database_path: String,
    pub vector_db_path: String,
    pub knowledge_db_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            database_path: "./data/leadflow.db".to_string(),
            vector_db_path: "./data/vectors.db".to_string(),
            knowledge_db_path: "./data/knowledge.db".to_string(),
        }
    }
}

/// Memory layer configuration.
#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub short_term_backend: MemoryBackend,
    pub embedding_dimensions: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            short_term_backend: MemoryBackend::Redis,
            embedding_dimensions: 384,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub marketing_apis: MarketingApiSettings,
    pub database: DatabaseSettings,
    pub memory: MemorySettings,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            llm: LlmSettings {
                openai_api_key: env_opt("OPENAI_API_KEY"),
                default_model_id: env_opt("DEFAULT_MODEL_ID")
                    .unwrap_or(defaults.llm.default_model_id),
                default_temperature: env_or("DEFAULT_TEMPERATURE", defaults.llm.default_temperature),
                max_context_length: env_or("MAX_CONTEXT_LENGTH", defaults.llm.max_context_length),
                base_url: env_opt("OPENAI_BASE_URL").unwrap_or(defaults.llm.base_url),
            },
            marketing_apis: MarketingApiSettings {
                apollo_api_key: env_opt("APOLLO_API_KEY"),
                hubspot_api_key: env_opt("HUBSPOT_API_KEY"),
                builtwith_api_key: env_opt("BUILTWITH_API_KEY"),
                apollo_rate_limit: env_or(
                    "APOLLO_RATE_LIMIT",
                    defaults.marketing_apis.apollo_rate_limit,
                ),
                hubspot_rate_limit: env_or(
                    "HUBSPOT_RATE_LIMIT",
                    defaults.marketing_apis.hubspot_rate_limit,
                ),
            },
            database: DatabaseSettings {
                redis_url: env_opt("REDIS_URL").unwrap_or(defaults.database.redis_url),
                database_path: env_opt("DATABASE_PATH").unwrap_or(defaults.database.database_path),
                vector_db_path: env_opt("VECTOR_DB_PATH")
                    .unwrap_or(defaults.database.vector_db_path),
                knowledge_db_path: env_opt("KNOWLEDGE_DB_PATH")
                    .unwrap_or(defaults.database.knowledge_db_path),
            },
            memory: MemorySettings {
                short_term_backend: env_opt("MEMORY_PROVIDER")
                    .map(|v| MemoryBackend::from_env_value(&v))
                    .unwrap_or(defaults.memory.short_term_backend),
                embedding_dimensions: env_or(
                    "EMBEDDING_DIMENSIONS",
                    defaults.memory.embedding_dimensions,
                ),
            },
        }
    }

    /// Report which API integrations are configured.
    pub fn validate_required_apis(&self) -> HashMap<&'static str, bool> {
        HashMap::from([
            ("llm_provider", self.llm.openai_api_key.is_some()),
            ("apollo", self.marketing_apis.apollo_api_key.is_some()),
            ("hubspot", self.marketing_apis.hubspot_api_key.is_some()),
            ("builtwith", self.marketing_apis.builtwith_api_key.is_some()),
        ])
    }

    /// List integrations that are missing a key, sorted for stable output.
    pub fn missing_apis(&self) -> Vec<&'static str> {
        let mut missing: Vec<_> = self
            .validate_required_apis()
            .into_iter()
            .filter(|(_, configured)| !configured)
            .map(|(name, _)| name)
            .collect();
        missing.sort_unstable();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.llm.default_model_id, "gpt-4o-mini");
        assert_eq!(settings.llm.default_temperature, 0.7);
        assert_eq!(settings.llm.max_context_length, 8000);
        assert_eq!(settings.database.redis_url, "redis://localhost:6379/0");
        assert_eq!(settings.marketing_apis.apollo_rate_limit, 100);
        assert_eq!(settings.memory.embedding_dimensions, 384);
        assert_eq!(settings.memory.short_term_backend, MemoryBackend::Redis);
    }

    #[test]
    fn missing_apis_lists_unconfigured_integrations() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.missing_apis(),
            vec!["apollo", "builtwith", "hubspot", "llm_provider"]
        );

        settings.llm.openai_api_key = Some("sk-test".into());
        settings.marketing_apis.apollo_api_key = Some("key".into());
        assert_eq!(settings.missing_apis(), vec!["builtwith", "hubspot"]);
    }

    #[test]
    fn memory_backend_parses_known_values() {
        assert_eq!(MemoryBackend::from_env_value("redis"), MemoryBackend::Redis);
        assert_eq!(MemoryBackend::from_env_value("SQLITE"), MemoryBackend::Sqlite);
        assert_eq!(MemoryBackend::from_env_value("memory"), MemoryBackend::InMemory);
        assert_eq!(MemoryBackend::from_env_value("bogus"), MemoryBackend::InMemory);
    }
}
