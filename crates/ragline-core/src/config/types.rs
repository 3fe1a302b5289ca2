use std::path::PathBuf;

use ragline_memory::document::SplitterConfig;
use serde::{Deserialize, Serialize};

use crate::chain::{DEFAULT_PROMPT_TEMPLATE, DEFAULT_TOP_K};
use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub index: IndexConfig,
    pub splitter: SplitterConfig,
    pub retrieval: RetrievalConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Chat model; the provider's default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Embedding model; the provider's default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Overrides the provider's default API root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: None,
            embedding_model: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn chat_model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.provider {
            ProviderKind::Gemini => ragline_llm::gemini::DEFAULT_MODEL,
            ProviderKind::OpenAi => ragline_llm::openai::DEFAULT_MODEL,
        })
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(match self.provider {
            ProviderKind::Gemini => ragline_llm::gemini::DEFAULT_EMBEDDING_MODEL,
            ProviderKind::OpenAi => ragline_llm::openai::DEFAULT_EMBEDDING_MODEL,
        })
    }
}

/// Where the vector index lives on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vector_db"),
            collection: "documents".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub prompt_template: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// Requests per minute per client IP on `/ask`; `0` disables the limit.
    pub rate_limit: u32,
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
            rate_limit: 60,
            max_body_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub gemini_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
    pub gateway_token: Option<Secret>,
}
