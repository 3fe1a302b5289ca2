//! Construction of providers, splitters, and the answer chain from `Config`.

use std::sync::Arc;

use anyhow::Context;
use ragline_llm::any::AnyProvider;
use ragline_llm::gemini::GeminiProvider;
use ragline_llm::openai::OpenAiProvider;
use ragline_memory::InMemoryVectorStore;
use ragline_memory::document::TextSplitter;

use crate::chain::{ChainConfig, RagChain};
use crate::config::{Config, ProviderKind};

const OPENAI_DEFAULT_MAX_TOKENS: u32 = 1024;

/// Build the configured provider. API keys come from `config.secrets`.
///
/// # Errors
///
/// Returns an error if the provider's API key has not been resolved.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Gemini => {
            let api_key = config
                .secrets
                .gemini_api_key
                .as_ref()
                .context("RAGLINE_GEMINI_API_KEY (or GOOGLE_API_KEY) not set")?
                .expose()
                .to_owned();
            let mut provider = GeminiProvider::new(api_key, config.llm.chat_model().to_owned())
                .with_embedding_model(config.llm.embedding_model())
                .with_temperature(config.llm.temperature)
                .with_max_output_tokens(config.llm.max_tokens);
            if let Some(ref base_url) = config.llm.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(AnyProvider::Gemini(provider))
        }
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("RAGLINE_OPENAI_API_KEY not set")?
                .expose()
                .to_owned();
            let base_url = config
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| ragline_llm::openai::DEFAULT_BASE_URL.to_owned());
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                base_url,
                config.llm.chat_model().to_owned(),
                config.llm.max_tokens.unwrap_or(OPENAI_DEFAULT_MAX_TOKENS),
                Some(config.llm.embedding_model().to_owned()),
            )))
        }
    }
}

/// # Errors
///
/// Returns an error if the splitter settings are invalid.
pub fn create_splitter(config: &Config) -> anyhow::Result<TextSplitter> {
    TextSplitter::new(config.splitter.clone()).context("invalid [splitter] settings")
}

#[must_use]
pub fn chain_config(config: &Config) -> ChainConfig {
    ChainConfig {
        collection: config.index.collection.clone(),
        top_k: config.retrieval.top_k,
        prompt_template: config.retrieval.prompt_template.clone(),
    }
}

/// Load the persisted index named by `config.index.path`.
///
/// # Errors
///
/// Returns an error if the index is missing or unreadable; run `ingest` first.
pub async fn open_index(config: &Config) -> anyhow::Result<Arc<InMemoryVectorStore>> {
    let store = InMemoryVectorStore::load(&config.index.path)
        .await
        .with_context(|| {
            format!(
                "failed to load vector index from {} (run `ragline ingest` first)",
                config.index.path.display()
            )
        })?;
    Ok(Arc::new(store))
}

/// Load the index and wire it to `provider` as an answer chain.
///
/// # Errors
///
/// Returns an error if the index cannot be loaded.
pub async fn build_chain<P: ragline_llm::LlmProvider>(
    config: &Config,
    provider: P,
) -> anyhow::Result<RagChain<P>> {
    let store = open_index(config).await?;
    Ok(RagChain::new(provider, store, chain_config(config)))
}
