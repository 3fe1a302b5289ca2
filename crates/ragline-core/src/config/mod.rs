mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings that would only fail later, at ingest or query time.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.splitter
            .validate()
            .context("invalid [splitter] settings")?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than zero");
        }
        for placeholder in ["{context}", "{question}"] {
            if !self.retrieval.prompt_template.contains(placeholder) {
                bail!("retrieval.prompt_template must contain {placeholder}");
            }
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            );
        }
        if self.index.collection.trim().is_empty() {
            bail!("index.collection must not be empty");
        }
        if self.gateway.max_body_size == 0 {
            bail!("gateway.max_body_size must be greater than zero");
        }
        Ok(())
    }

    /// Resolve API keys and the gateway token through the vault.
    ///
    /// `GOOGLE_API_KEY` is accepted when `RAGLINE_GEMINI_API_KEY` is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        let gemini = match vault.get_secret("RAGLINE_GEMINI_API_KEY").await? {
            Some(val) => Some(val),
            None => vault.get_secret("GOOGLE_API_KEY").await?,
        };
        if let Some(val) = gemini {
            self.secrets.gemini_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("RAGLINE_OPENAI_API_KEY").await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("RAGLINE_GATEWAY_TOKEN").await? {
            self.secrets.gateway_token = Some(Secret::new(val));
        }
        Ok(())
    }
}

/// Priority: explicit `--config` > `RAGLINE_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("RAGLINE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
