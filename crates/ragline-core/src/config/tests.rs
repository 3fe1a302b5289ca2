use std::io::Write;
use std::path::Path;

use ragline_memory::document::SplitMode;
use serial_test::serial;

use super::*;
use crate::vault::StaticVaultProvider;

const ENV_KEYS: [&str; 19] = [
    "RAGLINE_CONFIG",
    "RAGLINE_LLM_PROVIDER",
    "RAGLINE_LLM_MODEL",
    "RAGLINE_LLM_EMBEDDING_MODEL",
    "RAGLINE_LLM_BASE_URL",
    "RAGLINE_LLM_TEMPERATURE",
    "RAGLINE_LLM_MAX_TOKENS",
    "RAGLINE_INDEX_PATH",
    "RAGLINE_INDEX_COLLECTION",
    "RAGLINE_SPLITTER_CHUNK_SIZE",
    "RAGLINE_SPLITTER_CHUNK_OVERLAP",
    "RAGLINE_RETRIEVAL_TOP_K",
    "RAGLINE_LOG_LEVEL",
    "RAGLINE_GATEWAY_BIND",
    "RAGLINE_GATEWAY_PORT",
    "RAGLINE_GATEWAY_ALLOWED_ORIGINS",
    "RAGLINE_GATEWAY_RATE_LIMIT",
    "RAGLINE_GATEWAY_MAX_BODY_SIZE",
    "RAGLINE_GEMINI_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_service_settings() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.llm.chat_model(), "gemini-2.5-flash");
    assert_eq!(config.llm.embedding_model(), "gemini-embedding-001");
    assert!(config.llm.temperature.abs() < f32::EPSILON);
    assert_eq!(config.index.path, Path::new("vector_db"));
    assert_eq!(config.splitter.chunk_size, 200);
    assert_eq!(config.splitter.chunk_overlap, 20);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(
        config.gateway.allowed_origins,
        vec!["http://localhost:5173", "http://127.0.0.1:5173"]
    );
    assert_eq!(config.gateway.rate_limit, 60);
    assert_eq!(config.gateway.max_body_size, 65536);
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/ragline.toml")).unwrap();
    assert_eq!(config.llm.chat_model(), "gemini-2.5-flash");
    assert_eq!(config.index.collection, "documents");
}

#[test]
#[serial]
fn load_partial_toml_keeps_other_defaults() {
    clear_env();
    let file = write_config(
        r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "http://localhost:8080/v1"

[splitter]
chunk_size = 500
mode = "characters"

[gateway]
port = 9000
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.chat_model(), "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model(), "text-embedding-3-small");
    assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:8080/v1"));
    assert_eq!(config.splitter.chunk_size, 500);
    assert_eq!(config.splitter.chunk_overlap, 20);
    assert_eq!(config.splitter.mode, SplitMode::Characters);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
#[serial]
fn load_invalid_toml_errors() {
    clear_env();
    let file = write_config("[llm\nprovider = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_take_precedence_over_file() {
    clear_env();
    let file = write_config("[retrieval]\ntop_k = 5\n");
    unsafe {
        std::env::set_var("RAGLINE_RETRIEVAL_TOP_K", "7");
        std::env::set_var("RAGLINE_LLM_PROVIDER", "openai");
        std::env::set_var("RAGLINE_INDEX_PATH", "/tmp/idx");
        std::env::set_var("RAGLINE_GATEWAY_ALLOWED_ORIGINS", "https://a.example, ,https://b.example");
        std::env::set_var("RAGLINE_GATEWAY_PORT", "8123");
        std::env::set_var("RAGLINE_SPLITTER_CHUNK_SIZE", "300");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.index.path, Path::new("/tmp/idx"));
    assert_eq!(
        config.gateway.allowed_origins,
        vec!["https://a.example", "https://b.example"]
    );
    assert_eq!(config.gateway.port, 8123);
    assert_eq!(config.splitter.chunk_size, 300);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("RAGLINE_LLM_PROVIDER", "ollama");
        std::env::set_var("RAGLINE_GATEWAY_PORT", "not-a-port");
        std::env::set_var("RAGLINE_LLM_TEMPERATURE", "warm");
    }
    let config = Config::load(Path::new("/nonexistent")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.gateway.port, 8000);
    assert!(config.llm.temperature.abs() < f32::EPSILON);
}

#[test]
fn validate_rejects_overlap_not_below_size() {
    let mut config = Config::default();
    config.splitter.chunk_size = 10;
    config.splitter.chunk_overlap = 10;
    let err = config.validate().unwrap_err();
    assert!(format!("{err:#}").contains("chunk_overlap (10) must be smaller"));
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_requires_template_placeholders() {
    let mut config = Config::default();
    config.retrieval.prompt_template = "Question: {question}".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("{context}"));
}

#[test]
fn validate_rejects_out_of_range_temperature() {
    let mut config = Config::default();
    config.llm.temperature = 3.5;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_zero_body_limit() {
    let mut config = Config::default();
    config.gateway.max_body_size = 0;
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn resolve_secrets_prefers_ragline_key() {
    let vault = StaticVaultProvider::default()
        .with("RAGLINE_GEMINI_API_KEY", "primary")
        .with("GOOGLE_API_KEY", "fallback")
        .with("RAGLINE_GATEWAY_TOKEN", "tok");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();

    assert_eq!(
        config.secrets.gemini_api_key.as_ref().map(|s| s.expose()),
        Some("primary")
    );
    assert_eq!(
        config.secrets.gateway_token.as_ref().map(|s| s.expose()),
        Some("tok")
    );
    assert!(config.secrets.openai_api_key.is_none());
}

#[tokio::test]
async fn resolve_secrets_falls_back_to_google_api_key() {
    let vault = StaticVaultProvider::default().with("GOOGLE_API_KEY", "fallback");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.gemini_api_key.as_ref().map(|s| s.expose()),
        Some("fallback")
    );
}

#[test]
fn secrets_redacted_in_debug_output() {
    let mut config = Config::default();
    config.secrets.gemini_api_key = Some(crate::vault::Secret::new("AIza-secret"));
    let debug = format!("{config:?}");
    assert!(!debug.contains("AIza-secret"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn config_serialize_roundtrip() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).unwrap();
    let back: Config = toml::from_str(&toml_str).unwrap();
    assert_eq!(back.llm.model, config.llm.model);
    assert_eq!(back.splitter, config.splitter);
    assert_eq!(back.gateway.allowed_origins, config.gateway.allowed_origins);
}

#[test]
#[serial]
fn resolve_config_path_priority() {
    clear_env();
    assert_eq!(
        resolve_config_path(Some(Path::new("custom.toml"))),
        Path::new("custom.toml")
    );
    assert_eq!(resolve_config_path(None), Path::new("config/default.toml"));
    unsafe { std::env::set_var("RAGLINE_CONFIG", "/etc/ragline.toml") };
    assert_eq!(resolve_config_path(None), Path::new("/etc/ragline.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        Path::new("cli.toml")
    );
    clear_env();
}

#[test]
#[serial]
fn bundled_default_config_parses() {
    clear_env();
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let config = Config::load(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
fn model_defaults_follow_provider() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::OpenAi;
    assert_eq!(config.llm.chat_model(), "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model(), "text-embedding-3-small");

    config.llm.model = Some("llama3".into());
    assert_eq!(config.llm.chat_model(), "llama3");
    assert_eq!(config.llm.embedding_model(), "text-embedding-3-small");
}

#[test]
#[serial]
fn env_provider_switch_uses_openai_models() {
    clear_env();
    unsafe { std::env::set_var("RAGLINE_LLM_PROVIDER", "openai") };
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.chat_model(), "gpt-4o-mini");
    assert_eq!(config.llm.embedding_model(), "text-embedding-3-small");
}
