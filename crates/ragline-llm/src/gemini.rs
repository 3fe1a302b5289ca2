//! Google Gemini backend over the Generative Language REST API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
const MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    temperature: f32,
    max_output_tokens: Option<u32>,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model,
            embedding_model: None,
            temperature: 0.0,
            max_output_tokens: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url, model_path(model))
    }
}

/// Gemini addresses models as `models/<name>`; accept both spellings.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let (system, contents) = convert_messages(messages);
        let body = GenerateContentRequest {
            contents,
            system_instruction: system.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };
        let url = self.endpoint(&self.model, "generateContent");

        let response = send_with_retry("gemini", MAX_RETRIES, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("Gemini API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "gemini",
                status,
            });
        }

        let resp: GenerateContentResponse = serde_json::from_str(&text)?;
        tracing::debug!(model = %self.model, candidates = resp.candidates.len(), "Gemini response");
        extract_answer(resp)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "gemini" })?;

        let body = EmbedContentRequest {
            model: model_path(model),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };
        let url = self.endpoint(model, "embedContent");

        let response = send_with_retry("gemini", MAX_RETRIES, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("Gemini embedding API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "gemini",
                status,
            });
        }

        let resp: EmbedContentResponse = serde_json::from_str(&text)?;
        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "gemini" });
        }
        Ok(resp.embedding.values)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gemini"
    }
}

/// Split system messages into a single instruction block; map the rest to Gemini roles.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Content<'_>>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system = (!system.is_empty()).then(|| system.join("\n\n"));

    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| Content {
            role: Some(match m.role {
                Role::Assistant => "model",
                Role::User | Role::System => "user",
            }),
            parts: vec![Part { text: &m.content }],
        })
        .collect();

    (system, contents)
}

fn extract_answer(resp: GenerateContentResponse) -> Result<String, LlmError> {
    let answer: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if answer.is_empty() {
        return Err(LlmError::EmptyResponse { provider: "gemini" });
    }
    Ok(answer)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::{json_response, rate_limited_response, spawn_mock_server};

    fn test_provider() -> GeminiProvider {
        GeminiProvider::new("AIza-test-key".into(), DEFAULT_MODEL.into())
            .with_embedding_model(DEFAULT_EMBEDDING_MODEL)
    }

    fn local_provider(port: u16) -> GeminiProvider {
        test_provider().with_base_url(format!("http://127.0.0.1:{port}/v1beta"))
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", test_provider());
        assert!(!debug.contains("AIza-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(DEFAULT_MODEL));
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = test_provider().with_base_url("https://example.com/v1beta//".into());
        assert_eq!(p.base_url, "https://example.com/v1beta");
    }

    #[test]
    fn model_path_accepts_both_spellings() {
        assert_eq!(model_path("gemini-2.5-flash"), "models/gemini-2.5-flash");
        assert_eq!(
            model_path("models/gemini-embedding-001"),
            "models/gemini-embedding-001"
        );
    }

    #[test]
    fn endpoint_format() {
        let p = test_provider();
        assert_eq!(
            p.endpoint("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn supports_embeddings_depends_on_model() {
        assert!(test_provider().supports_embeddings());
        let p = GeminiProvider::new("k".into(), DEFAULT_MODEL.into());
        assert!(!p.supports_embeddings());
    }

    #[test]
    fn convert_messages_extracts_system_and_maps_roles() {
        let messages = vec![
            Message::system("rule one"),
            Message::user("hello"),
            Message::new(Role::Assistant, "hi"),
            Message::system("rule two"),
        ];
        let (system, contents) = convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("rule one\n\nrule two"));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, Some("user"));
        assert_eq!(contents[1].role, Some("model"));
    }

    #[test]
    fn request_serializes_camel_case() {
        let messages = vec![Message::user("question")];
        let (_, contents) = convert_messages(&messages);
        let body = GenerateContentRequest {
            contents,
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: Some(256),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "question");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn extract_answer_joins_parts() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_answer(resp).unwrap(), "Hello world");
    }

    #[test]
    fn extract_answer_empty_candidates() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            extract_answer(resp),
            Err(LlmError::EmptyResponse { provider: "gemini" })
        ));
    }

    #[test]
    fn extract_answer_missing_content() {
        let resp: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(extract_answer(resp).is_err());
    }

    #[tokio::test]
    async fn chat_against_local_server() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"**Spring** Boot"}]}}]}"#;
        let (port, _handle) = spawn_mock_server(vec![json_response("200 OK", body)]).await;

        let answer = local_provider(port)
            .chat(&[Message::user("What is Spring Boot?")])
            .await
            .unwrap();
        assert_eq!(answer, "**Spring** Boot");
    }

    #[tokio::test]
    async fn chat_retries_after_rate_limit() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#;
        let (port, _handle) =
            spawn_mock_server(vec![rate_limited_response(), json_response("200 OK", body)]).await;

        let answer = local_provider(port)
            .chat(&[Message::user("q")])
            .await
            .unwrap();
        assert_eq!(answer, "ok");
    }

    #[tokio::test]
    async fn chat_error_status_maps_to_api_error() {
        let (port, _handle) = spawn_mock_server(vec![json_response(
            "403 Forbidden",
            r#"{"error":{"message":"API key not valid"}}"#,
        )])
        .await;

        let err = local_provider(port)
            .chat(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { provider: "gemini", status } if status == 403));
    }

    #[tokio::test]
    async fn embed_against_local_server() {
        let body = r#"{"embedding":{"values":[0.25,-0.5,1.0]}}"#;
        let (port, _handle) = spawn_mock_server(vec![json_response("200 OK", body)]).await;

        let vector = local_provider(port).embed("chunk").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = GeminiProvider::new("k".into(), DEFAULT_MODEL.into());
        let err = p.embed("text").await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let p = test_provider().with_base_url("http://127.0.0.1:1".into());
        assert!(p.chat(&[Message::user("q")]).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires RAGLINE_GEMINI_API_KEY env var"]
    async fn integration_gemini_chat_and_embed() {
        let api_key = std::env::var("RAGLINE_GEMINI_API_KEY")
            .expect("RAGLINE_GEMINI_API_KEY must be set");
        let provider = GeminiProvider::new(api_key, DEFAULT_MODEL.into())
            .with_embedding_model(DEFAULT_EMBEDDING_MODEL);

        let response = provider
            .chat(&[Message::user("Reply with exactly: pong")])
            .await
            .unwrap();
        assert!(response.to_lowercase().contains("pong"));

        let vector = provider.embed("hello").await.unwrap();
        assert!(!vector.is_empty());
    }
}
