//! Retrieval-augmented answering: retrieve, format, prompt, call, clean.

use std::sync::Arc;

use ragline_llm::{LlmError, LlmProvider, Message};
use ragline_memory::{VectorStore, VectorStoreError};

use crate::markdown::strip_markdown;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the question based only on the following context:\n{context}\n\nQuestion: {question}\n";
pub const DEFAULT_TOP_K: usize = 3;

/// Separator placed between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("question cannot be empty")]
    EmptyQuestion,

    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub collection: String,
    pub top_k: usize,
    pub prompt_template: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            collection: "documents".into(),
            top_k: DEFAULT_TOP_K,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.into(),
        }
    }
}

pub struct RagChain<P> {
    provider: P,
    store: Arc<dyn VectorStore>,
    config: ChainConfig,
}

impl<P: LlmProvider> RagChain<P> {
    pub fn new(provider: P, store: Arc<dyn VectorStore>, config: ChainConfig) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Contents of the `top_k` chunks closest to `question`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the question or searching the index fails.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>, ChainError> {
        let vector = self.provider.embed(question).await?;
        let hits = self
            .store
            .search(&self.config.collection, vector, self.config.top_k as u64)
            .await?;

        tracing::debug!(hits = hits.len(), top_k = self.config.top_k, "retrieved context");

        Ok(hits
            .into_iter()
            .filter_map(|hit| hit.payload_str("content").map(str::to_owned))
            .collect())
    }

    #[must_use]
    pub fn build_prompt(&self, context: &str, question: &str) -> String {
        render_template(&self.config.prompt_template, context, question)
    }

    /// Answer `question` from the indexed documents.
    ///
    /// # Errors
    ///
    /// Returns `ChainError::EmptyQuestion` for blank input before any external
    /// call, otherwise any retrieval or LLM failure.
    pub async fn ask(&self, question: &str) -> Result<String, ChainError> {
        if question.trim().is_empty() {
            return Err(ChainError::EmptyQuestion);
        }

        let docs = self.retrieve(question).await?;
        let context = format_docs(&docs);
        let prompt = self.build_prompt(&context, question);

        let answer = self.provider.chat(&[Message::user(prompt)]).await?;
        tracing::info!(
            provider = self.provider.name(),
            chunks = docs.len(),
            answer_len = answer.len(),
            "question answered"
        );

        Ok(strip_markdown(&answer).into_owned())
    }
}

#[must_use]
pub fn format_docs(docs: &[String]) -> String {
    docs.join(CONTEXT_SEPARATOR)
}

/// Single-pass substitution of `{context}` and `{question}`, so braces inside
/// the substituted values are never expanded again. Other braces are literal.
#[must_use]
pub fn render_template(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ragline_llm::mock::MockProvider;
    use ragline_memory::{InMemoryVectorStore, VectorPoint};

    use super::*;

    async fn store_with(chunks: &[(&str, Vec<f32>)]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .ensure_collection("documents", chunks[0].1.len() as u64)
            .await
            .unwrap();
        let points = chunks
            .iter()
            .enumerate()
            .map(|(i, (content, vector))| VectorPoint {
                id: format!("p{i}"),
                vector: vector.clone(),
                payload: HashMap::from([("content".into(), serde_json::json!(content))]),
            })
            .collect();
        store.upsert("documents", points).await.unwrap();
        store
    }

    #[test]
    fn default_template_matches_service_prompt() {
        let prompt = render_template(DEFAULT_PROMPT_TEMPLATE, "ctx", "why?");
        assert_eq!(
            prompt,
            "Answer the question based only on the following context:\nctx\n\nQuestion: why?\n"
        );
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_values() {
        let prompt = render_template("{context}|{question}", "{question}", "q");
        assert_eq!(prompt, "{question}|q");
    }

    #[test]
    fn render_keeps_unknown_braces() {
        assert_eq!(render_template("{x} {context", "c", "q"), "{x} {context");
    }

    #[test]
    fn format_docs_joins_with_blank_line() {
        let docs = vec!["one".to_owned(), "two".to_owned()];
        assert_eq!(format_docs(&docs), "one\n\ntwo");
        assert_eq!(format_docs(&[]), "");
    }

    #[tokio::test]
    async fn ask_rejects_blank_question_before_any_call() {
        let provider = MockProvider::default();
        let chain = RagChain::new(
            provider.clone(),
            Arc::new(InMemoryVectorStore::new()),
            ChainConfig::default(),
        );
        assert!(matches!(chain.ask("   \n").await, Err(ChainError::EmptyQuestion)));
        assert!(matches!(chain.ask("").await, Err(ChainError::EmptyQuestion)));
        assert!(provider.recorded_messages().is_empty());
    }

    #[tokio::test]
    async fn retrieve_returns_top_k_best_first() {
        let store = store_with(&[
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.0]),
            ("middle", vec![0.8, 0.6]),
            ("other", vec![-1.0, 0.0]),
        ])
        .await;
        let provider = MockProvider::default().with_embedding_for("q", vec![1.0, 0.0]);
        let chain = RagChain::new(provider, store, ChainConfig::default());

        let docs = chain.retrieve("q").await.unwrap();
        assert_eq!(docs, vec!["near", "middle", "far"]);
    }

    #[tokio::test]
    async fn ask_builds_prompt_and_cleans_answer() {
        let store = store_with(&[("Spring Boot is a Java framework.", vec![1.0, 0.0])]).await;
        let provider = MockProvider::with_responses(vec!["It is **a Java framework**.".into()])
            .with_embedding_for("What is Spring Boot?", vec![1.0, 0.0]);
        let chain = RagChain::new(provider.clone(), store, ChainConfig::default());

        let answer = chain.ask("What is Spring Boot?").await.unwrap();
        assert_eq!(answer, "It is a Java framework.");

        let recorded = provider.recorded_messages();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), 1);
        assert_eq!(
            recorded[0][0],
            Message::user(
                "Answer the question based only on the following context:\n\
                 Spring Boot is a Java framework.\n\nQuestion: What is Spring Boot?\n"
            )
        );
    }

    #[tokio::test]
    async fn ask_missing_collection_is_retrieval_error() {
        let chain = RagChain::new(
            MockProvider::default(),
            Arc::new(InMemoryVectorStore::new()),
            ChainConfig::default(),
        );
        assert!(matches!(chain.ask("hi").await, Err(ChainError::Retrieval(_))));
    }

    #[tokio::test]
    async fn ask_propagates_llm_failure() {
        let store = store_with(&[("ctx", vec![1.0; 8])]).await;
        let mut provider = MockProvider::default();
        provider.fail_chat = true;
        let chain = RagChain::new(provider, store, ChainConfig::default());
        assert!(matches!(chain.ask("hi").await, Err(ChainError::Llm(_))));
    }

    #[tokio::test]
    async fn ask_propagates_embedding_failure() {
        let store = store_with(&[("ctx", vec![1.0; 8])]).await;
        let chain = RagChain::new(MockProvider::failing(), store, ChainConfig::default());
        assert!(matches!(chain.ask("hi").await, Err(ChainError::Llm(_))));
    }
}
