#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ragline_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::vector_store::VectorStoreError),
}
