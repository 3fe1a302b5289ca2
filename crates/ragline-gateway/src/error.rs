use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Failure reported by an [`AnswerService`](crate::AnswerService).
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Question cannot be empty.")]
    EmptyQuestion,
    #[error("{0}")]
    Upstream(String),
}
