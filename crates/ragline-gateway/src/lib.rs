//! HTTP API for asking questions against the indexed documents.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{AnswerError, GatewayError};
pub use server::{AnswerFuture, AnswerService, GatewayServer};
