//! Chat and embedding provider abstraction and HTTP backends.

pub mod any;
pub mod error;
pub mod gemini;
pub(crate) mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
