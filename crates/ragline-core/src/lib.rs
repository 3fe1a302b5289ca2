//! Configuration, provider bootstrap, markdown cleanup, and the answer chain.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod markdown;
pub mod vault;

pub use chain::{ChainConfig, ChainError, RagChain};
pub use config::Config;
pub use markdown::strip_markdown;
