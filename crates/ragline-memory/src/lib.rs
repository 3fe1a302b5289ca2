//! Document chunking, ingestion, and a file-persisted vector index.

pub mod document;
pub mod in_memory_store;
pub mod vector_store;

pub use in_memory_store::InMemoryVectorStore;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
