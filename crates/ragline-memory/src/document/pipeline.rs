use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::{Document, DocumentError, DocumentLoader, TextSplitter};
use crate::vector_store::{VectorPoint, VectorStore};

pub type EmbedFn = Box<dyn Fn(&str) -> ragline_llm::provider::EmbedFuture + Send + Sync>;

pub struct IngestionPipeline {
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
}

impl IngestionPipeline {
    pub fn new(
        splitter: TextSplitter,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
    ) -> Self {
        Self {
            splitter,
            store,
            collection: collection.into(),
            embed_fn,
        }
    }

    /// Ingest a document: split -> embed -> upsert. Returns chunk count.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails.
    pub async fn ingest(&self, document: Document) -> Result<usize, DocumentError> {
        let chunks = self.splitter.split(&document);
        if chunks.is_empty() {
            tracing::debug!(source = %document.metadata.source, "document produced no chunks");
            return Ok(0);
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = (self.embed_fn)(&chunk.content).await?;
            let payload = HashMap::from([
                ("source".to_owned(), json!(chunk.metadata.source)),
                ("content_type".to_owned(), json!(chunk.metadata.content_type)),
                ("chunk_index".to_owned(), json!(chunk.chunk_index)),
                ("content".to_owned(), json!(chunk.content)),
            ]);

            points.push(VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload,
            });
        }

        let dimension = points[0].vector.len() as u64;
        self.store
            .ensure_collection(&self.collection, dimension)
            .await?;

        let count = points.len();
        self.store.upsert(&self.collection, points).await?;

        tracing::info!(
            source = %document.metadata.source,
            chunks = count,
            dimension,
            collection = %self.collection,
            "document ingested"
        );
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn load_and_ingest(
        &self,
        loader: &(dyn DocumentLoader + '_),
        path: &std::path::Path,
    ) -> Result<usize, DocumentError> {
        let documents = loader.load(path).await?;
        let mut total = 0;
        for doc in documents {
            total += self.ingest(doc).await?;
        }
        Ok(total)
    }
}
