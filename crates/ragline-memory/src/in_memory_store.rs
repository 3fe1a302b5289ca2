use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

/// File name of the persisted index inside the index directory.
pub const INDEX_FILE: &str = "index.json";

const SNAPSHOT_VERSION: u32 = 1;

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    dimension: u64,
    points: HashMap<String, StoredPoint>,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    collections: Vec<CollectionSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    name: String,
    dimension: u64,
    points: Vec<VectorPoint>,
}

/// Brute-force cosine index held in memory, persisted as a single JSON file.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Write every collection to `dir/index.json`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `VectorStoreError::Persistence` on I/O failure.
    pub async fn save(&self, dir: &Path) -> Result<(), VectorStoreError> {
        let bytes = {
            let snapshot = self.snapshot()?;
            serde_json::to_vec(&snapshot)
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| VectorStoreError::Persistence(format!("{}: {e}", dir.display())))?;

        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| VectorStoreError::Persistence(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| VectorStoreError::Persistence(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "vector index saved");
        Ok(())
    }

    /// Read an index previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns `VectorStoreError::Persistence` if the file cannot be read and
    /// `VectorStoreError::Serialization` if it is malformed or inconsistent.
    pub async fn load(dir: &Path) -> Result<Self, VectorStoreError> {
        let path = dir.join(INDEX_FILE);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            VectorStoreError::Persistence(format!("cannot read index {}: {e}", path.display()))
        })?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(VectorStoreError::Serialization(format!(
                "unsupported index version {}",
                snapshot.version
            )));
        }

        let mut collections = HashMap::with_capacity(snapshot.collections.len());
        let mut total_points = 0usize;
        for col in snapshot.collections {
            let mut points = HashMap::with_capacity(col.points.len());
            for p in col.points {
                if p.vector.len() as u64 != col.dimension {
                    return Err(VectorStoreError::Serialization(format!(
                        "point {} in {} has dimension {}, expected {}",
                        p.id,
                        col.name,
                        p.vector.len(),
                        col.dimension
                    )));
                }
                points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            total_points += points.len();
            collections.insert(
                col.name,
                InMemoryCollection {
                    dimension: col.dimension,
                    points,
                },
            );
        }

        tracing::info!(
            path = %path.display(),
            collections = collections.len(),
            points = total_points,
            "vector index loaded"
        );

        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    fn snapshot(&self) -> Result<IndexSnapshot, VectorStoreError> {
        let cols = self
            .collections
            .read()
            .map_err(|e| VectorStoreError::Persistence(e.to_string()))?;

        let mut collections: Vec<CollectionSnapshot> = cols
            .iter()
            .map(|(name, col)| {
                let mut points: Vec<VectorPoint> = col
                    .points
                    .iter()
                    .map(|(id, sp)| VectorPoint {
                        id: id.clone(),
                        vector: sp.vector.clone(),
                        payload: sp.payload.clone(),
                    })
                    .collect();
                points.sort_by(|a, b| a.id.cmp(&b.id));
                CollectionSnapshot {
                    name: name.clone(),
                    dimension: col.dimension,
                    points,
                }
            })
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(IndexSnapshot {
            version: SNAPSHOT_VERSION,
            collections,
        })
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let col = cols
                .entry(collection.clone())
                .or_insert_with(|| InMemoryCollection {
                    dimension: vector_size,
                    points: HashMap::new(),
                });
            if col.dimension != vector_size {
                return Err(VectorStoreError::Collection(format!(
                    "collection {collection} has dimension {}, requested {vector_size}",
                    col.dimension
                )));
            }
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points
                .iter()
                .find(|p| p.vector.len() as u64 != col.dimension)
            {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has dimension {}, collection {collection} expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.dimension
                )));
            }
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            #[expect(clippy::cast_possible_truncation)]
            scored.truncate(limit as usize);
            Ok(scored)
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Collection(format!("collection {collection} not found"))
            })?;
            Ok(col.points.len() as u64)
        })
    }
}
