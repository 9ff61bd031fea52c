use crate::embeddings::Embedder;
use crate::error::StoreError;
use crate::models::{Chunk, ChunkMetadata, QueryHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: String,
    embedding: Vec<f32>,
    text: String,
    metadata: ChunkMetadata,
}

#[derive(Default)]
struct CollectionState {
    rows: Vec<StoredChunk>,
    by_id: HashMap<String, usize>,
}

/// Directory-backed named collection of chunk embeddings.
///
/// `open` either loads an existing snapshot under the given directory or
/// starts the collection empty; every upsert rewrites the snapshot through a
/// temp-file rename so a reopened process never sees a half-written store.
pub struct PersistentCollection {
    snapshot_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    state: RwLock<CollectionState>,
}

impl PersistentCollection {
    pub fn open(
        dir: &Path,
        name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let snapshot_path = dir.join(format!("{name}.json"));

        let rows: Vec<StoredChunk> = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path)?;
            serde_json::from_slice(&bytes).map_err(|error| StoreError::CorruptSnapshot {
                path: snapshot_path.display().to_string(),
                details: error.to_string(),
            })?
        } else {
            Vec::new()
        };

        let by_id = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.id.clone(), index))
            .collect::<HashMap<_, _>>();

        info!(
            collection = name,
            path = %snapshot_path.display(),
            chunks = rows.len(),
            "opened vector collection"
        );

        Ok(Self {
            snapshot_path,
            embedder,
            state: RwLock::new(CollectionState { rows, by_id }),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn persist(&self, rows: &[StoredChunk]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(rows)?;
        let tmp_path = self.snapshot_path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.snapshot_path)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PersistentCollection {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts);

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let row = StoredChunk {
                id: chunk.id(),
                embedding,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
            };

            match state.by_id.get(&row.id).copied() {
                Some(index) => state.rows[index] = row,
                None => {
                    state.by_id.insert(row.id.clone(), state.rows.len());
                    state.rows.push(row);
                }
            }
        }

        self.persist(&state.rows)?;
        debug!(
            upserted = chunks.len(),
            total = state.rows.len(),
            "collection snapshot written"
        );
        Ok(())
    }

    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<QueryHit>, StoreError> {
        let state = self.state.read().await;
        if state.rows.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query_text);
        let mut hits = state
            .rows
            .iter()
            .map(|row| QueryHit {
                text: row.text.clone(),
                metadata: row.metadata.clone(),
                distance: cosine_distance(&query_vector, &row.embedding),
            })
            .collect::<Vec<_>>();

        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// 1 - cosine similarity; 0 means identical direction, degenerate vectors
/// score as maximally distant.
fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| a * b)
        .sum::<f32>();
    let left_mag = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_mag = right.iter().map(|v| v * v).sum::<f32>().sqrt();

    if left_mag == 0.0 || right_mag == 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_mag * right_mag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;

    fn chunk(doc_id: &str, page: u32, seq: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                page_number: page,
                chunk_seq_id: seq,
                filename: format!("{}.pdf", doc_id.to_lowercase()),
            },
        }
    }

    fn open_collection(dir: &Path) -> PersistentCollection {
        PersistentCollection::open(dir, "document_collection", Arc::new(HashedNgramEmbedder::default()))
            .expect("collection should open")
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = vec![0.5f32, 0.5, 0.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_maximally_distant() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn search_on_empty_collection_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collection = open_collection(dir.path());

        let hits = collection.search("anything", 10).await.expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_the_matching_chunk_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collection = open_collection(dir.path());

        collection
            .upsert(&[
                chunk("DOC001", 1, 0, "Quarterly revenue increased 12%; revenue growth beat expectations."),
                chunk("DOC002", 1, 0, "The cafeteria menu offers soup and fresh bread daily."),
            ])
            .await
            .expect("upsert");

        let hits = collection
            .search("revenue growth", 2)
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.doc_id, "DOC001");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn batch_embedded_rows_match_the_query_side_embedder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collection = open_collection(dir.path());

        collection
            .upsert(&[
                chunk("DOC001", 1, 0, "alpha beta gamma"),
                chunk("DOC002", 1, 0, "delta epsilon zeta"),
            ])
            .await
            .expect("upsert");

        // Querying with a stored chunk's exact text must score it as an
        // exact match; index-side and query-side embeddings coincide.
        let hits = collection.search("alpha beta gamma", 1).await.expect("search");
        assert_eq!(hits[0].metadata.doc_id, "DOC001");
        assert!(hits[0].distance.abs() < 1e-5);
    }

    #[tokio::test]
    async fn reinserting_a_chunk_id_overwrites_instead_of_duplicating() {
        let dir = tempfile::tempdir().expect("tempdir");
        let collection = open_collection(dir.path());

        collection
            .upsert(&[chunk("DOC001", 1, 0, "first version")])
            .await
            .expect("upsert");
        collection
            .upsert(&[chunk("DOC001", 1, 0, "second version")])
            .await
            .expect("upsert again");

        assert_eq!(collection.len().await, 1);
        let hits = collection.search("version", 10).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second version");
    }

    #[tokio::test]
    async fn collection_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let collection = open_collection(dir.path());
            collection
                .upsert(&[chunk("DOC001", 1, 0, "persisted across restarts")])
                .await
                .expect("upsert");
        }

        let reopened = open_collection(dir.path());
        assert_eq!(reopened.len().await, 1);
        let hits = reopened.search("persisted", 5).await.expect("search");
        assert_eq!(hits[0].metadata.doc_id, "DOC001");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported_not_panicked() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("document_collection.json"), b"not json").expect("write");

        let result = PersistentCollection::open(
            dir.path(),
            "document_collection",
            Arc::new(HashedNgramEmbedder::default()),
        );
        assert!(matches!(result, Err(StoreError::CorruptSnapshot { .. })));
    }
}
