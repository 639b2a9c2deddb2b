//! Exact nearest-neighbour store persisted as a single JSON file.
//!
//! Search is brute force over squared L2 distance, the same ranking a flat
//! L2 index produces. Good enough for a single regulation document; no
//! approximate structure is built.

use crate::traits::{check_batch_shape, VectorIndex};
use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    vector: Vec<f32>,
    chunk: Chunk,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    model_name: String,
    source_checksum: Option<String>,
    entries: Vec<StoredEntry>,
}

pub struct FlatVectorStore {
    dimension: usize,
    model_name: String,
    source_checksum: Option<String>,
    entries: RwLock<Vec<StoredEntry>>,
}

impl FlatVectorStore {
    pub fn new(dimension: usize, model_name: impl Into<String>) -> Self {
        Self {
            dimension,
            model_name: model_name.into(),
            source_checksum: None,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn with_source_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.source_checksum = Some(checksum.into());
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn source_checksum(&self) -> Option<&str> {
        self.source_checksum.as_deref()
    }

    pub fn len(&self) -> Result<usize, SearchError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| SearchError::LockPoisoned)?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool, SearchError> {
        Ok(self.len()? == 0)
    }

    pub fn save(&self, directory: &Path) -> Result<PathBuf, SearchError> {
        fs::create_dir_all(directory)?;
        let entries = self
            .entries
            .read()
            .map_err(|_| SearchError::LockPoisoned)?
            .clone();

        let file = IndexFile {
            dimension: self.dimension,
            model_name: self.model_name.clone(),
            source_checksum: self.source_checksum.clone(),
            entries,
        };

        let path = directory.join(INDEX_FILE_NAME);
        fs::write(&path, serde_json::to_vec(&file)?)?;
        info!(path = %path.display(), entries = file.entries.len(), "saved vector index");
        Ok(path)
    }

    pub fn load(directory: &Path) -> Result<Self, SearchError> {
        let path = directory.join(INDEX_FILE_NAME);
        if !path.is_file() {
            return Err(SearchError::IndexNotFound(directory.display().to_string()));
        }

        let file: IndexFile = serde_json::from_slice(&fs::read(&path)?)?;
        if let Some(entry) = file
            .entries
            .iter()
            .find(|entry| entry.vector.len() != file.dimension)
        {
            return Err(SearchError::Request(format!(
                "stored vector {} has dimension {} != {}",
                entry.id,
                entry.vector.len(),
                file.dimension
            )));
        }

        info!(path = %path.display(), entries = file.entries.len(), "loaded vector index");
        Ok(Self {
            dimension: file.dimension,
            model_name: file.model_name,
            source_checksum: file.source_checksum,
            entries: RwLock::new(file.entries),
        })
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = f64::from(*a) - f64::from(*b);
            delta * delta
        })
        .sum()
}

#[async_trait]
impl VectorIndex for FlatVectorStore {
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        check_batch_shape(chunks, embeddings, self.dimension)?;

        let mut entries = self.entries.write().map_err(|_| SearchError::LockPoisoned)?;
        entries.extend(
            chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| StoredEntry {
                    id: Uuid::new_v4().to_string(),
                    vector: vector.clone(),
                    chunk: chunk.clone(),
                }),
        );
        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_vector.len() != self.dimension {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let entries = self.entries.read().map_err(|_| SearchError::LockPoisoned)?;
        let mut ranked: Vec<(f64, &StoredEntry)> = entries
            .iter()
            .map(|entry| (squared_l2(query_vector, &entry.vector), entry))
            .collect();
        // Stable sort: equal distances keep insertion order.
        ranked.sort_by(|left, right| left.0.total_cmp(&right.0));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(distance, entry)| SearchHit {
                id: entry.id.clone(),
                content: entry.chunk.body.clone(),
                metadata: entry.chunk.metadata.clone(),
                score: distance,
            })
            .collect())
    }
}
