use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex {
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    /// Nearest neighbours of `query_vector`, most relevant first.
    async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

pub(crate) fn check_batch_shape(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dimension: usize,
) -> Result<(), SearchError> {
    if chunks.len() != embeddings.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    if let Some(embedding) = embeddings.iter().find(|vector| vector.len() != dimension) {
        return Err(SearchError::Request(format!(
            "embedding dimension {} != {}",
            embedding.len(),
            dimension
        )));
    }

    Ok(())
}
