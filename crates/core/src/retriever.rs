use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{SearchError, SearchHit};
use tracing::debug;

pub struct VectorStoreRetriever<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    embedder: E,
    index: V,
}

impl<E, V> VectorStoreRetriever<E, V>
where
    E: Embedder,
    V: VectorIndex + Send + Sync,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self { embedder, index }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(query).await?;
        let hits = self.index.search_vector(&query_vector, k).await?;
        debug!(query = %query, k, hit_count = hits.len(), "vector search");
        Ok(hits)
    }

    pub async fn search_with_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(SearchHit, f64)>, SearchError> {
        Ok(self
            .search(query, k)
            .await?
            .into_iter()
            .map(|hit| {
                let score = hit.score;
                (hit, score)
            })
            .collect())
    }

    /// Hits whose distance to the query is at most `max_distance`.
    pub async fn relevant_documents(
        &self,
        query: &str,
        k: usize,
        max_distance: f64,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let mut hits = self.search(query, k).await?;
        hits.retain(|hit| hit.score <= max_distance);
        debug!(kept = hits.len(), max_distance, "filtered hits by distance");
        Ok(hits)
    }

    /// Ranked document identifiers (chunk titles) used for scoring.
    pub async fn retrieve_ids(&self, query: &str, depth: usize) -> Result<Vec<String>, SearchError> {
        Ok(self
            .search(query, depth)
            .await?
            .into_iter()
            .map(|hit| hit.metadata.title)
            .collect())
    }
}
