use crate::traits::{check_batch_shape, VectorIndex};
use crate::{Chunk, ChunkMetadata, SearchError, SearchHit};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: Url,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, SearchError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, SearchError> {
        Ok(self
            .endpoint
            .join(&format!("collections/{}{}", self.collection, suffix))?)
    }

    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let url = self.collection_url("")?;
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::OK {
            return Ok(());
        }

        let response = self
            .client
            .put(url)
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Euclid" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

fn point_for(chunk: &Chunk, embedding: &[f32]) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "vector": embedding,
        "payload": {
            "content": chunk.body,
            "title": chunk.metadata.title,
            "page": chunk.metadata.page,
            "chunk_id": chunk.metadata.chunk_id,
            "source": chunk.metadata.source,
        },
    })
}

fn hit_from_point(hit: &Value) -> SearchHit {
    let text = |pointer: &str| {
        hit.pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let id = match hit.pointer("/id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };

    SearchHit {
        id,
        content: text("/payload/content"),
        metadata: ChunkMetadata {
            title: text("/payload/title"),
            page: hit
                .pointer("/payload/page")
                .and_then(Value::as_u64)
                .and_then(|page| u32::try_from(page).ok())
                .unwrap_or_default(),
            chunk_id: text("/payload/chunk_id"),
            source: text("/payload/source"),
        },
        score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn index_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        check_batch_shape(chunks, embeddings, self.vector_size)?;

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| point_for(chunk, embedding))
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "search response has no result array".to_string(),
            })?;

        Ok(hits.iter().map(hit_from_point).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_urls_are_joined_under_endpoint() -> Result<(), SearchError> {
        let store = QdrantStore::new("http://localhost:6333", "rules", 4)?;
        assert_eq!(
            store.collection_url("/points/search")?.as_str(),
            "http://localhost:6333/collections/rules/points/search"
        );

        let prefixed = QdrantStore::new("http://proxy:8080/qdrant", "rules", 4)?;
        assert_eq!(
            prefixed.collection_url("")?.as_str(),
            "http://proxy:8080/qdrant/collections/rules"
        );
        Ok(())
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            QdrantStore::new("not a url", "rules", 4),
            Err(SearchError::Url(_))
        ));
    }

    #[test]
    fn payload_round_trips_through_point_json() {
        let chunk = Chunk {
            body: "본문".to_string(),
            metadata: ChunkMetadata {
                title: "제1항".to_string(),
                page: 2,
                chunk_id: "KOR-Regulation-00004".to_string(),
                source: "rules.pdf".to_string(),
            },
        };

        let mut point = point_for(&chunk, &[0.5, 0.5]);
        point["score"] = json!(0.25);
        let hit = hit_from_point(&point);

        assert_eq!(hit.content, "본문");
        assert_eq!(hit.metadata, chunk.metadata);
        assert_eq!(hit.score, 0.25);
        assert!(!hit.id.is_empty());
    }
}
