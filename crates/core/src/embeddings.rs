use crate::chunking::normalize_whitespace;
use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbedError::InvalidResponse("no vector for single text".to_string()))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts).await
    }
}

/// Rejects empty batches and blank texts, then collapses whitespace runs.
pub fn prepare_batch(texts: &[String]) -> Result<Vec<String>, EmbedError> {
    if texts.is_empty() {
        return Err(EmbedError::EmptyInput);
    }

    texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            if text.trim().is_empty() {
                Err(EmbedError::EmptyText(index))
            } else {
                Ok(normalize_whitespace(text))
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "character-trigram-hash"
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(prepare_batch(texts)?
            .iter()
            .map(|text| self.embed_one(text))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingEndpointConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider speaking the OpenAI-compatible `/v1/embeddings` API.
pub struct HttpEmbedder {
    config: EmbeddingEndpointConfig,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingEndpointConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/v1/embeddings", self.config.endpoint.trim_end_matches('/'));
        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: texts,
            });

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbedError::InvalidResponse(format!(
                "embedding request to {} returned {}",
                url,
                response.status()
            )));
        }

        let payload: EmbeddingResponse = response.json().await?;
        order_embeddings(payload, texts.len(), self.config.dimensions)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let prepared = prepare_batch(texts)?;
        self.request_embeddings(&prepared).await
    }
}

fn order_embeddings(
    payload: EmbeddingResponse,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if payload.data.len() != expected_count {
        return Err(EmbedError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected_count,
            payload.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected_count];
    for datum in payload.data {
        if datum.embedding.len() != dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: dimensions,
                actual: datum.embedding.len(),
            });
        }
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            EmbedError::InvalidResponse(format!("embedding index {} out of range", datum.index))
        })?;
        *slot = Some(datum.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| EmbedError::InvalidResponse(format!("missing embedding {index}")))
        })
        .collect()
}
