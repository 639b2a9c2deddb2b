use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub page: u32,
    pub chunk_id: String,
    pub source: String,
}

/// A titled unit of regulation text, serialized as `{content, metadata}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "content")]
    pub body: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn chunk_id(&self) -> &str {
        &self.metadata.chunk_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub answer: String,
    pub relevant_doc_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLog {
    pub query: String,
    pub relevant_doc_id: String,
    pub retrieved_docs: Vec<String>,
    pub hit_found: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankMetrics {
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
    pub mrr: f64,
    pub map: f64,
    pub ndcg: f64,
}

impl RankMetrics {
    pub fn accumulate(&mut self, other: &RankMetrics) {
        self.recall += other.recall;
        self.precision += other.precision;
        self.f1 += other.f1;
        self.mrr += other.mrr;
        self.map += other.map;
        self.ndcg += other.ndcg;
    }

    pub fn mean_over(&self, count: usize) -> RankMetrics {
        if count == 0 {
            return RankMetrics::default();
        }
        let n = count as f64;
        RankMetrics {
            recall: self.recall / n,
            precision: self.precision / n,
            f1: self.f1 / n,
            mrr: self.mrr / n,
            map: self.map / n,
            ndcg: self.ndcg / n,
        }
    }

    pub fn named_values(&self) -> [(&'static str, f64); 6] {
        [
            ("recall", self.recall),
            ("precision", self.precision),
            ("f1", self.f1),
            ("mrr", self.mrr),
            ("map", self.map),
            ("ndcg", self.ndcg),
        ]
    }
}

pub type MetricsTable = BTreeMap<usize, RankMetrics>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub metrics: MetricsTable,
    pub logs: Vec<SearchLog>,
}

/// Result artifact written after an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub dataset: String,
    pub vector_store: String,
    pub evaluation_time: String,
    pub k_values: Vec<usize>,
    pub metrics: MetricsTable,
    pub logs: Vec<SearchLog>,
}

#[derive(Debug, Clone)]
pub struct SegmenterOptions {
    pub max_body_chars: usize,
    pub split_chars: usize,
    pub split_overlap_chars: usize,
    pub id_prefix: String,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            max_body_chars: 1_000,
            split_chars: 500,
            split_overlap_chars: 50,
            id_prefix: "KOR-Regulation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetrievalFailurePolicy {
    /// The first failing retrieval aborts the run with no partial metrics.
    #[default]
    Abort,
    /// A failing retrieval is logged and scored as a miss with no retrieved documents.
    RecordMiss,
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluationOptions {
    pub concurrency: usize,
    pub failure_policy: RetrievalFailurePolicy,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: RetrievalFailurePolicy::Abort,
        }
    }
}
