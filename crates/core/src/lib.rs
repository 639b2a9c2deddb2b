pub mod chunking;
pub mod dataset;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod retriever;
pub mod stores;
pub mod titles;
pub mod traits;

pub use chunking::{normalize_whitespace, split_blocks, split_title, Segmenter};
pub use dataset::{build_report, load_dataset, render_summary, save_report};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingEndpointConfig, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbedError, EvalError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use metrics::{evaluate, evaluate_concurrent, Cutoffs, EvaluationProgress, NoProgress};
pub use models::{
    Chunk, ChunkMetadata, Evaluation, EvaluationOptions, EvaluationRecord, EvaluationReport,
    MetricsTable, RankMetrics, RetrievalFailurePolicy, SearchHit, SearchLog, SegmenterOptions,
};
pub use pipeline::{digest_file, EmbeddedDocument, KnowledgeBasePipeline, KnowledgeBaseSummary};
pub use query::{synthesize_query, ANSWER_SEPARATOR};
pub use retriever::VectorStoreRetriever;
pub use stores::{FlatVectorStore, QdrantStore};
pub use titles::{extract_rule_titles, uncovered_articles};
pub use traits::VectorIndex;
