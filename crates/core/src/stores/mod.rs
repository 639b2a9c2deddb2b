pub mod flat;
pub mod qdrant;

pub use flat::FlatVectorStore;
pub use qdrant::QdrantStore;
