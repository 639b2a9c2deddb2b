use crate::chunking::Segmenter;
use crate::embeddings::Embedder;
use crate::extractor::{document_name, LopdfExtractor, PdfExtractor};
use crate::stores::FlatVectorStore;
use crate::traits::VectorIndex;
use crate::{Chunk, IngestError, SegmenterOptions};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct KnowledgeBaseSummary {
    pub document_name: String,
    pub chunk_count: usize,
    pub index_path: PathBuf,
    pub source_checksum: String,
}

/// Chunks of one PDF paired with their embeddings, ready for any index.
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document_name: String,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
    pub source_checksum: String,
}

/// PDF loading, segmentation, embedding and persistence of one document.
pub struct KnowledgeBasePipeline<E, X = LopdfExtractor>
where
    E: Embedder,
    X: PdfExtractor,
{
    embedder: E,
    extractor: X,
    segmenter: Segmenter,
}

impl<E: Embedder> KnowledgeBasePipeline<E, LopdfExtractor> {
    pub fn new(embedder: E, options: SegmenterOptions) -> Result<Self, IngestError> {
        Self::with_extractor(embedder, LopdfExtractor, options)
    }
}

impl<E, X> KnowledgeBasePipeline<E, X>
where
    E: Embedder,
    X: PdfExtractor,
{
    pub fn with_extractor(
        embedder: E,
        extractor: X,
        options: SegmenterOptions,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            embedder,
            extractor,
            segmenter: Segmenter::new(options)?,
        })
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn process_pdf(
        &self,
        pdf_path: &Path,
        document_name_override: Option<&str>,
    ) -> Result<Vec<Chunk>, IngestError> {
        if !pdf_path.is_file() {
            return Err(IngestError::MissingFile(pdf_path.display().to_string()));
        }

        let name = match document_name_override {
            Some(name) => name.to_string(),
            None => document_name(pdf_path)?,
        };

        info!(path = %pdf_path.display(), "loading pdf");
        let pages = self.extractor.extract_pages(pdf_path)?;
        info!(page_count = pages.len(), "loaded pages");

        let chunks = self.segmenter.segment_pages(&pages, &name);
        info!(chunk_count = chunks.len(), document = %name, "segmented document");
        Ok(chunks)
    }

    pub async fn embed_document(
        &self,
        pdf_path: &Path,
        document_name_override: Option<&str>,
    ) -> Result<EmbeddedDocument, IngestError> {
        let chunks = self.process_pdf(pdf_path, document_name_override)?;
        let Some(first) = chunks.first() else {
            return Err(IngestError::EmptyDocument(pdf_path.display().to_string()));
        };
        let document_name = first.metadata.source.clone();

        let source_checksum = digest_file(pdf_path)?;
        let bodies: Vec<String> = chunks.iter().map(|chunk| chunk.body.clone()).collect();
        let embeddings = self.embedder.embed_batch(&bodies).await?;
        info!(chunk_count = chunks.len(), model = self.embedder.model_name(), "embedded chunks");

        Ok(EmbeddedDocument {
            document_name,
            chunks,
            embeddings,
            source_checksum,
        })
    }

    pub async fn save_flat_index(
        &self,
        document: &EmbeddedDocument,
        save_dir: &Path,
    ) -> Result<KnowledgeBaseSummary, IngestError> {
        let store = FlatVectorStore::new(self.embedder.dimensions(), self.embedder.model_name())
            .with_source_checksum(document.source_checksum.clone());
        store
            .index_chunks(&document.chunks, &document.embeddings)
            .await?;

        let index_path = store.save(save_dir)?;
        info!(path = %index_path.display(), chunk_count = document.chunks.len(), "knowledge base built");

        Ok(KnowledgeBaseSummary {
            document_name: document.document_name.clone(),
            chunk_count: document.chunks.len(),
            index_path,
            source_checksum: document.source_checksum.clone(),
        })
    }

    pub async fn build_knowledge_base(
        &self,
        pdf_path: &Path,
        save_dir: &Path,
        document_name_override: Option<&str>,
    ) -> Result<KnowledgeBaseSummary, IngestError> {
        let document = self
            .embed_document(pdf_path, document_name_override)
            .await?;
        self.save_flat_index(&document, save_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::PageText;
    use crate::retriever::VectorStoreRetriever;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: Vec<&'static str>,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let source = document_name(path)?;
            Ok(self
                .pages
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                    source: source.clone(),
                })
                .collect())
        }
    }

    fn pipeline(pages: Vec<&'static str>) -> KnowledgeBasePipeline<CharacterNgramEmbedder, FakeExtractor> {
        KnowledgeBasePipeline::with_extractor(
            CharacterNgramEmbedder::default(),
            FakeExtractor { pages },
            SegmenterOptions::default(),
        )
        .expect("default options are valid")
    }

    fn fake_pdf(dir: &Path) -> Result<PathBuf, std::io::Error> {
        let path = dir.join("rules.pdf");
        File::create(&path).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        Ok(path)
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_pdf_is_fatal() {
        let result = pipeline(vec![]).process_pdf(Path::new("/nope/rules.pdf"), None);
        assert!(matches!(result, Err(IngestError::MissingFile(_))));
    }

    #[test]
    fn document_name_defaults_to_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = fake_pdf(dir.path())?;
        let pipeline = pipeline(vec!["<A>\nfirst", "<B>\nsecond"]);

        let chunks = pipeline.process_pdf(&pdf, None)?;
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.metadata.source == "rules.pdf"));

        let named = pipeline.process_pdf(&pdf, Some("국어_규정"))?;
        assert!(named.iter().all(|chunk| chunk.metadata.source == "국어_규정"));
        Ok(())
    }

    #[tokio::test]
    async fn built_knowledge_base_is_searchable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = fake_pdf(dir.path())?;
        let save_dir = dir.path().join("kb").join("reference");
        let pipeline = pipeline(vec![
            "<Pressure>\nrelief valve set pressure",
            "<Wiring>\ncircuit insulation resistance",
        ]);

        let summary = pipeline.build_knowledge_base(&pdf, &save_dir, None).await?;
        assert_eq!(summary.chunk_count, 2);
        assert_eq!(summary.source_checksum, digest_file(&pdf)?);

        let store = FlatVectorStore::load(&save_dir)?;
        assert_eq!(store.source_checksum(), Some(summary.source_checksum.as_str()));
        let retriever = VectorStoreRetriever::new(CharacterNgramEmbedder::default(), store);
        let ids = retriever
            .retrieve_ids("circuit insulation resistance", 2)
            .await?;
        assert_eq!(ids[0], "Wiring");
        Ok(())
    }

    #[tokio::test]
    async fn embedded_document_feeds_a_second_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = fake_pdf(dir.path())?;
        let pipeline = pipeline(vec!["<A>\nfirst rule", "<B>\nsecond rule"]);

        let document = pipeline.embed_document(&pdf, Some("규정")).await?;
        assert_eq!(document.document_name, "규정");
        assert_eq!(document.chunks.len(), document.embeddings.len());

        let summary = pipeline
            .save_flat_index(&document, &dir.path().join("kb"))
            .await?;
        assert_eq!(summary.chunk_count, 2);

        let mirror = FlatVectorStore::new(pipeline.embedder().dimensions(), "mirror");
        mirror
            .index_chunks(&document.chunks, &document.embeddings)
            .await?;
        assert_eq!(mirror.len()?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_document_cannot_be_built() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = fake_pdf(dir.path())?;
        let result = pipeline(vec!["   ", ""])
            .build_knowledge_base(&pdf, &dir.path().join("kb"), None)
            .await;
        assert!(matches!(result, Err(IngestError::EmptyDocument(_))));
        Ok(())
    }
}
