mod progress;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use progress::EvaluationProgressBar;
use regulation_retrieval_core::extractor::join_pages;
use regulation_retrieval_core::titles::render_title_listing;
use regulation_retrieval_core::{
    build_report, evaluate_concurrent, extract_page_texts, extract_rule_titles, load_dataset,
    render_summary, save_report, uncovered_articles, CharacterNgramEmbedder, Cutoffs, Embedder,
    EmbeddingEndpointConfig, EvaluationOptions, FlatVectorStore, HttpEmbedder,
    KnowledgeBasePipeline, QdrantStore, RetrievalFailurePolicy, SearchHit, SegmenterOptions,
    VectorIndex, VectorStoreRetriever, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_STORE_DIR: &str = "data/knowledge_base/korean_rag_reference";

#[derive(Parser)]
#[command(name = "regulation-retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding provider used for documents and queries.
    #[arg(long, value_enum, default_value_t = EmbedderKind::Ngram, global = true)]
    embedder: EmbedderKind,

    /// Dimensions of the character n-gram embedder.
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS, global = true)]
    ngram_dimensions: usize,

    /// Base URL of an OpenAI-compatible embeddings service.
    #[arg(long, env = "EMBEDDING_ENDPOINT", default_value = "http://localhost:8080", global = true)]
    embedding_endpoint: String,

    /// Bearer token for the embeddings service.
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true, global = true)]
    embedding_api_key: Option<String>,

    /// Model requested from the embeddings service.
    #[arg(
        long,
        env = "EMBEDDING_MODEL",
        default_value = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
        global = true
    )]
    embedding_model: String,

    /// Vector size returned by the embeddings service.
    #[arg(long, default_value = "384", global = true)]
    embedding_dimensions: usize,

    /// Qdrant base URL; when set, chunks are mirrored into Qdrant and searched there.
    #[arg(long, env = "QDRANT_URL", global = true)]
    qdrant_url: Option<String>,

    /// Qdrant collection
    #[arg(long, default_value = "korean_rag_reference", global = true)]
    qdrant_collection: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    Ngram,
    Http,
}

#[derive(Subcommand)]
enum Command {
    /// Segment a regulation PDF, embed its chunks and save the vector index.
    Build {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, default_value = DEFAULT_STORE_DIR)]
        store_dir: PathBuf,
        /// Source name recorded on every chunk; defaults to the PDF file name.
        #[arg(long)]
        document_name: Option<String>,
    },
    /// Query a saved index and print ranked titles with distances.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Drop hits farther than this distance.
        #[arg(long)]
        max_distance: Option<f64>,
        #[arg(long, default_value = DEFAULT_STORE_DIR)]
        store_dir: PathBuf,
    },
    /// Score retrieval against a labelled dataset and save a report.
    Evaluate {
        #[arg(long, default_value = "data/korean_language_retriever_V1.0_train.json")]
        dataset: PathBuf,
        #[arg(long, default_value = DEFAULT_STORE_DIR)]
        store_dir: PathBuf,
        #[arg(long, default_value = "logs")]
        output_dir: PathBuf,
        /// Comma-separated cutoffs.
        #[arg(long, default_value = "1,3,5,10")]
        k_values: Cutoffs,
        /// Retrievals kept in flight at once.
        #[arg(long, default_value = "1")]
        concurrency: usize,
        /// Score failed retrievals as misses instead of aborting.
        #[arg(long, default_value_t = false)]
        record_misses: bool,
    },
    /// List the `<...>` rule titles found in a PDF.
    Titles {
        #[arg(long)]
        pdf: PathBuf,
        /// Also write the listing to this file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Report dataset articles that no title covers.
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

fn build_embedder(cli: &Cli) -> Box<dyn Embedder> {
    match cli.embedder {
        EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: cli.ngram_dimensions,
        }),
        EmbedderKind::Http => Box::new(HttpEmbedder::new(EmbeddingEndpointConfig {
            endpoint: cli.embedding_endpoint.clone(),
            model: cli.embedding_model.clone(),
            dimensions: cli.embedding_dimensions,
            api_key: cli.embedding_api_key.clone(),
        })),
    }
}

fn load_store(store_dir: &Path, embedder: &dyn Embedder) -> anyhow::Result<FlatVectorStore> {
    let store = FlatVectorStore::load(store_dir)
        .with_context(|| format!("loading vector index from {}", store_dir.display()))?;

    if store.dimension() != embedder.dimensions() {
        bail!(
            "index {} holds {}-dimensional vectors but embedder {} produces {}",
            store_dir.display(),
            store.dimension(),
            embedder.model_name(),
            embedder.dimensions()
        );
    }
    if store.model_name() != embedder.model_name() {
        warn!(
            index_model = store.model_name(),
            query_model = embedder.model_name(),
            "index was built with a different embedding model"
        );
    }
    Ok(store)
}

fn print_hits(hits: &[SearchHit]) {
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:2}. [{}] distance={:.4} page={} title={}",
            rank + 1,
            hit.metadata.chunk_id,
            hit.score,
            hit.metadata.page,
            hit.metadata.title
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let embedder = build_embedder(&cli);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = embedder.model_name(),
        started_at = %Local::now().to_rfc3339(),
        "regulation-retrieval boot"
    );

    match &cli.command {
        Command::Build {
            pdf,
            store_dir,
            document_name,
        } => {
            let pipeline = KnowledgeBasePipeline::new(embedder, SegmenterOptions::default())?;
            let document = pipeline
                .embed_document(pdf, document_name.as_deref())
                .await
                .with_context(|| format!("embedding {}", pdf.display()))?;
            let summary = pipeline
                .save_flat_index(&document, store_dir)
                .await
                .with_context(|| format!("saving knowledge base to {}", store_dir.display()))?;

            if let Some(qdrant_url) = &cli.qdrant_url {
                let qdrant = QdrantStore::new(
                    qdrant_url,
                    cli.qdrant_collection.as_str(),
                    pipeline.embedder().dimensions(),
                )?;
                qdrant.ensure_collection().await?;
                qdrant
                    .index_chunks(&document.chunks, &document.embeddings)
                    .await?;
                info!(collection = %cli.qdrant_collection, "mirrored chunks into qdrant");
            }

            println!(
                "{} chunks from {} saved to {} (sha256 {})",
                summary.chunk_count,
                summary.document_name,
                summary.index_path.display(),
                summary.source_checksum
            );
        }
        Command::Search {
            query,
            top_k,
            max_distance,
            store_dir,
        } => {
            let hits = match &cli.qdrant_url {
                Some(qdrant_url) => {
                    let qdrant = QdrantStore::new(
                        qdrant_url,
                        cli.qdrant_collection.as_str(),
                        embedder.dimensions(),
                    )?;
                    let retriever = VectorStoreRetriever::new(embedder, qdrant);
                    match max_distance {
                        Some(limit) => retriever.relevant_documents(query, *top_k, *limit).await?,
                        None => retriever.search(query, *top_k).await?,
                    }
                }
                None => {
                    let store = load_store(store_dir, embedder.as_ref())?;
                    let retriever = VectorStoreRetriever::new(embedder, store);
                    match max_distance {
                        Some(limit) => retriever.relevant_documents(query, *top_k, *limit).await?,
                        None => retriever.search(query, *top_k).await?,
                    }
                }
            };

            println!("query: {query}");
            print_hits(&hits);
        }
        Command::Evaluate {
            dataset,
            store_dir,
            output_dir,
            k_values,
            concurrency,
            record_misses,
        } => {
            let records = load_dataset(dataset)?;
            let store = load_store(store_dir, embedder.as_ref())?;
            let model_name = embedder.model_name().to_string();
            let retriever = VectorStoreRetriever::new(embedder, store);

            let options = EvaluationOptions {
                concurrency: *concurrency,
                failure_policy: if *record_misses {
                    RetrievalFailurePolicy::RecordMiss
                } else {
                    RetrievalFailurePolicy::Abort
                },
            };

            let retriever = &retriever;
            let mut progress = EvaluationProgressBar::new();
            let evaluation = evaluate_concurrent(
                &records,
                k_values,
                &options,
                move |query: String, depth: usize| async move {
                    retriever.retrieve_ids(&query, depth).await
                },
                &mut progress,
            )
            .await?;

            info!(
                records = records.len(),
                hits = progress.hits(),
                "retrieval finished"
            );
            print!("{}", render_summary(&evaluation.metrics));

            let evaluated_at = Local::now();
            let report = build_report(
                &model_name,
                dataset,
                store_dir,
                k_values,
                evaluation,
                evaluated_at,
            );
            let path = save_report(&report, output_dir, evaluated_at)?;
            println!("report saved to {}", path.display());
        }
        Command::Titles {
            pdf,
            output,
            dataset,
        } => {
            let pages = extract_page_texts(pdf)
                .with_context(|| format!("reading {}", pdf.display()))?;
            let titles = extract_rule_titles(&join_pages(&pages))?;
            let listing = render_title_listing(&titles);
            print!("{listing}");

            if let Some(output) = output {
                if let Some(parent) = output.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(output, &listing)?;
                info!(path = %output.display(), "saved title listing");
            }

            if let Some(dataset) = dataset {
                let records = load_dataset(dataset)?;
                let missing = uncovered_articles(&titles, &records);
                if missing.is_empty() {
                    println!("all {} dataset articles are covered", records.len());
                } else {
                    println!("{} dataset articles have no matching title:", missing.len());
                    for article in missing {
                        println!("  - {article}");
                    }
                }
            }
        }
    }

    Ok(())
}
