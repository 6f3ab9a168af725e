//! folio command line
//!
//! Run with: cargo run -p folio-rag --bin folio -- ingest statement.pdf

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_rag::{
    DocumentType, IngestPipeline, IngestRequest, Providers, QueryMode, QueryRequest, RagConfig, RagOrchestrator,
};

#[derive(Parser)]
#[command(name = "folio", version, about = "PDF ingestion and grounded question answering")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, enrich and index one or more PDFs
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Document id (single file only; defaults to the file stem)
        #[arg(long)]
        doc_id: Option<String>,
        /// Initial document type hint
        #[arg(long, default_value = "generic")]
        doc_type: String,
        /// Use the generative model for classification and enrichment
        #[arg(long)]
        use_model: bool,
    },
    /// Re-run cleaning, enrichment and indexing from stored artifacts
    Resume { doc_id: String },
    /// Chunk and index every stored document
    Reindex,
    /// Ask a question against the index
    Ask {
        question: String,
        /// Restrict retrieval to these documents
        #[arg(long = "doc-id")]
        doc_ids: Vec<String>,
        #[arg(long)]
        top_k: Option<usize>,
        /// auto, text, table or both
        #[arg(long, default_value = "auto")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref())?;
    let providers = Providers::from_config(&config)?;

    match cli.command {
        Command::Ingest {
            files,
            doc_id,
            doc_type,
            use_model,
        } => {
            if doc_id.is_some() && files.len() > 1 {
                anyhow::bail!("--doc-id can only be used with a single file");
            }
            let doc_type: DocumentType = doc_type.parse()?;
            let pipeline = IngestPipeline::new(&config, &providers);

            let requests: Vec<IngestRequest> = files
                .into_iter()
                .map(|path| {
                    let mut request = IngestRequest::new(path).with_doc_type(doc_type);
                    if let Some(doc_id) = &doc_id {
                        request = request.with_doc_id(doc_id.clone());
                    }
                    if use_model {
                        request = request.with_model(true);
                    }
                    request
                })
                .collect();

            let progress = ProgressBar::new_spinner();
            progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            progress.set_message(format!("Ingesting {} file(s)", requests.len()));
            progress.enable_steady_tick(std::time::Duration::from_millis(120));

            let results = pipeline.ingest_batch(requests).await;
            progress.finish_and_clear();

            let mut failed = 0;
            for (path, result) in results {
                match result {
                    Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                    Err(e) => {
                        failed += 1;
                        eprintln!("Failed {}: {}", path.display(), e);
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} file(s) failed to ingest", failed);
            }
        }
        Command::Resume { doc_id } => {
            let pipeline = IngestPipeline::new(&config, &providers);
            let report = pipeline.resume(&doc_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reindex => {
            let pipeline = IngestPipeline::new(&config, &providers);
            let summary = pipeline.reindex_all().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Ask {
            question,
            doc_ids,
            top_k,
            mode,
        } => {
            let rag = RagOrchestrator::from_providers(&providers, config.embeddings.batch_size, config.retrieval.clone());

            let mut request = QueryRequest::new(question).with_mode(QueryMode::parse_lenient(&mode));
            if !doc_ids.is_empty() {
                request = request.with_doc_ids(doc_ids);
            }
            if let Some(top_k) = top_k {
                request = request.with_top_k(top_k);
            }

            let response = rag.answer(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
