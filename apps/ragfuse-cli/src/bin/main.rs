use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ragfuse_cli::batch::{failed_queries, keyword_accuracy, read_queries, run_batch, write_answers, write_intermediate};
use ragfuse_cli::setup::{build_components, load_corpus, load_embedder, open_vector_index, Settings};
use ragfuse_core::config::Config;
use ragfuse_core::types::Query;
use ragfuse_pipeline::assemble;
use ragfuse_vector::{bootstrap_vectors, IngestOptions};

#[derive(Parser, Debug)]
#[command(name = "ragfuse", about = "Hybrid dense + sparse retrieval with rank fusion for question answering")]
struct Cli {
    /// Directory that relative paths in the config are resolved against
    #[arg(long, env = "RAGFUSE_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk the data directory and embed it into the vector collection
    Ingest {
        /// Clear the collection and embed everything again
        #[arg(long, default_value_t = false)]
        reindex: bool,
        /// Only ingest the first N files
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer one question
    Query {
        text: String,
        /// Restrict retrieval to this top-level directory
        #[arg(long)]
        document: Option<String>,
        /// Return candidates and contexts without calling the generator
        #[arg(long, default_value_t = false)]
        retrieval_only: bool,
    },
    /// Answer a JSONL file of questions
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Also write candidates, paths and scores per query as JSON
        #[arg(long)]
        intermediate: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        retrieval_only: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = Settings::from_config(&config, &cli.base_dir)?;

    match cli.command {
        Command::Ingest { reindex, limit } => {
            let corpus = load_corpus(&settings, limit)?;
            let embedder = load_embedder(&settings)?;
            let index = open_vector_index(&settings).await?;
            let opts = IngestOptions { batch_size: settings.embedding.batch_size, reindex, show_progress: true };
            let embedded = bootstrap_vectors(&corpus, embedder, index.as_ref(), &opts).await?;
            println!("Ingest complete: {} chunks in corpus, {} embedded, {} in collection", corpus.len(), embedded, index.count().await?);
        }
        Command::Query { text, document, retrieval_only } => {
            settings.pipeline.retrieval_only |= retrieval_only;
            let corpus = load_corpus(&settings, None)?;
            let pipeline = assemble(settings.pipeline.clone(), build_components(&settings, Arc::clone(&corpus)).await?)?;
            let mut query = Query::new(text);
            query.directory_filter = document;
            let out = pipeline.run(&query).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Batch { input, output, intermediate, retrieval_only } => {
            settings.pipeline.retrieval_only |= retrieval_only;
            let queries = read_queries(&input)?;
            let corpus = load_corpus(&settings, None)?;
            let pipeline = assemble(settings.pipeline.clone(), build_components(&settings, Arc::clone(&corpus)).await?)?;
            let records = run_batch(&pipeline, &corpus, &queries, true).await;
            write_answers(&output, &records).with_context(|| format!("writing answers to {}", output.display()))?;
            println!("Saved {} answers to {}", records.len(), output.display());
            if let Some(path) = intermediate {
                write_intermediate(&path, &records)?;
                println!("Saved intermediate results to {}", path.display());
            }
            if let Some(acc) = keyword_accuracy(&records) {
                println!("Keyword accuracy: {:.2}%", acc * 100.0);
            }
            let failed = failed_queries(&records);
            if failed > 0 {
                anyhow::bail!("{} of {} queries failed; see the error field in {}", failed, records.len(), output.display());
            }
        }
    }
    Ok(())
}
