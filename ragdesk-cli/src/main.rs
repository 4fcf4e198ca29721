mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragdesk_rag::gemini::GeminiModel;
use ragdesk_rag::openai::OpenAIEmbeddingProvider;
use ragdesk_rag::{Answer, RagConfig, RagService};
use tracing::info;

/// Default dimensionality of `BAAI/bge-small-en-v1.5`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Parser)]
#[command(name = "ragdesk")]
#[command(about = "Answer questions from a document corpus and crawled support pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The index lives in memory, so each command builds the collections before
/// doing its work.
#[derive(Subcommand)]
enum Commands {
    /// Build the collections and answer a question
    Ask {
        /// The question
        query: String,
        /// Search documents only
        #[arg(long)]
        no_web: bool,
        /// Ignore cached pages and crawl again
        #[arg(long)]
        force_crawl: bool,
        /// Number of passages to use as context
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity for a passage to count
        #[arg(long)]
        threshold: Option<f32>,
        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the collections and list their sizes
    Collections {
        /// Skip web content
        #[arg(long)]
        no_web: bool,
        /// Ignore cached pages and crawl again
        #[arg(long)]
        force_crawl: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();

    let cli = Cli::parse();
    let config = RagConfig::from_env().context("invalid configuration")?;
    let service = build_service(config)?;

    match cli.command {
        Commands::Ask { query, no_web, force_crawl, top_k, threshold, json } => {
            build_collections(&service, force_crawl, !no_web).await?;
            let answer = service.process_query(&query, !no_web, top_k, threshold).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Collections { no_web, force_crawl } => {
            build_collections(&service, force_crawl, !no_web).await?;
            print_collections(&service).await?;
        }
    }
    Ok(())
}

async fn build_collections(service: &RagService, force_crawl: bool, include_web: bool) -> Result<()> {
    if !service.initialize(force_crawl, include_web).await {
        anyhow::bail!("initialization failed, see the log for details");
    }
    Ok(())
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn build_service(config: RagConfig) -> Result<RagService> {
    let dimensions = match env("EMBEDDING_DIMENSIONS") {
        Some(value) => value.parse().context("EMBEDDING_DIMENSIONS must be an integer")?,
        None => DEFAULT_EMBEDDING_DIMENSIONS,
    };
    let embedder = match (env("EMBEDDING_API_BASE"), env("EMBEDDING_API_KEY")) {
        (Some(base), key) => {
            let provider = OpenAIEmbeddingProvider::compatible(base);
            match key {
                Some(key) => provider.with_api_key(key),
                None => provider,
            }
        }
        (None, Some(key)) => OpenAIEmbeddingProvider::new(key)?,
        (None, None) => {
            anyhow::bail!("set EMBEDDING_API_BASE or EMBEDDING_API_KEY to reach an embedding service")
        }
    }
    .with_model(config.embedding_model_name.clone())
    .with_dimensions(dimensions);

    let api_key = env("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
    let mut model = GeminiModel::new(api_key)?;
    if let Some(name) = env("GEMINI_MODEL") {
        model = model.with_model(name);
    }

    info!(
        embedding_model = %config.embedding_model_name,
        dimensions,
        documents = %config.documents_path.display(),
        "starting ragdesk"
    );
    let service = RagService::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .language_model(Arc::new(model))
        .build()?;
    Ok(service)
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if answer.sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, citation) in answer.sources.iter().enumerate() {
        match citation.metadata.page {
            Some(page) => println!("  {}. {} (page {page})", i + 1, citation.metadata.source),
            None => println!("  {}. {}", i + 1, citation.metadata.source),
        }
    }
}

async fn print_collections(service: &RagService) -> Result<()> {
    for collection in service.collections().await? {
        println!("{}\t{}", collection.name, collection.count);
    }
    Ok(())
}
