//! chat-rag command line
//!
//! Run with: cargo run -p chat-rag -- ingest handbook.pdf https://example.com/policies

use std::path::PathBuf;

use anyhow::Context;
use chat_rag::config::BackendProvider;
use chat_rag::providers::{self, OllamaClient};
use chat_rag::{IngestPipeline, RagConfig, RetrievalSession, Summarizer, VectorIndex};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about = "Chat with your PDFs, images and webpages")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and embed sources, replacing the current index
    Ingest {
        /// PDF paths, image paths or http(s) URLs
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Summarize sources without touching the index
    Summarize {
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Ask a question, or start an interactive chat when none is given
    Ask { question: Option<String> },
    /// Delete the stored index
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!("Index path: {}", config.index.storage_path.display());

    if !matches!(cli.command, Command::Clear) {
        check_backend(&config).await?;
    }

    match cli.command {
        Command::Ingest { sources } => ingest(&config, &sources).await,
        Command::Summarize { sources } => summarize(&config, &sources).await,
        Command::Ask { question } => ask(&config, question).await,
        Command::Clear => {
            VectorIndex::clear_path(&config.index.storage_path).await?;
            println!("Cleared {}", config.index.storage_path.display());
            Ok(())
        }
    }
}

/// Warn early when the local Ollama server is not running
async fn check_backend(config: &RagConfig) -> anyhow::Result<()> {
    if config.backend != BackendProvider::Ollama {
        return Ok(());
    }

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    if OllamaClient::new(&config.llm)?.health_check().await {
        tracing::info!("Ollama is running");
    } else {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("  Start it with: ollama serve");
        tracing::warn!(
            "  Pull models: ollama pull {} && ollama pull {}",
            config.llm.embed_model,
            config.llm.generate_model
        );
    }
    Ok(())
}

async fn ingest(config: &RagConfig, sources: &[String]) -> anyhow::Result<()> {
    let (embedder, _) = providers::build(config)?;
    let pipeline = IngestPipeline::from_config(config)?;

    let chunks = pipeline.prepare(sources).await?;
    let mut index = VectorIndex::new(&config.index.storage_path, embedder)
        .with_batch_config(&config.embeddings);
    let report = index.rebuild(&chunks).await?;

    println!(
        "Indexed {} chunks in {} batch(es) into {}",
        report.records,
        report.batches,
        config.index.storage_path.display()
    );
    Ok(())
}

async fn summarize(config: &RagConfig, sources: &[String]) -> anyhow::Result<()> {
    let (_, llm) = providers::build(config)?;
    let pipeline = IngestPipeline::from_config(config)?;

    let chunks = pipeline.prepare(sources).await?;
    let summary = Summarizer::new(llm, &config.summarization)
        .summarize(&chunks)
        .await?;

    println!("{}", summary);
    Ok(())
}

async fn ask(config: &RagConfig, question: Option<String>) -> anyhow::Result<()> {
    let (embedder, llm) = providers::build(config)?;
    let mut session = RetrievalSession::new(
        &config.index.storage_path,
        embedder,
        llm,
        config.retrieval.clone(),
    );

    if let Some(question) = question {
        let result = session.ask_with_sources(&question).await?;
        print_answer(&result.answer, &result.sources);
        return Ok(());
    }

    session.initialize().await?;
    println!("Ask a question (empty line or Ctrl-D to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        // A failed turn is reported and the chat continues
        match session.ask_with_sources(question).await {
            Ok(result) => print_answer(&result.answer, &result.sources),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

fn print_answer(answer: &str, sources: &[chat_rag::types::ScoredChunk]) {
    println!("\n{}\n", answer);
    if !sources.is_empty() {
        println!("Sources:");
        for (i, source) in sources.iter().enumerate() {
            println!(
                "  [{}] {} ({:.2})",
                i + 1,
                source.chunk.metadata.format_citation(),
                source.similarity
            );
        }
        println!();
    }
}
