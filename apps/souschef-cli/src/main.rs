use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use souschef_agent::{build_language_model, AgentConfig, AgentAnswer, RoutingAgent, ToolRegistry};
use souschef_core::cache::JsonDocumentCache;
use souschef_core::chunker::Chunker;
use souschef_core::config::{Config, Settings, SourceConfig};
use souschef_core::loader::DocumentLoader;
use souschef_core::traits::EmbeddingProvider;
use souschef_embed::build_provider;
use souschef_vector::{IngestReport, Ingestor, Retriever, RetrieverConfig, VectorIndex};

#[derive(Parser, Debug)]
#[command(name = "souschef", author, version, about = "Ask a cookbook and a food dictionary", long_about = None)]
struct Cli {
    /// Directory holding souschef.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, chunk and embed every configured source
    Ingest {
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest the sources, then answer one question
    Ask {
        question: String,
        /// Print the full turn as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the tools built from the configured sources
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load_from(&cli.config_dir)
        .and_then(|config| config.settings())
        .with_context(|| format!("loading configuration from {}", cli.config_dir.display()))?;
    debug!(?settings, "configuration loaded");

    match cli.command {
        Command::Ingest { json } => {
            let provider = build_provider(&settings)?;
            let index = Arc::new(VectorIndex::new());
            let reports = ingest_sources(&settings, index, provider, !json).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for r in &reports {
                    println!(
                        "{:<12} {:>4} documents  {:>5} chunks  ({} replaced)",
                        r.collection, r.documents, r.chunks, r.replaced
                    );
                }
            }
        }
        Command::Ask { question, json } => {
            let provider = build_provider(&settings)?;
            let index = Arc::new(VectorIndex::new());
            ingest_sources(&settings, index.clone(), provider.clone(), false).await?;
            let registry = build_registry(&settings, index, provider)?;
            let agent = RoutingAgent::new(
                Arc::new(registry),
                build_language_model(&settings)?,
                AgentConfig::from_settings(&settings),
            )?;
            let answer = agent.answer(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::Tools => {
            let tools = tool_sources(&settings)?;
            if tools.is_empty() {
                println!("No sources configured; the agent will answer without tools.");
            }
            for source in tools {
                println!("{:<20} [{}] {}", source.tool_name.trim(), source.collection, source.description.trim());
            }
        }
    }
    Ok(())
}

async fn ingest_sources(
    settings: &Settings,
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    show_progress: bool,
) -> anyhow::Result<Vec<IngestReport>> {
    let loader = match &settings.cache_dir {
        Some(dir) => DocumentLoader::with_cache(Arc::new(JsonDocumentCache::new(dir)?)),
        None => DocumentLoader::new(),
    };
    let ingestor = Ingestor::new(index, provider, loader, Chunker::new(settings.chunking.clone())?)
        .with_progress(show_progress);

    let mut reports = Vec::with_capacity(settings.sources.len());
    for source in &settings.sources {
        let report = ingestor
            .ingest_path(&source.collection, &source.path)
            .await
            .with_context(|| format!("ingesting {} into '{}'", source.path.display(), source.collection))?;
        reports.push(report);
    }
    info!(sources = reports.len(), "ingestion finished");
    Ok(reports)
}

/// The first source for each distinct `tool_name`, in configuration order.
///
/// Sources sharing a name must share a collection.
fn tool_sources(settings: &Settings) -> anyhow::Result<Vec<&SourceConfig>> {
    let mut tools: Vec<&SourceConfig> = Vec::new();
    for source in &settings.sources {
        match tools.iter().find(|t| t.tool_name.trim() == source.tool_name.trim()) {
            Some(first) if first.collection == source.collection => {}
            Some(first) => anyhow::bail!(
                "tool '{}' is bound to both '{}' and '{}'",
                source.tool_name.trim(),
                first.collection,
                source.collection
            ),
            None => tools.push(source),
        }
    }
    Ok(tools)
}

fn build_registry(
    settings: &Settings,
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<ToolRegistry> {
    let config = RetrieverConfig { top_k: settings.top_k, embed_timeout: settings.timeouts.embed() };
    let retriever = Arc::new(Retriever::new(index, provider, config)?);
    let mut registry = ToolRegistry::new();
    for source in tool_sources(settings)? {
        registry
            .register(&source.tool_name, &source.description, &source.collection, retriever.clone())
            .with_context(|| format!("registering tool for {}", source.path.display()))?;
    }
    Ok(registry)
}

fn print_answer(answer: &AgentAnswer) {
    println!("{}", answer.answer);
    if answer.tool_calls.is_empty() {
        return;
    }
    println!();
    for call in &answer.tool_calls {
        println!("{} ({}) <- \"{}\"", call.tool, call.collection, call.query);
        for hit in &call.results {
            println!("  {:.3}  {}  {}", hit.score, file_label(&hit.chunk.source_path), hit.chunk.id);
        }
    }
}

fn file_label(path: &str) -> &str {
    Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}
