use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragline_core::bootstrap::{build_chain, create_provider, create_splitter};
use ragline_core::config::resolve_config_path;
use ragline_core::vault::EnvVaultProvider;
use ragline_core::{ChainError, Config, RagChain};
use ragline_gateway::{AnswerError, AnswerFuture, AnswerService, GatewayServer};
use ragline_llm::LlmProvider;
use ragline_llm::any::AnyProvider;
use ragline_memory::InMemoryVectorStore;
use ragline_memory::document::{IngestionPipeline, TextLoader};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "Answer questions about a text file with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split, embed, and index a text file, replacing any existing index
    Ingest {
        /// Path to the text or markdown file
        file: PathBuf,
    },

    /// Serve the HTTP question-answering API
    Serve,

    /// Answer a single question and print it
    Ask {
        /// Question to answer
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    init_subscriber(&config.logging.level);
    config.validate()?;
    config.resolve_secrets(&EnvVaultProvider).await?;

    let provider = create_provider(&config)?;
    tracing::debug!(
        provider = provider.name(),
        config = %config_path.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Ingest { file } => ingest(&config, provider, &file).await,
        Command::Serve => serve(&config, provider).await,
        Command::Ask { question } => ask(&config, provider, &question).await,
    }
}

/// `RUST_LOG` wins over `logging.level`.
fn init_subscriber(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn ingest(config: &Config, provider: AnyProvider, file: &Path) -> anyhow::Result<()> {
    if !provider.supports_embeddings() {
        anyhow::bail!(
            "provider {} has no embedding model configured",
            provider.name()
        );
    }

    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = IngestionPipeline::new(
        create_splitter(config)?,
        Arc::clone(&store) as Arc<dyn ragline_memory::VectorStore>,
        config.index.collection.clone(),
        Box::new(provider.embed_fn()),
    );

    let chunks = pipeline
        .load_and_ingest(&TextLoader::default(), file)
        .await
        .with_context(|| format!("failed to ingest {}", file.display()))?;

    if chunks == 0 {
        anyhow::bail!(
            "{} contains no text to index, existing index left unchanged",
            file.display()
        );
    }

    store
        .save(&config.index.path)
        .await
        .with_context(|| format!("failed to save index to {}", config.index.path.display()))?;

    tracing::info!(
        chunks,
        index = %config.index.path.display(),
        "index written"
    );
    Ok(())
}

async fn ask(config: &Config, provider: AnyProvider, question: &str) -> anyhow::Result<()> {
    let chain = build_chain(config, provider).await?;
    let answer = chain.ask(question).await?;
    println!("{answer}");
    Ok(())
}

async fn serve(config: &Config, provider: AnyProvider) -> anyhow::Result<()> {
    let chain = build_chain(config, provider).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &config.gateway;
    let token = config
        .secrets
        .gateway_token
        .as_ref()
        .map(|s| s.expose().to_owned());
    if token.is_none() {
        tracing::debug!("RAGLINE_GATEWAY_TOKEN not set, /ask is unauthenticated");
    }

    GatewayServer::new(
        &gateway.bind,
        gateway.port,
        Arc::new(ChainService(chain)),
        shutdown_rx,
    )
    .with_auth(token)
    .with_rate_limit(gateway.rate_limit)
    .with_max_body_size(gateway.max_body_size)
    .with_allowed_origins(gateway.allowed_origins.clone())
    .serve()
    .await?;

    Ok(())
}

/// Adapts the answer chain to the gateway's service trait.
struct ChainService<P>(RagChain<P>);

impl<P: LlmProvider + Send + Sync + 'static> AnswerService for ChainService<P> {
    fn answer<'a>(&'a self, question: &'a str) -> AnswerFuture<'a> {
        Box::pin(async move { self.0.ask(question).await.map_err(answer_error) })
    }
}

fn answer_error(err: ChainError) -> AnswerError {
    match err {
        ChainError::EmptyQuestion => AnswerError::EmptyQuestion,
        other => AnswerError::Upstream(other.to_string()),
    }
}
