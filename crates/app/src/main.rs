use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use medichat_core::{
    ingest_document, AnswerPipeline, AppConfig, CharacterNgramEmbedder, ChatSession,
    CompletionModel, DocumentLoader, DocumentSource, EmbeddingModel, EmbeddingStore,
    InMemoryStore, OpenAiChat, OpenAiEmbeddings, Retriever, SupabaseStore, VectorStore,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medichat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file; flags below override its values
    #[arg(long, env = "MEDICHAT_CONFIG")]
    config: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Chat completion model
    #[arg(long)]
    chat_model: Option<String>,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Minimum similarity for a retrieved chunk
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Use the local hashing embedder and an in-memory table instead of the
    /// hosted services. Chat commands ingest the source first.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load, clean, embed and store the knowledge-base PDF.
    Ingest {
        /// PDF path, directory of PDFs, or http(s) URL.
        #[arg(long)]
        source: Option<String>,
    },
    /// Answer a single question with no prior history.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Interactive chat on stdin. `/quit` exits.
    Chat,
}

fn build_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(key) = &cli.openai_api_key {
        config.openai.api_key = Some(key.clone());
    }
    if let Some(base_url) = &cli.openai_base_url {
        config.openai.base_url = base_url.clone();
    }
    if let Some(model) = &cli.chat_model {
        config.openai.chat_model = model.clone();
    }
    if let Some(url) = &cli.supabase_url {
        config.supabase.url = Some(url.clone());
    }
    if let Some(key) = &cli.supabase_key {
        config.supabase.key = Some(key.clone());
    }
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }
    if cli.score_threshold.is_some() {
        config.retrieval.score_threshold = cli.score_threshold;
    }

    config.validate(cli.offline)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        offline = cli.offline,
        "medichat boot"
    );

    if cli.offline {
        let store = EmbeddingStore::new(
            CharacterNgramEmbedder::default(),
            InMemoryStore::new(),
            config.retrieval.clone(),
        );
        run(cli.command, &config, store, true).await
    } else {
        let store = EmbeddingStore::new(
            OpenAiEmbeddings::new(&config.openai)?,
            SupabaseStore::new(&config.supabase)?,
            config.retrieval.clone(),
        );
        run(cli.command, &config, store, false).await
    }
}

async fn run<E, S>(
    command: Command,
    config: &AppConfig,
    store: EmbeddingStore<E, S>,
    preload: bool,
) -> anyhow::Result<()>
where
    E: EmbeddingModel,
    S: VectorStore,
{
    let loader = DocumentLoader::new(
        config.ingestion.min_chunk_chars,
        config.ingestion.fetch_timeout(),
    )?;

    match command {
        Command::Ingest { source } => {
            let raw_source = source.unwrap_or_else(|| config.ingestion.source.clone());
            let source = DocumentSource::parse(&raw_source)?;
            let outcome = ingest_document(&loader, &store, &source).await;

            if !outcome.success {
                anyhow::bail!("ingestion of {source} failed: {}", outcome.message);
            }
            println!(
                "{} ({} chunks stored at {})",
                outcome.message,
                outcome.chunks_stored,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            if preload {
                preload_source(&loader, &store, config).await?;
            }
            let pipeline = AnswerPipeline::new(OpenAiChat::new(&config.openai)?, store)
                .configured(&config.pipeline);
            println!("{}", pipeline.respond(&[], &question).await);
        }
        Command::Chat => {
            if preload {
                preload_source(&loader, &store, config).await?;
            }
            let pipeline = AnswerPipeline::new(OpenAiChat::new(&config.openai)?, store)
                .configured(&config.pipeline);
            chat_loop(&pipeline, config).await?;
        }
    }

    Ok(())
}

async fn preload_source<E, S>(
    loader: &DocumentLoader,
    store: &EmbeddingStore<E, S>,
    config: &AppConfig,
) -> anyhow::Result<()>
where
    E: EmbeddingModel,
    S: VectorStore,
{
    let source = DocumentSource::parse(&config.ingestion.source)?;
    let outcome = ingest_document(loader, store, &source).await;
    if !outcome.success {
        anyhow::bail!("offline ingestion of {source} failed: {}", outcome.message);
    }
    if outcome.chunks_stored == 0 {
        warn!(source = %source, "offline store is empty; answers will have no context");
    }
    Ok(())
}

async fn chat_loop<M, R>(pipeline: &AnswerPipeline<M, R>, config: &AppConfig) -> anyhow::Result<()>
where
    M: CompletionModel,
    R: Retriever,
{
    let mut session = ChatSession::new(&config.session);
    for message in session.messages() {
        println!("bot: {}", message.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        session.set_input(&line);
        if let Some(reply) = session.submit(pipeline).await {
            println!("bot: {}", reply.text);
        }
    }

    info!(turns = session.messages().len(), "chat session closed");
    Ok(())
}
