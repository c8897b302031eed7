//! Binary entry point for `assistkit`.
//!
//! This module provides the command-line interface for assistkit with options
//! for configuration file paths and logging verbosity, and one subcommand per
//! service.

use std::sync::Arc;

use assistkit::{
    prelude::*,
    runtime::Runtime,
    service::{
        audio::whisper::WhisperLoader,
        embeddings::Embedder,
        llm::LlmClient,
        tools::{GenericTool, scraper::dom::DomScraper},
        trace::Tracer,
    },
};
use clap::{Parser, Subcommand, ValueEnum};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Assistkit: OpenAI Assistants runs with local tools, plus alternate providers.
///
/// Configuration can come from `config.toml` or `ASSISTKIT_*` environment variables.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, assistkit will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the assistant one question.
    Ask { prompt: String },
    /// Talk to the assistant on a single thread until EOF.
    Chat,
    /// Generate a completion with an LLM provider.
    Generate {
        #[arg(long, value_enum, default_value_t = LlmProvider::Openai)]
        provider: LlmProvider,
        prompt: String,
    },
    /// Print the embedding of each text as JSON.
    Embed {
        #[arg(long, value_enum, default_value_t = EmbeddingProvider::Openai)]
        provider: EmbeddingProvider,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Transcribe a local audio file or URL.
    Transcribe { source: String },
    /// Run the web scraper on text containing a URL.
    Scrape {
        input: String,
        /// Render the page in headless Chromium (needs the `browser` feature).
        #[arg(long)]
        browser: bool,
    },
    /// Manage assistants.
    #[command(subcommand)]
    Assistants(AssistantsCommand),
}

#[derive(Subcommand, Debug)]
enum AssistantsCommand {
    /// List assistants.
    List,
    /// Delete an assistant.
    Delete { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LlmProvider {
    Openai,
    Maritaca,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EmbeddingProvider {
    Openai,
    Jina,
}

/// Main entry point for the assistkit binary.
///
/// Sets up logging based on verbosity, loads configuration, and runs the subcommand.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("assistkit");
    let otel = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry().with(otel).with(level_filter).with(stderr).init();

    let config = Config::load(args.config.as_deref())?;

    // Cancel in-flight runs on Ctrl-C.

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling ...");
            on_signal.cancel();
        }
    });

    run(config, args.command, &cancel).await
}

async fn run(config: Config, command: Command, cancel: &CancellationToken) -> Void {
    match command {
        Command::Ask { prompt } => {
            let reply = assistkit::start(config, &prompt, cancel).await?;
            println!("{reply}");
        }
        Command::Chat => chat(config, cancel).await?,
        Command::Generate { provider, prompt } => {
            let tracer = Tracer::from_config(&config)?;
            let llm = match provider {
                LlmProvider::Openai => LlmClient::openai(&config, tracer),
                LlmProvider::Maritaca => LlmClient::maritaca(&config, tracer)?,
            };

            println!("{}", llm.call(&prompt, &TraceContext::root()).await?);
        }
        Command::Embed { provider, texts } => {
            let tracer = Tracer::from_config(&config)?;
            let embedder = match provider {
                EmbeddingProvider::Openai => Embedder::openai(&config, tracer),
                EmbeddingProvider::Jina => Embedder::jina(&config, tracer)?,
            };

            let vectors = embedder.embed_documents(&texts, &TraceContext::root()).await?;
            println!("{}", serde_json::to_string(&vectors)?);
        }
        Command::Transcribe { source } => {
            let loader = WhisperLoader::new(&config)?.with_tracer(Tracer::from_config(&config)?);

            for document in loader.load(&source, &TraceContext::root()).await? {
                println!("{}", document.page_content);
            }
        }
        Command::Scrape { input, browser } => {
            let scraper = if browser { browser_scraper(&config)? } else { Arc::new(DomScraper::new(&config)?) as Arc<dyn GenericTool> };

            println!("{}", scraper.call(&input).await?);
        }
        Command::Assistants(AssistantsCommand::List) => {
            let runtime = Runtime::new(config)?;

            for assistant in runtime.assistants.list_assistants().await? {
                println!("{}\t{}\t{}", assistant.id, assistant.model, assistant.name.unwrap_or_default());
            }
        }
        Command::Assistants(AssistantsCommand::Delete { id }) => {
            let runtime = Runtime::new(config)?;
            let status = runtime.assistants.delete_assistant(&id).await?;

            println!("{}\tdeleted={}", status.id, status.deleted);
        }
    }

    Ok(())
}

#[cfg(feature = "browser")]
fn browser_scraper(config: &Config) -> Res<Arc<dyn GenericTool>> {
    Ok(Arc::new(assistkit::service::tools::scraper::browser::BrowserScraper::new(config)))
}

#[cfg(not(feature = "browser"))]
fn browser_scraper(_config: &Config) -> Res<Arc<dyn GenericTool>> {
    Err(anyhow!("assistkit was built without the `browser` feature."))
}

/// Read prompts from stdin and answer each on the same thread.
async fn chat(config: Config, cancel: &CancellationToken) -> Void {
    let runtime = Runtime::new(config)?;
    let assistant_id = runtime.resolve_assistant().await?;
    let thread = runtime.assistants.create_thread(&Default::default()).await?;

    info!("Chatting with `{assistant_id}` on thread `{}`. Send EOF to quit.", thread.id);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let reply = runtime.reply_on_thread(&thread.id, &assistant_id, prompt, cancel).await?;
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
    }

    if let Err(e) = runtime.assistants.delete_thread(&thread.id).await {
        warn!("Failed to delete thread `{}`: {e}", thread.id);
    }

    Ok(())
}
