use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docchat_cli::chat;
use docchat_cli::config::{Config, Credentials};
use docchat_cli::ledger::{RemoteLedger, TokenLedger};
use docchat_cli::llm::OpenAiGateway;
use docchat_cli::session::{Document, SessionContext};
use docchat_cli::source::{self, Source, SourceError, SourceOptions};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(author, version, about = "Chat grounded in a single document, with token-usage tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and chat with it interactively
    Chat(ChatArgs),

    /// Show the local token-usage ledger
    Usage {
        /// Show only the last N records
        #[arg(long)]
        tail: Option<usize>,
    },
}

#[derive(Args)]
#[command(group(
    clap::ArgGroup::new("doc_source")
        .required(true)
        .args(["site", "video", "pdf", "text"]),
))]
struct ChatArgs {
    /// URL of a web page to ground the chat in
    #[arg(long)]
    site: Option<String>,

    /// YouTube video URL or id; its transcript grounds the chat
    #[arg(long)]
    video: Option<String>,

    /// Path to a PDF file
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Path to a plain-text file
    #[arg(long)]
    text: Option<PathBuf>,

    /// User identifier forwarded to the completion service
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "docchat_cli=debug"
    } else {
        "docchat_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Chat(args) => run_chat(args).await,
        Commands::Usage { tail } => run_usage(tail),
    }
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let config = Config::load()?;

    // Missing credentials are fatal before any session state exists.
    let credentials = Credentials::from_env(config.ledger.remote.enabled)?;

    let source = source_from_args(&args)?;
    let kind = source.kind();
    let options = SourceOptions {
        transcript_language: config.source.transcript_language.clone(),
        fetch_timeout: std::time::Duration::from_secs(config.source.fetch_timeout_secs),
    };

    tracing::info!(kind = %kind, "normalizing document source");
    let text = match source::normalize(source, &options).await {
        Ok(text) => text,
        Err(SourceError::Empty) => {
            // No session was created; report and let the user pick another
            // source.
            anyhow::bail!("the document contained no extractable text; try a different source")
        }
        Err(e) => return Err(e).context("failed to load document"),
    };

    let mut session = SessionContext::build(Document::new(kind, text));
    if let Some(user) = args.user {
        session = session.with_user_id(user);
    }

    let provider = OpenAiGateway::new(credentials.completion_api_key, config.llm.model.clone())
        .with_max_tokens(config.llm.max_tokens);

    let remote = match (config.ledger.remote.enabled, credentials.ledger_token) {
        (true, Some(token)) => Some(RemoteLedger::new(
            token,
            config.ledger.remote.owner.clone(),
            config.ledger.remote.repo.clone(),
            config.ledger.remote.path.clone(),
            config.ledger.remote.branch.clone(),
        )?),
        _ => None,
    };
    let ledger = TokenLedger::new(&config.ledger.local_path, remote)?;

    chat::run_repl(session, Box::new(provider), ledger).await
}

fn run_usage(tail: Option<usize>) -> Result<()> {
    let config = Config::load()?;
    let ledger = TokenLedger::new(&config.ledger.local_path, None)?;
    let counts = ledger.read_local()?;

    if counts.is_empty() {
        println!("Ledger is empty: no responses recorded yet.");
        return Ok(());
    }

    let shown = match tail {
        Some(n) if n < counts.len() => &counts[counts.len() - n..],
        _ => &counts[..],
    };
    for count in shown {
        println!("{count}");
    }
    println!(
        "-- {} responses, {} tokens total",
        counts.len(),
        counts.iter().sum::<u64>()
    );
    Ok(())
}

fn source_from_args(args: &ChatArgs) -> Result<Source> {
    if let Some(url) = &args.site {
        return Ok(Source::Site { url: url.clone() });
    }
    if let Some(video) = &args.video {
        return Ok(Source::Video {
            id: video_id(video),
        });
    }
    if let Some(path) = &args.pdf {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read PDF file {}", path.display()))?;
        return Ok(Source::Pdf { bytes });
    }
    if let Some(path) = &args.text {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read text file {}", path.display()))?;
        return Ok(Source::Text { bytes });
    }
    // clap's required group guarantees one of the above was given.
    unreachable!("no document source provided")
}

/// Accept either a bare video id or a full YouTube URL.
fn video_id(input: &str) -> String {
    if let Some((_, rest)) = input.split_once("v=") {
        let id = rest.split(['&', '#']).next().unwrap_or(rest);
        return id.to_string();
    }
    if let Some((_, rest)) = input.split_once("youtu.be/") {
        let id = rest.split(['?', '&', '#']).next().unwrap_or(rest);
        return id.to_string();
    }
    input.to_string()
}
