use anyhow::{bail, Result};
use chatdesk_agent::SupportAgent;
use chatdesk_client::create_language_model;
use chatdesk_config::AppConfig;
use chatdesk_conversation::{ConversationStore, SqliteConversationStore};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatdesk")]
#[command(about = "Customer support chat backend", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "chatdesk.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Send one message through the support agent
    Ask {
        /// The customer message
        #[arg(short, long)]
        message: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Print a stored conversation, or list recent ones
    History {
        session_id: Option<String>,

        /// How many conversations to list
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Probe the database and the language model
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format)?;

    let config = AppConfig::load(Some(cli.config.as_path()))?;
    let agent = Arc::new(build_agent(&config).await?);

    match cli.command {
        Commands::Serve => {
            chatdesk_server::start_server(agent, &config).await?;
        }
        Commands::Ask { message, session } => {
            ask(&agent, &message, session.as_deref()).await?;
        }
        Commands::History { session_id, limit } => match session_id {
            Some(session_id) => print_conversation(&agent, &session_id).await?,
            None => list_conversations(&agent, limit).await?,
        },
        Commands::Check => {
            check(&agent).await?;
        }
    }

    Ok(())
}

async fn build_agent(config: &AppConfig) -> Result<SupportAgent> {
    info!("Opening conversation store at {:?}", config.database.path);
    let store: Arc<dyn ConversationStore> =
        Arc::new(SqliteConversationStore::open(&config.database.path)?);
    let model = create_language_model(&config.llm).await?;

    Ok(SupportAgent::from_config(config, store, model)?)
}

async fn ask(agent: &SupportAgent, message: &str, session: Option<&str>) -> Result<()> {
    let reply = agent.process_message(message, session).await?;

    println!("{}", reply.reply);
    println!();
    println!("Session: {}", reply.session_id);
    Ok(())
}

async fn print_conversation(agent: &SupportAgent, session_id: &str) -> Result<()> {
    let transcript = agent.get_conversation(session_id).await?;
    let conversation = &transcript.conversation;

    println!("Session:  {}", conversation.session_id);
    println!("Started:  {}", conversation.created_at.to_rfc3339());
    println!("Updated:  {}", conversation.updated_at.to_rfc3339());
    if let Some(model) = &conversation.metadata.model {
        println!("Model:    {model}");
    }
    println!();

    for message in &transcript.messages {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            message.sender,
            message.text
        );
    }
    Ok(())
}

async fn list_conversations(agent: &SupportAgent, limit: usize) -> Result<()> {
    let conversations = agent.list_conversations(limit).await?;
    if conversations.is_empty() {
        println!("No conversations stored yet.");
        return Ok(());
    }

    for summary in conversations {
        println!(
            "{}  {:>4} messages  last active {}",
            summary.session_id,
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn check(agent: &SupportAgent) -> Result<()> {
    let report = agent.health().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_healthy() {
        bail!("chatdesk is unhealthy");
    }
    Ok(())
}

fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    Ok(())
}
