use std::fs;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod ask;
pub mod chat;
pub mod system;

use crate::chat::{ClientSession, SessionSettings};
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::openai::OpenAiClient;

pub type Session = ClientSession<OpenAiClient, SessionSettings>;

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Model to use instead of STREAMCHAT_MODEL
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<String>,
    },
    /// Send a single message and stream the reply to stdout
    Ask {
        message: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<String>,
    },
    /// Show, set or clear the persisted system prompt
    System {
        prompt: Option<String>,
        #[arg(long, action, default_value = "false")]
        clear: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        // Logs go to stderr so they never interleave with streamed replies
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Builds a session with the persisted system prompt restored and any
/// command line overrides applied.
pub async fn open_session(
    config: &AppConfig,
    model: Option<String>,
    temperature: Option<String>,
) -> Result<Session> {
    fs::create_dir_all(&config.storage_path)?;
    let db = async_db(&config.db_path).await?;
    let settings = SessionSettings::with_store(config.request_config(), db).await?;
    if let Some(model) = model {
        settings.set_model(&model);
    }
    if let Some(temperature) = temperature {
        settings.set_temperature(&temperature);
    }

    let client = OpenAiClient::new(&config.openai_api_hostname);
    Ok(ClientSession::new(client, settings).keep_partial_on_abort(config.keep_partial_on_abort))
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let config = AppConfig::default();

    match args.command {
        Some(Command::Chat { model, temperature }) => {
            let session = open_session(&config, model, temperature).await?;
            chat::run(&session).await?;
        }
        Some(Command::Ask {
            message,
            model,
            temperature,
        }) => {
            let session = open_session(&config, model, temperature).await?;
            ask::run(&session, &message).await?;
        }
        Some(Command::System { prompt, clear }) => {
            system::run(&config, prompt, clear).await?;
        }
        None => {}
    }

    Ok(())
}
