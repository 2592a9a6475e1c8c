use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qa_chat_core::{ChatSession, Config, QaClient, SendOutcome, SessionEvent};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "qa-chat")]
#[command(version, about = "Chat with a question-answering agent from the terminal")]
struct Cli {
    /// Base URL of the question-answering service
    #[arg(long, env = "QA_CHAT_BASE_URL", global = true)]
    base_url: Option<String>,
    /// Seconds to wait for an answer before giving up
    #[arg(long, env = "QA_CHAT_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Config {
        base_url: cli.base_url,
        timeout_secs: cli.timeout_secs,
    };

    match cli.command {
        None => {
            let log_path = init_file_logging()?;
            let config = load_config(overrides);
            tracing::info!(base_url = config.base_url(), log = %log_path.display(), "starting chat");
            run_tui(&config).await
        }
        Some(Commands::Ask { question }) => {
            init_stderr_logging();
            if run_ask(&load_config(overrides), question).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Config { save }) => {
            init_stderr_logging();
            show_config(&load_config(overrides), save)
        }
    }
}

/// Config file merged with command-line and environment overrides
fn load_config(overrides: Config) -> Config {
    let file_config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config file, using defaults");
        Config::new()
    });
    file_config.merged_with(overrides)
}

fn build_session(config: &Config) -> Result<ChatSession> {
    let client = QaClient::new(config.base_url(), config.timeout())?;
    Ok(ChatSession::new(Arc::new(client)).with_timeout(config.timeout()))
}

/// Log to a file while the terminal UI owns the screen
fn init_file_logging() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("qa-chat");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("qa-chat.log");
    let log_file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,qa_chat_core=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file)),
        )
        .init();

    Ok(log_path)
}

fn init_stderr_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_tui(config: &Config) -> Result<()> {
    let session = build_session(config)?;
    let mut app = App::new(session, config.base_url());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_app(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run_app(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();
    let mut session_events = app.session.subscribe();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let awaiting = app.session.is_awaiting_response();
        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event),
            Some(event) = session_events.recv() => app.on_session_event(event),
            _ = app.session.wait_for_response(), if awaiting => {}
        }
    }

    Ok(())
}

/// Ask one question and print the reply; returns whether the request failed
async fn run_ask(config: &Config, question: String) -> Result<bool> {
    let mut session = build_session(config)?;
    let (reply, failed) = ask_once(&mut session, question).await?;
    println!("{}", reply);
    Ok(failed)
}

/// Send a single question through the session and wait for the agent's reply
async fn ask_once(session: &mut ChatSession, question: String) -> Result<(String, bool)> {
    let mut session_events = session.subscribe();

    session.set_pending_input(question);
    if session.send_message() != SendOutcome::Sent {
        anyhow::bail!("Question is empty");
    }
    session.wait_for_response().await;

    let mut failed = false;
    while let Ok(event) = session_events.try_recv() {
        if let SessionEvent::ResponseApplied { failed: true } = event {
            failed = true;
        }
    }

    let reply = session
        .transcript()
        .last()
        .map(|message| message.content.clone())
        .unwrap_or_default();
    Ok((reply, failed))
}

fn show_config(config: &Config, save: bool) -> Result<()> {
    println!("base_url:     {}", config.base_url());
    println!("timeout_secs: {}", config.timeout().as_secs());

    if save {
        let path = config.save()?;
        println!("Saved to {}", path.display());
    } else {
        println!("Config file:  {}", Config::get_config_path()?.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::EchoService;
    use async_trait::async_trait;
    use qa_chat_core::{Message, QaService, RequestFailed, REQUEST_FAILED_MESSAGE};

    struct DownService;

    #[async_trait]
    impl QaService for DownService {
        async fn ask(&self, _question: &str, _history: &[Message]) -> Result<Option<String>, RequestFailed> {
            Err(RequestFailed::Aborted("service down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ask_once_returns_reply() {
        let mut session = ChatSession::new(Arc::new(EchoService));
        let (reply, failed) = ask_once(&mut session, "ping".to_string()).await.unwrap();
        assert_eq!(reply, "echo: ping");
        assert!(!failed);
    }

    #[tokio::test]
    async fn test_ask_once_reports_failure() {
        let mut session = ChatSession::new(Arc::new(DownService));
        let (reply, failed) = ask_once(&mut session, "ping".to_string()).await.unwrap();
        assert_eq!(reply, REQUEST_FAILED_MESSAGE);
        assert!(failed);
    }

    #[tokio::test]
    async fn test_ask_once_rejects_blank_question() {
        let mut session = ChatSession::new(Arc::new(EchoService));
        assert!(ask_once(&mut session, "   ".to_string()).await.is_err());
    }
}
