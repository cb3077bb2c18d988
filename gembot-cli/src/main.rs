//! CLI entry point for gembot

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Input;
use gembot_core::config::{validate_config, Config, ConfigLoader};
use gembot_core::logging::init_logging;
use gembot_core::session::{Role, SessionLimits};
use gembot_manager::{run_server, spawn_session_sweeper, AppState, ChatError, Manager};
use gembot_providers::{GeminiClient, LLMProvider};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gembot")]
#[command(about = "A chat server for Gemini with per-session conversation memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP chat server
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat with the model from the terminal
    Chat {
        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Session id for conversation continuity
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Mirror the environment of a `.env`-driven deployment.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Serve { host, port } => run_serve(&config_loader, host, port).await?,
        Commands::Chat { message, session } => run_chat(&config_loader, message, session).await?,
        Commands::Status => run_status(&config_loader)?,
    }

    Ok(())
}

fn load_config(loader: &ConfigLoader) -> Result<Config> {
    loader.load().with_context(|| {
        format!(
            "Invalid configuration (config directory: {})",
            loader.config_dir().display()
        )
    })
}

fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let client = GeminiClient::from_config(&config.provider)?;
    Ok(Arc::new(client))
}

async fn run_serve(loader: &ConfigLoader, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(loader)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let _log_guard = init_logging(&config.logging);

    let provider = build_provider(&config)?;
    let state = AppState::from_config(&config, provider)?;

    let bind = (config.server.host.as_str(), config.server.port);
    let addr: SocketAddr = tokio::net::lookup_host(bind)
        .await?
        .next()
        .with_context(|| format!("Cannot resolve {}:{}", bind.0, bind.1))?;

    println!("{}", style("Starting gembot...").bold().cyan());
    println!("Model: {}", config.provider.model);
    println!("Web interface: http://{}", addr);
    println!("API endpoint: http://{}/api/chat", addr);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper = spawn_session_sweeper(
        state.manager.clone(),
        Duration::from_secs(config.sessions.sweep_interval_secs),
        shutdown_tx.subscribe(),
    );
    let mut server = tokio::spawn(run_server(state, addr, shutdown_tx.subscribe()));

    println!("\n{}", style("Server is running. Press Ctrl+C to stop.").green());

    let early_exit = tokio::select! {
        result = &mut server => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
    };

    let _ = shutdown_tx.send(());
    match early_exit {
        // The server only returns on its own when it failed to start or crashed.
        Some(result) => result??,
        None => {
            println!("\n{}", style("Shutting down...").yellow());
            if let Err(e) = server.await? {
                error!("Server error during shutdown: {}", e);
            }
        }
    }

    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    println!("{}", style("Server stopped.").green());
    Ok(())
}

async fn run_chat(
    loader: &ConfigLoader,
    message: Option<String>,
    session: Option<String>,
) -> Result<()> {
    let config = load_config(loader)?;
    let _log_guard = init_logging(&config.logging);

    let manager = Arc::new(Manager::new(
        build_provider(&config)?,
        SessionLimits::from(&config.sessions),
        config.server.max_message_chars,
    ));
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("Chat session {}", session_id);

    if let Some(message) = message {
        send_and_print(&manager, &session_id, &message).await?;
        return Ok(());
    }

    println!(
        "{} model {}, session {}",
        style("gembot").bold().cyan(),
        manager.model(),
        style(&session_id).dim()
    );
    println!("Commands: /history, /clear, /quit\n");

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => println!("{}", style(manager.clear(&session_id)).yellow()),
            "/history" => {
                let history = manager.history(&session_id).await;
                if history.is_empty() {
                    println!("{}", style("(no history)").dim());
                }
                for turn in history {
                    let speaker = match turn.role {
                        Role::User => style("you").green(),
                        Role::Assistant => style("bot").cyan(),
                    };
                    println!("{}: {}", speaker, turn.message);
                }
            }
            _ => send_and_print(&manager, &session_id, &line).await?,
        }
    }

    Ok(())
}

async fn send_and_print(manager: &Arc<Manager>, session_id: &str, message: &str) -> Result<()> {
    match manager.chat(session_id, Some(message)).await {
        Ok(exchange) => {
            println!("{} {}\n", style("Bot:").bold().cyan(), exchange.reply.text());
            Ok(())
        }
        Err(ChatError::Validation(reason)) => {
            println!("{}", style(reason).yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load_unvalidated()?;

    println!("{}", style("gembot Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Model: {}", config.provider.model);
    let key_status = if config.provider.api_key.trim().is_empty() {
        style("not configured").red()
    } else {
        style("configured").green()
    };
    println!("  API key: {}", key_status);
    println!(
        "  API base: {}",
        config
            .provider
            .api_base
            .as_deref()
            .unwrap_or(gembot_providers::gemini::DEFAULT_API_BASE)
    );
    println!();

    println!("{}", style("Server:").bold());
    println!("  Bind: {}:{}", config.server.host, config.server.port);
    let secret_status = if config.server.secret_key.is_some() {
        style("configured").green()
    } else {
        style("random per process").yellow()
    };
    println!("  Cookie secret: {}", secret_status);
    println!("  Max message length: {}", config.server.max_message_chars);
    println!();

    println!("{}", style("Sessions:").bold());
    match config.sessions.ttl_secs {
        Some(ttl) => println!("  Idle TTL: {}s", ttl),
        None => println!("  Idle TTL: {}", style("none").dim()),
    }
    match config.sessions.max_sessions {
        Some(max) => println!("  Max sessions: {}", max),
        None => println!("  Max sessions: {}", style("unbounded").dim()),
    }
    println!();

    match validate_config(&config) {
        Ok(()) => println!("{}", style("Configuration is valid.").green()),
        Err(e) => println!("{} {}", style("Configuration problem:").red().bold(), e),
    }

    Ok(())
}
