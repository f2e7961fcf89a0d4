//! Agentgram — drive Claude Code sessions from Telegram.
//!
//! Quick start:
//!   agentgram init     # write a starter config
//!   agentgram          # run the bridge (same as `agentgram run`)
//!   agentgram status   # config location + session state per project
//!
//! The bridge relays prompts from a Telegram chat into tmux-hosted
//! Claude Code sessions, streams output back, and resolves the
//! approval requests that `agentgram-hook` files from inside a session.

use agentgram::approval::ApprovalQueue;
use agentgram::bridge::Bridge;
use agentgram::config::Config;
use agentgram::session::{SessionManager, TmuxSessionManager};
use agentgram::telegram::TelegramClient;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::watch;

/// Agentgram — drive Claude Code sessions from your phone.
#[derive(Parser)]
#[command(
    name = "agentgram",
    version,
    about = "Telegram bridge for Claude Code sessions",
    long_about = "Agentgram connects a Telegram chat to Claude Code sessions\n\
                  running in tmux: send prompts, watch output, and approve\n\
                  gated tool calls from anywhere.\n\n\
                  Quick start:\n  \
                  agentgram init      # write a starter config\n  \
                  agentgram           # run the bridge\n  \
                  agentgram status    # show config + session state"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (the default when no command is given)
    Run,

    /// Show config location and per-project session state
    Status,

    /// Write a starter config to fill in by hand
    Init,
}

#[tokio::main]
async fn main() {
    // Bridge chatter at info; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agentgram=info".parse().unwrap()),
        )
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Run) => run_bridge().await,
        Some(Commands::Status) => show_status().await,
        Some(Commands::Init) => run_init(),
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("  {} {}", "✗".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        eprintln!();
        std::process::exit(1);
    }
}

/// Load the config and run the bridge until SIGINT/SIGTERM.
async fn run_bridge() -> anyhow::Result<()> {
    let config = Config::load()?;
    let telegram = TelegramClient::new(&config.telegram);
    let sessions: Arc<dyn SessionManager> = Arc::new(TmuxSessionManager::new(&config));
    let queue = ApprovalQueue::open(Config::approvals_dir()?)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(projects = config.projects.len(), "bridge starting");
    Bridge::new(telegram, sessions, queue, shutdown_rx).run().await;
    Ok(())
}

/// Resolve on SIGINT or, on unix, SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Show where the config lives and which projects have a live session.
async fn show_status() -> anyhow::Result<()> {
    let config = Config::load()?;
    let sessions = TmuxSessionManager::new(&config);

    println!();
    println!("  {}  {}", "agentgram".bold(), "— bridge status".dimmed());
    println!(
        "  Config: {}",
        Config::config_path()?.display().to_string().dimmed()
    );
    println!("  Chat:   {}", config.telegram.chat_id);
    println!();

    if config.projects.is_empty() {
        println!("  No projects configured yet. Add some to the config file.");
    } else {
        for project in &config.projects {
            let state = if sessions.is_running(&project.name).await {
                "running".green()
            } else {
                "stopped".dimmed()
            };
            println!(
                "  {} {}  {}",
                state,
                project.name.bold(),
                project.path.display().to_string().dimmed()
            );
        }
    }
    println!();
    Ok(())
}

/// Write a starter config, refusing to overwrite an existing one.
fn run_init() -> anyhow::Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!();
        println!(
            "  {} Config already exists at {}",
            "✓".green(),
            path.display()
        );
        println!("  Edit it by hand, then run {}.", "agentgram".bold());
        println!();
        return Ok(());
    }

    Config::write_starter(&path)?;
    println!();
    println!(
        "  {} Wrote starter config to {}",
        "✓".green().bold(),
        path.display()
    );
    println!();
    println!("  Next steps:");
    println!(
        "    1. Create a bot with @BotFather and paste the token into {}",
        "telegram.token".cyan()
    );
    println!(
        "    2. Put your own chat id in {}",
        "telegram.chat_id".cyan()
    );
    println!(
        "    3. List your projects, then run {}",
        "agentgram".bold()
    );
    println!();
    Ok(())
}
