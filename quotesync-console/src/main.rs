//! Quotesync Console Application
//! 
//! Main entry point for the quotesync command-line client.

use clap::{Parser, Subcommand};
use quotesync_console::app::RunCommand;
use quotesync_console::category_index::CategoryFilter;
use quotesync_console::sync_manager::SyncOutcome;
use quotesync_console::{App, Config, ConsoleError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "quotesync")]
#[command(about = "Offline-first quote collection synced with a remote feed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Server URL
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Directory holding the quote store
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync periodically until interrupted
    Run,
    /// Run one reconciliation pass
    Sync,
    /// Add a quote and publish it
    Add { text: String, category: String },
    /// Show a random quote from the selected category
    Random,
    /// List quotes
    List {
        /// Only quotes in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// List categories
    Categories,
    /// Select the category used by `random`
    Select {
        /// Category name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        category: Option<String>,

        /// Clear the selection and browse all categories
        #[arg(long)]
        all: bool,
    },
    /// Import quotes from a JSON file
    Import { file: PathBuf },
    /// Export quotes to quotes.json
    Export {
        /// Target directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Restore local versions of the last conflict batch
    Resolve,
    /// Show collection and sync status
    Status,
    /// Generate a sample configuration file
    GenerateConfig { path: String },
    /// Validate configuration and exit
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::GenerateConfig { path } = &cli.command {
        return generate_sample_config(path).await;
    }

    let mut config = Config::load(
        cli.config.as_deref(),
        cli.server.clone(),
        cli.data_dir.clone(),
    )
    .await?;

    if let Some(ref log_level) = cli.log_level {
        config.log_level = log_level.clone();
        config.validate()?;
    }

    init_logging(&config);
    debug!("Command line arguments parsed successfully");
    debug!("Server URL: {}", config.server_url);
    debug!("Data directory: {}", config.data_dir.display());
    debug!("Sync interval: {}s", config.sync_interval_secs);

    if let Command::ValidateConfig = cli.command {
        info!("Configuration is valid");
        println!("Configuration is valid");
        return Ok(());
    }

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let app = App::new(config, shutdown_flag.clone()).await?;

    if let Command::Run = cli.command {
        let shutdown_flag_clone = shutdown_flag.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!("Error waiting for shutdown signal: {}", e);
            }

            info!("Shutdown signal received, initiating graceful shutdown...");
            shutdown_flag_clone.store(true, Ordering::SeqCst);
        });

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(read_operator_commands(commands_tx));

        info!("Starting Quotesync v{}", env!("CARGO_PKG_VERSION"));
        info!("Type sync, resolve or status and press Enter");
        return match app.run(commands_rx).await {
            Ok(()) => {
                info!("Quotesync shut down gracefully");
                Ok(())
            }
            Err(e) => {
                error!("Quotesync error: {}", e);
                Err(e)
            }
        };
    }

    let result = execute(&app, cli.command).await;
    app.shutdown().await;
    result
}

/// Initialize logging at the configured level
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Forward commands typed on stdin to the running app until EOF
async fn read_operator_commands(commands: mpsc::UnboundedSender<RunCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match line.parse::<RunCommand>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read command input: {}", e);
                break;
            }
        }
    }
    debug!("Command input closed");
}

/// Run a one-shot command
async fn execute(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Sync => match app.sync_now().await? {
            SyncOutcome::Completed { report, .. } => {
                println!(
                    "Sync complete: {} new, {} updated",
                    report.appended, report.overwritten
                );
                if report.has_conflicts() {
                    println!(
                        "{} conflict(s) detected. Server version applied. Run `quotesync resolve` to keep yours.",
                        report.conflicts.len()
                    );
                }
            }
            SyncOutcome::Coalesced => println!("Sync already in progress"),
        },
        Command::Add { text, category } => {
            let record = app.add_quote(&text, &category).await?;
            println!("Added {}", record);
        }
        Command::Random => match app.random_quote().await {
            Some(record) => println!("{}", record),
            None => println!("No quotes available"),
        },
        Command::List { category } => {
            let filter = CategoryFilter::from(category);
            for record in app.list(&filter).await {
                println!("{}", record);
            }
        }
        Command::Categories => {
            for category in app.categories() {
                println!("{}", category);
            }
        }
        Command::Select { category, all } => {
            let filter = if all {
                CategoryFilter::All
            } else {
                CategoryFilter::from(category)
            };
            let filter = app.select_category(filter).await?;
            println!("Selected category: {}", filter);
        }
        Command::Import { file } => {
            let count = app.import_file(&file).await?;
            println!("Quotes imported successfully! ({} added)", count);
        }
        Command::Export { dir } => {
            let path = app.export(dir.as_deref()).await?;
            println!("Exported to {}", path.display());
        }
        Command::Resolve => match app.resolve_conflicts().await? {
            Some(resolution) => println!("{} conflict(s) resolved with your versions", resolution.reverted),
            None => println!("No conflicts to resolve"),
        },
        Command::Status => {
            let status = app.status().await;
            println!("Quotes: {}", status.quotes);
            println!("Categories: {}", status.categories.join(", "));
            println!("Selected: {}", status.selected);
            println!("Pending conflicts: {}", status.pending_conflicts.len());
            for record in &status.pending_conflicts {
                println!("  {}", record);
            }
        }
        Command::Run | Command::GenerateConfig { .. } | Command::ValidateConfig => {
            return Err(ConsoleError::Config("Command handled before startup".to_string()));
        }
    }
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| ConsoleError::Config(format!("Failed to register SIGINT handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| ConsoleError::Config(format!("Failed to register SIGTERM handler: {}", e)))?;

        tokio::select! {
            _ = sigint.recv() => {
                debug!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                debug!("Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c()
            .await
            .map_err(|e| ConsoleError::Config(format!("Error waiting for Ctrl+C: {}", e)))?;

        debug!("Received Ctrl+C");
    }

    Ok(())
}

/// Generate a sample configuration file
async fn generate_sample_config(path: &str) -> Result<()> {
    let config = Config::default();

    config.save_to_file(path).await?;

    println!("Sample configuration file generated: {}", path);

    Ok(())
}
