//! CareBridge CLI — the main entry point.
//!
//! Commands:
//! - `onboard`         — Write a starter config
//! - `chat`            — Interactive or single-message conversation
//! - `serve`           — Start the HTTP API server
//! - `ingest`          — Build the knowledge index from a reference text
//! - `import-records`  — Load discharge reports into the record store
//! - `status`          — Show configuration and data status

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "carebridge",
    about = "CareBridge — post-discharge patient assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Onboard,

    /// Talk to the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Split and index a reference text for retrieval
    Ingest {
        /// Plain-text reference material
        file: PathBuf,

        /// Where to write the index (defaults to [knowledge] index_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON array of discharge reports
    ImportRecords {
        file: PathBuf,
    },

    /// Show configuration and data status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ingest { file, output } => commands::ingest::run(&file, output).await?,
        Commands::ImportRecords { file } => commands::import_records::run(&file).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}

/// Console logging, plus a per-run log file when `[logging] dir` is set.
fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_dir = carebridge_config::AppConfig::load()
        .ok()
        .and_then(|config| config.logging.dir);
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let name = chrono::Local::now()
                .format("session_%Y%m%d_%H%M%S.log")
                .to_string();
            let file = std::fs::File::create(dir.join(name))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    Ok(())
}
