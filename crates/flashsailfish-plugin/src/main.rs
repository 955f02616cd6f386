//! Flash Sailfish - Operator CLI
//!
//! Runs the plugin component outside the printer host, for inspecting the
//! firmware catalog and managing the manifest URL from a shell.

use anyhow::Result;
use clap::{Parser, Subcommand};
use flashsailfish_plugin::config::save_default_config;
use flashsailfish_plugin::{FileSettings, FlashSailfish, HttpFetcher, RefreshRequest};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "flashsailfish")]
#[command(about = "Sailfish firmware catalog for 3D printer control boards")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "flashsailfish.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the firmware catalog as JSON
    Catalog,
    /// List boards in manifest order
    Boards,
    /// Change the manifest URL
    SetSource {
        url: String,
    },
    /// Re-fetch the manifest, optionally from a new URL
    Refresh {
        #[arg(long)]
        url: Option<String>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so catalog output can be piped
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Flash Sailfish v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::InitConfig { force } => {
            if args.config.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite",
                    args.config.display()
                );
            }
            save_default_config(&args.config)?;
            println!("Wrote {}", args.config.display());
        }
        Command::Catalog => {
            let plugin = build_plugin(&args.config)?;
            let catalog = plugin.catalog().await?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Command::Boards => {
            let plugin = build_plugin(&args.config)?;
            let (catalog, report) = plugin.catalog_with_report().await?;
            let mut boards: Vec<_> = catalog.boards().collect();
            boards.sort_by_key(|b| b.index);

            for board in boards {
                println!(
                    "{:>3}  {}  ({} firmware)",
                    board.index,
                    board.name,
                    board.firmwares.len()
                );
            }
            if report.boards_skipped > 0 || report.firmwares_skipped > 0 {
                println!(
                    "Skipped {} malformed board(s) and {} malformed firmware entr(ies)",
                    report.boards_skipped, report.firmwares_skipped
                );
            }
            for name in &report.duplicate_boards {
                println!("Warning: board {:?} appears more than once, the last entry is shown", name);
            }
        }
        Command::SetSource { url } => {
            let plugin = build_plugin(&args.config)?;
            if plugin.set_source(&url).await? {
                println!("Manifest URL set to {}", url);
            } else {
                println!("Manifest URL already {}", url);
            }
        }
        Command::Refresh { url } => {
            let plugin = build_plugin(&args.config)?;
            let response = plugin.refresh_firmware_info(RefreshRequest { url }).await;
            if !response.is_success() {
                anyhow::bail!(response.body_text());
            }
            println!("{}", serde_json::to_string_pretty(&response.body)?);
        }
    }

    Ok(())
}

fn build_plugin(config_path: &Path) -> Result<FlashSailfish<HttpFetcher, FileSettings>> {
    let settings = FileSettings::load(config_path)?;
    let timeout = Duration::from_secs(settings.config().fetch.timeout_secs);
    Ok(FlashSailfish::new(HttpFetcher::new(timeout)?, settings))
}
