use clap::{Parser, Subcommand};
use recrop::{Config, Storage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recrop")]
#[command(about = "Maintenance commands for the recrop crop cache")]
#[command(long_about = "\
Maintenance commands for the recrop crop cache

Crops are generated lazily by the serving application and live until
explicitly deleted. This binary covers the operator side: bulk-deleting
crops from the crops store, optionally narrowed by a regex and optionally
as a dry run.

Sources are never touched; only files matching the crop grammar whose
source image still exists are considered.")]
#[command(version)]
struct Cli {
    /// Config file (falls back to built-in defaults if absent)
    #[arg(long, default_value = "recrop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete ALL crops from the crops store
    Purge {
        /// Regex whitelisting matching crop paths (case-insensitive)
        #[arg(long)]
        filter: Option<String>,

        /// Only report the crops that would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Command::Purge { filter, dry_run } => {
            let storage = Storage::from_config(&config);
            for path in storage.delete_all_crops(filter.as_deref(), dry_run)? {
                println!("{} {}", path, if dry_run { "not deleted" } else { "deleted" });
            }
        }
    }

    Ok(())
}
