//! Wallflow entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wallflow::favorites::FavoritesStore;
use wallflow::{cache, AppConfig, AppState, DirFavorites};

#[derive(Debug, Parser)]
#[command(name = "wallflow")]
#[command(about = "Scheduled wallpaper rotation backed by wallhaven.cc", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the rotation schedule until interrupted
    Run,
    /// Rotate every surface once and exit
    Once,
    /// Prune the wallpaper cache down to the retention limit
    Prune,
    /// Manage the favorites store
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommands,
    },
}

#[derive(Debug, Subcommand)]
enum FavoritesCommands {
    /// Copy an image into the favorites store
    Add {
        /// Image file to promote
        path: PathBuf,
    },
    /// List favorite images, newest first
    List,
    /// Remove one favorite by file name
    Remove {
        /// File name inside the favorites directory
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("wallflow=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => AppConfig::load_from(path.clone())?,
        None => AppConfig::load()?,
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Once => once(config).await,
        Commands::Prune => prune(&config),
        Commands::Favorites { command } => favorites(&config, command),
    }
}

/// Runs the schedule in the foreground until Ctrl-C.
async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Wallflow v{}", env!("CARGO_PKG_VERSION"));

    let mut state = AppState::new(config)?;
    state.engine.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping");
    state.engine.stop().await;
    Ok(())
}

/// One rotation pass outside the schedule.
async fn once(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let report = state.engine.rotate_once().await;
    println!("{}", report.summary());
    Ok(())
}

fn prune(config: &AppConfig) -> anyhow::Result<()> {
    let dir = config.cache_dir()?;
    cache::prune(&dir, config.storage.keep_per_prefix);
    println!("Pruned cache at {}", dir.display());
    Ok(())
}

fn favorites(config: &AppConfig, command: FavoritesCommands) -> anyhow::Result<()> {
    let store = DirFavorites::new(config.favorites_dir()?);
    match command {
        FavoritesCommands::Add { path } => {
            let dest = store.add(&path)?;
            println!("Added {}", dest.display());
        }
        FavoritesCommands::List => {
            for path in store.list() {
                println!("{}", path.display());
            }
        }
        FavoritesCommands::Remove { name } => {
            store.remove(&name)?;
            println!("Removed {}", name);
        }
    }
    Ok(())
}
