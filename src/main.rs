//! Book of Thoughts - topic service entry point

use anyhow::Result;
use book_of_thoughts::{AppState, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "thoughts")]
#[command(about = "Topic hierarchy service over a Neo4j knowledge graph")]
struct Cli {
    /// Path to a YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Reconcile topics from Neo4j into the shadow store
    Sync {
        /// Run even if a full sync completed recently
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,book_of_thoughts=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            book_of_thoughts::start_server(config).await
        }
        Commands::Sync { force } => run_sync(config, force).await,
    }
}

async fn run_sync(config: Config, force: bool) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Connected to databases");

    let outcome = state.topics.sync(force).await;
    if outcome.success {
        tracing::info!(
            "Sync complete: {} topics processed",
            outcome.records_processed
        );
        Ok(())
    } else {
        anyhow::bail!("{}", outcome.message)
    }
}
