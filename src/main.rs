//! CLI entry point for the vector store service

use anyhow::Result;
use clap::{Parser, Subcommand};
use libvecdb::{Config, SearchConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "libvecdb")]
#[command(about = "In-memory vector store with exact k-NN search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, env = "LIBVECDB_ADDR", default_value = "0.0.0.0:3000")]
        addr: String,
        /// Require this value in the X-Key header
        #[arg(long, env = "LIBVECDB_API_KEY")]
        api_key: Option<String>,
        /// Seed for VP-tree construction, for reproducible tree shapes
        #[arg(long, env = "LIBVECDB_SEED")]
        seed: Option<u64>,
        /// Log filter used when RUST_LOG is unset
        #[arg(long, env = "LIBVECDB_LOG", default_value = "info")]
        log: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            api_key,
            seed,
            log,
        } => {
            let config = Config {
                addr,
                api_key,
                log_filter: log,
                search: SearchConfig { vptree_seed: seed },
            };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
                )
                .init();
            libvecdb::server::start(config).await
        }
    }
}
