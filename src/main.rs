//! # apidex CLI
//!
//! Thin driver around the schema cache: loads the configured source list,
//! refreshes it, and prints query results as JSON on stdout. Logs go to
//! stderr (`RUST_LOG` controls verbosity).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `apidex refresh` | Fetch and normalize every configured source, print the per-source report |
//! | `apidex list [--source <name>]` | List cached resources (names, kinds, summaries) |
//! | `apidex detail <resource> [--source <name>]` | Full detail for one resource name |
//!
//! The source list comes from the `API_SOURCES` environment variable or a
//! `--sources <file>` JSON file:
//!
//! ```bash
//! export API_SOURCES='[{"name":"petstore","dialect":"rest","path":"./petstore.yaml"}]'
//! apidex list
//! apidex detail "GET /pets"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apidex::cache::SchemaCache;
use apidex::config;
use apidex::manager::CacheManager;

#[derive(Parser)]
#[command(
    name = "apidex",
    about = "Schema-aggregation cache for OpenAPI, GraphQL, and gRPC sources",
    version
)]
struct Cli {
    /// Path to a JSON source list (defaults to the API_SOURCES env var).
    #[arg(long, global = true)]
    sources: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and normalize all configured sources.
    Refresh,
    /// List cached resources.
    List {
        /// Restrict to one source name.
        #[arg(long)]
        source: Option<String>,
    },
    /// Show full detail for one resource name.
    Detail {
        /// Resource name, e.g. "GET /users" or "UserService.GetUser".
        resource: String,
        /// Restrict to one source name.
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sources = config::load_sources(cli.sources.as_deref())?;
    let manager = CacheManager::new(sources, Arc::new(SchemaCache::new()));

    match cli.command {
        Command::Refresh => {
            let report = manager.refresh_all().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List { source } => {
            manager.refresh_all().await;
            let listings = manager.list_docs(source.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&listings)?);
        }
        Command::Detail { resource, source } => {
            manager.refresh_all().await;
            let details = manager.find_details(&resource, source.as_deref());
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
    }

    Ok(())
}
