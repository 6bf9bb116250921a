use mcp::Server;
use provider::{ClickHouse, ProviderConfig, Result, Toolbox};
use tracing_subscriber::EnvFilter;

const INSTRUCTIONS: &str = "Tools for exploring and loading data into a ClickHouse database. \
Every tool returns {\"status\": \"success\", \"data\": ...} or {\"status\": \"error\", \"message\": ...}.";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = %e, "server stopped");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = ProviderConfig::from_env()?;
    let db = ClickHouse::new(&config.database)?;
    db.ping().await?;
    tracing::info!(database = %db, import_dir = %config.import_dir.display(), "connected");

    let toolbox = Toolbox::new(db, config.import_dir);
    Server::new("quarry", env!("CARGO_PKG_VERSION"), toolbox)
        .with_instructions(INSTRUCTIONS)
        .serve_stdio()
        .await?;
    Ok(())
}
