//! Ersatz - CLI Entry Point

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ersatz::{FixtureDocument, MockServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "ersatz",
    about = "Fixture-driven mock HTTP server",
    version
)]
struct Args {
    /// Fixtures file (YAML or JSON). Without one, fixtures are accepted once
    /// on POST /__ersatz/fixtures
    #[arg(value_name = "FILE", env = "ERSATZ_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8081)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, env = "ERSATZ_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Validate the fixtures file and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let builder = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false);
    match args.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    // Load fixtures
    let document = match &args.fixtures {
        Some(path) => {
            info!(path = %path.display(), "Loading fixtures");
            let document = FixtureDocument::from_file(path)
                .with_context(|| format!("Failed to load fixtures from {}", path.display()))?;
            Some(document)
        }
        None if args.validate => anyhow::bail!("No fixtures file given to validate"),
        None => None,
    };

    // Validate and exit if requested
    if args.validate {
        if let Some(document) = document {
            let summary = document.summary();
            ersatz::RouteTable::build(document)?;
            println!("Fixtures are valid ({summary})");
        }
        return Ok(());
    }

    let server = match document {
        Some(document) => MockServer::with_document(document)?,
        None => {
            info!(
                endpoint = ersatz::server::CONFIGURE_PATH,
                "No fixtures file given, waiting for configuration"
            );
            MockServer::new()
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let server = Arc::new(server);
    tokio::select! {
        result = Arc::clone(&server).serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    if let Some(stats) = server.stats() {
        info!(
            total = stats.total,
            matched = stats.matched,
            unmatched = stats.unmatched,
            not_found = stats.not_found,
            "Request totals"
        );
    }

    Ok(())
}
