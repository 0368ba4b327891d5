//! Main entry point for the packserve binary.

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use packserve::{Cli, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the -v / -q level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.log_level().into())
                .from_env_lossy(),
        )
        .init();

    let config = cli.serve_config();
    let app = match server::router(&config).await {
        Ok(app) => app,
        Err(err) if !cli.strict => {
            warn!(
                archive = %config.path.display(),
                "{err:#}; falling back to directory {}",
                config.directory().display()
            );
            server::directory_router(&config.directory())
        }
        Err(err) => return Err(err),
    };

    let listener = TcpListener::bind(cli.listen).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
