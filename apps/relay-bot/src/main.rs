//! File relay bot entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting file relay bot");

    // Load configuration. Any error here exits non-zero.
    let config = config::Config::load()?;
    tracing::info!(
        destination = %config.destination,
        chunk_size = config.chunk_size,
        staging = %config.staging_dir.display(),
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("bot shut down cleanly");
    Ok(())
}
