/// Process plumbing shared by the four benchmark binaries.

use std::io::{self, Stdout};

use handoff_core::{BenchConfig, Reporter};
use tracing::info;

/// Load `.env` and install the stderr subscriber. Stdout is reserved for
/// the CSV stream.
pub fn init(default_filter: &str) {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

/// CSV reporter on stdout, mirrored to `RESULTS_FILE` when configured.
pub fn reporter(config: &BenchConfig) -> io::Result<Reporter<Stdout>> {
    let reporter = Reporter::new(io::stdout())?;
    match &config.results_file {
        Some(path) => reporter.with_results_file(path),
        None => Ok(reporter),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
