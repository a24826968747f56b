use std::sync::atomic::Ordering;

use handoff_core::FsConfig;
use handoff_fs::Reader;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handoff_bench::init("handoff_bench=info,handoff_fs=info,fs_reader=info");

    let config = FsConfig::from_env()?;
    info!(
        "File reader: dir={} chunk_size={}",
        config.data_dir.display(),
        config.chunk_size
    );

    let reader = Reader::new(&config);
    let stats = reader.stats();
    reader.run_until(handoff_bench::shutdown_signal()).await?;

    info!(
        "Reader exiting: consumed={} bytes={} failures={} watch_restarts={}",
        stats.consumed.load(Ordering::Relaxed),
        stats.bytes_drained.load(Ordering::Relaxed),
        stats.failures.load(Ordering::Relaxed),
        stats.watch_restarts.load(Ordering::Relaxed),
    );
    Ok(())
}
