use handoff_core::{BenchConfig, FsConfig, run_benchmark};
use handoff_fs::FsWriter;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handoff_bench::init("handoff_bench=info,handoff_core=info,handoff_fs=info,fs_writer=info");

    // Fail fast on bad config before touching the shared directory.
    let bench = BenchConfig::from_env()?;
    let config = FsConfig::from_env()?;
    info!(
        "File writer: dir={} fsync={} ack_timeout={:?}",
        config.data_dir.display(),
        config.fsync,
        config.ack_timeout
    );

    let mut writer = FsWriter::new(&config, bench.storage_medium.clone());
    writer.wait_for_reader().await?;

    let mut reporter = handoff_bench::reporter(&bench)?;
    let result = run_benchmark(&bench, &mut writer, &mut reporter).await;
    let (_, summary) = reporter.finish();
    info!(
        "File benchmark done: {} ok, {} failed",
        summary.total_successes(),
        summary.total_failures()
    );

    result?;
    Ok(())
}
