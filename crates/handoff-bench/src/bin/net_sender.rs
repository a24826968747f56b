use handoff_core::{BenchConfig, NetConfig, run_benchmark};
use handoff_net::NetSender;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handoff_bench::init("handoff_bench=info,handoff_core=info,handoff_net=info,net_sender=info");

    let bench = BenchConfig::from_env()?;
    let config = NetConfig::from_env("net-svc")?;

    let mut sender = NetSender::new(&config)?;
    info!("Net sender: url={} timeout={:?}", sender.url(), config.timeout);

    let mut reporter = handoff_bench::reporter(&bench)?;
    let result = run_benchmark(&bench, &mut sender, &mut reporter).await;
    let (_, summary) = reporter.finish();
    info!(
        "Net benchmark done: {} ok, {} failed",
        summary.total_successes(),
        summary.total_failures()
    );

    result?;
    Ok(())
}
