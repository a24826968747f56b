use std::net::SocketAddr;

use handoff_core::NetConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    handoff_bench::init("handoff_bench=info,handoff_net=info,net_receiver=info,tower_http=info");

    let config = NetConfig::from_env("0.0.0.0")?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    handoff_net::serve(listener, handoff_bench::shutdown_signal()).await?;

    Ok(())
}
