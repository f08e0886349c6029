use std::time::Duration;

use tracing_subscriber::EnvFilter;

use wirehttp::app::DemoHandler;
use wirehttp::config::Config;
use wirehttp::proxy::Upstream;
use wirehttp::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let upstream = Upstream::new(
        &cfg.upstream_base,
        Duration::from_millis(cfg.upstream_connect_timeout_ms),
    )?;

    let mut handle =
        server::serve_with_limit(&cfg.listen_addr, DemoHandler::new(upstream), cfg.max_connections)
            .await?;
    tracing::info!("Server started on {}", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    handle.close().await?;
    tracing::info!("Server gracefully stopped");

    Ok(())
}
