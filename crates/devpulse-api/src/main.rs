use anyhow::Context;
use devpulse_api::Server;
use devpulse_core::{ConfigManager, LoggingConfig};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "devpulse_api={level},devpulse_insights={level},devpulse_ai={level},devpulse_store={level},tower_http=info",
            level = logging.level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("failed to load configuration")?;
    init_tracing(&manager.config().logging);

    let server_cfg = &manager.config().server;
    let addr: SocketAddr = format!("{}:{}", server_cfg.host, server_cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", server_cfg.host, server_cfg.port))?;

    if let Some(path) = manager.config_path() {
        info!(config_file = %path.display(), "Using configuration file");
    }

    let server = Server::new(addr, manager.config())
        .await
        .context("failed to initialise server")?;
    server.run().await?;
    Ok(())
}
