use anyhow::Result;
use drove_dns::{server, Config};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("drove-dns v{}", drove_dns::VERSION);

    let config = Config::load()?;
    info!(dns = %config.server.dns_bind, metrics = %config.server.metrics_bind, "configuration loaded");

    server::run(config).await?;

    Ok(())
}
