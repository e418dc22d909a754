pub mod dns;
pub mod http;

use crate::config::Config;
use crate::controller::ControllerClient;
use crate::handler::DnsHandler;
use crate::index::EndpointIndex;
use crate::metrics::Metrics;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bootstrap the controller client and endpoint index, then run the DNS
/// and metrics servers concurrently until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let metrics = Arc::new(Metrics::new()?);

    let client = Arc::new(ControllerClient::new(
        &config.drove.endpoint,
        config.drove.auth(),
        config.drove.skip_ssl_check,
        metrics.clone(),
    )?);
    client.init().await?;
    info!("connected to drove controller and elected a leader");

    let shutdown = CancellationToken::new();
    let index = EndpointIndex::new(client, metrics.clone(), shutdown.clone()).await;
    let handler = DnsHandler::new(index, None);

    let dns_bind = config.server.dns_bind.clone();
    let metrics_bind = config.server.metrics_bind.clone();

    let dns_handle = tokio::spawn(async move {
        info!("DNS server starting on {}", dns_bind);
        dns::serve(&dns_bind, handler).await
    });

    let metrics_handle = tokio::spawn(async move {
        info!("metrics server starting on {}", metrics_bind);
        http::serve(&metrics_bind, metrics).await
    });

    tokio::select! {
        res = dns_handle => {
            shutdown.cancel();
            res??;
        }
        res = metrics_handle => {
            shutdown.cancel();
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    }

    Ok(())
}
