use crate::metrics::Metrics;
use anyhow::Result;
use axum::{extract::State, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Serve the Prometheus `/metrics` exposition endpoint.
pub async fn serve(bind: &str, metrics: Arc<Metrics>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> String {
    metrics.encode()
}
