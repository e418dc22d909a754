use drove_dns::controller::ControllerClient;
use drove_dns::handler::DnsHandler;
use drove_dns::index::EndpointIndex;
use drove_dns::metrics::Metrics;
use drove_dns::transport::AuthConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A controller that answers pings but whose endpoints listing is broken
/// leaves the index permanently unpopulated, and the handler must report
/// not-ready rather than serving an empty answer.
#[tokio::test]
async fn handler_is_not_ready_until_the_first_apps_sync_succeeds() {
    let mut server = mockito::Server::new_async().await;
    let _ping = server.mock("GET", "/apis/v1/ping").with_status(200).create_async().await;
    let _apps = server
        .mock("GET", "/apis/v1/endpoints")
        .with_status(500)
        .create_async()
        .await;

    let metrics = Arc::new(Metrics::new().unwrap());
    let client = Arc::new(
        ControllerClient::new(&server.url(), AuthConfig::None, false, metrics.clone()).unwrap(),
    );
    client.init().await.unwrap();

    let index = EndpointIndex::new(client, metrics, CancellationToken::new()).await;
    let handler = DnsHandler::new(index, None);

    assert!(!handler.ready().await);
}

#[tokio::test]
async fn handler_becomes_ready_once_apps_are_synced() {
    let mut server = mockito::Server::new_async().await;
    let _ping = server.mock("GET", "/apis/v1/ping").with_status(200).create_async().await;
    let _apps = server
        .mock("GET", "/apis/v1/endpoints")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"ok","message":"ok","data":[]}"#)
        .create_async()
        .await;

    let metrics = Arc::new(Metrics::new().unwrap());
    let client = Arc::new(
        ControllerClient::new(&server.url(), AuthConfig::None, false, metrics.clone()).unwrap(),
    );
    client.init().await.unwrap();

    let index = EndpointIndex::new(client, metrics, CancellationToken::new()).await;
    let handler = DnsHandler::new(index, None);

    assert!(handler.ready().await);
}
