use crate::handler::DnsHandler;
use anyhow::Result;
use hickory_server::ServerFuture;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};

const TCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve DNS queries over UDP and TCP on `bind` until the server future
/// completes (driven by socket errors, since there is no graceful-stop
/// hook on `ServerFuture` itself).
pub async fn serve(bind: &str, handler: DnsHandler) -> Result<()> {
    let mut server = ServerFuture::new(handler);

    let udp = UdpSocket::bind(bind).await?;
    server.register_socket(udp);

    let tcp = TcpListener::bind(bind).await?;
    server.register_listener(tcp, TCP_TIMEOUT);

    server.block_until_done().await?;
    Ok(())
}
