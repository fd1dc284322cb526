use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::config::{GateConfig, NetLocation};
use crate::http::RequestHead;
use crate::trusted_hosts::TrustedHosts;

const READ_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// The current trust snapshot for a gate. The watcher swaps in a fresh
/// `Arc<TrustedHosts>` on config changes; connections clone the inner `Arc`
/// once per request so a check never sees a half-updated configuration.
pub type SharedTrustedHosts = Arc<RwLock<Arc<TrustedHosts>>>;

pub struct Gate {
    bind_address: SocketAddr,
    target: NetLocation,
    tcp_nodelay: bool,
    trusted_hosts: SharedTrustedHosts,
}

impl Gate {
    pub fn new(config: &GateConfig) -> std::io::Result<Self> {
        let target = config.target.clone().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("gate {} has no target address", config.bind_address),
            )
        })?;
        Ok(Self {
            bind_address: config.bind_address,
            target,
            tcp_nodelay: config.tcp_nodelay,
            trusted_hosts: Arc::new(RwLock::new(Arc::new(TrustedHosts::from_config(config)))),
        })
    }

    /// Handle for the config watcher to swap in refreshed snapshots.
    pub fn trusted_hosts(&self) -> SharedTrustedHosts {
        self.trusted_hosts.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_address).await?;
        info!("Listening: {} -> {}", listener.local_addr()?, &self.target);

        let target = Arc::new(self.target);
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept failed: {:?}", e);
                    continue;
                }
            };

            let target = target.clone();
            let trusted_hosts = self.trusted_hosts.clone();
            let tcp_nodelay = self.tcp_nodelay;
            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, addr, &target, trusted_hosts, tcp_nodelay).await
                {
                    debug!("Connection from {} finished with error: {:?}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    target: &NetLocation,
    trusted_hosts: SharedTrustedHosts,
    tcp_nodelay: bool,
) -> std::io::Result<()> {
    let head = timeout(READ_HEAD_TIMEOUT, RequestHead::read_from(&mut stream))
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out reading request head",
            )
        })??;

    let snapshot = trusted_hosts.read().clone();
    let admitted = match head.host() {
        Some(host) => snapshot.is_trusted_domain(host),
        None => false,
    };

    if !admitted {
        warn!(
            "Rejecting untrusted host from {}: {:?}",
            addr.ip(),
            head.host().unwrap_or("<no host header>")
        );
        return write_untrusted_response(&mut stream).await;
    }

    debug!(
        "Admitted {} from {}: {}",
        // admitted implies the Host header was present
        head.host().unwrap_or_default(),
        addr.ip(),
        head.request_line()
    );

    let mut target_stream = TcpStream::connect((target.address.as_str(), target.port)).await?;
    if tcp_nodelay {
        target_stream.set_nodelay(true)?;
        stream.set_nodelay(true)?;
    }

    target_stream.write_all(&head.to_bytes()).await?;
    if !head.unparsed_data().is_empty() {
        target_stream.write_all(head.unparsed_data()).await?;
    }

    tokio::io::copy_bidirectional(&mut stream, &mut target_stream)
        .await
        .map(|_| ())
}

async fn write_untrusted_response(stream: &mut TcpStream) -> std::io::Result<()> {
    const BODY: &str = "untrusted domain\n";
    let response = format!(
        "HTTP/1.1 400 Bad Request\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        BODY.len(),
        BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
