//! OSC transport over UDP

use super::traits::MessageTransport;
use crate::error::{ConfigError, Error, NsmError, Result};
use crate::osc::{self, OscMessage};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, trace, warn};

/// Largest datagram we accept
const MAX_PACKET_SIZE: usize = 65_507;

/// Encoded datagram waiting for the writer task
struct OutboundPacket {
    address: String,
    bytes: Vec<u8>,
}

/// Transport layer for NSM communication
/// Uses channels so sending never waits on the socket reader
pub struct UdpTransport {
    server_url: String,
    /// Channel to the socket writer task
    outbound_tx: mpsc::Sender<OutboundPacket>,
    /// Channel from the socket reader task
    inbound_rx: Mutex<mpsc::Receiver<OscMessage>>,
    reader_task: tokio::task::JoinHandle<()>,
    writer_task: tokio::task::JoinHandle<()>,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and start exchanging messages with the
    /// server at `server_url` (`osc.udp://host:port/`)
    pub async fn connect(server_url: &str) -> Result<Self> {
        let (host, port) = parse_server_url(server_url)?;

        let server_addr = tokio::net::lookup_host((host.as_str(), port))
            .await?
            .next()
            .ok_or_else(|| {
                Error::Config(ConfigError::InvalidServerUrl(format!(
                    "Could not resolve host: {}",
                    host
                )))
            })?;

        let unspecified = match server_addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = Arc::new(UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?);
        let local_addr = socket.local_addr()?;

        debug!(
            "OSC transport bound to {} (server {} at {})",
            local_addr, server_url, server_addr
        );

        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundPacket>(100);
        let (inbound_tx, inbound_rx) = mpsc::channel::<OscMessage>(100);

        let writer_task = tokio::spawn(Self::write_task(
            Arc::clone(&socket),
            server_addr,
            outbound_rx,
        ));
        let reader_task = tokio::spawn(Self::read_task(socket, inbound_tx));

        Ok(Self {
            server_url: server_url.to_string(),
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            reader_task,
            writer_task,
        })
    }

    /// Background task sending queued messages to the server
    async fn write_task(
        socket: Arc<UdpSocket>,
        server_addr: SocketAddr,
        mut rx: mpsc::Receiver<OutboundPacket>,
    ) {
        while let Some(packet) = rx.recv().await {
            if let Err(e) = socket.send_to(&packet.bytes, server_addr).await {
                // UDP is best-effort; a failed send is not fatal
                error!("Failed to send {} to {}: {}", packet.address, server_addr, e);
            }
        }
        debug!("OSC writer task ended");
    }

    /// Background task decoding received datagrams
    async fn read_task(socket: Arc<UdpSocket>, tx: mpsc::Sender<OscMessage>) {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    error!("Error reading OSC socket: {}", e);
                    break;
                }
            };

            match osc::decode(&buf[..len]) {
                Ok(message) => {
                    trace!("Received OSC from {}: {}", src, message);
                    if tx.send(message).await.is_err() {
                        debug!("Inbound channel closed");
                        break;
                    }
                }
                Err(e) => {
                    warn!("Dropping undecodable packet from {} ({} bytes): {}", src, len, e);
                }
            }
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[async_trait]
impl MessageTransport for UdpTransport {
    fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn send(&self, message: OscMessage) -> Result<()> {
        trace!("Queueing OSC for {}: {}", self.server_url, message);
        let packet = OutboundPacket {
            bytes: osc::encode(&message)?,
            address: message.address,
        };

        // the writer task only stops when the transport is dropped
        self.outbound_tx
            .send(packet)
            .await
            .map_err(|_| Error::Nsm(NsmError::TransportClosed))
    }

    async fn recv(&self) -> Option<OscMessage> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }
}

/// Split an `osc.udp://host:port/` URL into host and port
pub fn parse_server_url(url: &str) -> Result<(String, u16)> {
    let invalid = || Error::Config(ConfigError::InvalidServerUrl(url.to_string()));

    let rest = url.trim().strip_prefix("osc.udp://").ok_or_else(invalid)?;
    let authority = rest.split('/').next().unwrap_or_default();

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        // [v6addr]:port
        let (host, port) = bracketed.split_once("]:").ok_or_else(invalid)?;
        (host, port)
    } else {
        authority.rsplit_once(':').ok_or_else(invalid)?
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_server_url() {
        assert_eq!(
            parse_server_url("osc.udp://localhost:18440/").unwrap(),
            ("localhost".to_string(), 18440)
        );
        assert_eq!(
            parse_server_url("osc.udp://127.0.0.1:7777").unwrap(),
            ("127.0.0.1".to_string(), 7777)
        );
        assert_eq!(
            parse_server_url("osc.udp://[::1]:9000/").unwrap(),
            ("::1".to_string(), 9000)
        );
    }

    #[test]
    fn test_parse_server_url_invalid() {
        for url in [
            "",
            "http://localhost:80/",
            "osc.udp://localhost/",
            "osc.udp://:1234/",
            "osc.udp://host:notaport/",
            "osc.tcp://host:1234/",
        ] {
            let err = parse_server_url(url).unwrap_err();
            assert!(
                matches!(err, Error::Config(ConfigError::InvalidServerUrl(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[tokio::test]
    async fn test_udp_exchange_with_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let url = format!("osc.udp://127.0.0.1:{}/", server.local_addr().unwrap().port());

        let transport = UdpTransport::connect(&url).await.unwrap();
        assert_eq!(transport.server_url(), url);

        transport
            .send(OscMessage::new("/nsm/client/label").with_arg("hello"))
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, src) = tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let received = osc::decode(&buf[..len]).unwrap();
        assert_eq!(received.address, "/nsm/client/label");
        assert_eq!(received.str_arg(0), Some("hello"));

        // garbage is dropped, the following valid message still arrives
        server.send_to(b"not osc", src).await.unwrap();
        let reply = OscMessage::new("/nsm/client/save");
        server.send_to(&osc::encode(&reply).unwrap(), src).await.unwrap();

        let inbound = tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .unwrap();
        assert_eq!(inbound, Some(reply));
    }
}
