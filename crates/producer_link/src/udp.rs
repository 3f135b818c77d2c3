//! UDP/JSON producer transport
//!
//! One JSON object per datagram in both directions, tagged by `topic`.
//! Undecodable datagrams are logged and skipped.

use std::net::SocketAddr;

use contracts::{ProducerEvent, ProducerMessage};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

use crate::client::ProducerClient;
use crate::error::{ProducerLinkError, Result};

/// Largest UDP payload over IPv4.
const MAX_DATAGRAM: usize = 65_507;

pub struct UdpProducerClient {
    socket: UdpSocket,
    remote: SocketAddr,
    buf: Vec<u8>,
}

impl UdpProducerClient {
    /// Listen on `listen_addr` for events; send messages to `remote_addr`.
    #[instrument(name = "udp_producer_bind", skip_all, fields(listen = %listen_addr, remote = %remote_addr))]
    pub async fn bind(listen_addr: &str, remote_addr: &str) -> Result<Self> {
        let remote: SocketAddr = remote_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ProducerLinkError::invalid_address(remote_addr, e.to_string())
            })?;

        let socket = UdpSocket::bind(listen_addr)
            .await
            .map_err(|source| ProducerLinkError::Bind {
                addr: listen_addr.to_string(),
                source,
            })?;

        debug!(local = ?socket.local_addr().ok(), "producer link bound");

        Ok(Self {
            socket,
            remote,
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl ProducerClient for UdpProducerClient {
    fn name(&self) -> &str {
        "udp"
    }

    async fn recv_event(&mut self) -> Result<ProducerEvent> {
        loop {
            let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
            match serde_json::from_slice::<ProducerEvent>(&self.buf[..len]) {
                Ok(event) => return Ok(event),
                Err(e) => {
                    warn!(peer = %peer, bytes = len, error = %e, "undecodable producer datagram");
                }
            }
        }
    }

    async fn send(&mut self, message: &ProducerMessage) -> Result<()> {
        let data = serde_json::to_vec(message).map_err(|e| ProducerLinkError::Encode {
            topic: message.topic(),
            message: e.to_string(),
        })?;

        if data.len() > MAX_DATAGRAM {
            warn!(
                topic = message.topic(),
                size = data.len(),
                max = MAX_DATAGRAM,
                "message exceeds datagram size"
            );
        }

        let sent = self.socket.send_to(&data, self.remote).await?;
        debug!(topic = message.topic(), bytes = sent, "sent to producer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ControlValue;

    #[tokio::test]
    async fn rejects_bad_remote_address() {
        let result = UdpProducerClient::bind("127.0.0.1:0", "not-an-address").await;
        assert!(matches!(
            result,
            Err(ProducerLinkError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn exchanges_json_datagrams() {
        let producer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let producer_addr = producer.local_addr().unwrap().to_string();

        let mut client = UdpProducerClient::bind("127.0.0.1:0", &producer_addr)
            .await
            .unwrap();
        let client_addr = client.local_addr().unwrap();

        // garbage first; it must be skipped
        producer.send_to(b"not json", client_addr).await.unwrap();
        producer
            .send_to(
                br#"{"topic":"cartesian_position","data":[1,2,3,4,5,6]}"#,
                client_addr,
            )
            .await
            .unwrap();

        let event = client.recv_event().await.unwrap();
        assert_eq!(
            event,
            ProducerEvent::CartesianPosition {
                data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
            }
        );

        client
            .send(&ProducerMessage::MasterInfo(ControlValue::default()))
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let (len, _) = producer.recv_from(&mut buf).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(value["topic"], "master_info");
    }
}
