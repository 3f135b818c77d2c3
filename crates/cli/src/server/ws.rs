//! WebSocket halves as subscriber sink / command source.

use axum::extract::ws::{Message, WebSocket};
use contracts::{CommandSource, ContractError, SubscriberSink};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::trace;

/// Split an upgraded socket into independently owned halves.
pub fn split(socket: WebSocket, peer: String) -> (WsSink, WsSource) {
    let (tx, rx) = socket.split();
    (
        WsSink {
            peer: peer.clone(),
            tx,
        },
        WsSource { peer, rx },
    )
}

pub struct WsSink {
    peer: String,
    tx: SplitSink<WebSocket, Message>,
}

impl SubscriberSink for WsSink {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, payload: String) -> Result<(), ContractError> {
        self.tx
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| ContractError::connection(&self.peer, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.tx
            .close()
            .await
            .map_err(|e| ContractError::connection(&self.peer, e.to_string()))
    }
}

pub struct WsSource {
    peer: String,
    rx: SplitStream<WebSocket>,
}

impl CommandSource for WsSource {
    fn peer(&self) -> &str {
        &self.peer
    }

    /// Next text frame; binary frames carrying UTF-8 are accepted too.
    async fn recv(&mut self) -> Option<Result<String, ContractError>> {
        loop {
            match self.rx.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => trace!(peer = %self.peer, "non-UTF-8 binary frame ignored"),
                },
                Ok(Message::Close(_)) => return None,
                // ping / pong are answered by the transport
                Ok(_) => {}
                Err(e) => return Some(Err(ContractError::connection(&self.peer, e.to_string()))),
            }
        }
    }
}
