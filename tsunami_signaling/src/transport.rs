//! Signaling transport
//!
//! The client writes through a [`SignalSink`] and reads a stream of text
//! frames. [`connect`] provides both over a WebSocket.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, SplitSink};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::config::ReconnectConfig;
use crate::error::TransportError;

/// Inbound text frames, in the order the server sent them
pub type InboundFrames = BoxStream<'static, Result<String, TransportError>>;

/// Outbound half of the signaling connection
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a signaling WebSocket
pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SignalSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Open a WebSocket to the signaling server
pub async fn connect(url: &str) -> Result<(WsSink, InboundFrames), TransportError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    info!(url, "connected to signaling server");

    let (sink, stream) = socket.split();
    let frames = stream
        .filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
                // Control and binary frames carry no envelopes
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::WebSocket(e.to_string()))),
            }
        })
        .boxed();

    Ok((WsSink { inner: sink }, frames))
}

/// [`connect`], retrying with exponential backoff while `reconnect` allows
pub async fn connect_with_backoff(
    url: &str,
    reconnect: &ReconnectConfig,
) -> Result<(WsSink, InboundFrames), TransportError> {
    let max_attempts = if reconnect.enabled {
        reconnect.max_attempts.max(1)
    } else {
        1
    };

    let mut attempt = 1;
    loop {
        match connect(url).await {
            Ok(connection) => return Ok(connection),
            Err(err) if attempt < max_attempts => {
                let delay = reconnect.delay_for(attempt);
                warn!(url, attempt, ?delay, error = %err, "signaling connect failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
