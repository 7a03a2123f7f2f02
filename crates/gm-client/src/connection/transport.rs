//! Transport seam
//!
//! The connection manager only needs a sink of outbound text frames and a
//! stream of inbound ones. [`WsConnector`] provides them over a WebSocket;
//! tests plug in an in-memory connector instead.

use std::pin::Pin;

use async_trait::async_trait;
use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use gm_core::ConnectionError;

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;

/// Inbound half of a connection. Ends (or yields an error) when the
/// connection is lost.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ConnectionError>> + Send>>;

/// Opens one full-duplex connection to the device
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Attempt a single connection
    async fn connect(&self) -> Result<(FrameSink, FrameStream), ConnectionError>;

    /// Where this connector points, for logging
    fn endpoint(&self) -> String;
}

/// WebSocket connector for the controller's `/ws` endpoint
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for `url` (e.g. `ws://gaggimate.local/ws`)
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), ConnectionError> {
        tracing::debug!("Opening WebSocket to {}", self.url);
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ConnectionError::ConnectionRefused(e.to_string()))?;

        let (ws_sink, ws_stream) = ws.split();

        let sink = ws_sink
            .sink_map_err(|e| ConnectionError::ConnectionLost(e.to_string()))
            .with(|frame: String| future::ready(Ok::<_, ConnectionError>(WsMessage::Text(frame))));

        let stream = ws_stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(WsMessage::Text(text)) => Some(Ok(text)),
                Ok(WsMessage::Close(frame)) => {
                    tracing::debug!("Device sent close frame: {:?}", frame);
                    Some(Err(ConnectionError::Closed))
                }
                Ok(WsMessage::Binary(data)) => {
                    tracing::trace!("Ignoring {} byte binary frame", data.len());
                    None
                }
                // WebSocket-level ping/pong is answered by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(ConnectionError::ConnectionLost(e.to_string()))),
            })
        });

        let sink: FrameSink = Box::pin(sink);
        let stream: FrameStream = Box::pin(stream);
        Ok((sink, stream))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}
