// ============================
// quickbite-client-lib/src/realtime/transport.rs
// ============================
//! Realtime transport seam and its tokio-tungstenite implementation.

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::AppError;
use quickbite_common::{ClientFrame, ServerFrame};

/// Write half of a realtime connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: ClientFrame) -> Result<(), AppError>;
    /// Best-effort close; errors are irrelevant at teardown
    async fn close(&mut self);
}

/// Read half of a realtime connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound frame; `None` once the connection is gone
    async fn next(&mut self) -> Option<Result<ServerFrame, AppError>>;
}

/// Dials the realtime endpoint and authenticates the socket.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a connection and send the `auth` frame as the first message
    async fn connect(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), AppError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `RealtimeTransport` over a websocket carrying JSON text frames.
pub struct WsTransport;

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

struct WsFrames {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn connect(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), AppError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;
        let (sink, stream) = socket.split();

        let mut sink = WsSink { inner: sink };
        sink.send(ClientFrame::Auth {
            token: access_token.to_string(),
        })
        .await?;

        Ok((Box::new(sink), Box::new(WsFrames { inner: stream })))
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: ClientFrame) -> Result<(), AppError> {
        let json = serde_json::to_string(&frame)?;
        self.inner
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| AppError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next(&mut self) -> Option<Result<ServerFrame, AppError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(frame) => return Some(Ok(frame)),
                        Err(e) => {
                            // Events this client does not model are skipped,
                            // not fatal
                            debug!(error = %e, "ignoring unrecognized realtime frame");
                        },
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}, // ping/pong/binary
                Err(e) => return Some(Err(AppError::Transport(e.to_string()))),
            }
        }
    }
}
