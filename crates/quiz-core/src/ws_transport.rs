//! WebSocket transport for native targets, built on `tokio-tungstenite`.
//!
//! The game server is usually configured by its HTTP address, so
//! [`WsConnector`] maps `http`/`https` onto `ws`/`wss` before dialing.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::transport::{Connector, Transport, TransportError, TransportReader, TransportWriter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Rewrite a server address into a WebSocket URL.
///
/// `ws://` and `wss://` pass through; `http://` and `https://` are mapped to
/// them. Anything else is rejected before a socket is opened.
pub fn websocket_url(url: &str) -> Result<String, TransportError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| TransportError::Io(format!("missing scheme in `{url}`")))?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(TransportError::Io(format!("unsupported scheme `{other}`")));
        }
    };
    if rest.is_empty() {
        return Err(TransportError::Io(format!("missing host in `{url}`")));
    }
    Ok(format!("{ws_scheme}://{rest}"))
}

/// Dials the game server over WebSocket. Stateless, so one instance serves
/// every reconnection.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport, TransportError> {
        let url = websocket_url(url)?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(WsTransport { stream })
    }
}

/// An open WebSocket connection.
pub struct WsTransport {
    stream: WsStream,
}

impl Transport for WsTransport {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = self.stream.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl TransportReader for WsReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message.map_err(|e| TransportError::Io(e.to_string()))? {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Close(_) => return Ok(None),
                // Game events only travel as text.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}

pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl TransportWriter for WsWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed => {
                    TransportError::ConnectionClosed
                }
                other => TransportError::Io(other.to_string()),
            })
    }
}
