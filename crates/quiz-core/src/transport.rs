//! Byte-agnostic pipe underneath the quiz event channel.
//!
//! The adapter in `quiz-client` only ever moves whole `{"event","data"}` JSON
//! frames, one per message. It dials through a [`Connector`] on every attempt
//! (first connect and each backoff retry), splits the resulting [`Transport`]
//! and drives the halves from two tasks: a read loop feeding the subscriber
//! registry and a write loop draining queued [`ClientEvent`]s.
//!
//! [`ClientEvent`]: crate::protocol::ClientEvent

use std::future::Future;

use thiserror::Error;

/// Why a connect, read or write on the game channel failed.
///
/// Cloneable so the adapter can hand the same failure to both the
/// `disconnect` and the `error` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server end is gone; further writes cannot succeed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Dialing exceeded the configured connect timeout.
    #[error("connection timed out")]
    Timeout,

    /// Anything else reported by the socket or handshake, as text.
    #[error("{0}")]
    Io(String),
}

/// Inbound half: yields server frames until the link ends.
pub trait TransportReader: Send + 'static {
    /// Wait for the next server frame.
    ///
    /// `Ok(None)` means the server closed the link on purpose; `Err` means it
    /// broke. The adapter reports the two differently, so implementations
    /// must not fold one into the other.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

/// Outbound half: carries one serialized client event per call.
pub trait TransportWriter: Send + 'static {
    /// Write one frame. An error ends the connection.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// One established link to the game server.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    /// Hand out the halves; the adapter moves the writer into its own task.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Dials the game server. Kept by the adapter for its whole lifetime and
/// called again for every reconnection attempt, so it must be reusable.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Dial `url` (the server address with the namespace appended).
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}
