//! Error types for the client crate.
//!
//! [`ClientError`] is returned synchronously from action methods.
//! [`ChannelError`] never crosses a call boundary: the channel adapter wraps
//! asynchronous failures in it and delivers them to subscribers as `error`
//! events.

use quiz_core::transport::TransportError;
use thiserror::Error;

/// Errors returned by client actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// An action required a live connection and there was none.
    #[error("socket not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Asynchronous failures reported through the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Opening the transport failed (`connect_error`).
    #[error("connect error: {0}")]
    ConnectFailed(TransportError),

    /// An established connection failed while reading or writing.
    #[error("connection lost: {0}")]
    ConnectionLost(TransportError),

    /// The server sent a frame that did not decode.
    #[error("malformed server frame: {0}")]
    MalformedFrame(String),

    /// Automatic reconnection gave up.
    #[error("Max reconnection attempts reached ({attempts})")]
    ReconnectExhausted { attempts: u32 },
}
