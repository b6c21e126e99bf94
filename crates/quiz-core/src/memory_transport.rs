//! In-process transport backed by channels.
//!
//! [`memory_channel`] returns a [`MemoryConnector`] for the client side and a
//! [`MemoryListener`] that yields one [`MemoryPeer`] (the server end) per
//! successful connect. Connect failures can be scripted with
//! [`MemoryConnector::fail_next`]. Dropping a peer closes the connection
//! cleanly from the client's point of view; [`MemoryPeer::fail`] breaks it
//! with a transport error instead.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::protocol::{ClientEvent, ProtocolError, ServerEvent, decode_client_frame};
use crate::transport::{Connector, Transport, TransportError, TransportReader, TransportWriter};

/// Create a connected connector/listener pair.
pub fn memory_channel() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let connector = MemoryConnector {
        accept_tx,
        failures: Arc::new(Mutex::new(VecDeque::new())),
    };
    (connector, MemoryListener { accept_rx })
}

/// Client-side connector.
#[derive(Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    failures: Arc<Mutex<VecDeque<TransportError>>>,
}

impl MemoryConnector {
    /// Make the next connect attempt fail with `err`. Calls queue up.
    pub fn fail_next(&self, err: TransportError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(err);
        }
    }

    fn next_failure(&self) -> Option<TransportError> {
        self.failures.lock().ok()?.pop_front()
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn connect(&self, _url: &str) -> Result<MemoryTransport, TransportError> {
        if let Some(err) = self.next_failure() {
            return Err(err);
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel::<Inbound>();
        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            incoming: to_server_rx,
            outgoing: to_client_tx,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| TransportError::Io("connection refused".to_string()))?;

        Ok(MemoryTransport {
            incoming: to_client_rx,
            outgoing: to_server_tx,
        })
    }
}

/// Server side of the pair: yields one peer per accepted connection.
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Take an already-established connection, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }
}

/// What the client reader sees next: a frame or a read failure.
type Inbound = Result<String, TransportError>;

/// Server end of one in-memory connection.
pub struct MemoryPeer {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<Inbound>,
}

impl MemoryPeer {
    /// Push a domain event to the client. Returns `false` if the client is gone.
    pub fn send(&self, event: &ServerEvent) -> bool {
        match event.to_frame() {
            Ok(frame) => self.send_raw(&frame),
            Err(_) => false,
        }
    }

    /// Push an arbitrary text frame to the client.
    pub fn send_raw(&self, frame: &str) -> bool {
        self.outgoing.send(Ok(frame.to_string())).is_ok()
    }

    /// Make the client's next read fail with `err`, after any frames already
    /// sent. Consumes the peer: the connection is unusable afterwards.
    pub fn fail(self, err: TransportError) -> bool {
        self.outgoing.send(Err(err)).is_ok()
    }

    /// Next decoded client event.
    pub async fn recv(&mut self) -> Option<Result<ClientEvent, ProtocolError>> {
        let frame = self.incoming.recv().await?;
        Some(decode_client_frame(&frame))
    }

    /// Next decoded client event without waiting.
    pub fn try_recv(&mut self) -> Option<Result<ClientEvent, ProtocolError>> {
        let frame = self.incoming.try_recv().ok()?;
        Some(decode_client_frame(&frame))
    }

}

/// Client end of one in-memory connection.
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<Inbound>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MemoryReader {
                incoming: self.incoming,
            },
            MemoryWriter {
                outgoing: self.outgoing,
            },
        )
    }
}

pub struct MemoryReader {
    incoming: mpsc::UnboundedReceiver<Inbound>,
}

impl TransportReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        self.incoming.recv().await.transpose()
    }
}

pub struct MemoryWriter {
    outgoing: mpsc::UnboundedSender<String>,
}

impl TransportWriter for MemoryWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.outgoing
            .send(text.to_string())
            .map_err(|_| TransportError::ConnectionClosed)
    }
}
