//! Connection records and the adapter → router event protocol.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use mavswitch_codec::{CodecError, Frame};
use tokio::sync::mpsc;
use tracing::warn;

/// Depth of each connection's outbound raw-frame queue.
pub(crate) const OUTBOUND_QUEUE: usize = 128;

/// Stable identity of one routable connection, e.g.
/// `udpin:0.0.0.0:14550/peer:10.0.0.2:52011` or `tcpout:10.0.0.5:5760`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey(Arc<str>);

impl ConnectionKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionKey {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

/// Transport variant behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    UdpPeer,
    UdpOut,
    TcpOut,
    Serial,
}

/// A live, routable connection: its identity plus the bounded channel that
/// feeds its adapter's write path. The router forwards raw frames here and
/// never blocks on a slow link.
#[derive(Debug, Clone)]
pub struct Connection {
    key: ConnectionKey,
    kind: EndpointKind,
    outbound: mpsc::Sender<Bytes>,
}

impl Connection {
    pub fn new(key: ConnectionKey, kind: EndpointKind, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            key,
            kind,
            outbound,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Hand a raw encoded frame to the adapter's write path. Returns false
    /// when the link is saturated or gone; the frame is dropped either way.
    pub fn forward(&self, raw: Bytes) -> bool {
        match self.outbound.try_send(raw) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(key = %self.key, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Events adapters emit into the router's inbox.
#[derive(Debug)]
pub enum LinkEvent<M> {
    /// A connection became usable (or re-registered after reconnect).
    Connected(Connection),
    /// A connection went away; stream adapters will retry on their own.
    Disconnected(ConnectionKey),
    /// A validated inbound frame.
    Frame {
        key: ConnectionKey,
        frame: Frame<M>,
    },
    /// A frame-level error local to this connection.
    FrameError {
        key: ConnectionKey,
        error: CodecError,
    },
}
