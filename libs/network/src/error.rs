//! Adapter startup and I/O errors.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("serial port {device} is not attached: {source}")]
    PortNotAttached {
        device: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("serial port {0} is already checked out of the pool")]
    PortInUse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
