//! # Connection Adapters
//!
//! ## Purpose
//!
//! One tokio task per transport endpoint, each turning raw bytes into
//! validated frames and frames back into raw bytes:
//!
//! - **udpin**: UDP listener; every remote peer becomes its own connection
//! - **udpout**: UDP socket aimed at a fixed remote
//! - **tcpout**: persistent outbound TCP stream with adapter-local reconnect
//! - **serial**: UART at a fixed baud, handle leased from a bounded pool
//!
//! Adapters communicate with the router exclusively through [`LinkEvent`]s
//! on a bounded channel and per-connection outbound byte channels. They
//! never learn routes and never inspect routing state: reframe, decode,
//! report, repeat.
//!
//! Stream transports (TCP, serial) share the [`framing::StreamParser`]
//! resynchronizing reframer; datagram transports assume one frame per
//! datagram and discard any remainder with a warning.

pub mod connection;
pub mod error;
pub mod framing;
pub mod pool;
pub mod serial;
mod stream;
pub mod tcp;
pub mod udp;

pub use connection::{Connection, ConnectionKey, EndpointKind, LinkEvent};
pub use error::NetworkError;
pub use framing::{decode_datagram, StreamParser};
pub use pool::{UartHandle, UartPool};
pub use serial::spawn_serial;
pub use tcp::spawn_tcp_out;
pub use udp::{spawn_udp_in, spawn_udp_out};
