//! # MAVLink Wire Codec
//!
//! ## Purpose
//!
//! The protocol "rules" layer of the mavswitch workspace: frame envelopes for
//! MAVLink v1 and v2, the x25 checksum, and the pack/unpack driver that turns
//! payload bytes into typed messages and back. This crate knows nothing about
//! sockets or routing, and nothing about any concrete dialect: dialects plug
//! in through the [`Message`] / [`MessageData`] traits implemented by
//! generated code.
//!
//! ## Architecture Role
//!
//! ```text
//! mavswitch-dialect → [generated dialect crate] → mavswitch-codec → mavswitch-network
//!       ↑                      ↓                        ↓                 ↓
//!   XML schema          Typed messages           Frame envelopes      Transports
//!   Code generator      Dispatch tables          CRC validation       Reframing
//! ```
//!
//! ## What This Crate Does NOT Contain
//!
//! - Transport or socket management (belongs in `mavswitch-network`)
//! - Routing policy (belongs in `mavswitch-router`)
//! - Any concrete message definitions (generated into `mavswitch-common`)

pub mod crc;
pub mod error;
pub mod frame;
pub mod message;
pub mod wire;

pub use crc::{x25, X25};
pub use error::CodecError;
pub use frame::{decode, encode, envelope_total, Frame, MavVersion, MAV_STX_V1, MAV_STX_V2};
pub use message::{Destination, EntryParam, Message, MessageData};
