//! Dialect-facing traits and the routing destination model.
//!
//! Generated dialect code implements [`MessageData`] once per message and
//! [`Message`] on the dialect's message enum; everything else in the
//! workspace is generic over [`Message`].

use bytes::BytesMut;

use crate::error::CodecError;

/// Where a message is addressed, derived from its `target_system` /
/// `target_component` fields. 0 is the wildcard in both positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// No target constraint: deliver to every link.
    Broadcast,
    /// Addressed to every component of one system.
    System(u8),
    /// Addressed to a component id on any system.
    Component(u8),
    /// Addressed to one component of one system.
    SystemComponent(u8, u8),
}

impl Destination {
    /// Classify a `(target_system, target_component)` pair.
    pub fn of(target_system: u8, target_component: u8) -> Self {
        match (target_system, target_component) {
            (0, 0) => Self::Broadcast,
            (s, 0) => Self::System(s),
            (0, c) => Self::Component(c),
            (s, c) => Self::SystemComponent(s, c),
        }
    }

    /// The raw `(target_system, target_component)` pair, wildcards as 0.
    pub fn raw(&self) -> (u8, u8) {
        match *self {
            Self::Broadcast => (0, 0),
            Self::System(s) => (s, 0),
            Self::Component(c) => (0, c),
            Self::SystemComponent(s, c) => (s, c),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }
}

/// A dialect message set: the enum of every message the dialect defines,
/// plus the id-keyed dispatch tables the codec drives.
pub trait Message: Clone + Send + Sync + Sized + 'static {
    fn message_id(&self) -> u32;

    fn message_name(&self) -> &'static str;

    /// Routing destination carried in the payload. Messages without target
    /// fields are broadcast.
    fn destination(&self) -> Destination;

    /// Serialize the full, untruncated payload in wire order (non-extension
    /// fields sorted by decreasing primitive size, then extensions in
    /// declaration order).
    fn pack_payload(&self, buf: &mut BytesMut);

    /// Rebuild a message from a payload that has already been zero-extended
    /// to [`Message::wire_size`].
    fn unpack_payload(id: u32, payload: &[u8]) -> Result<Self, CodecError>;

    /// CRC_EXTRA constant for a message id, `None` for ids outside the
    /// dialect.
    fn crc_extra(id: u32) -> Option<u8>;

    /// Full payload size including extension fields.
    fn wire_size(id: u32) -> Option<usize>;

    /// Payload size excluding extension fields (the v1 payload size).
    fn base_wire_size(id: u32) -> Option<usize>;

    fn name_of(id: u32) -> Option<&'static str>;
}

/// Per-message constants and codec entry points, implemented by generated
/// code for each message struct.
pub trait MessageData: Clone + Sized {
    const ID: u32;
    const NAME: &'static str;
    const CRC_EXTRA: u8;
    /// Full payload size including extension fields.
    const WIRE_SIZE: usize;
    /// Payload size excluding extension fields.
    const BASE_WIRE_SIZE: usize;

    fn pack_payload(&self, buf: &mut BytesMut);

    fn unpack_payload(payload: &[u8]) -> Result<Self, CodecError>;

    fn destination(&self) -> Destination {
        Destination::Broadcast
    }
}

/// Description of one indexed parameter of an enum entry (the `<param>`
/// elements MAV_CMD-style enums carry). Metadata only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryParam {
    pub index: u8,
    pub label: Option<&'static str>,
    pub units: Option<&'static str>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub description: &'static str,
}
