//! # Frame Envelopes: MAVLink v1 and v2
//!
//! ## Purpose
//!
//! Byte-exact encode/decode of the two MAVLink envelopes with the full
//! validation pipeline: magic → declared length → dialect lookup → x25
//! checksum → field extraction. A decoded [`Frame`] keeps the raw encoded
//! bytes so the router can forward it to other links without re-encoding.
//!
//! ## Wire Layout
//!
//! ```text
//! v1: 0xFE | len | seq | sysid | compid | msgid(u8)            | payload | crc(u16 LE)
//! v2: 0xFD | len | incompat | compat | seq | sysid | compid | msgid(u24 LE) | payload | crc(u16 LE)
//! ```
//!
//! The checksum covers every header byte except the magic, then the payload,
//! and is finally mixed with the message's CRC_EXTRA byte. v2 payloads have
//! trailing zero bytes truncated on encode (never below one byte) and are
//! zero-extended back to the full wire size before field extraction.

use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::X25;
use crate::error::CodecError;
use crate::message::{Destination, Message};

/// Framing magic for MAVLink v1.
pub const MAV_STX_V1: u8 = 0xFE;
/// Framing magic for MAVLink v2.
pub const MAV_STX_V2: u8 = 0xFD;

/// v2 incompatibility bit for signed frames; unsupported here.
const IFLAG_SIGNED: u8 = 0x01;

const V1_HEADER: usize = 6;
const V2_HEADER: usize = 10;
const V1_OVERHEAD: usize = V1_HEADER + 2;
const V2_OVERHEAD: usize = V2_HEADER + 2;

/// Protocol version of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MavVersion {
    V1,
    V2,
}

impl MavVersion {
    fn header_len(self) -> usize {
        match self {
            Self::V1 => V1_HEADER,
            Self::V2 => V2_HEADER,
        }
    }

    fn overhead(self) -> usize {
        match self {
            Self::V1 => V1_OVERHEAD,
            Self::V2 => V2_OVERHEAD,
        }
    }
}

/// A fully wrapped MAVLink message.
///
/// `message` is `None` when the id is not part of the dialect: the envelope
/// is intact and the frame may be re-broadcast raw, but fields cannot be
/// materialized and the checksum cannot be verified (no CRC_EXTRA).
#[derive(Debug, Clone)]
pub struct Frame<M> {
    pub version: MavVersion,
    pub sequence: u8,
    pub source_system: u8,
    pub source_component: u8,
    pub message_id: u32,
    /// Payload as transmitted (v2: possibly truncated).
    pub payload: Bytes,
    pub checksum: u16,
    /// The complete encoded frame, cached for zero-copy forwarding.
    pub raw: Bytes,
    pub message: Option<M>,
}

impl<M: Message> Frame<M> {
    /// Routing destination carried in the payload; unknown messages are
    /// broadcast.
    pub fn destination(&self) -> Destination {
        self.message
            .as_ref()
            .map(Message::destination)
            .unwrap_or(Destination::Broadcast)
    }
}

/// Total encoded size of the frame starting at `buf[0]`, derived from the
/// magic and the declared payload length. Needs at least two bytes.
pub fn envelope_total(buf: &[u8]) -> Result<usize, CodecError> {
    if buf.len() < 2 {
        return Err(CodecError::NotAFrame {
            reason: "buffer too short for a frame header",
        });
    }
    let overhead = match buf[0] {
        MAV_STX_V1 => V1_OVERHEAD,
        MAV_STX_V2 => V2_OVERHEAD,
        _ => {
            return Err(CodecError::NotAFrame {
                reason: "invalid magic byte",
            })
        }
    };
    Ok(buf[1] as usize + overhead)
}

/// Pack a message into a complete frame with the given header fields.
pub fn encode<M: Message>(
    message: M,
    version: MavVersion,
    sequence: u8,
    source_system: u8,
    source_component: u8,
) -> Result<Frame<M>, CodecError> {
    let id = message.message_id();
    let crc_extra = M::crc_extra(id).ok_or(CodecError::ProtocolUndefined(id))?;

    let mut payload = BytesMut::with_capacity(M::wire_size(id).unwrap_or(0));
    message.pack_payload(&mut payload);

    match version {
        MavVersion::V1 => {
            if id > u32::from(u8::MAX) {
                return Err(CodecError::V1IdOverflow(id));
            }
            // v1 payloads never carry extension fields.
            let base = M::base_wire_size(id).ok_or(CodecError::ProtocolUndefined(id))?;
            payload.truncate(base);
        }
        MavVersion::V2 => {
            // Trailing-zero truncation, never below one byte.
            while payload.len() > 1 && payload[payload.len() - 1] == 0 {
                payload.truncate(payload.len() - 1);
            }
        }
    }

    let declared = payload.len();
    let mut raw = BytesMut::with_capacity(declared + version.overhead());
    match version {
        MavVersion::V1 => {
            raw.put_u8(MAV_STX_V1);
            raw.put_u8(declared as u8);
            raw.put_u8(sequence);
            raw.put_u8(source_system);
            raw.put_u8(source_component);
            raw.put_u8(id as u8);
        }
        MavVersion::V2 => {
            raw.put_u8(MAV_STX_V2);
            raw.put_u8(declared as u8);
            raw.put_u8(0); // incompat_flags
            raw.put_u8(0); // compat_flags
            raw.put_u8(sequence);
            raw.put_u8(source_system);
            raw.put_u8(source_component);
            raw.put_slice(&id.to_le_bytes()[..3]);
        }
    }
    raw.put_slice(&payload);

    let mut crc = X25::new();
    crc.update(&raw[1..]);
    crc.update(&[crc_extra]);
    let checksum = crc.finish();
    raw.put_u16_le(checksum);

    let raw = raw.freeze();
    let header_len = version.header_len();
    Ok(Frame {
        version,
        sequence,
        source_system,
        source_component,
        message_id: id,
        payload: raw.slice(header_len..header_len + declared),
        checksum,
        raw,
        message: Some(message),
    })
}

/// Validate and unpack one complete frame.
///
/// `raw` must hold exactly one encoded frame (magic through checksum).
/// Validation order: magic, declared length, dialect lookup, checksum,
/// field extraction. An id outside the dialect yields a frame with
/// `message: None` rather than an error: such frames are still forwardable.
pub fn decode<M: Message>(raw: Bytes) -> Result<Frame<M>, CodecError> {
    if raw.len() < 2 {
        return Err(CodecError::NotAFrame {
            reason: "buffer too short for a frame header",
        });
    }
    let version = match raw[0] {
        MAV_STX_V1 => MavVersion::V1,
        MAV_STX_V2 => MavVersion::V2,
        _ => {
            return Err(CodecError::NotAFrame {
                reason: "invalid magic byte",
            })
        }
    };

    let declared = raw[1] as usize;
    let overhead = version.overhead();
    if raw.len() != declared + overhead {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: raw.len().saturating_sub(overhead),
        });
    }

    let (sequence, source_system, source_component, message_id) = match version {
        MavVersion::V1 => (raw[2], raw[3], raw[4], u32::from(raw[5])),
        MavVersion::V2 => {
            if raw[2] & IFLAG_SIGNED != 0 {
                return Err(CodecError::NotAFrame {
                    reason: "signed v2 frames are not supported",
                });
            }
            let id = u32::from_le_bytes([raw[7], raw[8], raw[9], 0]);
            (raw[4], raw[5], raw[6], id)
        }
    };

    let header_len = version.header_len();
    let checksum = u16::from_le_bytes([raw[raw.len() - 2], raw[raw.len() - 1]]);
    let payload = raw.slice(header_len..header_len + declared);

    let Some(crc_extra) = M::crc_extra(message_id) else {
        // Unknown to the dialect: forwardable envelope, no fields, no CRC
        // check possible.
        return Ok(Frame {
            version,
            sequence,
            source_system,
            source_component,
            message_id,
            payload,
            checksum,
            raw,
            message: None,
        });
    };

    let mut crc = X25::new();
    crc.update(&raw[1..header_len + declared]);
    crc.update(&[crc_extra]);
    let computed = crc.finish();
    if computed != checksum {
        return Err(CodecError::FailedCrc {
            message_id,
            expected: checksum,
            computed,
        });
    }

    // Zero-extend to the full wire size to recover v2 truncation, then
    // extract fields.
    let wire_size = M::wire_size(message_id).ok_or(CodecError::UnknownMessage(message_id))?;
    let mut full = vec![0u8; wire_size];
    let n = declared.min(wire_size);
    full[..n].copy_from_slice(&payload[..n]);
    let message = M::unpack_payload(message_id, &full)?;

    Ok(Frame {
        version,
        sequence,
        source_system,
        source_component,
        message_id,
        payload,
        checksum,
        raw,
        message: Some(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    // A two-message test dialect, hand-written in the shape the generator
    // emits.
    #[derive(Debug, Clone, PartialEq, Default)]
    struct StatusData {
        uptime: u32,
        level: u8,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct CommandData {
        value: u16,
        target_system: u8,
        target_component: u8,
        // extension field
        note: u8,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestMessage {
        Status(StatusData),
        Command(CommandData),
    }

    impl Message for TestMessage {
        fn message_id(&self) -> u32 {
            match self {
                Self::Status(_) => 1,
                Self::Command(_) => 2,
            }
        }

        fn message_name(&self) -> &'static str {
            match self {
                Self::Status(_) => "STATUS",
                Self::Command(_) => "COMMAND",
            }
        }

        fn destination(&self) -> Destination {
            match self {
                Self::Status(_) => Destination::Broadcast,
                Self::Command(m) => Destination::of(m.target_system, m.target_component),
            }
        }

        fn pack_payload(&self, buf: &mut BytesMut) {
            match self {
                Self::Status(m) => {
                    buf.put_u32_le(m.uptime);
                    buf.put_u8(m.level);
                }
                Self::Command(m) => {
                    buf.put_u16_le(m.value);
                    buf.put_u8(m.target_system);
                    buf.put_u8(m.target_component);
                    buf.put_u8(m.note);
                }
            }
        }

        fn unpack_payload(id: u32, payload: &[u8]) -> Result<Self, CodecError> {
            let mut buf = payload;
            match id {
                1 => Ok(Self::Status(StatusData {
                    uptime: buf.get_u32_le(),
                    level: buf.get_u8(),
                })),
                2 => Ok(Self::Command(CommandData {
                    value: buf.get_u16_le(),
                    target_system: buf.get_u8(),
                    target_component: buf.get_u8(),
                    note: buf.get_u8(),
                })),
                other => Err(CodecError::UnknownMessage(other)),
            }
        }

        fn crc_extra(id: u32) -> Option<u8> {
            match id {
                1 => Some(99),
                2 => Some(7),
                _ => None,
            }
        }

        fn wire_size(id: u32) -> Option<usize> {
            match id {
                1 => Some(5),
                2 => Some(5),
                _ => None,
            }
        }

        fn base_wire_size(id: u32) -> Option<usize> {
            match id {
                1 => Some(5),
                2 => Some(4),
                _ => None,
            }
        }

        fn name_of(id: u32) -> Option<&'static str> {
            match id {
                1 => Some("STATUS"),
                2 => Some("COMMAND"),
                _ => None,
            }
        }
    }

    #[test]
    fn v2_round_trip() {
        let msg = TestMessage::Status(StatusData {
            uptime: 0x0102_0304,
            level: 5,
        });
        let frame = encode(msg.clone(), MavVersion::V2, 7, 42, 1).unwrap();
        assert_eq!(frame.raw[0], MAV_STX_V2);
        assert_eq!(frame.sequence, 7);

        let decoded: Frame<TestMessage> = decode(frame.raw.clone()).unwrap();
        assert_eq!(decoded.message, Some(msg));
        assert_eq!(decoded.source_system, 42);
        assert_eq!(decoded.source_component, 1);
    }

    #[test]
    fn v2_truncates_trailing_zeros_and_recovers() {
        let msg = TestMessage::Status(StatusData::default());
        let frame = encode(msg.clone(), MavVersion::V2, 0, 1, 1).unwrap();
        // All-zero five-byte payload shrinks to a single byte.
        assert_eq!(frame.payload.len(), 1);

        let decoded: Frame<TestMessage> = decode(frame.raw.clone()).unwrap();
        assert_eq!(decoded.message, Some(msg));
    }

    #[test]
    fn v1_round_trip_drops_extensions() {
        let msg = TestMessage::Command(CommandData {
            value: 0xBEEF,
            target_system: 2,
            target_component: 1,
            note: 9,
        });
        let frame = encode(msg, MavVersion::V1, 0, 1, 1).unwrap();
        assert_eq!(frame.raw[0], MAV_STX_V1);
        assert_eq!(frame.payload.len(), 4);

        let decoded: Frame<TestMessage> = decode(frame.raw.clone()).unwrap();
        match decoded.message {
            Some(TestMessage::Command(cmd)) => {
                assert_eq!(cmd.value, 0xBEEF);
                assert_eq!(cmd.target_system, 2);
                // Extension bytes never travel in v1; recovered as zero.
                assert_eq!(cmd.note, 0);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn targeted_destination_derived_from_fields() {
        let msg = TestMessage::Command(CommandData {
            target_system: 2,
            target_component: 1,
            ..Default::default()
        });
        let frame = encode(msg, MavVersion::V2, 0, 1, 1).unwrap();
        assert_eq!(frame.destination(), Destination::SystemComponent(2, 1));
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let msg = TestMessage::Status(StatusData {
            uptime: 1,
            level: 1,
        });
        let frame = encode(msg, MavVersion::V2, 0, 1, 1).unwrap();
        let mut bad = BytesMut::from(&frame.raw[..]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let err = decode::<TestMessage>(bad.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::FailedCrc { message_id: 1, .. }));
    }

    #[test]
    fn bad_magic_is_not_a_frame() {
        let err = decode::<TestMessage>(Bytes::from_static(&[0x42, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, CodecError::NotAFrame { .. }));
    }

    #[test]
    fn short_buffer_is_length_mismatch() {
        let msg = TestMessage::Status(StatusData {
            uptime: 1,
            level: 2,
        });
        let frame = encode(msg, MavVersion::V2, 0, 1, 1).unwrap();
        let truncated = frame.raw.slice(..frame.raw.len() - 3);

        let err = decode::<TestMessage>(truncated).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { .. }));
    }

    #[test]
    fn unknown_id_keeps_envelope_without_fields() {
        // Hand-built v2 frame carrying message id 42 with a one-byte payload.
        let raw = Bytes::from_static(&[
            0xFD, 0x01, 0x00, 0x00, 0x03, 0x09, 0x08, 0x2A, 0x00, 0x00, 0xAA, 0x11, 0x22,
        ]);
        let frame: Frame<TestMessage> = decode(raw).unwrap();
        assert_eq!(frame.message_id, 42);
        assert_eq!(frame.message, None);
        assert_eq!(frame.destination(), Destination::Broadcast);
        assert_eq!(frame.source_system, 9);
        assert_eq!(&frame.payload[..], &[0xAA]);
    }

    #[test]
    fn signed_frames_are_rejected() {
        let msg = TestMessage::Status(StatusData {
            uptime: 1,
            level: 1,
        });
        let frame = encode(msg, MavVersion::V2, 0, 1, 1).unwrap();
        let mut bad = BytesMut::from(&frame.raw[..]);
        bad[2] = IFLAG_SIGNED;

        let err = decode::<TestMessage>(bad.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::NotAFrame { .. }));
    }

    #[test]
    fn envelope_total_matches_encoded_length() {
        let msg = TestMessage::Status(StatusData {
            uptime: 3,
            level: 1,
        });
        for version in [MavVersion::V1, MavVersion::V2] {
            let frame = encode(msg.clone(), version, 0, 1, 1).unwrap();
            assert_eq!(envelope_total(&frame.raw).unwrap(), frame.raw.len());
        }
    }
}
