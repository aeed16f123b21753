//! # Stream Reframing
//!
//! ## Purpose
//!
//! Extracts complete MAVLink frames from TCP and serial byte streams. The
//! parser accumulates bytes, hunts for a magic byte (0xFD / 0xFE), waits
//! until the envelope's declared length is buffered, and hands the candidate
//! slice to the codec. On checksum failure it slides one byte forward and
//! rescans, so a magic byte appearing inside garbage cannot wedge the
//! stream.
//!
//! The buffer is bounded: a stream that never yields a valid frame drops its
//! oldest bytes rather than growing without limit.

use bytes::{Buf, Bytes, BytesMut};
use mavswitch_codec::{decode, envelope_total, CodecError, Frame, Message};
use memchr::memchr2;
use tracing::warn;

use crate::connection::ConnectionKey;

/// Cap on buffered unframed bytes per stream.
const MAX_BUFFER_SIZE: usize = 256 * 1024;

/// Stateful reframer for one byte stream.
pub struct StreamParser {
    buffer: BytesMut,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append freshly read bytes, evicting the oldest data if the bound
    /// would be exceeded.
    pub fn push(&mut self, data: &[u8]) {
        let new_len = self.buffer.len() + data.len();
        if new_len > MAX_BUFFER_SIZE {
            let overflow = new_len - MAX_BUFFER_SIZE;
            warn!(overflow, "reframing buffer full, dropping oldest bytes");
            if overflow < self.buffer.len() {
                self.buffer.advance(overflow);
            } else {
                self.buffer.clear();
            }
        }
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next frame.
    ///
    /// Returns `None` when more bytes are needed, `Some(Ok(frame))` for a
    /// validated frame, and `Some(Err(_))` when a candidate failed
    /// validation (the parser has already resynchronized past it).
    pub fn next_frame<M: Message>(&mut self) -> Option<Result<Frame<M>, CodecError>> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }

            // Resynchronize on the next magic byte.
            match memchr2(0xFD, 0xFE, &self.buffer) {
                Some(0) => {}
                Some(idx) => self.buffer.advance(idx),
                None => {
                    self.buffer.clear();
                    return None;
                }
            }

            if self.buffer.len() < 2 {
                return None;
            }
            let total = match envelope_total(&self.buffer) {
                Ok(total) => total,
                Err(_) => {
                    // Unreachable after the magic scan, but never wedge.
                    self.buffer.advance(1);
                    continue;
                }
            };
            if self.buffer.len() < total {
                return None;
            }

            let candidate = Bytes::copy_from_slice(&self.buffer[..total]);
            match decode::<M>(candidate) {
                Ok(frame) => {
                    self.buffer.advance(total);
                    return Some(Ok(frame));
                }
                Err(error) => {
                    // A false magic inside other data: slide one byte and
                    // keep scanning on the next call.
                    self.buffer.advance(1);
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Decode a datagram that is assumed to carry exactly one frame. Trailing
/// bytes beyond the frame are discarded with a warning.
pub fn decode_datagram<M: Message>(
    key: &ConnectionKey,
    datagram: &[u8],
) -> Result<Frame<M>, CodecError> {
    let total = envelope_total(datagram)?;
    if datagram.len() < total {
        return Err(CodecError::NotAFrame {
            reason: "datagram shorter than the declared frame",
        });
    }
    if datagram.len() > total {
        warn!(
            key = %key,
            extra = datagram.len() - total,
            "datagram carries bytes beyond one frame, discarding remainder"
        );
    }
    decode(Bytes::copy_from_slice(&datagram[..total]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavswitch_codec::{encode, MavVersion};
    use mavswitch_common::{HeartbeatData, MavMessage, VfrHudData};

    fn heartbeat_bytes(seq: u8) -> Bytes {
        encode(
            MavMessage::Heartbeat(HeartbeatData::default()),
            MavVersion::V2,
            seq,
            1,
            1,
        )
        .unwrap()
        .raw
    }

    #[test]
    fn partial_then_complete_frame() {
        let mut parser = StreamParser::new();
        let raw = heartbeat_bytes(0);
        let split = raw.len() / 2;

        parser.push(&raw[..split]);
        assert!(parser.next_frame::<MavMessage>().is_none());

        parser.push(&raw[split..]);
        let frame = parser.next_frame::<MavMessage>().unwrap().unwrap();
        assert_eq!(frame.message_id, 0);
    }

    #[test]
    fn garbage_before_frame_is_skipped() {
        let mut parser = StreamParser::new();
        parser.push(&[0x00, 0x11, 0x22, 0x33, 0x44]);
        parser.push(&heartbeat_bytes(1));

        let frame = parser.next_frame::<MavMessage>().unwrap().unwrap();
        assert_eq!(frame.sequence, 1);
    }

    #[test]
    fn multiple_frames_in_one_push() {
        let mut parser = StreamParser::new();
        let mut bytes = Vec::new();
        for seq in 0..3 {
            bytes.extend_from_slice(&heartbeat_bytes(seq));
        }
        parser.push(&bytes);

        for seq in 0..3 {
            let frame = parser.next_frame::<MavMessage>().unwrap().unwrap();
            assert_eq!(frame.sequence, seq);
        }
        assert!(parser.next_frame::<MavMessage>().is_none());
    }

    #[test]
    fn corrupted_frame_reports_error_then_recovers() {
        let mut parser = StreamParser::new();
        // A heartbeat frame carrying a checksum that cannot be right; no
        // other byte looks like a magic, so resync lands on the next frame.
        let corrupted = [
            0xFD, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x11, 0x11,
        ];
        parser.push(&corrupted);
        parser.push(&heartbeat_bytes(1));

        match parser.next_frame::<MavMessage>() {
            Some(Err(CodecError::FailedCrc { message_id: 0, .. })) => {}
            other => panic!("expected a crc failure, got {other:?}"),
        }
        let frame = parser.next_frame::<MavMessage>().unwrap().unwrap();
        assert_eq!(frame.sequence, 1);
        assert!(parser.next_frame::<MavMessage>().is_none());
    }

    #[test]
    fn no_magic_clears_buffer() {
        let mut parser = StreamParser::new();
        parser.push(&[0x00, 0x11, 0x22, 0x33]);
        assert!(parser.next_frame::<MavMessage>().is_none());
        assert!(parser.buffer.is_empty());
    }

    #[test]
    fn v1_frames_reframe_too() {
        let mut parser = StreamParser::new();
        let raw = encode(
            MavMessage::VfrHud(VfrHudData {
                airspeed: 1.0,
                groundspeed: 2.0,
                heading: 90,
                throttle: 50,
                alt: 10.0,
                climb: 0.5,
            }),
            MavVersion::V1,
            4,
            3,
            1,
        )
        .unwrap()
        .raw;
        parser.push(&raw);

        let frame = parser.next_frame::<MavMessage>().unwrap().unwrap();
        assert_eq!(frame.version, MavVersion::V1);
        assert_eq!(frame.source_system, 3);
    }

    #[test]
    fn datagram_remainder_is_discarded() {
        let key = ConnectionKey::new("udpin:test/peer:1");
        let mut datagram = heartbeat_bytes(2).to_vec();
        datagram.extend_from_slice(&[1, 2, 3]);

        let frame = decode_datagram::<MavMessage>(&key, &datagram).unwrap();
        assert_eq!(frame.sequence, 2);
    }

    #[test]
    fn short_datagram_is_not_a_frame() {
        let key = ConnectionKey::new("udpin:test/peer:1");
        let raw = heartbeat_bytes(0);
        let err = decode_datagram::<MavMessage>(&key, &raw[..raw.len() - 2]).unwrap_err();
        assert!(matches!(err, CodecError::NotAFrame { .. }));
    }
}
