//! Small field-level helpers shared with generated dialect code.

use bytes::{Buf, BufMut, BytesMut};

/// Write a `char[len]` field: the string's bytes, truncated to capacity and
/// padded with NULs to the declared length.
pub fn put_char_array(buf: &mut BytesMut, value: &str, len: usize) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(len);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, len - n);
}

/// Read a `char[len]` field, stopping at the first NUL.
pub fn take_char_array<B: Buf>(buf: &mut B, len: usize) -> String {
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_array_pads_with_nuls() {
        let mut buf = BytesMut::new();
        put_char_array(&mut buf, "hello", 8);
        assert_eq!(&buf[..], b"hello\0\0\0");
    }

    #[test]
    fn char_array_truncates_at_capacity() {
        let mut buf = BytesMut::new();
        put_char_array(&mut buf, "overlong", 4);
        assert_eq!(&buf[..], b"over");
    }

    #[test]
    fn char_array_round_trip() {
        let mut buf = BytesMut::new();
        put_char_array(&mut buf, "hello", 25);
        let mut slice = &buf[..];
        assert_eq!(take_char_array(&mut slice, 25), "hello");
    }

    #[test]
    fn full_capacity_string_has_no_terminator() {
        let mut buf = BytesMut::new();
        put_char_array(&mut buf, "abcd", 4);
        let mut slice = &buf[..];
        assert_eq!(take_char_array(&mut slice, 4), "abcd");
    }
}
