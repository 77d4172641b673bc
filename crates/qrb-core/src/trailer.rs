//! File metadata trailer: `[name_len, ts_be(4), name_bytes]`, appended after the file's own bytes
//! in the logical block stream. On the wire the whole trailer is byte-reversed, so a decoder
//! reading it off the tail of a reassembled file reverses the chunk once before parsing.

use std::time::{SystemTime, UNIX_EPOCH};

pub const MAX_NAME_LEN: usize = 255;
/// Fixed header size before the filename: 1 name-length byte + 4 big-endian timestamp bytes.
pub const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub name: String,
    pub timestamp: u32,
}

impl Trailer {
    /// Builds a trailer for `name` stamped with the current UTC second.
    pub fn now(name: &str) -> Option<Self> {
        if name.as_bytes().len() > MAX_NAME_LEN {
            return None;
        }
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() as u32;
        Some(Trailer { name: name.to_owned(), timestamp })
    }

    pub fn len(&self) -> usize {
        HEADER_LEN + self.name.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Canonical byte layout, `[name_len, ts_be(4), name_bytes]`.
    pub fn encode(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let mut out = Vec::with_capacity(self.len());
        out.push(name_bytes.len() as u8);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(name_bytes);
        out
    }

    /// Byte-reversed form actually appended to the logical block stream.
    pub fn encode_wire(&self) -> Vec<u8> {
        let mut bytes = self.encode();
        bytes.reverse();
        bytes
    }

    /// Parses canonical-order bytes.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let name_len = bytes[0] as usize;
        if bytes.len() < HEADER_LEN + name_len {
            return None;
        }
        let timestamp = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let name = String::from_utf8_lossy(&bytes[HEADER_LEN..HEADER_LEN + name_len]).into_owned();
        Some(Trailer { name, timestamp })
    }

    /// Parses a chunk taken off the tail of a reassembled file, wire (reversed) order.
    pub fn parse_wire(bytes: &[u8]) -> Option<Self> {
        let mut reversed = bytes.to_vec();
        reversed.reverse();
        Self::parse(&reversed)
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn round_trip_through_wire_order() {
        let trailer = Trailer { name: "report.pdf".to_owned(), timestamp: 1_700_000_000 };
        let wire = trailer.encode_wire();
        let parsed = Trailer::parse_wire(&wire).unwrap();
        assert_eq!(parsed, trailer);
    }

    #[test]
    fn reject_a_truncated_header() {
        assert!(Trailer::parse(&[1, 2, 3]).is_none());
    }

    #[test]
    fn reject_a_name_length_that_overruns_the_buffer() {
        let bytes = [5u8, 0, 0, 0, 0, b'h', b'i'];
        assert!(Trailer::parse(&bytes).is_none());
    }
}
