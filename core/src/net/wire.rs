//! Wire framing (§4.5 Replication Layer, §6 External Interfaces). Grounded
//! in `packet.hpp`/`net_basic.hpp`: a fixed 24-byte header (action kind,
//! reliable flag, packet id, payload FNV-1a64 hash) followed by an
//! action-specific little-endian payload.

use fnv::FnvHasher;
use std::hash::Hasher;

use crate::error::WireError;

/// Maximum UDP datagram size this transport will send or accept, matching
/// a conservative MTU bound (§4.5 Datagram socket).
pub const MAX_DATAGRAM_SIZE: usize = 1472;

/// Header size in bytes: `action_kind(4) + reliable_flag(4) + packet_id(8)
/// + payload_hash(8)`.
pub const HEADER_SIZE: usize = 24;

/// FNV-1a 64-bit hash, matching `fnv1a64` in the original source bit for
/// bit (offset basis `0xcbf29ce484222325`, prime `0x100000001b3`) — the
/// `fnv` crate's default hasher implements the identical constants.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub action_kind: u32,
    pub reliable: bool,
    pub packet_id: u64,
    pub payload_hash: u64,
}

impl PacketHeader {
    /// Writes the header followed by `payload` into a single buffer, with
    /// `payload_hash` computed over `payload` after the fact (§6 Wire
    /// format: "written AFTER the payload is serialised").
    pub fn frame(action_kind: u32, reliable: bool, packet_id: u64, payload: &[u8]) -> Result<Vec<u8>, WireError> {
        let total = HEADER_SIZE + payload.len();
        if total > MAX_DATAGRAM_SIZE {
            return Err(WireError::TooBig(total));
        }
        let hash = fnv1a64(payload);
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&action_kind.to_le_bytes());
        buf.extend_from_slice(&(reliable as u32).to_le_bytes());
        buf.extend_from_slice(&packet_id.to_le_bytes());
        buf.extend_from_slice(&hash.to_le_bytes());
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// Parses and hash-validates a received datagram, returning the header
    /// and a slice of the payload that follows it.
    pub fn parse(datagram: &[u8]) -> Result<(PacketHeader, &[u8]), WireError> {
        if datagram.len() < HEADER_SIZE {
            return Err(WireError::TooSmall(datagram.len()));
        }
        let action_kind = u32::from_le_bytes(datagram[0..4].try_into().unwrap());
        let reliable = u32::from_le_bytes(datagram[4..8].try_into().unwrap()) != 0;
        let packet_id = u64::from_le_bytes(datagram[8..16].try_into().unwrap());
        let payload_hash = u64::from_le_bytes(datagram[16..24].try_into().unwrap());
        let payload = &datagram[HEADER_SIZE..];

        let actual = fnv1a64(payload);
        if actual != payload_hash {
            return Err(WireError::InvalidHash { expected: payload_hash, actual });
        }

        Ok((PacketHeader { action_kind, reliable, packet_id, payload_hash }, payload))
    }
}

/// Encodes a string into a fixed-size zero-padded buffer (player names:
/// `N = 23` bytes + implicit NUL via the trailing zero pad), erroring if
/// the UTF-8 byte length would not fit.
pub fn encode_bounded_string<const N: usize>(value: &str) -> Result<[u8; N], WireError> {
    let bytes = value.as_bytes();
    if bytes.len() > N {
        return Err(WireError::StringTooLong { len: bytes.len(), max: N });
    }
    let mut buf = [0u8; N];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

/// Decodes a fixed-size zero-padded buffer back to a string, trimming at
/// the first NUL byte.
pub fn decode_bounded_string<const N: usize>(buf: &[u8; N]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(N);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

pub fn encode_vec2(v: crate::geometry::Vec2) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&v.x.to_le_bytes());
    buf[4..8].copy_from_slice(&v.y.to_le_bytes());
    buf
}

pub fn decode_vec2(buf: &[u8]) -> Result<crate::geometry::Vec2, WireError> {
    if buf.len() < 8 {
        return Err(WireError::Truncated { expected: 8, actual: buf.len() });
    }
    let x = f32::from_le_bytes(buf[0..4].try_into().unwrap());
    let y = f32::from_le_bytes(buf[4..8].try_into().unwrap());
    Ok(crate::geometry::Vec2::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_parse_round_trip() {
        let payload = b"hello action payload";
        let framed = PacketHeader::frame(7, true, 42, payload).unwrap();
        let (header, parsed_payload) = PacketHeader::parse(&framed).unwrap();
        assert_eq!(header.action_kind, 7);
        assert!(header.reliable);
        assert_eq!(header.packet_id, 42);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn tampered_payload_fails_hash_validation() {
        let mut framed = PacketHeader::frame(1, false, 1, b"original").unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0xff;
        assert!(matches!(PacketHeader::parse(&framed), Err(WireError::InvalidHash { .. })));
    }

    #[test]
    fn undersized_datagram_is_rejected() {
        assert!(matches!(PacketHeader::parse(&[0u8; 10]), Err(WireError::TooSmall(10))));
    }

    #[test]
    fn oversized_payload_is_rejected_before_sending() {
        let payload = vec![0u8; MAX_DATAGRAM_SIZE];
        assert!(matches!(PacketHeader::frame(1, false, 1, &payload), Err(WireError::TooBig(_))));
    }

    #[test]
    fn bounded_string_round_trips() {
        let buf = encode_bounded_string::<23>("alice").unwrap();
        assert_eq!(decode_bounded_string(&buf), "alice");
    }

    #[test]
    fn bounded_string_rejects_overlong_input() {
        let err = encode_bounded_string::<4>("toolong").unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { len: 7, max: 4 }));
    }
}
