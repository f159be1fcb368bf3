// Copyright 2026 PeerTalk developers
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Message frame: `{ magic "PTMG", version, type, flags, reserved,
//! sequence, payload-length, payload, CRC-16 }` (spec.md §3, §6).

use crate::error::Error;
use crate::protocol::crc::crc16;
use crate::version::WIRE_PROTOCOL_VERSION;

pub const MAGIC: [u8; 4] = *b"PTMG";
pub const HEADER_LEN: usize = 4 + 1 + 1 + 1 + 1 + 4 + 2;
pub const TRAILER_LEN: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0,
    Ping = 1,
    Pong = 2,
    Disconnect = 3,
    Capability = 4,
    FragStart = 5,
    FragCont = 6,
    FragEnd = 7,
}

impl FrameType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => FrameType::Data,
            1 => FrameType::Ping,
            2 => FrameType::Pong,
            3 => FrameType::Disconnect,
            4 => FrameType::Capability,
            5 => FrameType::FragStart,
            6 => FrameType::FragCont,
            7 => FrameType::FragEnd,
            _ => return None,
        })
    }
}

/// A single decoded or to-be-encoded message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub flags: u8,
    pub sequence: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            flags: 0,
            sequence,
            payload,
        }
    }

    /// Encode into a freshly allocated buffer: header, payload, CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + TRAILER_LEN);
        buf.extend_from_slice(&MAGIC);
        buf.push(WIRE_PROTOCOL_VERSION);
        buf.push(self.frame_type as u8);
        buf.push(self.flags);
        buf.push(0); // reserved
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);

        let crc = crc16(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }
}

/// Result of attempting to decode one frame from the front of a buffer.
pub enum Decoded {
    /// A full frame was decoded; `consumed` bytes should be dropped from
    /// the front of the input.
    Complete { frame: Frame, consumed: usize },
    /// Not enough bytes buffered yet; none consumed.
    Partial,
    /// A fatal decode error; the connection must close (spec.md §4.5).
    Err(Error),
}

/// Decode at most one frame from the front of `buf`. Partial returns do
/// not consume any bytes (spec.md §4.5 decoding contract).
pub fn decode(buf: &[u8]) -> Decoded {
    if buf.len() < HEADER_LEN {
        return Decoded::Partial;
    }
    if buf[0..4] != MAGIC {
        return Decoded::Err(Error::Magic);
    }
    let version = buf[4];
    if version != WIRE_PROTOCOL_VERSION {
        return Decoded::Err(Error::Version);
    }
    let frame_type = match FrameType::from_u8(buf[5]) {
        Some(t) => t,
        None => return Decoded::Err(Error::Magic),
    };
    let flags = buf[6];
    // buf[7] reserved
    let sequence = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let payload_len = u16::from_be_bytes([buf[12], buf[13]]) as usize;

    let total = HEADER_LEN + payload_len + TRAILER_LEN;
    if buf.len() < total {
        return Decoded::Partial;
    }

    let expected_crc = crc16(&buf[..HEADER_LEN + payload_len]);
    let actual_crc = u16::from_be_bytes([buf[total - 2], buf[total - 1]]);
    if expected_crc != actual_crc {
        return Decoded::Err(Error::Crc);
    }

    let payload = buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec();

    Decoded::Complete {
        frame: Frame {
            frame_type,
            flags,
            sequence,
            payload,
        },
        consumed: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = Frame::new(FrameType::Data, 42, b"hello".to_vec());
        let encoded = frame.encode();
        match decode(&encoded) {
            Decoded::Complete { frame: decoded, consumed } => {
                assert_eq!(consumed, encoded.len());
                assert_eq!(decoded, frame);
            }
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn partial_does_not_consume() {
        let frame = Frame::new(FrameType::Data, 1, b"hello world".to_vec());
        let encoded = frame.encode();
        let truncated = &encoded[..encoded.len() - 1];
        assert!(matches!(decode(truncated), Decoded::Partial));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut encoded = Frame::new(FrameType::Ping, 0, vec![]).encode();
        encoded[0] = b'X';
        assert!(matches!(decode(&encoded), Decoded::Err(Error::Magic)));
    }

    #[test]
    fn wrong_version_is_fatal() {
        let mut encoded = Frame::new(FrameType::Ping, 0, vec![]).encode();
        encoded[4] = 99;
        assert!(matches!(decode(&encoded), Decoded::Err(Error::Version)));
    }

    #[test]
    fn bit_flip_in_payload_is_crc_error() {
        let mut encoded = Frame::new(FrameType::Data, 7, b"payload bytes".to_vec()).encode();
        let mid = HEADER_LEN + 3;
        encoded[mid] ^= 0x01;
        assert!(matches!(decode(&encoded), Decoded::Err(Error::Crc)));
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = Frame::new(FrameType::Pong, 9, vec![]);
        let encoded = frame.encode();
        match decode(&encoded) {
            Decoded::Complete { frame: decoded, .. } => assert_eq!(decoded, frame),
            _ => panic!("expected Complete"),
        }
    }
}
