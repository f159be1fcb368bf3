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

//! Discovery packet codec (spec.md §3 "Discovery packet", §6 wire
//! format). The discovery *engine* (periodic announce, timeout sweep)
//! lives in `Context::poll` since it needs the peer table; this module
//! is purely the wire codec plus the packet value type.

use crate::error::Error;
use crate::version::WIRE_PROTOCOL_VERSION;
use std::net::{IpAddr, Ipv4Addr};

pub const MAGIC: [u8; 4] = *b"PTLK";

/// Destination `udp_send` fans out to every host on the local broadcast
/// domain (spec.md §3 "sent over datagram transport to the local
/// broadcast address").
pub const BROADCAST_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255));

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Announce = 0,
    Query = 1,
    Goodbye = 2,
}

impl PacketType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => PacketType::Announce,
            1 => PacketType::Query,
            2 => PacketType::Goodbye,
            _ => return None,
        })
    }
}

/// One capability TLV: `(tag, length, value)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTlv {
    pub tag: u8,
    pub value: Vec<u8>,
}

/// A discovery datagram (spec.md §3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub flags: u8,
    pub sender_port: u16,
    pub name: String,
    pub capabilities: Vec<CapabilityTlv>,
}

impl Packet {
    pub fn new(packet_type: PacketType, sender_port: u16, name: impl Into<String>) -> Self {
        Self {
            packet_type,
            flags: 0,
            sender_port,
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    /// Encode as `{ magic, version, type, flags, sender-port (BE),
    /// name-length, name-bytes, capability TLVs }`.
    pub fn encode(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        debug_assert!(name_bytes.len() <= 31, "name must fit in a u8 length");

        let mut buf = Vec::with_capacity(4 + 1 + 1 + 1 + 2 + 1 + name_bytes.len());
        buf.extend_from_slice(&MAGIC);
        buf.push(WIRE_PROTOCOL_VERSION);
        buf.push(self.packet_type as u8);
        buf.push(self.flags);
        buf.extend_from_slice(&self.sender_port.to_be_bytes());
        buf.push(name_bytes.len() as u8);
        buf.extend_from_slice(name_bytes);

        for tlv in &self.capabilities {
            buf.push(tlv.tag);
            buf.push(tlv.value.len() as u8);
            buf.extend_from_slice(&tlv.value);
        }

        buf
    }

    /// Decode a full datagram. Unlike the message frame codec, discovery
    /// packets arrive as complete datagrams (one recv == one packet), so
    /// there is no partial-buffer case (spec.md §4.3: "Magic is checked;
    /// malformed or wrong-version packets log a PROTOCOL warning and are
    /// discarded" — modeled here as a plain decode error for the caller
    /// to log and drop).
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 4 + 1 + 1 + 1 + 2 + 1 {
            return Err(Error::Truncated);
        }
        if buf[0..4] != MAGIC {
            return Err(Error::Magic);
        }
        let version = buf[4];
        if version != WIRE_PROTOCOL_VERSION {
            return Err(Error::Version);
        }
        let packet_type = PacketType::from_u8(buf[5]).ok_or(Error::Magic)?;
        let flags = buf[6];
        let sender_port = u16::from_be_bytes([buf[7], buf[8]]);
        let name_len = buf[9] as usize;

        if buf.len() < 10 + name_len {
            return Err(Error::Truncated);
        }
        let name = String::from_utf8_lossy(&buf[10..10 + name_len]).into_owned();

        let mut capabilities = Vec::new();
        let mut cursor = 10 + name_len;
        while cursor + 2 <= buf.len() {
            let tag = buf[cursor];
            let len = buf[cursor + 1] as usize;
            cursor += 2;
            if cursor + len > buf.len() {
                return Err(Error::Truncated);
            }
            capabilities.push(CapabilityTlv {
                tag,
                value: buf[cursor..cursor + len].to_vec(),
            });
            cursor += len;
        }

        Ok(Packet {
            packet_type,
            flags,
            sender_port,
            name,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let packet = Packet::new(PacketType::Announce, 7354, "alice");
        let encoded = packet.encode();
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn round_trips_with_capability_tlv() {
        let mut packet = Packet::new(PacketType::Query, 1, "bob");
        packet.capabilities.push(CapabilityTlv {
            tag: 1,
            value: vec![1, 2, 3],
        });
        let encoded = packet.encode();
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn empty_name_round_trips() {
        let packet = Packet::new(PacketType::Goodbye, 0, "");
        let encoded = packet.encode();
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = Packet::new(PacketType::Announce, 1, "x").encode();
        encoded[0] = b'Q';
        assert!(matches!(Packet::decode(&encoded), Err(Error::Magic)));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut encoded = Packet::new(PacketType::Announce, 1, "x").encode();
        encoded[4] = 7;
        assert!(matches!(Packet::decode(&encoded), Err(Error::Version)));
    }

    #[test]
    fn truncated_is_rejected() {
        let encoded = Packet::new(PacketType::Announce, 1, "alice").encode();
        let short = &encoded[..encoded.len() - 2];
        assert!(matches!(Packet::decode(short), Err(Error::Truncated)));
    }
}
