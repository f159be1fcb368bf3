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

//! Capability exchange (spec.md §4.5, §9 Open Question a).
//!
//! Immediately after a connection enters `CONNECTED`, both sides send
//! one `CAPABILITY` frame carrying their configured maximum and
//! preferred chunk size. The effective maximum is the minimum of the
//! two advertised maxima; sends posted before the exchange completes
//! use conservative defaults (spec.md default: 512 bytes).

use crate::error::Error;
use crate::protocol::frame::{Frame, FrameType};

/// Conservative default used before a peer's capability is known.
pub const CONSERVATIVE_EFFECTIVE_MAX: usize = 512;

/// Local and (once received) remote capability, backing `GetPeerStats`/
/// `GetPeer` diagnostics (SPEC_FULL.md supplement 2).
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub local_max: u32,
    pub local_chunk: u32,
    pub remote_max: Option<u32>,
    pub remote_chunk: Option<u32>,
}

impl Capabilities {
    pub fn new(local_max: usize, local_chunk: usize) -> Self {
        Self {
            local_max: local_max as u32,
            local_chunk: local_chunk as u32,
            remote_max: None,
            remote_chunk: None,
        }
    }

    /// Encode the local capability as a `CAPABILITY` frame payload:
    /// 4-byte max, 4-byte preferred chunk, both big-endian.
    pub fn to_frame(&self, sequence: u32) -> Frame {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&self.local_max.to_be_bytes());
        payload.extend_from_slice(&self.local_chunk.to_be_bytes());
        Frame::new(FrameType::Capability, sequence, payload)
    }

    /// Record a received `CAPABILITY` frame's payload.
    pub fn receive(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() < 8 {
            return Err(Error::Truncated);
        }
        self.remote_max = Some(u32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]));
        self.remote_chunk = Some(u32::from_be_bytes([
            payload[4], payload[5], payload[6], payload[7],
        ]));
        Ok(())
    }

    /// Effective max (spec.md Glossary): the minimum of the two
    /// advertised maxima once both are known, or the conservative
    /// default otherwise.
    pub fn effective_max(&self) -> usize {
        match self.remote_max {
            Some(remote) => (self.local_max as usize).min(remote as usize),
            None => CONSERVATIVE_EFFECTIVE_MAX.min(self.local_max as usize),
        }
    }

    /// Preferred chunk size to fragment with, once both sides are
    /// known; falls back to the local preference otherwise.
    pub fn effective_chunk(&self) -> usize {
        match self.remote_chunk {
            Some(remote) => (self.local_chunk as usize).min(remote as usize),
            None => self.local_chunk as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_max_is_the_minimum_once_both_known() {
        let mut caps = Capabilities::new(8192, 1024);
        caps.receive(&512u32.to_be_bytes().iter().chain(256u32.to_be_bytes().iter()).copied().collect::<Vec<u8>>()).unwrap();
        assert_eq!(caps.effective_max(), 512);
        assert_eq!(caps.effective_chunk(), 256);
    }

    #[test]
    fn effective_max_is_conservative_before_exchange() {
        let caps = Capabilities::new(8192, 1024);
        assert_eq!(caps.effective_max(), CONSERVATIVE_EFFECTIVE_MAX);
    }

    #[test]
    fn frame_round_trips_through_receive() {
        let caps = Capabilities::new(4096, 512);
        let frame = caps.to_frame(0);

        let mut peer_caps = Capabilities::new(8192, 1024);
        peer_caps.receive(&frame.payload).unwrap();
        assert_eq!(peer_caps.remote_max, Some(4096));
        assert_eq!(peer_caps.remote_chunk, Some(512));
    }
}
