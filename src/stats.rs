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

//! Aggregate statistics (spec.md §3 "aggregate statistics",
//! §6 `GetPeerStats`/`GetGlobalStats`/`ResetStats`).

/// Per-peer counters, the cold half's "statistics" field (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub sends_dropped: u64,
    pub sends_coalesced: u64,
    pub frames_crc_failed: u64,
    pub reconnects: u64,
}

/// Context-wide aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub peers_discovered: u64,
    pub peers_connected: u64,
    pub peers_lost: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub sends_dropped: u64,
    pub sends_coalesced: u64,
    pub frames_crc_failed: u64,
    pub reconnects: u64,
}

impl GlobalStats {
    /// Fold a peer's stats into the aggregate (called as peers are
    /// removed, so the numbers survive swap-back removal).
    pub fn accumulate(&mut self, peer: &PeerStats) {
        self.messages_sent += peer.messages_sent;
        self.messages_received += peer.messages_received;
        self.bytes_sent += peer.bytes_sent;
        self.bytes_received += peer.bytes_received;
        self.sends_dropped += peer.sends_dropped;
        self.sends_coalesced += peer.sends_coalesced;
        self.frames_crc_failed += peer.frames_crc_failed;
        self.reconnects += peer.reconnects;
    }

    pub fn reset(&mut self) {
        *self = GlobalStats::default();
    }
}
