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

//! Peer lifecycle: hot/cold state split, the peer table and the name
//! table (spec.md §3 "Peer", §4.2, §9 "Hot/cold split of peer state").

pub mod name_table;
pub mod table;

pub use name_table::NameTable;
pub use table::PeerTable;

use crate::protocol::{Capabilities, RttSampler};
use crate::queue::SendQueue;
use crate::stats::PeerStats;
use crate::types::{PeerAddress, PeerFlags, Transport};
use crate::peer_id::PeerId;

/// Peer-level lifecycle state (spec.md §3 "States").
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PeerState {
    Unused,
    Discovered,
    Connecting,
    Connected,
    Disconnecting,
    Failed,
}

/// Fields touched on every poll pass, packed together for locality
/// (spec.md §3, §9 "Hot/cold split of peer state"). Rust does not give
/// manual control over layout the way the source's C struct does, but
/// the separation from [`PeerCold`] is what actually matters: the hot
/// array is what `Context::poll` scans every call.
#[derive(Debug, Clone)]
pub struct PeerHot {
    pub id: PeerId,
    pub state: PeerState,
    /// Index into the connection stream table, once one exists for this
    /// peer (spec.md §3 "connection handle (opaque)").
    pub connection: Option<usize>,
    /// Per-connection validation tag; incremented whenever `connection`
    /// is rebound, so a stale completion event referring to an old
    /// connection index can be detected and dropped.
    pub validation_tag: u32,
    pub last_activity_ms: u64,
    pub flags: PeerFlags,
    pub rtt_estimate_ms: Option<u32>,
    pub address_count: u8,
    pub preferred_transport: Transport,
    pub send_sequence: u32,
    pub recv_sequence: u32,
    pub name_idx: usize,
    pub asr_flags: crate::types::AsrFlags,
    pub async_op_pending: bool,
    pub async_result: Option<Result<(), crate::error::Error>>,
    pub buffer_outstanding: bool,
    pub pending_log_event: bool,
}

impl PeerHot {
    fn new(id: PeerId, name_idx: usize, last_activity_ms: u64) -> Self {
        Self {
            id,
            state: PeerState::Discovered,
            connection: None,
            validation_tag: 0,
            last_activity_ms,
            flags: PeerFlags::NONE,
            rtt_estimate_ms: None,
            address_count: 0,
            preferred_transport: Transport::Stream,
            send_sequence: 0,
            recv_sequence: 0,
            name_idx,
            asr_flags: crate::types::AsrFlags::NONE,
            async_op_pending: false,
            async_result: None,
            buffer_outstanding: false,
            pending_log_event: false,
        }
    }
}

/// Rarely-touched per-peer state (spec.md §3 "Cold half").
#[derive(Debug, Default)]
pub struct PeerCold {
    pub addresses: [Option<PeerAddress>; 2],
    pub stats: PeerStats,
    pub rtt_samples: RttSampler,
    pub send_queue: SendQueue,
    pub capabilities: Option<Capabilities>,
    pub reassembly: Option<crate::protocol::Reassembly>,
    /// Set when a `PING` is emitted, cleared once the matching `PONG`
    /// closes the round trip (spec.md §4.5 "PING/PONG RTT sampling").
    pub last_ping_sent_ms: Option<u64>,
    pub last_ping_sequence: Option<u32>,
}

impl PeerCold {
    fn new() -> Self {
        Self::default()
    }
}
