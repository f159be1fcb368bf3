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

//! Connection stream state machine (spec.md §3 "Connection stream",
//! §4.4). One instance lives per peer plus one for the listener.
//! Transitions here are a pure function of `(state, event)`; the side
//! effects (calling the transport adapter, firing callbacks, touching
//! the peer table) are driven by `Context::poll`, which is the only
//! caller that has all of those at hand.

use crate::callbacks::DisconnectReason;
use crate::error::Error;
use crate::peer_id::PeerId;
use crate::transport::StreamHandle;
use crate::types::AsrFlags;

/// Lifecycle state of one connection stream (spec.md §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnState {
    Unused,
    Creating,
    Idle,
    Listening,
    Connecting,
    Connected,
    Closing,
    Releasing,
}

/// An input to the state machine (spec.md §4.4's transition table,
/// "Event" column).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnEvent {
    CreateRequested,
    CreateComplete,
    ActiveOpenRequested,
    PassiveOpenRequested,
    AcceptComplete,
    ConnectOk,
    ConnectTimeout,
    ConnectError,
    DataArrived,
    RemoteClose,
    DisconnectRequested,
    CloseComplete,
    CloseTimeout,
    Released,
}

/// Apply one transition, returning the next state or `None` if `event`
/// does not apply in `state` (the caller should treat that as a no-op,
/// not an error: spec.md §4.7 "otherwise skip").
pub fn next_state(state: ConnState, event: ConnEvent) -> Option<ConnState> {
    use ConnEvent::*;
    use ConnState::*;

    match (state, event) {
        (Unused, CreateRequested) => Some(Creating),
        (Creating, CreateComplete) => Some(Idle),
        (Idle, ActiveOpenRequested) => Some(Connecting),
        (Idle, PassiveOpenRequested) => Some(Listening),
        // the listener re-arms itself and stays LISTENING; the accepted
        // connection gets its own slot, allocated by the caller.
        (Listening, AcceptComplete) => Some(Listening),
        (Connecting, ConnectOk) => Some(Connected),
        (Connecting, ConnectTimeout) => Some(Closing),
        (Connecting, ConnectError) => Some(Closing),
        (Connected, DataArrived) => Some(Connected),
        (Connected, RemoteClose) => Some(Closing),
        (Connected, DisconnectRequested) => Some(Closing),
        (Closing, CloseComplete) => Some(Releasing),
        (Closing, CloseTimeout) => Some(Releasing),
        (Releasing, Released) => Some(Unused),
        _ => None,
    }
}

/// Fields touched every poll pass (spec.md §3 "Connection stream" hot
/// struct).
#[derive(Debug, Clone)]
pub struct ConnHot {
    pub state: ConnState,
    pub handle: Option<StreamHandle>,
    pub asr_flags: AsrFlags,
    pub async_result: Option<Result<(), Error>>,
    pub buffer_outstanding: bool,
    /// Back-reference to the peer this stream belongs to, `None` for
    /// the listener's own stream. Keyed by [`PeerId`] rather than a raw
    /// table index since peer-table removal swap-compacts positions
    /// (spec.md §3 "Peer table"); an index would go stale whenever an
    /// unrelated peer is removed.
    pub peer_index: Option<PeerId>,
    pub pending_log_event: bool,
    /// Snapshot of the owning peer's `validation_tag` at the moment this
    /// slot was bound to it. A platform event that arrives for this
    /// slot's handle after the owning peer has rebound `connection`
    /// elsewhere carries a stale tag and is dropped rather than applied.
    pub owner_validation_tag: u32,
}

impl Default for ConnHot {
    fn default() -> Self {
        Self {
            state: ConnState::Unused,
            handle: None,
            asr_flags: AsrFlags::NONE,
            async_result: None,
            buffer_outstanding: false,
            peer_index: None,
            pending_log_event: false,
            owner_validation_tag: 0,
        }
    }
}

/// Rarely-touched per-connection state (spec.md §3 cold struct).
#[derive(Debug, Default)]
pub struct ConnCold {
    pub listen_port: Option<u16>,
    pub remote_address: Option<std::net::IpAddr>,
    pub remote_port: Option<u16>,
    pub close_initiated_ms: Option<u64>,
    pub connect_deadline_ms: Option<u64>,
    pub close_deadline_ms: Option<u64>,
    pub termination_reason: Option<DisconnectReason>,
    /// Per-connection input framing buffer (spec.md §4.5): bytes
    /// accumulate here until a full frame can be extracted.
    pub recv_framing_buffer: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ConnSlot {
    pub hot: ConnHot,
    pub cold: ConnCold,
}

/// Free-list-backed slot table for connection streams. Unlike the peer
/// table, slots are reused in place rather than swap-compacted: a
/// peer's `connection` field and the listener's own index must stay
/// valid for the slot's entire lifetime.
#[derive(Debug, Default)]
pub struct ConnTable {
    slots: Vec<ConnSlot>,
    free: Vec<usize>,
}

impl ConnTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> usize {
        if let Some(index) = self.free.pop() {
            self.slots[index] = ConnSlot::default();
            self.slots[index].hot.state = ConnState::Creating;
            index
        } else {
            self.slots.push(ConnSlot {
                hot: ConnHot {
                    state: ConnState::Creating,
                    ..ConnHot::default()
                },
                cold: ConnCold::default(),
            });
            self.slots.len() - 1
        }
    }

    pub fn release(&mut self, index: usize) {
        self.slots[index] = ConnSlot::default();
        self.free.push(index);
    }

    pub fn get(&self, index: usize) -> &ConnSlot {
        &self.slots[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ConnSlot {
        &mut self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnEvent::*;
    use ConnState::*;

    #[test]
    fn full_lifecycle_matches_the_transition_table() {
        let mut state = Unused;
        for (event, expected) in [
            (CreateRequested, Creating),
            (CreateComplete, Idle),
            (ActiveOpenRequested, Connecting),
            (ConnectOk, Connected),
            (DisconnectRequested, Closing),
            (CloseComplete, Releasing),
            (Released, Unused),
        ] {
            state = next_state(state, event).expect("transition should apply");
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn connect_timeout_and_connect_error_both_lead_to_closing() {
        assert_eq!(next_state(Connecting, ConnectTimeout), Some(Closing));
        assert_eq!(next_state(Connecting, ConnectError), Some(Closing));
    }

    #[test]
    fn close_timeout_forces_release_same_as_clean_close() {
        assert_eq!(next_state(Closing, CloseTimeout), Some(Releasing));
        assert_eq!(next_state(Closing, CloseComplete), Some(Releasing));
    }

    #[test]
    fn listener_stays_listening_across_accepts() {
        assert_eq!(next_state(Listening, AcceptComplete), Some(Listening));
    }

    #[test]
    fn unrelated_event_in_a_state_is_a_no_op() {
        assert_eq!(next_state(Idle, DataArrived), None);
        assert_eq!(next_state(Unused, ConnectOk), None);
    }

    #[test]
    fn table_reuses_released_slots() {
        let mut table = ConnTable::new();
        let a = table.allocate();
        let b = table.allocate();
        assert_ne!(a, b);

        table.release(a);
        let c = table.allocate();
        assert_eq!(c, a);
        assert_eq!(table.get(c).hot.state, ConnState::Creating);
    }
}
