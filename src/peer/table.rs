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

//! The peer table: O(1) allocation and swap-back removal, keyed by a
//! dense peer-ID-to-index array (spec.md §3, §4.2, §8 "Testable
//! properties", §9 "O(1) peer ID lookup").

use crate::error::Error;
use crate::peer::{NameTable, PeerCold, PeerHot, PeerState};
use crate::peer_id::{IdGenerator, PeerId};
use crate::types::PeerAddress;

/// Peer table: parallel hot/cold arrays plus the ID-to-index lookup and
/// the centralised name table, all kept in lockstep under swap-back
/// removal (spec.md invariant 2: "`peer_id_to_index[id]` points back to
/// this slot whenever the peer's state is not UNUSED").
pub struct PeerTable {
    capacity: usize,
    hot: Vec<PeerHot>,
    cold: Vec<PeerCold>,
    names: NameTable,
    id_to_index: Box<[Option<usize>; 256]>,
    id_generator: IdGenerator,
    /// Bumped on every structural change; backs `GetPeersVersion` so
    /// callers can cheaply detect whether a cached peer list is stale.
    version: u64,
}

impl PeerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hot: Vec::with_capacity(capacity),
            cold: Vec::with_capacity(capacity),
            names: NameTable::new(),
            id_to_index: Box::new([None; 256]),
            id_generator: IdGenerator::default(),
            version: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.hot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hot.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_full(&self) -> bool {
        self.hot.len() >= self.capacity
    }

    /// Allocate a new `DISCOVERED` peer (spec.md §4.2). Fails with
    /// [`Error::PeerTableFull`] once `peer_count == max_peers`.
    pub fn allocate(&mut self, name: impl Into<String>, now_ms: u64) -> Result<PeerId, Error> {
        if self.is_full() {
            return Err(Error::PeerTableFull);
        }

        let id_to_index = &self.id_to_index;
        let id = self
            .id_generator
            .allocate(|candidate| id_to_index[candidate as usize].is_some())
            .ok_or(Error::PeerTableFull)?;

        let index = self.hot.len();
        let name_idx = self.names.push(name);
        self.hot.push(PeerHot::new(id, name_idx, now_ms));
        self.cold.push(PeerCold::new());
        self.id_to_index[id.value() as usize] = Some(index);
        self.version += 1;

        Ok(id)
    }

    /// Remove a peer via swap-back (spec.md §4.2, §9 "Swap-back
    /// removal"): the last live slot overwrites the removed one and the
    /// lookup table is patched for the moved peer. Returns the removed
    /// peer's cold state so the caller can drain its queue and fold its
    /// stats into the context-wide aggregate.
    pub fn remove(&mut self, id: PeerId) -> Option<PeerCold> {
        let index = self.id_to_index[id.value() as usize].take()?;
        let last = self.hot.len() - 1;

        self.hot.swap_remove(index);
        let removed_cold = self.cold.swap_remove(index);
        self.names.swap_remove(index);

        if index != last {
            let moved_id = self.hot[index].id;
            self.id_to_index[moved_id.value() as usize] = Some(index);
        }

        self.version += 1;
        Some(removed_cold)
    }

    pub fn index_of(&self, id: PeerId) -> Option<usize> {
        self.id_to_index[id.value() as usize]
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn hot(&self, id: PeerId) -> Option<&PeerHot> {
        self.index_of(id).map(|i| &self.hot[i])
    }

    pub fn hot_mut(&mut self, id: PeerId) -> Option<&mut PeerHot> {
        let index = self.index_of(id)?;
        Some(&mut self.hot[index])
    }

    pub fn cold(&self, id: PeerId) -> Option<&PeerCold> {
        self.index_of(id).map(|i| &self.cold[i])
    }

    pub fn cold_mut(&mut self, id: PeerId) -> Option<&mut PeerCold> {
        let index = self.index_of(id)?;
        Some(&mut self.cold[index])
    }

    /// Split borrow of one peer's hot and cold halves, used by the poll
    /// loop which needs both at once without re-deriving the index twice.
    pub fn pair_mut(&mut self, id: PeerId) -> Option<(&mut PeerHot, &mut PeerCold)> {
        let index = self.index_of(id)?;
        Some((&mut self.hot[index], &mut self.cold[index]))
    }

    pub fn name(&self, id: PeerId) -> Option<&str> {
        let index = self.index_of(id)?;
        Some(self.names.get(self.hot[index].name_idx))
    }

    /// All live peer IDs, in table order (spec.md §6 `GetPeers`).
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.hot.iter().map(|h| h.id).collect()
    }

    /// Linear scan by name (spec.md §4.2 "cold path"), used both by
    /// `FindPeerByName` and by the discovery engine's find-or-create.
    pub fn find_by_name(&self, name: &str) -> Option<PeerId> {
        self.hot
            .iter()
            .find(|h| self.names.get(h.name_idx) == name)
            .map(|h| h.id)
    }

    pub fn find_by_address(&self, address: &PeerAddress) -> Option<PeerId> {
        self.hot
            .iter()
            .zip(self.cold.iter())
            .find(|(_, cold)| cold.addresses.iter().flatten().any(|a| a == address))
            .map(|(hot, _)| hot.id)
    }

    /// Match on host address alone, ignoring port/transport. Unreliable
    /// datagram traffic (spec.md §6 `SendUDP`/`BroadcastUDP`) arrives from
    /// a peer's IP but not necessarily the advertised stream port, so the
    /// full `PeerAddress` equality `find_by_address` uses is too strict
    /// for attributing it back to a known peer.
    pub fn find_by_ip(&self, ip: std::net::IpAddr) -> Option<PeerId> {
        self.hot
            .iter()
            .zip(self.cold.iter())
            .find(|(_, cold)| cold.addresses.iter().flatten().any(|a| a.address == ip))
            .map(|(hot, _)| hot.id)
    }

    /// Iterate hot entries whose state matches `state`, yielding the
    /// peer ID (used by the sweep and by `Context::poll`'s per-state
    /// dispatch passes, spec.md §4.1 step 6).
    pub fn ids_in_state(&self, state: PeerState) -> Vec<PeerId> {
        self.hot
            .iter()
            .filter(|h| h.state == state)
            .map(|h| h.id)
            .collect()
    }

    pub fn hot_slice(&self) -> &[PeerHot] {
        &self.hot
    }
}
