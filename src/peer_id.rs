// Copyright 2023 litep2p developers
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

//! Peer identifiers.
//!
//! The ID space is deliberately small (0..=255, spec.md §3/§4.2): a dense
//! array keyed by ID is cheaper and simpler than a hash map and the
//! layout is deterministic on constrained targets (spec.md §9).

use std::fmt;

/// Reserved ID meaning "no peer" / "uninitialized slot".
pub const RESERVED: u8 = 0;

/// Opaque small peer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub(crate) u8);

impl PeerId {
    /// Raw numeric value, 1..=255.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Monotonic ID generator that skips IDs already present in the
/// peer-ID-to-index lookup table and treats ID 0 as reserved (spec.md
/// §4.2).
#[derive(Debug)]
pub struct IdGenerator {
    next: u8,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdGenerator {
    /// Allocate the next free ID, given a predicate telling whether an ID
    /// is currently in use. Wraps within the 16-bit- err, 8-bit space
    /// (spec.md's ID space is described as 0..255) and returns `None` if
    /// every non-reserved ID is occupied.
    pub fn allocate(&mut self, in_use: impl Fn(u8) -> bool) -> Option<PeerId> {
        let start = self.next;
        loop {
            let candidate = self.next;
            self.next = self.next.wrapping_add(1);
            if self.next == RESERVED {
                self.next = self.next.wrapping_add(1);
            }

            if candidate != RESERVED && !in_use(candidate) {
                return Some(PeerId(candidate));
            }

            if self.next == start {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn never_allocates_the_reserved_id() {
        let mut gen = IdGenerator::default();
        for _ in 0..300 {
            let id = gen.allocate(|_| false).unwrap();
            assert_ne!(id.value(), RESERVED);
        }
    }

    #[test]
    fn skips_ids_already_in_use() {
        let mut gen = IdGenerator::default();
        let mut used = HashSet::new();
        used.insert(1u8);
        used.insert(2u8);

        let id = gen.allocate(|v| used.contains(&v)).unwrap();
        assert_eq!(id.value(), 3);
    }

    #[test]
    fn returns_none_when_exhausted() {
        let mut gen = IdGenerator::default();
        let id = gen.allocate(|v| v != 5).unwrap();
        assert_eq!(id.value(), 5);

        let mut gen_full = IdGenerator::default();
        assert!(gen_full.allocate(|_| true).is_none());
    }
}
