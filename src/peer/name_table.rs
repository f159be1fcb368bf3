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

//! Centralised peer name table (spec.md §3 "Name table", §4.2).
//!
//! A peer's name lives here, addressed by `name_idx`, rather than inline
//! in the hot struct, so the hot array stays small. [`PeerTable`](super::table::PeerTable)
//! keeps this parallel to the hot/cold arrays and moves entries in
//! lockstep during swap-back removal.

/// Dense, swap-back-compatible array of peer names.
#[derive(Debug, Default)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name, returning its `name_idx`.
    pub fn push(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.names.len() - 1
    }

    pub fn get(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn set(&mut self, idx: usize, name: impl Into<String>) {
        self.names[idx] = name.into();
    }

    /// Swap-remove the entry at `idx`, mirroring the peer table's
    /// swap-back removal. Returns the `name_idx` of whatever entry was
    /// moved into `idx` (`None` if `idx` was already the last slot).
    pub fn swap_remove(&mut self, idx: usize) -> Option<usize> {
        let last = self.names.len() - 1;
        self.names.swap_remove(idx);
        if idx == last {
            None
        } else {
            Some(idx)
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_remove_reports_the_moved_slot() {
        let mut table = NameTable::new();
        table.push("alice");
        table.push("bob");
        table.push("carol");

        let moved = table.swap_remove(0);
        assert_eq!(moved, Some(0));
        assert_eq!(table.get(0), "carol");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn swap_remove_of_last_slot_reports_none() {
        let mut table = NameTable::new();
        table.push("alice");
        table.push("bob");

        assert_eq!(table.swap_remove(1), None);
        assert_eq!(table.len(), 1);
    }
}
