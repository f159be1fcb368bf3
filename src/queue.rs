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

//! Send queue: four priority FIFOs with newest-wins coalescing
//! (spec.md §3 "Queue", §4.6).

use crate::error::Error;
use crate::types::{Priority, SendFlags, Transport};
use std::collections::VecDeque;

/// Capacity of each priority bucket; a power of two per spec.md §3's
/// queue invariant. See DESIGN.md Open Question (d): spec.md's
/// configuration table does not expose a queue-depth knob, so this is a
/// crate constant rather than a config field.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Per-priority queue depth, backing `GetQueueStatus` (spec.md §6).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub critical: usize,
}

impl QueueStatus {
    pub fn total(&self) -> usize {
        self.low + self.normal + self.high + self.critical
    }
}

/// One queued send.
#[derive(Debug, Clone)]
pub struct Entry {
    pub priority: Priority,
    pub coalesce_key: u16,
    pub flags: SendFlags,
    pub sequence: u32,
    pub transport_hint: Transport,
    pub buffer: Vec<u8>,
    /// Present when the entry was posted through `SendTracked`
    /// (spec.md §9 "Send-tracked IDs").
    pub send_id: Option<u64>,
}

/// A single peer's send queue: four FIFOs, one per [`Priority`], each
/// capped at [`DEFAULT_QUEUE_CAPACITY`].
#[derive(Debug)]
pub struct SendQueue {
    capacity_per_priority: usize,
    buckets: [VecDeque<Entry>; 4],
}

fn bucket_index(priority: Priority) -> usize {
    priority as usize
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl SendQueue {
    pub fn new(capacity_per_priority: usize) -> Self {
        Self {
            capacity_per_priority,
            buckets: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
        }
    }

    /// Total number of queued entries across all priorities.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue one send (spec.md §4.6):
    ///
    /// 1. If coalescable and `coalesce_key != 0`, replace any existing
    ///    queued entry with the same key (newest-wins), preserving its
    ///    slot (and so its priority/position).
    /// 2. Otherwise append to the tail of its priority's FIFO.
    /// 3. If that bucket is full, return `Err(Backpressure)` unless
    ///    `DROP_ON_FULL` is set, in which case the entry is silently
    ///    dropped and `Ok(())` is returned with `dropped = true`.
    pub fn enqueue(&mut self, entry: Entry) -> Result<bool, Error> {
        if entry.flags.contains(SendFlags::COALESCABLE) && entry.coalesce_key != 0 {
            let bucket = &mut self.buckets[bucket_index(entry.priority)];
            if let Some(existing) = bucket
                .iter_mut()
                .find(|queued| queued.coalesce_key == entry.coalesce_key)
            {
                existing.buffer = entry.buffer;
                existing.sequence = entry.sequence;
                existing.transport_hint = entry.transport_hint;
                existing.send_id = entry.send_id;
                return Ok(false);
            }
        }

        let bucket = &mut self.buckets[bucket_index(entry.priority)];
        if bucket.len() >= self.capacity_per_priority {
            if entry.flags.contains(SendFlags::DROP_ON_FULL) {
                return Ok(true);
            }
            return Err(Error::Backpressure);
        }

        bucket.push_back(entry);
        Ok(false)
    }

    /// Dequeue up to `batch` entries, highest priority first, FIFO
    /// within a priority.
    pub fn dequeue_batch(&mut self, batch: usize) -> Vec<Entry> {
        let mut drained = Vec::with_capacity(batch);
        'outer: for priority in Priority::ALL_HIGH_TO_LOW {
            let bucket = &mut self.buckets[bucket_index(priority)];
            while drained.len() < batch {
                match bucket.pop_front() {
                    Some(entry) => drained.push(entry),
                    None => continue 'outer,
                }
            }
            if drained.len() == batch {
                break;
            }
        }
        drained
    }

    /// Snapshot of how many entries sit in each priority bucket, backing
    /// `GetQueueStatus` (spec.md §6).
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            low: self.buckets[bucket_index(Priority::Low)].len(),
            normal: self.buckets[bucket_index(Priority::Normal)].len(),
            high: self.buckets[bucket_index(Priority::High)].len(),
            critical: self.buckets[bucket_index(Priority::Critical)].len(),
        }
    }

    /// Discard every queued entry, returning how many were dropped
    /// (spec.md §4.4: "If a peer is removed while its queue is
    /// non-empty, queued entries are discarded and accounted as
    /// dropped").
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        for bucket in &mut self.buckets {
            dropped += bucket.len();
            bucket.clear();
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: Priority, seq: u32) -> Entry {
        Entry {
            priority,
            coalesce_key: 0,
            flags: SendFlags::NONE,
            sequence: seq,
            transport_hint: Transport::Stream,
            buffer: vec![seq as u8],
            send_id: None,
        }
    }

    #[test]
    fn drains_non_increasing_priority_then_insertion_order() {
        let mut queue = SendQueue::default();
        queue.enqueue(entry(Priority::Low, 1)).unwrap();
        queue.enqueue(entry(Priority::Critical, 2)).unwrap();
        queue.enqueue(entry(Priority::Normal, 3)).unwrap();
        queue.enqueue(entry(Priority::Critical, 4)).unwrap();

        let drained = queue.dequeue_batch(10);
        let sequences: Vec<u32> = drained.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 4, 3, 1]);
    }

    #[test]
    fn coalescing_replaces_in_place_and_keeps_one_entry() {
        let mut queue = SendQueue::default();
        let mut first = entry(Priority::Normal, 1);
        first.coalesce_key = 7;
        first.flags = SendFlags::COALESCABLE;
        queue.enqueue(first).unwrap();

        let mut second = entry(Priority::Normal, 2);
        second.coalesce_key = 7;
        second.flags = SendFlags::COALESCABLE;
        second.buffer = vec![0xAA];
        queue.enqueue(second).unwrap();

        assert_eq!(queue.len(), 1);
        let drained = queue.dequeue_batch(10);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].sequence, 2);
        assert_eq!(drained[0].buffer, vec![0xAA]);
    }

    #[test]
    fn without_coalescable_flag_both_entries_are_queued() {
        let mut queue = SendQueue::default();
        let mut first = entry(Priority::Normal, 1);
        first.coalesce_key = 7;
        queue.enqueue(first).unwrap();

        let mut second = entry(Priority::Normal, 2);
        second.coalesce_key = 7;
        queue.enqueue(second).unwrap();

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn backpressure_when_priority_bucket_is_full() {
        let mut queue = SendQueue::new(2);
        queue.enqueue(entry(Priority::Normal, 1)).unwrap();
        queue.enqueue(entry(Priority::Normal, 2)).unwrap();
        assert!(matches!(
            queue.enqueue(entry(Priority::Normal, 3)),
            Err(Error::Backpressure)
        ));
    }

    #[test]
    fn drop_on_full_silently_discards() {
        let mut queue = SendQueue::new(1);
        queue.enqueue(entry(Priority::Normal, 1)).unwrap();

        let mut overflow = entry(Priority::Normal, 2);
        overflow.flags = SendFlags::DROP_ON_FULL;
        let dropped = queue.enqueue(overflow).unwrap();
        assert!(dropped);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn four_fit_fifth_backpressures_then_drain_frees_one_slot() {
        let mut queue = SendQueue::new(4);
        for i in 0..4 {
            queue.enqueue(entry(Priority::Normal, i)).unwrap();
        }
        assert!(matches!(
            queue.enqueue(entry(Priority::Normal, 99)),
            Err(Error::Backpressure)
        ));

        let drained = queue.dequeue_batch(1);
        assert_eq!(drained.len(), 1);
        queue.enqueue(entry(Priority::Normal, 100)).unwrap();
    }

    #[test]
    fn status_reports_per_priority_depth() {
        let mut queue = SendQueue::default();
        queue.enqueue(entry(Priority::Low, 1)).unwrap();
        queue.enqueue(entry(Priority::Low, 2)).unwrap();
        queue.enqueue(entry(Priority::Critical, 3)).unwrap();

        let status = queue.status();
        assert_eq!(status.low, 2);
        assert_eq!(status.critical, 1);
        assert_eq!(status.total(), 3);
    }

    #[test]
    fn clear_discards_everything_and_reports_count() {
        let mut queue = SendQueue::default();
        queue.enqueue(entry(Priority::Low, 1)).unwrap();
        queue.enqueue(entry(Priority::High, 2)).unwrap();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
