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

//! Message protocol: framing, CRC, fragmentation, capability exchange
//! and ping/pong RTT sampling (spec.md §4.5).

pub mod capability;
pub mod crc;
pub mod fragment;
pub mod frame;

pub use capability::Capabilities;
pub use fragment::Reassembly;
pub use frame::{decode, Decoded, Frame, FrameType};

/// Width of the rolling RTT sample window (spec.md §3 "rolling RTT
/// samples").
pub const RTT_WINDOW: usize = 8;

/// Rolling window of the last [`RTT_WINDOW`] RTT samples observed from
/// `PONG` replies.
#[derive(Debug, Clone)]
pub struct RttSampler {
    samples: [u32; RTT_WINDOW],
    len: usize,
    next: usize,
}

impl Default for RttSampler {
    fn default() -> Self {
        Self {
            samples: [0; RTT_WINDOW],
            len: 0,
            next: 0,
        }
    }
}

impl RttSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one RTT sample, in milliseconds.
    pub fn record(&mut self, rtt_ms: u32) {
        self.samples[self.next] = rtt_ms;
        self.next = (self.next + 1) % RTT_WINDOW;
        self.len = (self.len + 1).min(RTT_WINDOW);
    }

    /// Mean of the samples currently in the window, or `None` if empty.
    pub fn estimate(&self) -> Option<u32> {
        if self.len == 0 {
            return None;
        }
        let sum: u64 = self.samples[..self.len].iter().map(|&s| s as u64).sum();
        Some((sum / self.len as u64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest_sample() {
        let mut sampler = RttSampler::new();
        for i in 1..=RTT_WINDOW {
            sampler.record(i as u32 * 10);
        }
        assert_eq!(sampler.estimate(), Some(45)); // mean of 10..=80

        sampler.record(1000);
        // oldest sample (10) evicted, replaced by 1000
        let expected: u32 = (20 + 30 + 40 + 50 + 60 + 70 + 80 + 1000) / 8;
        assert_eq!(sampler.estimate(), Some(expected));
    }

    #[test]
    fn empty_sampler_has_no_estimate() {
        assert_eq!(RttSampler::new().estimate(), None);
    }
}
