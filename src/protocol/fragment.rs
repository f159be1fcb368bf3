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

//! Fragmentation and reassembly (spec.md §4.5, §8).
//!
//! A payload exceeding the peer's effective max is split into one
//! `FRAG_START`, zero or more `FRAG_CONT` and a terminating `FRAG_END`.
//! Each peer has exactly one in-progress reassembly at a time.

use crate::error::Error;
use crate::protocol::frame::{Frame, FrameType};

/// Split `payload` into frames no larger than `chunk` bytes of payload
/// each. If `payload.len() <= chunk`, a single `Data` frame is produced
/// instead of a fragmentation sequence (spec.md §4.5: fragmentation only
/// applies once the effective max is exceeded).
///
/// `next_sequence` is called once per frame produced, in order, so the
/// caller's per-peer sequence counter advances monotonically.
pub fn split(
    payload: &[u8],
    chunk: usize,
    mut next_sequence: impl FnMut() -> u32,
) -> Vec<Frame> {
    assert!(chunk > 0, "chunk size must be non-zero");

    if payload.len() <= chunk {
        return vec![Frame::new(FrameType::Data, next_sequence(), payload.to_vec())];
    }

    let mut frames = Vec::new();
    let mut chunks = payload.chunks(chunk);

    let first = chunks.next().expect("payload is non-empty");
    let mut start_payload = (payload.len() as u32).to_be_bytes().to_vec();
    start_payload.extend_from_slice(first);
    frames.push(Frame::new(FrameType::FragStart, next_sequence(), start_payload));

    let remaining: Vec<&[u8]> = chunks.collect();
    for (i, chunk_bytes) in remaining.iter().enumerate() {
        let is_last = i + 1 == remaining.len();
        let frame_type = if is_last { FrameType::FragEnd } else { FrameType::FragCont };
        frames.push(Frame::new(frame_type, next_sequence(), chunk_bytes.to_vec()));
    }

    frames
}

/// Reassembly state for one peer's in-progress fragmented message.
pub struct Reassembly {
    total_len: u32,
    buffer: Vec<u8>,
    last_sequence: Option<u32>,
    last_type: Option<FrameType>,
}

impl Reassembly {
    /// Begin reassembly from a `FRAG_START` frame.
    pub fn start(frame: &Frame) -> Result<Self, Error> {
        if frame.payload.len() < 4 {
            return Err(Error::Truncated);
        }
        let total_len = u32::from_be_bytes([
            frame.payload[0],
            frame.payload[1],
            frame.payload[2],
            frame.payload[3],
        ]);
        let mut buffer = Vec::with_capacity(total_len as usize);
        buffer.extend_from_slice(&frame.payload[4..]);

        if buffer.len() as u32 > total_len {
            return Err(Error::Internal("fragment exceeds declared total length"));
        }

        Ok(Self {
            total_len,
            buffer,
            last_sequence: Some(frame.sequence),
            last_type: Some(FrameType::FragStart),
        })
    }

    /// Feed a `FRAG_CONT` or `FRAG_END` frame. Returns `Some(payload)`
    /// once `FRAG_END` completes the message.
    ///
    /// Aborts (returns `Err`) on a sequence gap, a type mismatch (e.g. a
    /// `FRAG_END` seen twice), or if the accumulated size would exceed
    /// the declared total (spec.md §4.5).
    pub fn feed(&mut self, frame: &Frame) -> Result<Option<Vec<u8>>, Error> {
        let expected_seq = self
            .last_sequence
            .ok_or(Error::Internal("reassembly fed after completion"))?
            .wrapping_add(1);
        if frame.sequence != expected_seq {
            return Err(Error::Internal("fragment sequence gap"));
        }
        match (self.last_type, frame.frame_type) {
            (Some(FrameType::FragStart), FrameType::FragCont)
            | (Some(FrameType::FragStart), FrameType::FragEnd)
            | (Some(FrameType::FragCont), FrameType::FragCont)
            | (Some(FrameType::FragCont), FrameType::FragEnd) => {}
            _ => return Err(Error::Internal("fragment type mismatch")),
        }

        if self.buffer.len() + frame.payload.len() > self.total_len as usize {
            return Err(Error::Internal("fragment exceeds declared total length"));
        }

        self.buffer.extend_from_slice(&frame.payload);
        self.last_sequence = Some(frame.sequence);
        self.last_type = Some(frame.frame_type);

        if frame.frame_type == FrameType::FragEnd {
            if self.buffer.len() as u32 != self.total_len {
                return Err(Error::Internal("fragment sequence incomplete at FRAG_END"));
            }
            return Ok(Some(std::mem::take(&mut self.buffer)));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble_all(frames: &[Frame]) -> Result<Vec<u8>, Error> {
        let mut iter = frames.iter();
        let first = iter.next().expect("at least one frame");
        if first.frame_type != FrameType::FragStart {
            return Ok(first.payload.clone());
        }
        let mut reassembly = Reassembly::start(first)?;
        for frame in iter {
            if let Some(result) = reassembly.feed(frame)? {
                return Ok(result);
            }
        }
        Err(Error::Internal("reassembly never completed"))
    }

    #[test]
    fn small_payload_is_a_single_data_frame() {
        let mut seq = 0u32;
        let frames = split(b"hi", 512, || {
            let s = seq;
            seq += 1;
            s
        });
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::Data);
    }

    #[test]
    fn large_payload_round_trips_through_fragmentation() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i & 0xFF) as u8).collect();
        let mut seq = 0u32;
        let frames = split(&payload, 512, || {
            let s = seq;
            seq += 1;
            s
        });
        assert!(frames.len() > 1);
        assert_eq!(frames.first().unwrap().frame_type, FrameType::FragStart);
        assert_eq!(frames.last().unwrap().frame_type, FrameType::FragEnd);

        let result = reassemble_all(&frames).unwrap();
        assert_eq!(result, payload);
    }

    #[test]
    fn missing_middle_fragment_fails_cleanly() {
        let payload = vec![0xABu8; 2000];
        let mut seq = 0u32;
        let mut frames = split(&payload, 256, || {
            let s = seq;
            seq += 1;
            s
        });
        frames.remove(2);

        let mut iter = frames.iter();
        let first = iter.next().unwrap();
        let mut reassembly = Reassembly::start(first).unwrap();
        let mut failed = false;
        for frame in iter {
            if reassembly.feed(frame).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }

    #[test]
    fn duplicate_fragment_fails_cleanly() {
        let payload = vec![0x11u8; 1500];
        let mut seq = 0u32;
        let mut frames = split(&payload, 256, || {
            let s = seq;
            seq += 1;
            s
        });
        let dup = frames[1].clone();
        frames.insert(2, dup);

        assert!(reassemble_all(&frames).is_err());
    }
}
