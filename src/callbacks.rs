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

//! Application callback table, backing `SetCallbacks` (spec.md §6).
//!
//! Callbacks fire only from within `poll`, never from interrupt context
//! (spec.md §5).

use crate::error::Error;
use crate::peer_id::PeerId;

/// Reason a peer disconnected or was lost, surfaced to
/// `on_peer_disconnected` (spec.md §4.4, §7, §8 scenario 4/5).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Timeout,
    Network,
    Remote,
    Local,
}

type PeerCb = Box<dyn FnMut(PeerId) + Send>;
type DisconnectCb = Box<dyn FnMut(PeerId, DisconnectReason) + Send>;
type MessageCb = Box<dyn FnMut(PeerId, &[u8]) + Send>;
type SentCb = Box<dyn FnMut(u64, Result<(), Error>) + Send>;

/// Callback table. Every slot is optional; an unset callback is simply
/// not invoked.
#[derive(Default)]
pub struct Callbacks {
    pub(crate) on_peer_discovered: Option<PeerCb>,
    pub(crate) on_peer_connected: Option<PeerCb>,
    pub(crate) on_peer_disconnected: Option<DisconnectCb>,
    pub(crate) on_peer_lost: Option<PeerCb>,
    pub(crate) on_message_received: Option<MessageCb>,
    pub(crate) on_message_sent: Option<SentCb>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_peer_discovered(&mut self, cb: impl FnMut(PeerId) + Send + 'static) {
        self.on_peer_discovered = Some(Box::new(cb));
    }

    pub fn set_on_peer_connected(&mut self, cb: impl FnMut(PeerId) + Send + 'static) {
        self.on_peer_connected = Some(Box::new(cb));
    }

    pub fn set_on_peer_disconnected(
        &mut self,
        cb: impl FnMut(PeerId, DisconnectReason) + Send + 'static,
    ) {
        self.on_peer_disconnected = Some(Box::new(cb));
    }

    pub fn set_on_peer_lost(&mut self, cb: impl FnMut(PeerId) + Send + 'static) {
        self.on_peer_lost = Some(Box::new(cb));
    }

    pub fn set_on_message_received(&mut self, cb: impl FnMut(PeerId, &[u8]) + Send + 'static) {
        self.on_message_received = Some(Box::new(cb));
    }

    pub fn set_on_message_sent(&mut self, cb: impl FnMut(u64, Result<(), Error>) + Send + 'static) {
        self.on_message_sent = Some(Box::new(cb));
    }

    pub(crate) fn fire_peer_discovered(&mut self, peer: PeerId) {
        if let Some(cb) = self.on_peer_discovered.as_mut() {
            cb(peer);
        }
    }

    pub(crate) fn fire_peer_connected(&mut self, peer: PeerId) {
        if let Some(cb) = self.on_peer_connected.as_mut() {
            cb(peer);
        }
    }

    pub(crate) fn fire_peer_disconnected(&mut self, peer: PeerId, reason: DisconnectReason) {
        if let Some(cb) = self.on_peer_disconnected.as_mut() {
            cb(peer, reason);
        }
    }

    pub(crate) fn fire_peer_lost(&mut self, peer: PeerId) {
        if let Some(cb) = self.on_peer_lost.as_mut() {
            cb(peer);
        }
    }

    pub(crate) fn fire_message_received(&mut self, peer: PeerId, payload: &[u8]) {
        if let Some(cb) = self.on_message_received.as_mut() {
            cb(peer, payload);
        }
    }

    pub(crate) fn fire_message_sent(&mut self, send_id: u64, result: Result<(), Error>) {
        if let Some(cb) = self.on_message_sent.as_mut() {
            cb(send_id, result);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn unset_callback_is_a_no_op() {
        let mut callbacks = Callbacks::new();
        callbacks.fire_peer_discovered(PeerId(1));
    }

    #[test]
    fn set_callback_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut callbacks = Callbacks::new();
        callbacks.set_on_peer_connected(move |_peer| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.fire_peer_connected(PeerId(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
