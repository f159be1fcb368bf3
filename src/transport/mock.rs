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

//! In-memory loopback/broadcast-domain transport used by unit and
//! integration tests (spec.md §8 "End-to-end scenarios"). Several hosts
//! join the same [`LanBus`]; UDP broadcasts fan out to every joined
//! host, and `stream_connect` pairs up with a matching `stream_listen`
//! on another host.

use super::{PlatformEvent, StreamHandle, Transport};
use crate::error::Error;
use crate::types::AsrFlags;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::rc::Rc;

/// Re-exported for test convenience; the bus treats this the same as
/// the discovery engine's broadcast destination.
pub use crate::discovery::BROADCAST_ADDR as BROADCAST;

struct StreamState {
    owner: IpAddr,
    peer: Option<StreamHandle>,
    recv_buffer: VecDeque<u8>,
}

#[derive(Default)]
struct BusInner {
    next_handle: usize,
    streams: HashMap<StreamHandle, StreamState>,
    listeners: HashMap<(IpAddr, u16), StreamHandle>,
    udp_mailboxes: HashMap<(IpAddr, u16), VecDeque<(IpAddr, Vec<u8>)>>,
    events: HashMap<IpAddr, VecDeque<PlatformEvent>>,
    ticks: u64,
}

impl BusInner {
    fn allocate_handle(&mut self) -> StreamHandle {
        let handle = StreamHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn push_event(&mut self, owner: IpAddr, event: PlatformEvent) {
        self.events.entry(owner).or_default().push_back(event);
    }
}

/// Shared virtual LAN. Clone to hand additional handles to test setup
/// code; all clones see the same underlying bus.
#[derive(Clone, Default)]
pub struct LanBus {
    inner: Rc<RefCell<BusInner>>,
}

impl LanBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the bus as `ip`, returning a transport adapter for that host.
    pub fn join(&self, ip: IpAddr) -> MockTransport {
        self.inner.borrow_mut().events.entry(ip).or_default();
        MockTransport {
            bus: self.inner.clone(),
            local_ip: ip,
        }
    }

    /// Advance the shared virtual clock `get_ticks` reports.
    pub fn advance_ticks(&self, ms: u64) {
        self.inner.borrow_mut().ticks += ms;
    }

    /// Flip the low bit of the last byte sitting in `owner`'s oldest
    /// non-empty stream receive buffer, simulating a single-bit
    /// corruption of a frame in transit (spec.md §8 scenario 4). Returns
    /// `false` if nothing is currently buffered to corrupt.
    pub fn corrupt_pending_byte(&self, owner: IpAddr) -> bool {
        let mut bus = self.inner.borrow_mut();
        let handle = bus
            .streams
            .iter()
            .find(|(_, state)| state.owner == owner && !state.recv_buffer.is_empty())
            .map(|(handle, _)| *handle);
        let Some(handle) = handle else { return false };
        let state = bus.streams.get_mut(&handle).expect("looked up above");
        let last = state.recv_buffer.len() - 1;
        state.recv_buffer[last] ^= 0x01;
        true
    }
}

/// One host's view of a [`LanBus`].
pub struct MockTransport {
    bus: Rc<RefCell<BusInner>>,
    local_ip: IpAddr,
}

impl Transport for MockTransport {
    fn init(&mut self) -> Result<(), Error> {
        self.bus.borrow_mut().events.entry(self.local_ip).or_default();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.bus.borrow_mut().events.remove(&self.local_ip);
    }

    fn get_ticks(&self) -> u64 {
        self.bus.borrow().ticks
    }

    fn poll_platform(&mut self) -> Vec<PlatformEvent> {
        let mut bus = self.bus.borrow_mut();
        match bus.events.get_mut(&self.local_ip) {
            Some(queue) => queue.drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn udp_send(&mut self, address: IpAddr, port: u16, bytes: &[u8]) -> Result<(), Error> {
        let mut bus = self.bus.borrow_mut();
        if address == BROADCAST {
            let hosts: Vec<IpAddr> = bus.events.keys().copied().collect();
            for host in hosts {
                bus.udp_mailboxes
                    .entry((host, port))
                    .or_default()
                    .push_back((self.local_ip, bytes.to_vec()));
            }
        } else {
            bus.udp_mailboxes
                .entry((address, port))
                .or_default()
                .push_back((self.local_ip, bytes.to_vec()));
        }
        Ok(())
    }

    fn udp_recv(&mut self) -> Option<(IpAddr, u16, Vec<u8>)> {
        let mut bus = self.bus.borrow_mut();
        let key = bus
            .udp_mailboxes
            .iter()
            .find(|((ip, _), queue)| *ip == self.local_ip && !queue.is_empty())
            .map(|(key, _)| *key)?;
        let mailbox = bus.udp_mailboxes.get_mut(&key)?;
        let (from, bytes) = mailbox.pop_front()?;
        Some((from, key.1, bytes))
    }

    fn stream_create(&mut self) -> Result<StreamHandle, Error> {
        let mut bus = self.bus.borrow_mut();
        let handle = bus.allocate_handle();
        bus.streams.insert(
            handle,
            StreamState {
                owner: self.local_ip,
                peer: None,
                recv_buffer: VecDeque::new(),
            },
        );
        Ok(handle)
    }

    fn stream_release(&mut self, handle: StreamHandle) {
        let mut bus = self.bus.borrow_mut();
        bus.streams.remove(&handle);
        bus.listeners.retain(|_, v| *v != handle);
    }

    fn stream_listen(&mut self, handle: StreamHandle, port: u16) -> Result<(), Error> {
        let mut bus = self.bus.borrow_mut();
        bus.listeners.insert((self.local_ip, port), handle);
        Ok(())
    }

    fn stream_connect(
        &mut self,
        handle: StreamHandle,
        address: IpAddr,
        port: u16,
        _timeout_ms: u64,
    ) -> Result<(), Error> {
        let mut bus = self.bus.borrow_mut();
        let listener_handle = match bus.listeners.get(&(address, port)).copied() {
            Some(h) => h,
            None => return Err(Error::ConnectionRefused),
        };

        let remote_handle = bus.allocate_handle();
        bus.streams.insert(
            remote_handle,
            StreamState {
                owner: address,
                peer: Some(handle),
                recv_buffer: VecDeque::new(),
            },
        );
        if let Some(local_state) = bus.streams.get_mut(&handle) {
            local_state.peer = Some(remote_handle);
        }

        bus.push_event(self.local_ip, PlatformEvent::new(handle, AsrFlags::CONNECT_COMPLETE));

        let mut accept_event = PlatformEvent::new(listener_handle, AsrFlags::LISTEN_COMPLETE);
        accept_event.accepted = Some((remote_handle, self.local_ip, 0));
        bus.push_event(address, accept_event);

        Ok(())
    }

    fn stream_send(&mut self, handle: StreamHandle, bytes: &[u8]) -> Result<usize, Error> {
        let mut bus = self.bus.borrow_mut();
        let peer = bus
            .streams
            .get(&handle)
            .and_then(|s| s.peer)
            .ok_or(Error::ConnectionClosed)?;

        if let Some(peer_state) = bus.streams.get_mut(&peer) {
            peer_state.recv_buffer.extend(bytes.iter().copied());
            let peer_owner = peer_state.owner;
            bus.push_event(peer_owner, PlatformEvent::new(peer, AsrFlags::DATA_ARRIVED));
        }
        bus.push_event(self.local_ip, PlatformEvent::new(handle, AsrFlags::SEND_COMPLETE));

        Ok(bytes.len())
    }

    fn stream_recv(&mut self, handle: StreamHandle, into: &mut Vec<u8>) -> Result<usize, Error> {
        let mut bus = self.bus.borrow_mut();
        let state = bus.streams.get_mut(&handle).ok_or(Error::ConnectionClosed)?;
        let drained = state.recv_buffer.len();
        into.extend(state.recv_buffer.drain(..));
        Ok(drained)
    }

    fn stream_close(&mut self, handle: StreamHandle, _timeout_ms: u64) -> Result<(), Error> {
        let mut bus = self.bus.borrow_mut();
        let peer = bus.streams.get(&handle).and_then(|s| s.peer);
        if let Some(peer) = peer {
            if let Some(peer_state) = bus.streams.get(&peer) {
                let owner = peer_state.owner;
                bus.push_event(owner, PlatformEvent::new(peer, AsrFlags::REMOTE_CLOSE));
            }
        }
        bus.push_event(self.local_ip, PlatformEvent::new(handle, AsrFlags::CLOSE_COMPLETE));
        Ok(())
    }

    fn stream_abort(&mut self, handle: StreamHandle) {
        let mut bus = self.bus.borrow_mut();
        bus.streams.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, last))
    }

    #[test]
    fn broadcast_datagram_is_delivered_to_every_other_host() {
        let bus = LanBus::new();
        let mut a = bus.join(ip(1));
        let mut b = bus.join(ip(2));

        a.udp_send(BROADCAST, 7353, b"hello").unwrap();

        let (from, _, bytes) = b.udp_recv().unwrap();
        assert_eq!(from, ip(1));
        assert_eq!(bytes, b"hello");
        // the sender also receives its own broadcast; the core is
        // responsible for the self-loop filter (spec.md §4.3)
        assert!(a.udp_recv().is_some());
    }

    #[test]
    fn connect_pairs_with_a_matching_listener_and_completes_both_sides() {
        let bus = LanBus::new();
        let mut server = bus.join(ip(10));
        let mut client = bus.join(ip(20));

        let listener = server.stream_create().unwrap();
        server.stream_listen(listener, 7354).unwrap();

        let client_handle = client.stream_create().unwrap();
        client.stream_connect(client_handle, ip(10), 7354, 1000).unwrap();

        let client_events = client.poll_platform();
        assert_eq!(client_events.len(), 1);
        assert!(client_events[0].flags.contains(AsrFlags::CONNECT_COMPLETE));

        let server_events = server.poll_platform();
        assert_eq!(server_events.len(), 1);
        assert!(server_events[0].flags.contains(AsrFlags::LISTEN_COMPLETE));
        let (accepted_handle, remote_ip, _) = server_events[0].accepted.unwrap();
        assert_eq!(remote_ip, ip(20));

        client.stream_send(client_handle, b"ping").unwrap();
        let mut into = Vec::new();
        server.stream_recv(accepted_handle, &mut into).unwrap();
        assert_eq!(into, b"ping");
    }

    #[test]
    fn connect_without_a_listener_is_refused() {
        let bus = LanBus::new();
        let mut client = bus.join(ip(30));
        let handle = client.stream_create().unwrap();
        assert!(matches!(
            client.stream_connect(handle, ip(99), 7354, 1000),
            Err(Error::ConnectionRefused)
        ));
    }
}
