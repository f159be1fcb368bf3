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

//! PeerTalk core engine: LAN peer discovery, connection management and
//! framed messaging driven entirely from a single cooperative [`Context::poll`]
//! call (spec.md §1-§4). No internal threads, no async runtime; the
//! application supplies a [`transport::Transport`] adapter and calls
//! `poll` from whatever loop or timer it already has.

pub mod callbacks;
pub mod config;
pub mod conn;
pub mod discovery;
pub mod error;
pub mod log;
pub mod peer;
pub mod peer_id;
pub mod protocol;
pub mod queue;
pub mod stats;
pub mod transport;
pub mod types;
pub mod version;

pub use callbacks::{Callbacks, DisconnectReason};
pub use config::{ContextConfig, ContextConfigBuilder};
pub use error::{error_string, Error, ErrorKind, Result};
pub use peer::PeerState;
pub use peer_id::PeerId;
pub use stats::{GlobalStats, PeerStats};
pub use types::{PeerAddress, PeerFlags, Priority, SendFlags, Transport as TransportKind};
pub use version::Version;

use crate::conn::{next_state, ConnEvent, ConnState, ConnTable};
use crate::discovery::{Packet, PacketType, BROADCAST_ADDR};
use crate::log::{DeferredLog, LogCategory, LogLevel, LogSink, NullSink};
use crate::peer::table::PeerTable;
use crate::protocol::{capability::CONSERVATIVE_EFFECTIVE_MAX, fragment, Capabilities, Decoded, Frame, FrameType};
use crate::queue::Entry;
use crate::transport::{PlatformEvent, StreamHandle, Transport as TransportAdapter};
use std::collections::HashMap;
use std::net::IpAddr;

/// How long an active-open attempt waits for `CONNECT_COMPLETE` before the
/// core gives up (spec.md §4.4 transition table).
const CONNECT_TIMEOUT_MS: u64 = 30_000;

/// How long a graceful close waits for `CLOSE_COMPLETE` before the stream
/// is aborted outright (spec.md §4.4 transition table).
const CLOSE_TIMEOUT_MS: u64 = 10_000;

/// How long a `CONNECTED` peer may go without any frame observed before
/// the core emits an idle `PING` (spec.md §4.5 "ping/pong RTT sampling").
/// Not config-surfaced: spec.md's configuration table has no knob for it,
/// so it is a crate constant, same treatment as `DEFAULT_QUEUE_CAPACITY`.
const IDLE_PING_THRESHOLD_MS: u64 = 5_000;

/// How many queued sends one peer may flush per `poll` call, so one
/// saturated peer cannot starve the others in the per-connection pass.
const SEND_BATCH: usize = 8;

/// Bitmask returned by `get_available_transports` when the configuration
/// did not restrict transports (spec.md §6 "0 = all").
const ALL_TRANSPORTS_MASK: u8 = 0xFF;

/// Spread applied to the discovery announce interval so that several
/// hosts started together don't keep re-synchronizing their broadcasts
/// (spec.md §4.3 is silent on this; a fixed period alone would let every
/// peer on the LAN announce in lockstep).
fn jittered_interval(base_ms: u64) -> u64 {
    use rand::Rng;
    let spread = base_ms / 10;
    if spread == 0 {
        return base_ms;
    }
    let offset = rand::thread_rng().gen_range(0..=2 * spread);
    base_ms - spread + offset
}

/// Snapshot of one peer, returned by `get_peers`/`get_peer`/`get_peer_by_id`
/// (spec.md §6).
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: PeerId,
    pub name: String,
    pub state: PeerState,
    pub flags: PeerFlags,
    pub rtt_estimate_ms: Option<u32>,
    pub addresses: [Option<PeerAddress>; 2],
    pub stats: PeerStats,
}

/// The root object: one per LAN network the application participates in
/// (spec.md §3 "Context"). Owns the peer table, the connection streams,
/// the send queues and the transport adapter; every state change happens
/// inside [`Context::poll`].
pub struct Context {
    config: ContextConfig,
    transport: Box<dyn TransportAdapter>,
    sink: Box<dyn LogSink>,
    log: DeferredLog,
    callbacks: Callbacks,
    peers: PeerTable,
    conns: ConnTable,
    handle_to_conn: HashMap<StreamHandle, usize>,
    listener_conn: Option<usize>,
    pending_accepts: Vec<(StreamHandle, IpAddr, u16)>,
    discovery_active: bool,
    next_discovery_due_ms: u64,
    next_send_id: u64,
    next_enqueue_seq: u32,
    stats: GlobalStats,
}

impl Context {
    /// Validate `builder`, allocate the peer table and call the adapter's
    /// `init` (spec.md §4.1 `Init`). On any failure nothing is retained:
    /// the half-built config, peer table, etc. are all local values that
    /// simply drop when this function returns via `?`.
    pub fn init(builder: ContextConfigBuilder, mut transport: Box<dyn TransportAdapter>) -> Result<Self> {
        let (config, sink) = builder.build()?;
        transport.init()?;

        let peers = PeerTable::new(config.max_peers());
        let mut log = DeferredLog::new();
        log.set_min_level(config.log_level());
        log.push(LogLevel::Info, LogCategory::Init, "context initialized");

        let mut context = Self {
            config,
            transport,
            sink,
            log,
            callbacks: Callbacks::new(),
            peers,
            conns: ConnTable::new(),
            handle_to_conn: HashMap::new(),
            listener_conn: None,
            pending_accepts: Vec::new(),
            discovery_active: false,
            next_discovery_due_ms: 0,
            next_send_id: 0,
            next_enqueue_seq: 0,
            stats: GlobalStats::default(),
        };
        context.log.flush_into(&mut *context.sink);
        Ok(context)
    }

    /// Mutable access to the callback table (spec.md §6 `SetCallbacks`).
    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    /// Send a `GOODBYE` if discovery was active, abort every live
    /// connection, drain the deferred log and hand the adapter back
    /// control (spec.md §4.1 `Shutdown`).
    pub fn shutdown(&mut self) {
        if self.discovery_active {
            let packet = Packet::new(PacketType::Goodbye, self.config.tcp_port(), self.config.local_name());
            let _ = self.transport.udp_send(BROADCAST_ADDR, self.config.discovery_port(), &packet.encode());
        }

        for idx in 0..self.conns.len() {
            if self.conns.get(idx).hot.state != ConnState::Unused {
                if let Some(handle) = self.conns.get(idx).hot.handle {
                    self.transport.stream_abort(handle);
                }
            }
        }

        self.log.flush_into(&mut *self.sink);
        self.transport.shutdown();
        self.sink = Box::new(NullSink);
    }

    // ---- discovery -----------------------------------------------------

    pub fn start_discovery(&mut self) -> Result<()> {
        self.discovery_active = true;
        self.next_discovery_due_ms = self.transport.get_ticks();
        Ok(())
    }

    pub fn stop_discovery(&mut self) {
        self.discovery_active = false;
    }

    fn broadcast_announce(&mut self) -> Result<()> {
        let packet = Packet::new(PacketType::Announce, self.config.tcp_port(), self.config.local_name());
        self.transport.udp_send(BROADCAST_ADDR, self.config.discovery_port(), &packet.encode())
    }

    fn handle_discovery_datagram(&mut self, from: IpAddr, bytes: &[u8], now: u64) {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                self.log.push(LogLevel::Warn, LogCategory::Protocol, format!("malformed discovery packet: {err}"));
                return;
            }
        };

        // the core, not the transport, filters out our own broadcasts
        // (spec.md §4.3): the mock bus has no notion of "don't deliver to
        // sender", so this comparison is the self-loop guard.
        if packet.name == self.config.local_name() {
            return;
        }

        match packet.packet_type {
            PacketType::Announce => self.handle_announce(packet, from, now),
            PacketType::Query => {
                let _ = self.broadcast_announce();
            }
            PacketType::Goodbye => {
                if let Some(id) = self.peers.find_by_name(&packet.name) {
                    self.remove_peer(id);
                }
            }
        }
    }

    /// A raw datagram addressed to `udp_port`: the unreliable sibling of
    /// `send`/`SendUDP` (spec.md §6, SPEC_FULL.md §4.3). No framing, CRC,
    /// or fragmentation applies, so the payload is handed straight to
    /// `on_message_received` for whichever known peer the sender's
    /// address matches; datagrams from unrecognized senders are dropped,
    /// since there is no address-only peer identity to attribute them to.
    fn handle_udp_datagram(&mut self, from: IpAddr, bytes: Vec<u8>) {
        match self.peers.find_by_ip(from) {
            Some(id) => self.deliver_message(id, bytes),
            None => self.log.push(LogLevel::Trace, LogCategory::Protocol, "UDP datagram from unrecognized peer address"),
        }
    }

    fn handle_announce(&mut self, packet: Packet, from: IpAddr, now: u64) {
        let id = match self.peers.find_by_name(&packet.name) {
            Some(id) => id,
            None => match self.peers.allocate(packet.name.clone(), now) {
                Ok(id) => {
                    self.stats.peers_discovered += 1;
                    self.callbacks.fire_peer_discovered(id);
                    id
                }
                Err(_) => return,
            },
        };

        let address = PeerAddress {
            address: from,
            port: packet.sender_port,
            transport: TransportKind::Stream,
        };
        if let Some(cold) = self.peers.cold_mut(id) {
            if !cold.addresses.iter().flatten().any(|a| *a == address) {
                for slot in cold.addresses.iter_mut() {
                    if slot.is_none() {
                        *slot = Some(address);
                        break;
                    }
                }
            }
        }
        let address_count = self.peers.cold(id).map(|c| c.addresses.iter().flatten().count()).unwrap_or(0);
        if let Some(hot) = self.peers.hot_mut(id) {
            hot.last_activity_ms = now;
            hot.address_count = address_count as u8;
            if hot.state != PeerState::Connected && hot.state != PeerState::Connecting {
                hot.state = PeerState::Discovered;
            }
        }
    }

    // ---- peer directory --------------------------------------------------

    pub fn get_peers(&self) -> Vec<PeerInfo> {
        self.peers.peer_ids().into_iter().filter_map(|id| self.build_peer_info(id)).collect()
    }

    pub fn get_peers_version(&self) -> u64 {
        self.peers.version()
    }

    pub fn get_peer_by_id(&self, id: PeerId) -> Result<PeerInfo> {
        self.build_peer_info(id).ok_or(Error::PeerNotFound(id))
    }

    /// Position-based accessor into the live peer array, complementing
    /// `get_peer_by_id` (spec.md §6 `GetPeer` vs `GetPeerByID`).
    pub fn get_peer(&self, index: usize) -> Result<PeerInfo> {
        let id = self.peers.hot_slice().get(index).map(|h| h.id).ok_or(Error::Internal("peer index out of range"))?;
        self.build_peer_info(id).ok_or(Error::PeerNotFound(id))
    }

    pub fn get_peer_name(&self, id: PeerId) -> Result<String> {
        self.peers.name(id).map(str::to_string).ok_or(Error::PeerNotFound(id))
    }

    pub fn find_peer_by_name(&self, name: &str) -> Option<PeerId> {
        self.peers.find_by_name(name)
    }

    pub fn find_peer_by_address(&self, address: &PeerAddress) -> Option<PeerId> {
        self.peers.find_by_address(address)
    }

    fn build_peer_info(&self, id: PeerId) -> Option<PeerInfo> {
        let hot = self.peers.hot(id)?;
        let cold = self.peers.cold(id)?;
        Some(PeerInfo {
            id,
            name: self.peers.name(id).unwrap_or("").to_string(),
            state: hot.state,
            flags: hot.flags,
            rtt_estimate_ms: hot.rtt_estimate_ms,
            addresses: cold.addresses,
            stats: cold.stats,
        })
    }

    // ---- connection lifecycle ------------------------------------------

    pub fn start_listening(&mut self) -> Result<()> {
        if self.listener_conn.is_some() {
            return Ok(());
        }
        let index = self.conns.allocate();
        let handle = self.transport.stream_create()?;
        self.handle_to_conn.insert(handle, index);
        {
            let slot = self.conns.get_mut(index);
            slot.hot.handle = Some(handle);
            slot.hot.state = ConnState::Idle;
        }
        if let Err(err) = self.transport.stream_listen(handle, self.config.tcp_port()) {
            self.transport.stream_release(handle);
            self.handle_to_conn.remove(&handle);
            self.conns.release(index);
            return Err(err);
        }
        {
            let slot = self.conns.get_mut(index);
            slot.hot.state = ConnState::Listening;
            slot.cold.listen_port = Some(self.config.tcp_port());
        }
        self.listener_conn = Some(index);
        Ok(())
    }

    pub fn stop_listening(&mut self) {
        if let Some(index) = self.listener_conn.take() {
            if let Some(handle) = self.conns.get(index).hot.handle {
                self.transport.stream_abort(handle);
                self.handle_to_conn.remove(&handle);
            }
            self.conns.release(index);
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener_conn.is_some()
    }

    pub fn get_listen_port(&self) -> Option<u16> {
        self.listener_conn.and_then(|index| self.conns.get(index).cold.listen_port)
    }

    /// Active-open a connection to a known peer, or, if a not-yet-accepted
    /// inbound connection is already sitting in the peer's slot, accept it
    /// (spec.md §6 `Connect` doubling as the accept lever when `auto_accept`
    /// is disabled).
    pub fn connect(&mut self, id: PeerId) -> Result<()> {
        let hot = self.peers.hot(id).ok_or(Error::PeerNotFound(id))?;
        if hot.async_op_pending && hot.state == PeerState::Connecting {
            // a connect attempt is already in flight for this peer; let it
            // resolve through `poll` instead of racing a second attempt.
            return Ok(());
        }
        if let Some(conn_idx) = hot.connection {
            let conn = self.conns.get(conn_idx);
            if conn.hot.state == ConnState::Connected {
                return Ok(());
            }
            if conn.hot.state == ConnState::Idle && conn.cold.remote_address.is_some() {
                self.finish_accept(id, conn_idx);
                return Ok(());
            }
        }

        if let Some(Err(prior_err)) = self.peers.hot_mut(id).and_then(|h| h.async_result.take()) {
            self.log.push(
                LogLevel::Debug,
                LogCategory::Transport,
                format!("retrying connect to peer {id} after previous failure: {prior_err}"),
            );
        }

        let address = self.peers.cold(id).and_then(|c| c.addresses[0]).ok_or(Error::PeerNotFound(id))?;
        let conn_idx = self.conns.allocate();
        let handle = self.transport.stream_create()?;
        self.handle_to_conn.insert(handle, conn_idx);
        {
            let slot = self.conns.get_mut(conn_idx);
            slot.hot.handle = Some(handle);
            slot.hot.peer_index = Some(id);
            slot.hot.state = ConnState::Idle;
        }

        let now = self.transport.get_ticks();
        if let Err(err) = self.transport.stream_connect(handle, address.address, address.port, CONNECT_TIMEOUT_MS) {
            self.transport.stream_release(handle);
            self.handle_to_conn.remove(&handle);
            self.conns.release(conn_idx);
            return Err(err);
        }
        {
            let slot = self.conns.get_mut(conn_idx);
            slot.hot.state = ConnState::Connecting;
            slot.cold.connect_deadline_ms = Some(now + CONNECT_TIMEOUT_MS);
        }
        if let Some(hot) = self.peers.hot_mut(id) {
            hot.state = PeerState::Connecting;
        }
        self.bind_peer_connection(id, conn_idx);
        Ok(())
    }

    /// Bind a peer to the connection-table slot that now represents it,
    /// bumping the peer's `validation_tag` and snapshotting it onto the
    /// slot so a platform event that outlives this binding (the peer later
    /// rebinds `connection` elsewhere, or the slot is reused) is detected
    /// as stale in [`Context::dispatch_platform_event`] instead of being
    /// applied to the wrong generation of the connection.
    fn bind_peer_connection(&mut self, id: PeerId, conn_idx: usize) {
        let tag = match self.peers.hot_mut(id) {
            Some(hot) => {
                hot.connection = Some(conn_idx);
                hot.async_op_pending = true;
                hot.validation_tag = hot.validation_tag.wrapping_add(1);
                hot.validation_tag
            }
            None => return,
        };
        let slot = self.conns.get_mut(conn_idx);
        slot.hot.peer_index = Some(id);
        slot.hot.owner_validation_tag = tag;
    }

    /// Gracefully close an established connection (spec.md §6
    /// `Disconnect`).
    pub fn disconnect(&mut self, id: PeerId) -> Result<()> {
        let conn_idx = self.peers.hot(id).ok_or(Error::PeerNotFound(id))?.connection.ok_or(Error::NotConnected(id))?;
        if self.conns.get(conn_idx).hot.state != ConnState::Connected {
            return Err(Error::NotConnected(id));
        }
        let now = self.transport.get_ticks();
        self.begin_close(conn_idx, now, DisconnectReason::Local);
        Ok(())
    }

    /// Abort a pending inbound connection that has not yet been accepted
    /// (spec.md §6 `RejectConnection`, the `auto_accept = false` lever).
    pub fn reject_connection(&mut self, id: PeerId) -> Result<()> {
        let conn_idx = self.peers.hot(id).ok_or(Error::PeerNotFound(id))?.connection.ok_or(Error::NotConnected(id))?;
        if let Some(handle) = self.conns.get(conn_idx).hot.handle {
            self.transport.stream_abort(handle);
            self.handle_to_conn.remove(&handle);
        }
        self.conns.release(conn_idx);
        if let Some(hot) = self.peers.hot_mut(id) {
            hot.connection = None;
            hot.async_op_pending = false;
            hot.state = PeerState::Discovered;
        }
        Ok(())
    }

    fn finish_accept(&mut self, id: PeerId, conn_idx: usize) {
        self.conns.get_mut(conn_idx).hot.state = ConnState::Connected;
        let now = self.transport.get_ticks();
        let reconnected_after_issue = if let Some(hot) = self.peers.hot_mut(id) {
            hot.state = PeerState::Connected;
            hot.last_activity_ms = now;
            hot.async_op_pending = false;
            hot.async_result = Some(Ok(()));
            std::mem::take(&mut hot.pending_log_event)
        } else {
            false
        };
        if reconnected_after_issue {
            self.log.push(LogLevel::Info, LogCategory::General, format!("peer {id} reconnected after a prior issue"));
        }
        self.stats.peers_connected += 1;
        self.callbacks.fire_peer_connected(id);
        self.send_capability(conn_idx, id);
    }

    // ---- sending ----------------------------------------------------------

    pub fn send(&mut self, id: PeerId, bytes: &[u8]) -> Result<()> {
        self.send_ex(id, bytes, Priority::Normal, SendFlags::NONE, 0).map(|_| ())
    }

    pub fn send_tracked(&mut self, id: PeerId, bytes: &[u8]) -> Result<u64> {
        let send_id = self.send_ex(id, bytes, Priority::Normal, SendFlags::TRACKED, 0)?;
        Ok(send_id.expect("TRACKED always allocates a send_id"))
    }

    /// Full-option enqueue (spec.md §6 `SendEx`): priority, flags and an
    /// optional coalescing key (spec.md §4.6 "newest-wins").
    pub fn send_ex(
        &mut self,
        id: PeerId,
        bytes: &[u8],
        priority: Priority,
        flags: SendFlags,
        coalesce_key: u16,
    ) -> Result<Option<u64>> {
        let hot = self.peers.hot(id).ok_or(Error::PeerNotFound(id))?;
        if hot.state != PeerState::Connected {
            return Err(Error::NotConnected(id));
        }

        let send_id = if flags.contains(SendFlags::TRACKED) {
            self.next_send_id += 1;
            Some(self.next_send_id)
        } else {
            None
        };
        self.next_enqueue_seq = self.next_enqueue_seq.wrapping_add(1);

        let entry = Entry {
            priority,
            coalesce_key,
            flags,
            sequence: self.next_enqueue_seq,
            transport_hint: TransportKind::Stream,
            buffer: bytes.to_vec(),
            send_id,
        };

        let cold = self.peers.cold_mut(id).ok_or(Error::PeerNotFound(id))?;
        let dropped = cold.send_queue.enqueue(entry)?;
        if dropped {
            cold.stats.sends_dropped += 1;
            self.stats.sends_dropped += 1;
        }
        Ok(send_id)
    }

    /// Like `send`, but records which transport the application prefers
    /// for this message (spec.md §6 `SendVia`); the queue still drains
    /// through whichever stream the peer's connection uses.
    pub fn send_via(&mut self, id: PeerId, bytes: &[u8], transport: TransportKind) -> Result<()> {
        let hot = self.peers.hot(id).ok_or(Error::PeerNotFound(id))?;
        if hot.state != PeerState::Connected {
            return Err(Error::NotConnected(id));
        }
        self.next_enqueue_seq = self.next_enqueue_seq.wrapping_add(1);
        let entry = Entry {
            priority: Priority::Normal,
            coalesce_key: 0,
            flags: SendFlags::NONE,
            sequence: self.next_enqueue_seq,
            transport_hint: transport,
            buffer: bytes.to_vec(),
            send_id: None,
        };
        let cold = self.peers.cold_mut(id).ok_or(Error::PeerNotFound(id))?;
        let dropped = cold.send_queue.enqueue(entry)?;
        if dropped {
            cold.stats.sends_dropped += 1;
            self.stats.sends_dropped += 1;
        }
        Ok(())
    }

    /// Enqueue onto every connected peer, returning how many accepted it
    /// (spec.md §6 `Broadcast`).
    pub fn broadcast(&mut self, bytes: &[u8]) -> usize {
        let ids: Vec<PeerId> = self
            .peers
            .hot_slice()
            .iter()
            .filter(|h| h.state == PeerState::Connected)
            .map(|h| h.id)
            .collect();
        ids.into_iter().filter(|&id| self.send(id, bytes).is_ok()).count()
    }

    /// Unreliable, unframed datagram straight to one peer's advertised
    /// address (spec.md §6 `SendUDP`).
    pub fn send_udp(&mut self, id: PeerId, bytes: &[u8]) -> Result<()> {
        let address = self.peers.cold(id).and_then(|c| c.addresses[0]).ok_or(Error::PeerNotFound(id))?;
        self.transport.udp_send(address.address, self.config.udp_port(), bytes)
    }

    pub fn broadcast_udp(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.udp_send(BROADCAST_ADDR, self.config.udp_port(), bytes)
    }

    pub fn get_queue_status(&self, id: PeerId) -> Result<queue::QueueStatus> {
        self.peers.cold(id).map(|c| c.send_queue.status()).ok_or(Error::PeerNotFound(id))
    }

    // ---- stats and flags -------------------------------------------------

    pub fn get_peer_stats(&self, id: PeerId) -> Result<PeerStats> {
        self.peers.cold(id).map(|c| c.stats).ok_or(Error::PeerNotFound(id))
    }

    pub fn get_global_stats(&self) -> GlobalStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn get_flags(&self, id: PeerId) -> Result<PeerFlags> {
        self.peers.hot(id).map(|h| h.flags).ok_or(Error::PeerNotFound(id))
    }

    pub fn set_flags(&mut self, id: PeerId, flags: PeerFlags) -> Result<()> {
        let hot = self.peers.hot_mut(id).ok_or(Error::PeerNotFound(id))?;
        hot.flags = flags;
        Ok(())
    }

    pub fn modify_flags(&mut self, id: PeerId, set: PeerFlags, clear: PeerFlags) -> Result<()> {
        let hot = self.peers.hot_mut(id).ok_or(Error::PeerNotFound(id))?;
        hot.flags = PeerFlags::from_bits((hot.flags.bits() | set.bits()) & !clear.bits());
        Ok(())
    }

    pub fn get_available_transports(&self) -> u8 {
        match self.config.transports() {
            0 => ALL_TRANSPORTS_MASK,
            mask => mask,
        }
    }

    // ---- the poll loop ------------------------------------------------

    /// Drive every state machine forward exactly once (spec.md §4.1):
    /// flush deferred logs, drain discovery datagrams, advance the
    /// listener, advance every connection stream, fire the discovery
    /// announce timer, then sweep the peer table for timeouts.
    pub fn poll(&mut self) -> Result<()> {
        let now = self.transport.get_ticks();

        self.log.flush_into(&mut *self.sink);

        while let Some((from, port, bytes)) = self.transport.udp_recv() {
            if port == self.config.udp_port() {
                self.handle_udp_datagram(from, bytes);
            } else {
                self.handle_discovery_datagram(from, &bytes, now);
            }
        }

        let events = self.transport.poll_platform();
        for event in events {
            self.dispatch_platform_event(event);
        }

        if let Some(listener_idx) = self.listener_conn {
            self.advance_listener(listener_idx, now);
        }

        let conn_count = self.conns.len();
        for idx in 0..conn_count {
            if Some(idx) == self.listener_conn {
                continue;
            }
            self.advance_connection(idx, now);
        }

        if self.discovery_active && now >= self.next_discovery_due_ms {
            self.broadcast_announce()?;
            self.next_discovery_due_ms = now + jittered_interval(self.config.discovery_interval_ms());
        }

        self.sweep_peers(now);

        Ok(())
    }

    fn dispatch_platform_event(&mut self, event: PlatformEvent) {
        if let Some((accepted_handle, addr, port)) = event.accepted {
            self.pending_accepts.push((accepted_handle, addr, port));
        }
        if let Some(&conn_idx) = self.handle_to_conn.get(&event.handle) {
            let stale = {
                let conn = self.conns.get(conn_idx);
                match conn.hot.peer_index {
                    Some(owner) => match self.peers.hot(owner) {
                        Some(phot) => phot.connection != Some(conn_idx) || phot.validation_tag != conn.hot.owner_validation_tag,
                        None => true,
                    },
                    // the listener's own slot has no owning peer and is
                    // never rebound, so it can never be stale.
                    None => false,
                }
            };
            if stale {
                self.log.push(LogLevel::Trace, LogCategory::Internal, "dropped a platform event for a stale connection slot");
                return;
            }
            let slot = self.conns.get_mut(conn_idx);
            slot.hot.asr_flags = slot.hot.asr_flags.union(event.flags);
            if let Some(err) = event.error {
                slot.hot.async_result = Some(Err(err));
                slot.hot.pending_log_event = true;
            }
        }
    }

    fn advance_listener(&mut self, _listener_idx: usize, now: u64) {
        let pending = std::mem::take(&mut self.pending_accepts);
        for (handle, addr, port) in pending {
            self.handle_listener_accept(handle, addr, port, now);
        }
    }

    fn handle_listener_accept(&mut self, handle: StreamHandle, addr: IpAddr, port: u16, now: u64) {
        if self.peers.is_full() {
            self.transport.stream_abort(handle);
            return;
        }

        let probe = PeerAddress { address: addr, port, transport: TransportKind::Stream };
        let peer_id = match self.peers.find_by_address(&probe) {
            Some(id) => Some(id),
            None => {
                let name = format!("{addr}:{port}");
                match self.peers.allocate(name, now) {
                    Ok(id) => {
                        if let Some(cold) = self.peers.cold_mut(id) {
                            cold.addresses[0] = Some(probe);
                        }
                        if let Some(hot) = self.peers.hot_mut(id) {
                            hot.address_count = 1;
                        }
                        self.stats.peers_discovered += 1;
                        self.callbacks.fire_peer_discovered(id);
                        Some(id)
                    }
                    Err(_) => None,
                }
            }
        };

        let peer_id = match peer_id {
            Some(id) => id,
            None => {
                self.transport.stream_abort(handle);
                return;
            }
        };

        let conn_idx = self.conns.allocate();
        self.handle_to_conn.insert(handle, conn_idx);
        {
            let slot = self.conns.get_mut(conn_idx);
            slot.hot.handle = Some(handle);
            slot.hot.state = ConnState::Idle;
            slot.cold.remote_address = Some(addr);
            slot.cold.remote_port = Some(port);
        }
        self.bind_peer_connection(peer_id, conn_idx);

        if self.config.auto_accept() {
            self.finish_accept(peer_id, conn_idx);
        }
        // otherwise left pending: the application must call `connect`
        // (accept) or `reject_connection` on this peer.
    }

    fn advance_connection(&mut self, idx: usize, now: u64) {
        let state = self.conns.get(idx).hot.state;
        let flags = std::mem::replace(&mut self.conns.get_mut(idx).hot.asr_flags, types::AsrFlags::NONE);

        let timed_out_event = match state {
            ConnState::Connecting => {
                if flags.contains(types::AsrFlags::ERROR) {
                    self.drain_async_error(idx);
                    Some((ConnEvent::ConnectError, DisconnectReason::Network))
                } else if flags.contains(types::AsrFlags::CONNECT_COMPLETE) {
                    Some((ConnEvent::ConnectOk, DisconnectReason::Local))
                } else if self.conns.get(idx).cold.connect_deadline_ms.map_or(false, |d| now >= d) {
                    self.abort_handle(idx);
                    Some((ConnEvent::ConnectTimeout, DisconnectReason::Timeout))
                } else {
                    None
                }
            }
            ConnState::Connected => {
                if flags.contains(types::AsrFlags::ERROR) {
                    self.drain_async_error(idx);
                    Some((ConnEvent::RemoteClose, DisconnectReason::Network))
                } else if flags.contains(types::AsrFlags::REMOTE_CLOSE) {
                    Some((ConnEvent::RemoteClose, DisconnectReason::Remote))
                } else {
                    if flags.contains(types::AsrFlags::DATA_ARRIVED) {
                        self.drain_recv(idx, now);
                    }
                    self.drain_sends(idx, now);
                    self.maybe_ping(idx, now);
                    None
                }
            }
            ConnState::Closing => {
                if flags.contains(types::AsrFlags::CLOSE_COMPLETE) {
                    Some((ConnEvent::CloseComplete, DisconnectReason::Local))
                } else if self.conns.get(idx).cold.close_deadline_ms.map_or(false, |d| now >= d) {
                    self.abort_handle(idx);
                    Some((ConnEvent::CloseTimeout, DisconnectReason::Timeout))
                } else {
                    None
                }
            }
            _ => None,
        };

        let Some((event, reason)) = timed_out_event else { return };
        let Some(next) = next_state(state, event) else { return };
        self.conns.get_mut(idx).hot.state = next;

        match next {
            ConnState::Connected => self.on_connect_ok(idx, now),
            ConnState::Closing => {
                // a just-detected error or remote close: issue the close
                // request and wait for the adapter to confirm it.
                self.conns.get_mut(idx).cold.termination_reason = Some(reason);
                if let Some(handle) = self.conns.get(idx).hot.handle {
                    let _ = self.transport.stream_close(handle, CLOSE_TIMEOUT_MS);
                }
                self.conns.get_mut(idx).cold.close_deadline_ms = Some(now + CLOSE_TIMEOUT_MS);
            }
            ConnState::Releasing => {
                self.conns.get_mut(idx).cold.termination_reason.get_or_insert(reason);
                self.finish_release(idx, now, reason);
            }
            _ => {}
        }
    }

    fn on_connect_ok(&mut self, idx: usize, now: u64) {
        if let Some(id) = self.conns.get(idx).hot.peer_index {
            let reconnected_after_issue = if let Some(hot) = self.peers.hot_mut(id) {
                hot.state = PeerState::Connected;
                hot.last_activity_ms = now;
                hot.async_op_pending = false;
                hot.async_result = Some(Ok(()));
                std::mem::take(&mut hot.pending_log_event)
            } else {
                false
            };
            if reconnected_after_issue {
                self.log.push(LogLevel::Info, LogCategory::General, format!("peer {id} reconnected after a prior issue"));
            }
            self.stats.peers_connected += 1;
            self.callbacks.fire_peer_connected(id);
            self.send_capability(idx, id);
        }
    }

    fn abort_handle(&mut self, idx: usize) {
        if let Some(handle) = self.conns.get(idx).hot.handle {
            self.transport.stream_abort(handle);
        }
    }

    /// Surface the specific error a transport adapter attached to the
    /// connection's `ERROR` ASR bit (spec.md §4.8 `error` out-param),
    /// rather than letting only the generic flag drive the state machine
    /// while the adapter's actual failure reason is captured and dropped.
    fn drain_async_error(&mut self, idx: usize) {
        let had_pending = self.conns.get(idx).hot.pending_log_event;
        let result = self.conns.get_mut(idx).hot.async_result.take();
        self.conns.get_mut(idx).hot.pending_log_event = false;
        if had_pending {
            if let Some(Err(err)) = result {
                self.log.push(LogLevel::Warn, LogCategory::Transport, format!("connection error: {err}"));
            }
        }
    }

    /// Tear down a connection's table slot and reflect the outcome onto
    /// its peer (spec.md §4.4's terminal actions: "release" / "abort").
    fn finish_release(&mut self, idx: usize, _now: u64, reason: DisconnectReason) {
        let peer_id = self.conns.get(idx).hot.peer_index;
        if let Some(handle) = self.conns.get(idx).hot.handle {
            self.transport.stream_release(handle);
            self.handle_to_conn.remove(&handle);
        }
        self.conns.release(idx);

        if let Some(id) = peer_id {
            // a connect timeout leaves the peer DISCOVERED so it can be
            // retried; an outright connect error demotes it to FAILED
            // (terminal); any other termination of a live connection
            // returns it to DISCOVERED (spec.md §3 state diagram).
            if let Some(hot) = self.peers.hot_mut(id) {
                hot.connection = None;
                hot.async_op_pending = false;
                hot.async_result = Some(match reason {
                    DisconnectReason::Local => Ok(()),
                    DisconnectReason::Timeout => Err(Error::Timeout),
                    DisconnectReason::Network => Err(Error::Network),
                    DisconnectReason::Remote => Err(Error::ConnectionClosed),
                });
                hot.state = match reason {
                    DisconnectReason::Network if hot.state == PeerState::Connecting => PeerState::Failed,
                    _ => PeerState::Discovered,
                };
            }
            self.stats.peers_connected = self.stats.peers_connected.saturating_sub(1);
            self.callbacks.fire_peer_disconnected(id, reason);
        }
    }

    fn begin_close(&mut self, idx: usize, now: u64, reason: DisconnectReason) {
        if let Some(handle) = self.conns.get(idx).hot.handle {
            let _ = self.transport.stream_close(handle, CLOSE_TIMEOUT_MS);
        }
        let slot = self.conns.get_mut(idx);
        slot.hot.state = ConnState::Closing;
        slot.cold.close_initiated_ms = Some(now);
        slot.cold.close_deadline_ms = Some(now + CLOSE_TIMEOUT_MS);
        slot.cold.termination_reason = Some(reason);
        if let Some(id) = slot.hot.peer_index {
            if let Some(hot) = self.peers.hot_mut(id) {
                hot.state = PeerState::Disconnecting;
            }
        }
    }

    fn protocol_fail(&mut self, idx: usize, now: u64) {
        self.abort_handle(idx);
        if let Some(id) = self.conns.get(idx).hot.peer_index {
            if let Some(cold) = self.peers.cold_mut(id) {
                cold.stats.frames_crc_failed += 1;
            }
            if let Some(hot) = self.peers.hot_mut(id) {
                hot.pending_log_event = true;
            }
            self.stats.frames_crc_failed += 1;
        }
        self.conns.get_mut(idx).cold.termination_reason = Some(DisconnectReason::Network);
        self.finish_release(idx, now, DisconnectReason::Network);
    }

    fn drain_recv(&mut self, idx: usize, now: u64) {
        // A real (async) adapter may still be copying a previous receive
        // into this connection's buffer when a second `DATA_ARRIVED`
        // arrives; `buffer_outstanding` keeps the core from handing the
        // adapter a second buffer for the same stream until the first
        // one resolves (spec.md §3 "buffer-outstanding marker").
        if !self.conns.get(idx).hot.buffer_outstanding {
            if let Some(handle) = self.conns.get(idx).hot.handle {
                self.conns.get_mut(idx).hot.buffer_outstanding = true;
                let mut buf = Vec::new();
                let read = self.transport.stream_recv(handle, &mut buf);
                self.conns.get_mut(idx).hot.buffer_outstanding = false;
                if read.is_ok() && !buf.is_empty() {
                    self.conns.get_mut(idx).cold.recv_framing_buffer.extend(buf);
                }
            }
            if let Some(id) = self.conns.get(idx).hot.peer_index {
                if let Some(hot) = self.peers.hot_mut(id) {
                    hot.buffer_outstanding = false;
                }
            }
        }

        loop {
            let decision = {
                let buf = &self.conns.get(idx).cold.recv_framing_buffer;
                match crate::protocol::decode(buf) {
                    Decoded::Partial => None,
                    Decoded::Err(err) => Some(Err(err)),
                    Decoded::Complete { frame, consumed } => Some(Ok((frame, consumed))),
                }
            };

            match decision {
                None => break,
                Some(Err(_)) => {
                    self.log.push(LogLevel::Warn, LogCategory::Protocol, "frame decode error");
                    self.protocol_fail(idx, now);
                    break;
                }
                Some(Ok((frame, consumed))) => {
                    self.conns.get_mut(idx).cold.recv_framing_buffer.drain(..consumed);
                    self.handle_frame(idx, frame, now);
                    // the connection may have been torn down by a
                    // protocol failure detected inside `handle_frame`.
                    if self.conns.get(idx).hot.state != ConnState::Connected {
                        break;
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, idx: usize, frame: Frame, now: u64) {
        let peer_id = self.conns.get(idx).hot.peer_index;
        if let Some(id) = peer_id {
            if let Some(hot) = self.peers.hot_mut(id) {
                hot.last_activity_ms = now;
                hot.recv_sequence = frame.sequence;
            }
        }

        match frame.frame_type {
            FrameType::Data => {
                if let Some(id) = peer_id {
                    self.deliver_message(id, frame.payload);
                }
            }
            FrameType::Ping => {
                let seq = frame.sequence;
                self.transmit_frame(idx, &Frame::new(FrameType::Pong, seq, Vec::new()).encode());
            }
            FrameType::Pong => {
                if let Some(id) = peer_id {
                    self.record_pong(id, frame.sequence, now);
                }
            }
            FrameType::Capability => {
                if let Some(id) = peer_id {
                    let local_max = self.config.max_message_size();
                    let local_chunk = self.config.preferred_chunk();
                    if let Some(cold) = self.peers.cold_mut(id) {
                        let caps = cold.capabilities.get_or_insert_with(|| Capabilities::new(local_max, local_chunk));
                        let _ = caps.receive(&frame.payload);
                    }
                }
            }
            FrameType::Disconnect => {
                self.begin_close(idx, now, DisconnectReason::Remote);
            }
            FrameType::FragStart => {
                if let Some(id) = peer_id {
                    match crate::protocol::Reassembly::start(&frame) {
                        Ok(reassembly) => {
                            if let Some(cold) = self.peers.cold_mut(id) {
                                cold.reassembly = Some(reassembly);
                            }
                        }
                        Err(_) => self.protocol_fail(idx, now),
                    }
                }
            }
            FrameType::FragCont | FrameType::FragEnd => {
                if let Some(id) = peer_id {
                    self.feed_reassembly(idx, id, &frame, now);
                }
            }
        }
    }

    fn feed_reassembly(&mut self, idx: usize, id: PeerId, frame: &Frame, now: u64) {
        let outcome = match self.peers.cold_mut(id).and_then(|c| c.reassembly.as_mut()) {
            Some(reassembly) => reassembly.feed(frame),
            None => Err(Error::Internal("frame continuation with no reassembly in progress")),
        };

        match outcome {
            Ok(Some(payload)) => {
                if let Some(cold) = self.peers.cold_mut(id) {
                    cold.reassembly = None;
                }
                self.deliver_message(id, payload);
            }
            Ok(None) => {}
            Err(_) => {
                if let Some(cold) = self.peers.cold_mut(id) {
                    cold.reassembly = None;
                }
                self.log.push(LogLevel::Warn, LogCategory::Protocol, "fragment reassembly failed");
                self.protocol_fail(idx, now);
            }
        }
    }

    fn deliver_message(&mut self, id: PeerId, payload: Vec<u8>) {
        self.callbacks.fire_message_received(id, &payload);
        if let Some(cold) = self.peers.cold_mut(id) {
            cold.stats.messages_received += 1;
            cold.stats.bytes_received += payload.len() as u64;
        }
        self.stats.messages_received += 1;
        self.stats.bytes_received += payload.len() as u64;
    }

    fn record_pong(&mut self, id: PeerId, sequence: u32, now: u64) {
        if let Some(cold) = self.peers.cold_mut(id) {
            if cold.last_ping_sequence == Some(sequence) {
                if let Some(sent) = cold.last_ping_sent_ms.take() {
                    cold.rtt_samples.record(now.saturating_sub(sent) as u32);
                }
                cold.last_ping_sequence = None;
            }
        }
        let estimate = self.peers.cold(id).and_then(|c| c.rtt_samples.estimate());
        if let Some(hot) = self.peers.hot_mut(id) {
            hot.rtt_estimate_ms = estimate;
        }
    }

    fn maybe_ping(&mut self, idx: usize, now: u64) {
        let Some(id) = self.conns.get(idx).hot.peer_index else { return };
        let due = self.peers.hot(id).map_or(false, |h| now.saturating_sub(h.last_activity_ms) >= IDLE_PING_THRESHOLD_MS);
        if !due {
            return;
        }
        let seq = {
            let hot = match self.peers.hot_mut(id) {
                Some(hot) => hot,
                None => return,
            };
            hot.send_sequence = hot.send_sequence.wrapping_add(1);
            hot.send_sequence
        };
        self.transmit_frame(idx, &Frame::new(FrameType::Ping, seq, Vec::new()).encode());
        if let Some(cold) = self.peers.cold_mut(id) {
            cold.last_ping_sent_ms = Some(now);
            cold.last_ping_sequence = Some(seq);
        }
    }

    fn send_capability(&mut self, idx: usize, id: PeerId) {
        let local_max = self.config.max_message_size();
        let local_chunk = self.config.preferred_chunk();
        let seq = {
            let hot = match self.peers.hot_mut(id) {
                Some(hot) => hot,
                None => return,
            };
            hot.send_sequence = hot.send_sequence.wrapping_add(1);
            hot.send_sequence
        };

        let frame = {
            let cold = match self.peers.cold_mut(id) {
                Some(cold) => cold,
                None => return,
            };
            let caps = cold.capabilities.get_or_insert_with(|| Capabilities::new(local_max, local_chunk));
            caps.to_frame(seq)
        };
        self.transmit_frame(idx, &frame.encode());
    }

    fn drain_sends(&mut self, idx: usize, _now: u64) {
        let Some(id) = self.conns.get(idx).hot.peer_index else { return };
        if self.peers.hot(id).map_or(false, |h| h.buffer_outstanding) {
            // an async adapter is still mid-receive for this peer; don't
            // also hand it a send buffer this pass.
            return;
        }

        let entries = match self.peers.cold_mut(id) {
            Some(cold) => cold.send_queue.dequeue_batch(SEND_BATCH),
            None => return,
        };
        if entries.is_empty() {
            return;
        }

        let (effective_max, effective_chunk) = self
            .peers
            .cold(id)
            .and_then(|c| c.capabilities.as_ref())
            .map(|c| (c.effective_max(), c.effective_chunk()))
            .unwrap_or((CONSERVATIVE_EFFECTIVE_MAX, CONSERVATIVE_EFFECTIVE_MAX));
        let enable_fragmentation = self.config.enable_fragmentation();

        let mut seq_counter = self.peers.hot(id).map(|h| h.send_sequence).unwrap_or(0);

        for entry in entries {
            let should_fragment = enable_fragmentation && entry.buffer.len() > effective_max;
            let frames = if should_fragment {
                fragment::split(&entry.buffer, effective_chunk.max(1), || {
                    seq_counter = seq_counter.wrapping_add(1);
                    seq_counter
                })
            } else {
                seq_counter = seq_counter.wrapping_add(1);
                vec![Frame::new(FrameType::Data, seq_counter, entry.buffer.clone())]
            };

            for frame in &frames {
                self.transmit_frame(idx, &frame.encode());
            }

            if let Some(cold) = self.peers.cold_mut(id) {
                cold.stats.messages_sent += 1;
                cold.stats.bytes_sent += entry.buffer.len() as u64;
            }
            self.stats.messages_sent += 1;
            self.stats.bytes_sent += entry.buffer.len() as u64;

            if let Some(send_id) = entry.send_id {
                self.callbacks.fire_message_sent(send_id, Ok(()));
            }
        }

        if let Some(hot) = self.peers.hot_mut(id) {
            hot.send_sequence = seq_counter;
        }
    }

    fn transmit_frame(&mut self, idx: usize, bytes: &[u8]) {
        if let Some(handle) = self.conns.get(idx).hot.handle {
            if let Err(err) = self.transport.stream_send(handle, bytes) {
                self.log.push(LogLevel::Warn, LogCategory::Transport, format!("send failed: {err}"));
            }
        }
    }

    /// Tear down a peer (aborting any live connection first) and fire
    /// `on_peer_lost`, discarding and accounting for any queued sends
    /// (spec.md §4.2, §4.4 "removed while its queue is non-empty").
    ///
    /// A peer removed while it still had a live connection (e.g. a GOODBYE
    /// datagram arriving for a peer we're also connected to, spec.md §8
    /// scenario 5) gets `on_peer_disconnected(Remote)` fired first, same as
    /// a connection the state machine walked down to `RELEASING` on its
    /// own — `remove_peer` just skips straight there instead of stepping
    /// through `CLOSING`.
    fn remove_peer(&mut self, id: PeerId) {
        if let Some(conn_idx) = self.peers.hot(id).and_then(|h| h.connection) {
            if let Some(handle) = self.conns.get(conn_idx).hot.handle {
                self.transport.stream_abort(handle);
                self.handle_to_conn.remove(&handle);
            }
            if self.conns.get(conn_idx).hot.state == ConnState::Connected {
                self.stats.peers_connected = self.stats.peers_connected.saturating_sub(1);
                self.callbacks.fire_peer_disconnected(id, DisconnectReason::Remote);
            }
            self.conns.release(conn_idx);
        }

        if let Some(mut cold) = self.peers.remove(id) {
            let dropped = cold.send_queue.clear();
            cold.stats.sends_dropped += dropped as u64;
            self.stats.accumulate(&cold.stats);
        }
        self.stats.peers_lost += 1;
        self.callbacks.fire_peer_lost(id);
    }

    fn sweep_peers(&mut self, now: u64) {
        if !self.config.auto_cleanup() {
            return;
        }
        let timeout = self.config.peer_timeout_ms();
        let stale: Vec<PeerId> = self
            .peers
            .hot_slice()
            .iter()
            .filter(|h| h.state == PeerState::Discovered && now.saturating_sub(h.last_activity_ms) >= timeout)
            .map(|h| h.id)
            .collect();
        for id in stale {
            self.remove_peer(id);
        }
    }
}

/// Crate version (spec.md §6 `Version`).
pub fn version() -> Version {
    Version::CURRENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::LanBus;
    use std::net::Ipv4Addr;

    fn host(bus: &LanBus, last: u8, name: &str) -> Context {
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, last));
        let transport = Box::new(bus.join(ip));
        Context::init(ContextConfigBuilder::new().with_local_name(name).with_max_peers(4), transport).unwrap()
    }

    #[test]
    fn init_and_shutdown_round_trip() {
        let bus = LanBus::new();
        let mut ctx = host(&bus, 1, "alice");
        assert!(!ctx.is_listening());
        ctx.shutdown();
    }

    #[test]
    fn discovery_converges_both_ways() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");

        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();

        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(100);
        }

        assert!(alice.find_peer_by_name("bob").is_some());
        assert!(bob.find_peer_by_name("alice").is_some());
    }

    #[test]
    fn connect_then_send_delivers_a_message() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");

        bob.start_listening().unwrap();
        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();

        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(50);
        }

        let bob_id = alice.find_peer_by_name("bob").expect("bob discovered");
        alice.connect(bob_id).unwrap();

        for _ in 0..3 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(10);
        }

        assert_eq!(alice.get_peer_by_id(bob_id).unwrap().state, PeerState::Connected);

        alice.send(bob_id, b"hello bob").unwrap();
        for _ in 0..3 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(10);
        }

        let alice_id = bob.find_peer_by_name("alice").expect("alice discovered");
        assert_eq!(bob.get_peer_stats(alice_id).unwrap().messages_received, 1);
    }

    #[test]
    fn send_udp_delivers_without_a_stream_connection() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");

        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();
        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(100);
        }

        let bob_id = alice.find_peer_by_name("bob").expect("bob discovered");
        // No connect() call: SendUDP needs no stream, unlike `send`.
        alice.send_udp(bob_id, b"unreliable hello").unwrap();
        bob.poll().unwrap();

        let alice_id = bob.find_peer_by_name("alice").expect("alice discovered");
        assert_eq!(bob.get_peer_stats(alice_id).unwrap().messages_received, 1);
    }

    #[test]
    fn broadcast_udp_does_not_get_mistaken_for_a_discovery_packet() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");

        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();
        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(100);
        }
        let discovered_before = bob.get_global_stats().peers_discovered;

        alice.broadcast_udp(b"unreliable broadcast").unwrap();
        bob.poll().unwrap();

        // bob still only knows about alice from discovery; the raw UDP
        // broadcast must not be decoded as a (malformed) discovery packet.
        assert_eq!(bob.get_global_stats().peers_discovered, discovered_before);
        let alice_id = bob.find_peer_by_name("alice").expect("alice discovered");
        assert_eq!(bob.get_peer_stats(alice_id).unwrap().messages_received, 1);
    }

    #[test]
    fn disconnect_demotes_peer_back_to_discovered() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");

        bob.start_listening().unwrap();
        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();
        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(50);
        }

        let bob_id = alice.find_peer_by_name("bob").unwrap();
        alice.connect(bob_id).unwrap();
        for _ in 0..3 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(10);
        }

        alice.disconnect(bob_id).unwrap();
        for _ in 0..3 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(10);
        }

        assert_eq!(alice.get_peer_by_id(bob_id).unwrap().state, PeerState::Discovered);
    }

    #[test]
    fn backpressure_surfaces_as_an_error_without_drop_on_full() {
        let bus = LanBus::new();
        let mut alice = host(&bus, 1, "alice");
        let mut bob = host(&bus, 2, "bob");
        bob.start_listening().unwrap();
        alice.start_discovery().unwrap();
        bob.start_discovery().unwrap();
        for _ in 0..5 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(50);
        }
        let bob_id = alice.find_peer_by_name("bob").unwrap();
        alice.connect(bob_id).unwrap();
        for _ in 0..3 {
            alice.poll().unwrap();
            bob.poll().unwrap();
            bus.advance_ticks(10);
        }

        for i in 0..queue::DEFAULT_QUEUE_CAPACITY {
            alice.send_ex(bob_id, &[i as u8], Priority::Normal, SendFlags::NONE, 0).unwrap();
        }
        assert!(matches!(
            alice.send_ex(bob_id, b"one too many", Priority::Normal, SendFlags::NONE, 0),
            Err(Error::Backpressure)
        ));
    }

    #[test]
    fn version_reports_current_crate_version() {
        assert_eq!(version(), Version::CURRENT);
    }

    #[test]
    fn jittered_interval_stays_within_ten_percent_of_base() {
        for _ in 0..100 {
            let jittered = jittered_interval(5_000);
            assert!((4_500..=5_500).contains(&jittered), "{jittered} out of range");
        }
    }
}
