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

//! Transport adapter interface (spec.md §4.8): the small synchronous
//! vtable the core consumes. The platform-specific implementations
//! (TCP socket wrappers, MacTCP stream drivers, Open Transport endpoint
//! wrappers, ADSP control blocks) are out of scope (spec.md §1); only
//! the contract and an in-memory loopback implementation for tests live
//! here.

pub mod mock;

use crate::error::Error;
use crate::types::AsrFlags;
use std::net::IpAddr;

/// Opaque handle to one stream (connection or listener), assigned by the
/// adapter. The core never interprets its value, only compares it for
/// equality and stores it in a peer or listener slot (spec.md §3
/// "connection handle (opaque)").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub usize);

/// One event drained from [`Transport::poll_platform`]. In a genuinely
/// interrupt-driven adapter the flags on `handle` would already have
/// been OR'd into the connection's hot ASR byte by interrupt-time code;
/// `poll_platform` here is the point where the core's single flow of
/// control observes that prior work (spec.md §4.8, §5, §9).
#[derive(Debug, Clone)]
pub struct PlatformEvent {
    pub handle: StreamHandle,
    pub flags: AsrFlags,
    /// Populated alongside [`AsrFlags::ERROR`].
    pub error: Option<Error>,
    /// Populated alongside [`AsrFlags::LISTEN_COMPLETE`]: the accepted
    /// connection's own handle and the remote endpoint it came from.
    pub accepted: Option<(StreamHandle, IpAddr, u16)>,
}

impl PlatformEvent {
    pub fn new(handle: StreamHandle, flags: AsrFlags) -> Self {
        Self {
            handle,
            flags,
            error: None,
            accepted: None,
        }
    }
}

/// The core's view of the platform. Every method here is the
/// synchronous counterpart of spec.md §4.8's list; none of them block —
/// operations that take real wall time (`listen`, `connect`, `close`)
/// report completion asynchronously through [`Transport::poll_platform`]
/// instead.
pub trait Transport {
    fn init(&mut self) -> Result<(), Error>;
    fn shutdown(&mut self);

    /// Milliseconds since some fixed epoch, monotonic within a process.
    /// Main-thread-only per spec.md §4.8.
    fn get_ticks(&self) -> u64;

    /// Pump the platform and drain whatever flag-setting work interrupt
    /// context (or, on a host-OS adapter, background I/O) queued up.
    fn poll_platform(&mut self) -> Vec<PlatformEvent>;

    fn udp_send(&mut self, address: IpAddr, port: u16, bytes: &[u8]) -> Result<(), Error>;
    /// Pop one received datagram, if any are queued: `(sender address,
    /// destination port, payload)`. The destination port is how the core
    /// tells a discovery packet (arrived on `discovery_port`) apart from
    /// an application datagram (arrived on `udp_port`) without the
    /// adapter having to parse payloads itself.
    fn udp_recv(&mut self) -> Option<(IpAddr, u16, Vec<u8>)>;

    fn stream_create(&mut self) -> Result<StreamHandle, Error>;
    fn stream_release(&mut self, handle: StreamHandle);

    fn stream_listen(&mut self, handle: StreamHandle, port: u16) -> Result<(), Error>;
    fn stream_connect(
        &mut self,
        handle: StreamHandle,
        address: IpAddr,
        port: u16,
        timeout_ms: u64,
    ) -> Result<(), Error>;

    fn stream_send(&mut self, handle: StreamHandle, bytes: &[u8]) -> Result<usize, Error>;
    /// Append received bytes into `into`, returning how many were read.
    fn stream_recv(&mut self, handle: StreamHandle, into: &mut Vec<u8>) -> Result<usize, Error>;
    fn stream_close(&mut self, handle: StreamHandle, timeout_ms: u64) -> Result<(), Error>;
    fn stream_abort(&mut self, handle: StreamHandle);
}
