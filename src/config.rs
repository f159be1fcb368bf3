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

//! Context configuration (spec.md §6).
//!
//! Follows the teacher's builder-then-immutable-config split
//! (`Litep2pConfigBuilder` → `Litep2pConfig`).

use crate::error::Error;
use crate::log::{LogLevel, LogSink};

/// Ceiling on `max_peers` (spec.md §6: "ceiling = 256").
pub const MAX_PEERS_CEILING: usize = 256;

/// Smallest a message frame header+trailer can be; `max_message_size`
/// must be at least this (spec.md §4.1).
pub const MINIMUM_FRAME_SIZE: usize = 16;

/// Largest a single message is allowed to be, fragmented or not.
pub const MAX_MESSAGE_SIZE_CEILING: usize = 1 << 20;

fn default_discovery_port() -> u16 {
    7353
}

fn default_tcp_port() -> u16 {
    7354
}

fn default_udp_port() -> u16 {
    7355
}

/// Immutable, validated configuration for a [`crate::Context`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub(crate) local_name: String,
    pub(crate) transports: u8,
    pub(crate) discovery_port: u16,
    pub(crate) tcp_port: u16,
    pub(crate) udp_port: u16,
    pub(crate) max_peers: usize,
    pub(crate) recv_buffer_size: usize,
    pub(crate) send_buffer_size: usize,
    pub(crate) discovery_interval_ms: u64,
    pub(crate) peer_timeout_ms: u64,
    pub(crate) auto_accept: bool,
    pub(crate) auto_cleanup: bool,
    pub(crate) log_level: LogLevel,
    pub(crate) max_message_size: usize,
    pub(crate) preferred_chunk: usize,
    pub(crate) enable_fragmentation: bool,
}

impl ContextConfig {
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Bitmask restricting which transports to use (0 = all).
    pub fn transports(&self) -> u8 {
        self.transports
    }

    pub fn discovery_port(&self) -> u16 {
        self.discovery_port
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    pub fn udp_port(&self) -> u16 {
        self.udp_port
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    pub fn discovery_interval_ms(&self) -> u64 {
        self.discovery_interval_ms
    }

    pub fn peer_timeout_ms(&self) -> u64 {
        self.peer_timeout_ms
    }

    pub fn auto_accept(&self) -> bool {
        self.auto_accept
    }

    pub fn auto_cleanup(&self) -> bool {
        self.auto_cleanup
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn preferred_chunk(&self) -> usize {
        self.preferred_chunk
    }

    pub fn enable_fragmentation(&self) -> bool {
        self.enable_fragmentation
    }

    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }

    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }
}

/// Builder for [`ContextConfig`].
#[derive(Debug)]
pub struct ContextConfigBuilder {
    local_name: String,
    transports: u8,
    discovery_port: u16,
    tcp_port: u16,
    udp_port: u16,
    max_peers: usize,
    recv_buffer_size: usize,
    send_buffer_size: usize,
    discovery_interval_ms: u64,
    peer_timeout_ms: u64,
    auto_accept: bool,
    auto_cleanup: bool,
    log_level: LogLevel,
    log_sink: Option<Box<dyn LogSink>>,
    max_message_size: usize,
    preferred_chunk: usize,
    enable_fragmentation: bool,
}

impl Default for ContextConfigBuilder {
    fn default() -> Self {
        Self {
            local_name: String::new(),
            transports: 0,
            discovery_port: default_discovery_port(),
            tcp_port: default_tcp_port(),
            udp_port: default_udp_port(),
            max_peers: 16,
            recv_buffer_size: 0,
            send_buffer_size: 0,
            discovery_interval_ms: 5_000,
            peer_timeout_ms: 15_000,
            auto_accept: true,
            auto_cleanup: true,
            log_level: LogLevel::Info,
            log_sink: None,
            max_message_size: 8192,
            preferred_chunk: 1024,
            enable_fragmentation: true,
        }
    }
}

impl ContextConfigBuilder {
    /// Create a new, empty [`ContextConfigBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertised local name (≤ 31 bytes).
    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    /// Restrict which transports to use (0 = all).
    pub fn with_transports(mut self, mask: u8) -> Self {
        self.transports = mask;
        self
    }

    /// Datagram port for discovery (0 = 7353).
    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = if port == 0 { default_discovery_port() } else { port };
        self
    }

    /// Reliable listen port (0 = 7354).
    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = if port == 0 { default_tcp_port() } else { port };
        self
    }

    /// Unreliable port (0 = 7355).
    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.udp_port = if port == 0 { default_udp_port() } else { port };
        self
    }

    /// Table size (0 = 16, ceiling = 256).
    pub fn with_max_peers(mut self, max_peers: usize) -> Self {
        self.max_peers = if max_peers == 0 { 16 } else { max_peers };
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    /// Milliseconds between announces (0 = 5000).
    pub fn with_discovery_interval_ms(mut self, ms: u64) -> Self {
        self.discovery_interval_ms = if ms == 0 { 5_000 } else { ms };
        self
    }

    /// Milliseconds of silence before loss (0 = 15000).
    pub fn with_peer_timeout_ms(mut self, ms: u64) -> Self {
        self.peer_timeout_ms = if ms == 0 { 15_000 } else { ms };
        self
    }

    pub fn with_auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_log_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Locally willing to handle (0 = 8192).
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = if size == 0 { 8192 } else { size };
        self
    }

    /// Fragmentation hint (0 = 1024).
    pub fn with_preferred_chunk(mut self, size: usize) -> Self {
        self.preferred_chunk = if size == 0 { 1024 } else { size };
        self
    }

    pub fn with_fragmentation(mut self, enabled: bool) -> Self {
        self.enable_fragmentation = enabled;
        self
    }

    /// Validate and build a [`ContextConfig`] plus the [`LogSink`] to
    /// install, consuming the builder.
    ///
    /// Mirrors spec.md §4.1's `Init` validation: names ≤ 31 bytes,
    /// `max_peers` in `(0, MAX_PEERS_CEILING]`, `max_message_size` in
    /// `[MINIMUM_FRAME_SIZE, MAX_MESSAGE_SIZE_CEILING]`, plus the
    /// cross-field checks SPEC_FULL.md §4.1 adds: a peer must survive at
    /// least one announce interval, and the fragmentation hint cannot
    /// exceed the locally willing maximum.
    pub fn build(self) -> Result<(ContextConfig, Box<dyn LogSink>), Error> {
        if self.local_name.len() > 31 {
            return Err(Error::InvalidConfiguration("local_name exceeds 31 bytes"));
        }
        if self.max_peers == 0 || self.max_peers > MAX_PEERS_CEILING {
            return Err(Error::InvalidConfiguration("max_peers out of range"));
        }
        if self.max_message_size < MINIMUM_FRAME_SIZE
            || self.max_message_size > MAX_MESSAGE_SIZE_CEILING
        {
            return Err(Error::InvalidConfiguration("max_message_size out of range"));
        }
        if self.peer_timeout_ms <= self.discovery_interval_ms {
            return Err(Error::InvalidConfiguration(
                "peer_timeout_ms must exceed discovery_interval_ms",
            ));
        }
        if self.preferred_chunk > self.max_message_size {
            return Err(Error::InvalidConfiguration(
                "preferred_chunk exceeds max_message_size",
            ));
        }

        let config = ContextConfig {
            local_name: self.local_name,
            transports: self.transports,
            discovery_port: self.discovery_port,
            tcp_port: self.tcp_port,
            udp_port: self.udp_port,
            max_peers: self.max_peers,
            recv_buffer_size: self.recv_buffer_size,
            send_buffer_size: self.send_buffer_size,
            discovery_interval_ms: self.discovery_interval_ms,
            peer_timeout_ms: self.peer_timeout_ms,
            auto_accept: self.auto_accept,
            auto_cleanup: self.auto_cleanup,
            log_level: self.log_level,
            max_message_size: self.max_message_size,
            preferred_chunk: self.preferred_chunk,
            enable_fragmentation: self.enable_fragmentation,
        };

        let sink = self
            .log_sink
            .unwrap_or_else(|| Box::new(crate::log::NullSink));

        Ok((config, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_name_over_31_bytes() {
        let err = ContextConfigBuilder::new()
            .with_local_name("x".repeat(32))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_timeout_not_exceeding_interval() {
        let err = ContextConfigBuilder::new()
            .with_discovery_interval_ms(1000)
            .with_peer_timeout_ms(1000)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn defaults_match_spec() {
        let (config, _sink) = ContextConfigBuilder::new().build().unwrap();
        assert_eq!(config.discovery_port(), 7353);
        assert_eq!(config.tcp_port(), 7354);
        assert_eq!(config.udp_port(), 7355);
        assert_eq!(config.max_peers(), 16);
        assert_eq!(config.max_message_size(), 8192);
        assert_eq!(config.preferred_chunk(), 1024);
    }
}
