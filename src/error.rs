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

//! Error taxonomy for the PeerTalk core.

use crate::peer_id::PeerId;

/// Broad category an [`Error`] falls into, used to keep the log sink's
/// category filtering coherent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad parameter, state mismatch, peer-not-found.
    InvalidInput,
    /// No-memory, buffer-full, backpressure, resource-exhausted.
    ResourceExhaustion,
    /// Network, timeout, connection-refused, connection-closed.
    Transport,
    /// CRC mismatch, wrong magic, truncated frame, version mismatch.
    Protocol,
    /// Invalid size, not-power-of-two capacity, feature-not-supported.
    Configuration,
    /// Magic-tag mismatch, index out of range.
    Internal,
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("context has not been initialized")]
    NotInitialized,

    #[error("out of memory")]
    NoMemory,

    #[error("platform adapter refused the operation")]
    Platform,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("peer {0} not found")]
    PeerNotFound(PeerId),

    #[error("peer {0} is not connected")]
    NotConnected(PeerId),

    #[error("peer table is full")]
    PeerTableFull,

    #[error("send queue is full")]
    Backpressure,

    #[error("operation timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("network error")]
    Network,

    #[error("CRC mismatch")]
    Crc,

    #[error("wrong magic")]
    Magic,

    #[error("truncated frame")]
    Truncated,

    #[error("unsupported protocol version")]
    Version,

    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Category this error belongs to, for log filtering (spec.md §7).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotInitialized
            | Error::PeerNotFound(_)
            | Error::NotConnected(_)
            | Error::PeerTableFull => ErrorKind::InvalidInput,
            Error::NoMemory | Error::Backpressure => ErrorKind::ResourceExhaustion,
            Error::Platform
            | Error::Timeout
            | Error::ConnectionRefused
            | Error::ConnectionClosed
            | Error::Network => ErrorKind::Transport,
            Error::Crc | Error::Magic | Error::Truncated | Error::Version => ErrorKind::Protocol,
            Error::InvalidConfiguration(_) => ErrorKind::Configuration,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable string form of an error, mirroring the C API's `ErrorString`.
pub fn error_string(error: &Error) -> &'static str {
    match error {
        Error::NotInitialized => "NOT_INITIALIZED",
        Error::NoMemory => "NO_MEMORY",
        Error::Platform => "PLATFORM",
        Error::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
        Error::PeerNotFound(_) => "PEER_NOT_FOUND",
        Error::NotConnected(_) => "NOT_CONNECTED",
        Error::PeerTableFull => "PEER_TABLE_FULL",
        Error::Backpressure => "BACKPRESSURE",
        Error::Timeout => "TIMEOUT",
        Error::ConnectionRefused => "CONNECTION_REFUSED",
        Error::ConnectionClosed => "CONNECTION_CLOSED",
        Error::Network => "NETWORK",
        Error::Crc => "CRC",
        Error::Magic => "MAGIC",
        Error::Truncated => "TRUNCATED",
        Error::Version => "VERSION",
        Error::Internal(_) => "INTERNAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_partition_into_the_six_categories() {
        assert_eq!(Error::NoMemory.kind(), ErrorKind::ResourceExhaustion);
        assert_eq!(Error::Crc.kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::InvalidConfiguration("bad").kind(),
            ErrorKind::Configuration
        );
    }
}
