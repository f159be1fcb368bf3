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

//! Small shared value types used across the core (spec.md §3).

use std::fmt;
use std::net::IpAddr;

/// A tiny const-friendly stand-in for a bitflags-style struct: the real
/// `bitflags` crate is not part of the teacher's dependency stack and
/// these sets are small enough that hand-rolling them keeps the
/// dependency surface aligned with litep2p's (small, focused, no
/// incidental macro crates). Each flag set gets the same
/// `bits`/`contains`/`union` surface without repeating it by hand.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }
    };
}

/// Which underlying transport a peer address belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Reliable stream transport (TCP, ADSP, ...).
    Stream,
    /// Unreliable datagram transport, used by `SendUDP`/`BroadcastUDP`.
    Datagram,
}

/// One `(address, port, transport)` tuple a peer advertised. Peers carry
/// up to two of these (spec.md §3 Peer cold half).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub address: IpAddr,
    pub port: u16,
    pub transport: Transport,
}

/// Send priority. Higher priorities are drained first within their
/// transport (spec.md §3 Queue).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    pub const ALL_HIGH_TO_LOW: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

bitflags_lite! {
    /// Flags attached to an enqueued send (spec.md §4.6).
    pub struct SendFlags: u8 {
        const NONE         = 0b0000_0000;
        const COALESCABLE  = 0b0000_0001;
        const DROP_ON_FULL = 0b0000_0010;
        const TRACKED      = 0b0000_0100;
    }
}

bitflags_lite! {
    /// Advertised per-peer flag bits carried in discovery announces.
    pub struct PeerFlags: u8 {
        const NONE              = 0b0000_0000;
        const SUPPORTS_FRAGMENT = 0b0000_0001;
        const SUPPORTS_UDP      = 0b0000_0010;
    }
}

bitflags_lite! {
    /// ASR ("asynchronous status report") flags: the one-writer/one-reader
    /// byte-flag protocol an adapter uses to signal the poll loop from
    /// interrupt context (spec.md §3 "ASR flag bitfield", §4.8, §5, §9).
    /// Setting a bit is the *only* operation interrupt-time code performs;
    /// `poll` reads and clears them.
    pub struct AsrFlags: u8 {
        const NONE             = 0b0000_0000;
        const DATA_ARRIVED     = 0b0000_0001;
        const REMOTE_CLOSE     = 0b0000_0010;
        const SEND_COMPLETE    = 0b0000_0100;
        const LISTEN_COMPLETE  = 0b0000_1000;
        const CONNECT_COMPLETE = 0b0001_0000;
        const CLOSE_COMPLETE   = 0b0010_0000;
        const ERROR            = 0b0100_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_non_decreasing() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn send_flags_compose() {
        let flags = SendFlags::COALESCABLE | SendFlags::TRACKED;
        assert!(flags.contains(SendFlags::COALESCABLE));
        assert!(flags.contains(SendFlags::TRACKED));
        assert!(!flags.contains(SendFlags::DROP_ON_FULL));
    }
}
