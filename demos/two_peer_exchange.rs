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

//! Minimal, non-interactive demonstration of the public API: two
//! `Context`s discover each other over an in-memory `LanBus`, connect,
//! and exchange one message. There is no real network here — this is
//! the shape an adapter crate wires up over actual sockets.

use peertalk_core::transport::mock::LanBus;
use peertalk_core::{Context, ContextConfigBuilder};
use std::net::{IpAddr, Ipv4Addr};

fn main() {
    tracing_subscriber::fmt().with_env_filter("peertalk_core=debug").init();

    let bus = LanBus::new();
    let mut host = Context::init(
        ContextConfigBuilder::new().with_local_name("host"),
        Box::new(bus.join(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)))),
    )
    .expect("valid configuration");
    let mut guest = Context::init(
        ContextConfigBuilder::new().with_local_name("guest"),
        Box::new(bus.join(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 11)))),
    )
    .expect("valid configuration");

    guest.callbacks_mut().set_on_message_received(|_id, bytes| {
        println!("guest received: {}", String::from_utf8_lossy(bytes));
    });

    host.start_listening().expect("listen");
    host.start_discovery().expect("discovery");
    guest.start_discovery().expect("discovery");

    // Discovery converges within the first handful of polls; keep polling
    // both sides and advancing the mock clock until "guest" shows up in
    // "host"'s peer table.
    let guest_id = loop {
        host.poll().expect("poll");
        guest.poll().expect("poll");
        bus.advance_ticks(50);
        if let Some(id) = host.find_peer_by_name("guest") {
            break id;
        }
    };

    host.connect(guest_id).expect("connect");
    while host.get_peer_by_id(guest_id).unwrap().state != peertalk_core::PeerState::Connected {
        host.poll().expect("poll");
        guest.poll().expect("poll");
        bus.advance_ticks(10);
    }

    host.send(guest_id, b"hello from host").expect("send");
    for _ in 0..5 {
        host.poll().expect("poll");
        guest.poll().expect("poll");
        bus.advance_ticks(10);
    }

    host.shutdown();
    guest.shutdown();
}
