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

//! The six end-to-end scenarios, driven by two hosts sharing one
//! in-memory `LanBus` instead of a real NIC.

use peertalk_core::log::{LogCategory, LogEvent, LogLevel, LogSink};
use peertalk_core::queue;
use peertalk_core::transport::mock::LanBus;
use peertalk_core::{Context, ContextConfigBuilder, DisconnectReason, Error, PeerState, Priority, SendFlags};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
}

fn host(bus: &LanBus, last: u8, name: &str) -> Context {
    let transport = Box::new(bus.join(ip(last)));
    Context::init(ContextConfigBuilder::new().with_local_name(name).with_max_peers(4), transport).unwrap()
}

/// Sink that records every event it's handed, for asserting on log
/// traffic from outside the crate. `Arc<Mutex<..>>` rather than
/// `Rc<RefCell<..>>` because `LogSink` requires `Send`.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<LogEvent>>>);

impl LogSink for Recorder {
    fn emit(&mut self, event: &LogEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn run(a: &mut Context, b: &mut Context, bus: &LanBus, iterations: usize, tick_ms: u64) {
    for _ in 0..iterations {
        a.poll().unwrap();
        b.poll().unwrap();
        bus.advance_ticks(tick_ms);
    }
}

#[test]
fn discovery_convergence() {
    let bus = LanBus::new();
    let mut a = host(&bus, 1, "A");
    let mut b = host(&bus, 2, "B");

    let discovered_on_a: Arc<Mutex<u32>> = Arc::default();
    let discovered_on_b: Arc<Mutex<u32>> = Arc::default();
    {
        let counter = discovered_on_a.clone();
        a.callbacks_mut().set_on_peer_discovered(move |_id| *counter.lock().unwrap() += 1);
    }
    {
        let counter = discovered_on_b.clone();
        b.callbacks_mut().set_on_peer_discovered(move |_id| *counter.lock().unwrap() += 1);
    }

    a.start_discovery().unwrap();
    b.start_discovery().unwrap();

    // Two announce intervals at 100ms each.
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("A discovers B");
    let a_id = b.find_peer_by_name("A").expect("B discovers A");
    assert_eq!(a.get_peer_by_id(b_id).unwrap().name, "B");
    assert_eq!(b.get_peer_by_id(a_id).unwrap().name, "A");
    assert_eq!(*discovered_on_a.lock().unwrap(), 1);
    assert_eq!(*discovered_on_b.lock().unwrap(), 1);
}

#[test]
fn connect_and_single_message() {
    let bus = LanBus::new();
    let mut a = host(&bus, 1, "A");
    let mut b = host(&bus, 2, "B");

    let a_connected: Arc<Mutex<bool>> = Arc::default();
    let b_connected: Arc<Mutex<bool>> = Arc::default();
    {
        let flag = a_connected.clone();
        a.callbacks_mut().set_on_peer_connected(move |_id| *flag.lock().unwrap() = true);
    }
    {
        let flag = b_connected.clone();
        b.callbacks_mut().set_on_peer_connected(move |_id| *flag.lock().unwrap() = true);
    }
    let received: Arc<Mutex<Option<Vec<u8>>>> = Arc::default();
    {
        let slot = received.clone();
        b.callbacks_mut().set_on_message_received(move |_id, bytes| *slot.lock().unwrap() = Some(bytes.to_vec()));
    }

    b.start_listening().unwrap();
    a.start_discovery().unwrap();
    b.start_discovery().unwrap();
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("B discovered");
    a.connect(b_id).unwrap();
    run(&mut a, &mut b, &bus, 3, 10);

    assert!(*a_connected.lock().unwrap());
    assert!(*b_connected.lock().unwrap());
    assert_eq!(a.get_peer_by_id(b_id).unwrap().state, PeerState::Connected);

    a.send(b_id, b"hello").unwrap();
    run(&mut a, &mut b, &bus, 3, 10);

    assert_eq!(received.lock().unwrap().as_deref(), Some(&b"hello"[..]));
}

#[test]
fn fragmentation_reassembles_exactly() {
    let bus = LanBus::new();
    // 512-byte effective max on both sides, well below the 4096-byte payload.
    let transport_a = Box::new(bus.join(ip(1)));
    let transport_b = Box::new(bus.join(ip(2)));
    let mut a = Context::init(
        ContextConfigBuilder::new().with_local_name("A").with_max_peers(4).with_max_message_size(512).with_preferred_chunk(128),
        transport_a,
    )
    .unwrap();
    let mut b = Context::init(
        ContextConfigBuilder::new().with_local_name("B").with_max_peers(4).with_max_message_size(512).with_preferred_chunk(128),
        transport_b,
    )
    .unwrap();

    let received: Arc<Mutex<Option<Vec<u8>>>> = Arc::default();
    let fire_count: Arc<Mutex<u32>> = Arc::default();
    {
        let slot = received.clone();
        let count = fire_count.clone();
        b.callbacks_mut().set_on_message_received(move |_id, bytes| {
            *slot.lock().unwrap() = Some(bytes.to_vec());
            *count.lock().unwrap() += 1;
        });
    }

    b.start_listening().unwrap();
    a.start_discovery().unwrap();
    b.start_discovery().unwrap();
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("B discovered");
    a.connect(b_id).unwrap();
    run(&mut a, &mut b, &bus, 3, 10);
    assert_eq!(a.get_peer_by_id(b_id).unwrap().state, PeerState::Connected);

    let payload: Vec<u8> = (0..4096u32).map(|i| (i & 0xFF) as u8).collect();
    a.send(b_id, &payload).unwrap();
    run(&mut a, &mut b, &bus, 10, 10);

    assert_eq!(*fire_count.lock().unwrap(), 1);
    assert_eq!(received.lock().unwrap().as_deref(), Some(payload.as_slice()));
}

#[test]
fn crc_error_in_transit_closes_the_connection() {
    let bus = LanBus::new();
    let recorder = Recorder::default();
    let transport_a = Box::new(bus.join(ip(1)));
    let transport_b = Box::new(bus.join(ip(2)));
    let mut a = Context::init(ContextConfigBuilder::new().with_local_name("A").with_max_peers(4), transport_a).unwrap();
    let mut b = Context::init(
        ContextConfigBuilder::new().with_local_name("B").with_max_peers(4).with_log_sink(Box::new(recorder.clone())),
        transport_b,
    )
    .unwrap();

    let disconnects: Arc<Mutex<Vec<DisconnectReason>>> = Arc::default();
    {
        let log = disconnects.clone();
        b.callbacks_mut().set_on_peer_disconnected(move |_id, reason| log.lock().unwrap().push(reason));
    }

    b.start_listening().unwrap();
    a.start_discovery().unwrap();
    b.start_discovery().unwrap();
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("B discovered");
    a.connect(b_id).unwrap();
    run(&mut a, &mut b, &bus, 3, 10);
    let a_id = b.find_peer_by_name("A").expect("A discovered");
    assert_eq!(b.get_peer_by_id(a_id).unwrap().state, PeerState::Connected);

    a.send(b_id, b"a frame worth corrupting").unwrap();
    a.poll().unwrap();
    assert!(bus.corrupt_pending_byte(ip(2)), "expected a pending frame to corrupt");
    b.poll().unwrap();

    assert_eq!(*disconnects.lock().unwrap(), vec![DisconnectReason::Network]);
    assert_eq!(b.get_peer_by_id(a_id).unwrap().state, PeerState::Discovered);
    assert_eq!(b.get_peer_stats(a_id).unwrap().frames_crc_failed, 1);
    assert!(recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .any(|event| event.level == LogLevel::Warn && event.category == LogCategory::Protocol));
}

#[test]
fn graceful_shutdown_fires_disconnected_then_lost() {
    let bus = LanBus::new();
    let mut a = host(&bus, 1, "A");
    let mut b = host(&bus, 2, "B");

    let events: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    {
        let log = events.clone();
        b.callbacks_mut().set_on_peer_disconnected(move |_id, _reason| log.lock().unwrap().push("disconnected"));
    }
    {
        let log = events.clone();
        b.callbacks_mut().set_on_peer_lost(move |_id| log.lock().unwrap().push("lost"));
    }

    b.start_listening().unwrap();
    a.start_discovery().unwrap();
    b.start_discovery().unwrap();
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("B discovered");
    a.connect(b_id).unwrap();
    run(&mut a, &mut b, &bus, 3, 10);
    let a_id = b.find_peer_by_name("A").expect("A discovered");
    assert_eq!(b.get_peer_by_id(a_id).unwrap().state, PeerState::Connected);

    a.shutdown();
    for _ in 0..3 {
        b.poll().unwrap();
        bus.advance_ticks(50);
    }

    assert_eq!(*events.lock().unwrap(), vec!["disconnected", "lost"]);
    assert!(b.find_peer_by_name("A").is_none());
}

#[test]
fn backpressure_then_one_slot_frees_after_a_drain() {
    let bus = LanBus::new();
    let mut a = host(&bus, 1, "A");
    let mut b = host(&bus, 2, "B");

    b.start_listening().unwrap();
    a.start_discovery().unwrap();
    b.start_discovery().unwrap();
    run(&mut a, &mut b, &bus, 3, 100);

    let b_id = a.find_peer_by_name("B").expect("B discovered");
    a.connect(b_id).unwrap();
    run(&mut a, &mut b, &bus, 3, 10);

    for i in 0..queue::DEFAULT_QUEUE_CAPACITY {
        a.send_ex(b_id, &[i as u8], Priority::Normal, SendFlags::NONE, 0).unwrap();
    }
    assert!(matches!(
        a.send_ex(b_id, b"one too many", Priority::Normal, SendFlags::NONE, 0),
        Err(Error::Backpressure)
    ));

    // One poll drains a batch of queued sends, freeing at least one slot.
    a.poll().unwrap();
    b.poll().unwrap();
    bus.advance_ticks(10);

    a.send_ex(b_id, b"fits now", Priority::Normal, SendFlags::NONE, 0).unwrap();
}
