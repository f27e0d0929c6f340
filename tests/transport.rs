//! Transport tests over loopback TCP
//!
//! Usage:
//!   cargo test --test transport -- --nocapture

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use parcel::error::TransportError;
use parcel::network::{
    Client, ClientConfig, Connection, ConnectionConfig, ConnectionNamer, Listener, ListenerConfig, SendLoopConfig,
};
use parcel::protocol::{Record, Schema, SchemaRegistry, TypeDescriptor, Value, WireCodec};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

fn listener(prefix: &'static str) -> (Listener, SocketAddr) {
    let listener = Listener::bind(
        "127.0.0.1:0".parse().unwrap(),
        ConnectionNamer::new(prefix),
        ListenerConfig::default(),
    )
    .unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn fast_client_config() -> ClientConfig {
    ClientConfig {
        connection: ConnectionConfig::default(),
        send_loop: SendLoopConfig::default().poll_timeout(Duration::from_millis(20)),
    }
}

#[test]
fn test_truncated_frame_reports_received_and_expected() {
    let (mut listener, addr) = listener("server-");

    let writer = thread::spawn(move || {
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(&10i32.to_be_bytes()).unwrap();
        raw.write_all(&[1, 2, 3, 4]).unwrap();
        // drop = close setelah 4 dari 10 byte
    });

    let server = listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap();
    writer.join().unwrap();

    match server.receive_framed() {
        Err(TransportError::Truncated {
            received, expected, ..
        }) => {
            assert_eq!(received, 4);
            assert_eq!(expected, 10);
        }
        other => panic!("expected truncated read, got {:?}", other),
    }
}

#[test]
fn test_fifo_with_concurrent_producers() {
    const PRODUCERS: u8 = 4;
    const PER_PRODUCER: u32 = 250;

    let (mut listener, addr) = listener("server-");
    let namer = ConnectionNamer::new("producer-client-");
    let client = Client::connect(addr, &namer, fast_client_config()).unwrap();
    assert_eq!(client.name(), "producer-client-0");

    let server = listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap();

    thread::scope(|s| {
        for producer in 0..PRODUCERS {
            let client = &client;
            s.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let mut payload = vec![producer];
                    payload.extend_from_slice(&seq.to_be_bytes());
                    client.send_framed(&payload).unwrap();
                }
            });
        }
    });

    let mut next = vec![0u32; PRODUCERS as usize];
    for _ in 0..(PRODUCERS as u32 * PER_PRODUCER) {
        let frame = server.receive_framed().unwrap();
        assert_eq!(frame.len(), 5);
        let producer = frame[0] as usize;
        let seq = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        assert_eq!(seq, next[producer], "producer {} out of order", producer);
        next[producer] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));

    assert_eq!(client.shutdown(), u64::from(PRODUCERS) * u64::from(PER_PRODUCER));
}

#[test]
fn test_single_producer_order_abc() {
    let (mut listener, addr) = listener("server-");
    let client = Client::connect_named(addr, "abc", fast_client_config()).unwrap();
    let server = listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap();

    for payload in [b"A", b"B", b"C"] {
        client.send(payload.to_vec());
    }

    let received = server.receive_exact(3).unwrap();
    assert_eq!(received, b"ABC");
    client.shutdown();
}

#[test]
fn test_send_failures_are_reported_and_loop_keeps_draining() {
    let (mut listener, addr) = listener("server-");
    let connection = Connection::connect(addr, "doomed", ConnectionConfig::default()).unwrap();
    let _server = listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap();
    connection.close();

    let (tx, rx) = mpsc::channel();
    let client = Client::start_with_handler(
        connection,
        SendLoopConfig::default().poll_timeout(Duration::from_millis(20)),
        move |err| {
            tx.send(err.to_string()).ok();
        },
    )
    .unwrap();

    client.send_labeled(b"one".to_vec(), "first failed").unwrap();
    client.send_labeled(b"two".to_vec(), "second failed").unwrap();
    client.send(b"three".to_vec());
    assert!(matches!(
        client.send_labeled(b"four".to_vec(), ""),
        Err(TransportError::InvalidArgument(_))
    ));

    let labels: Vec<String> = (0..3)
        .map(|_| rx.recv_timeout(ACCEPT_TIMEOUT).unwrap())
        .collect();
    assert_eq!(
        labels,
        vec![
            "first failed".to_owned(),
            "second failed".to_owned(),
            "error while attempting to send a message on doomed".to_owned(),
        ]
    );

    assert_eq!(client.shutdown(), 0);
}

#[test]
fn test_value_exchange_over_client() {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            Schema::new("Quote")
                .field("symbol", TypeDescriptor::String)
                .field("price", TypeDescriptor::Double)
                .field("flags", TypeDescriptor::array(TypeDescriptor::Bool)),
        )
        .unwrap();
    let codec = WireCodec::new(registry);
    let descriptor = TypeDescriptor::composite("Quote");

    let quote = Value::object(Record::new(
        "Quote",
        vec![
            Value::from("ACME"),
            Value::Double(101.25),
            Value::Array(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]),
        ],
    ));

    let (mut listener, addr) = listener("server-");
    let client = Client::connect_named(addr, "quotes", fast_client_config()).unwrap();
    let server = listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap();

    client.send_value(&codec, &quote, &descriptor).unwrap();
    client.send_value(&codec, &Value::null(), &descriptor).unwrap();

    let first = codec
        .decode_exact(&server.receive_framed().unwrap(), &descriptor)
        .unwrap();
    assert_eq!(first, quote);
    let second = codec
        .decode_exact(&server.receive_framed().unwrap(), &descriptor)
        .unwrap();
    assert!(second.is_null());

    // balasan lewat jalur sebaliknya
    server
        .send_framed(&codec.encode(&quote, &descriptor).unwrap())
        .unwrap();
    assert_eq!(client.receive_value(&codec, &descriptor).unwrap(), quote);

    client.shutdown();
}

#[test]
fn test_close_unblocks_reader() {
    let (mut listener, addr) = listener("server-");
    let _peer = TcpStream::connect(addr).unwrap();
    let server = Arc::new(listener.accept_timeout(ACCEPT_TIMEOUT).unwrap().unwrap());

    let reader = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.receive_framed())
    };

    thread::sleep(Duration::from_millis(50));
    server.close();

    assert!(reader.join().unwrap().is_err());
    assert!(matches!(server.receive_framed(), Err(TransportError::Closed(_))));
}

#[test]
fn test_listener_serve_until_stopped() {
    let (mut listener, addr) = listener("peer-");
    let running = Arc::new(AtomicBool::new(true));
    let accepted = Arc::new(Mutex::new(Vec::new()));

    let server = {
        let running = Arc::clone(&running);
        let accepted = Arc::clone(&accepted);
        thread::spawn(move || {
            listener
                .serve(&running, |connection| {
                    accepted.lock().unwrap().push(connection.name().to_owned());
                })
                .unwrap();
        })
    };

    let _a = TcpStream::connect(addr).unwrap();
    let _b = TcpStream::connect(addr).unwrap();

    let deadline = Instant::now() + ACCEPT_TIMEOUT;
    while accepted.lock().unwrap().len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    running.store(false, Ordering::Release);
    server.join().unwrap();

    assert_eq!(*accepted.lock().unwrap(), vec!["peer-0", "peer-1"]);
}
