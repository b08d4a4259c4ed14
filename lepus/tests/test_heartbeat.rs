use std::time::{Duration, Instant};

use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::error::Error;

mod common;

/// With heartbeat 2 negotiated and no application traffic, the client
/// sends a heartbeat frame within 1.5 s; after the server goes silent
/// for more than twice the interval, the client abandons the connection
/// with a missed-heartbeat failure.
#[test]
fn heartbeat_send_and_missed_detection() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        let silence_begins = Instant::now();
        conn.handshake(0, 131072, 2);

        // the client's heartbeat must arrive at roughly half the interval
        let frame = conn.read_frame();
        assert_eq!(common::FRAME_HEARTBEAT, frame.frame_type);
        assert_eq!(0, frame.channel);
        let elapsed = silence_begins.elapsed();
        assert!(
            elapsed < Duration::from_millis(1500),
            "heartbeat took {:?}",
            elapsed
        );

        // stay silent; drain whatever the client sends until it gives up
        // on us and shuts the socket
        use std::io::Read;
        loop {
            let mut chunk = [0u8; 1024];
            match conn.stream_mut().read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(2)
        .finish();
    let connection = Connection::open(&args).unwrap();
    assert_eq!(2, connection.heartbeat());

    // missed-heartbeat close happens after 2 * interval of read silence
    let waited = Instant::now();
    while connection.is_open() {
        assert!(
            waited.elapsed() < Duration::from_secs(8),
            "connection not closed on missed heartbeats"
        );
        std::thread::sleep(Duration::from_millis(100));
    }

    match connection.channel(None).unwrap_err() {
        Error::Network(msg) => assert!(msg.contains("missed heartbeat"), "cause: {}", msg),
        other => panic!("unexpected error: {}", other),
    }

    broker.join().unwrap();
}
