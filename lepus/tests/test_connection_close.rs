use std::time::{Duration, Instant};

use lepus::channel::QueueDeclareArguments;
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::error::Error;

mod common;

/// A server-initiated `connection.close` is confirmed with `close-ok`,
/// and every channel fails afterwards with the server's reason.
#[test]
fn server_initiated_close_fails_everything() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        let mut close = Vec::new();
        close.extend_from_slice(&320u16.to_be_bytes());
        common::put_shortstr(&mut close, b"CONNECTION_FORCED - broker is shutting down");
        close.extend_from_slice(&0u16.to_be_bytes());
        close.extend_from_slice(&0u16.to_be_bytes());
        conn.write_method(0, 10, 50, &close);

        // the client must confirm before the socket goes away
        conn.expect_method(0, 10, 51);
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .rpc_timeout(Duration::from_secs(5))
        .finish();
    let connection = Connection::open(&args).unwrap();
    let channel = connection.channel(None).unwrap();

    let waited = Instant::now();
    while connection.is_open() {
        assert!(
            waited.elapsed() < Duration::from_secs(5),
            "connection not closed after server close"
        );
        std::thread::sleep(Duration::from_millis(20));
    }

    match connection.channel(None).unwrap_err() {
        Error::ConnectionClosed {
            reply_code,
            reply_text,
        } => {
            assert_eq!(320, reply_code);
            assert!(reply_text.contains("CONNECTION_FORCED"));
        }
        other => panic!("unexpected error: {}", other),
    }

    match channel
        .queue_declare(QueueDeclareArguments::new("q"))
        .unwrap_err()
    {
        Error::ChannelClosed { reply_code, .. } => assert_eq!(320, reply_code),
        other => panic!("unexpected error: {}", other),
    }

    // closing again is a clean no-op
    connection.close().unwrap();
    broker.join().unwrap();
}
