use std::time::Duration;

use lepus::channel::{BasicGetArguments, QueueDeclareArguments};
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::error::Error;

mod common;

/// A passive declare of a missing queue draws `channel.close` 404. The
/// failing call surfaces the code and text, later calls on the same
/// channel fail without touching the wire, and a sibling channel stays
/// fully usable.
#[test]
fn channel_exception_closes_only_that_channel() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);
        conn.accept_channel_open(2);

        // queue.declare on channel 1 -> channel.close 404
        let mut declare = conn.expect_method(1, 50, 10);
        declare.u16(); // ticket
        assert_eq!("missing", declare.shortstr());
        assert_eq!(0b0000_0001, declare.u8()); // passive bit

        let mut close = Vec::new();
        close.extend_from_slice(&404u16.to_be_bytes());
        common::put_shortstr(&mut close, b"NOT_FOUND - no queue 'missing' in vhost '/'");
        close.extend_from_slice(&50u16.to_be_bytes());
        close.extend_from_slice(&10u16.to_be_bytes());
        conn.write_method(1, 20, 40, &close);

        // the client must confirm with channel.close-ok
        conn.expect_method(1, 20, 41);

        // channel 2 still works
        let mut declare = conn.expect_method(2, 50, 10);
        declare.u16();
        assert_eq!("present", declare.shortstr());
        let mut declare_ok = Vec::new();
        common::put_shortstr(&mut declare_ok, b"present");
        declare_ok.extend_from_slice(&3u32.to_be_bytes()); // message count
        declare_ok.extend_from_slice(&1u32.to_be_bytes()); // consumer count
        conn.write_method(2, 50, 11, &declare_ok);

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .rpc_timeout(Duration::from_secs(5))
        .finish();
    let connection = Connection::open(&args).unwrap();
    let failing = connection.channel(None).unwrap();
    let healthy = connection.channel(None).unwrap();

    let err = failing
        .queue_declare(QueueDeclareArguments::new("missing").passive(true).finish())
        .unwrap_err();
    match err {
        Error::ChannelClosed {
            reply_code,
            reply_text,
        } => {
            assert_eq!(404, reply_code);
            assert!(reply_text.contains("NOT_FOUND"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!failing.is_open());

    // the channel is dead; this does not reach the wire
    match failing.basic_get(BasicGetArguments::new("missing")).unwrap_err() {
        Error::ChannelClosed { reply_code, .. } => assert_eq!(404, reply_code),
        other => panic!("unexpected error: {}", other),
    }

    let (queue, message_count, consumer_count) = healthy
        .queue_declare(QueueDeclareArguments::new("present"))
        .unwrap()
        .unwrap();
    assert_eq!(("present".to_owned(), 3, 1), (queue, message_count, consumer_count));

    connection.close().unwrap();
    broker.join().unwrap();
}
