use lepus::connection::{Connection, OpenConnectionArguments};

mod common;

/// The full client-side handshake against a scripted broker: protocol
/// header bytes, start-ok contents, tune negotiation, vhost open, and
/// the orderly close handshake.
#[test]
fn handshake_and_close() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        // server imposes no channel limit, the client's 2047 must win
        let log = conn.handshake(0, 131072, 60);

        let mut start_ok = log.start_ok;
        start_ok.skip_table(); // client properties
        assert_eq!("PLAIN", start_ok.shortstr());
        assert_eq!(b"\0guest\0guest".to_vec(), start_ok.longstr());
        assert_eq!("en_US", start_ok.shortstr());

        assert_eq!((2047, 131072, 60), log.negotiated);
        assert_eq!("/", log.virtual_host);

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest");
    let connection = Connection::open(&args).unwrap();
    assert!(connection.is_open());
    assert_eq!(2047, connection.channel_max());
    assert_eq!(131072, connection.frame_max());
    assert_eq!(60, connection.heartbeat());
    assert!(connection.server_properties().is_empty());

    connection.close().unwrap();
    assert!(!connection.is_open());
    broker.join().unwrap();
}

/// Dropping the last handle of an open channel sends `channel.close`;
/// the dispatcher finalizes the close when `close-ok` arrives.
#[test]
fn dropped_channel_is_closed_on_the_server() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        // the drop must put a channel.close on the wire
        let mut close = conn.expect_method(1, 20, 40);
        assert_eq!(200, close.u16());
        conn.write_method(1, 20, 41, &[]);

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .finish();
    let connection = Connection::open(&args).unwrap();
    {
        let channel = connection.channel(None).unwrap();
        assert!(channel.is_open());
    }
    connection.close().unwrap();
    broker.join().unwrap();
}

/// The server may reject the virtual host during open with
/// `connection.close`; the client surfaces the code and text.
#[test]
fn open_rejected_by_server() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.expect_protocol_header();

        let mut start = vec![0, 9];
        start.extend_from_slice(&0u32.to_be_bytes());
        common::put_longstr(&mut start, b"PLAIN");
        common::put_longstr(&mut start, b"en_US");
        conn.write_method(0, 10, 10, &start);
        conn.expect_method(0, 10, 11);

        let mut tune = Vec::new();
        tune.extend_from_slice(&0u16.to_be_bytes());
        tune.extend_from_slice(&131072u32.to_be_bytes());
        tune.extend_from_slice(&0u16.to_be_bytes());
        conn.write_method(0, 10, 30, &tune);
        conn.expect_method(0, 10, 31);
        conn.expect_method(0, 10, 40);

        // refuse the vhost
        let mut close = Vec::new();
        close.extend_from_slice(&530u16.to_be_bytes());
        common::put_shortstr(&mut close, b"NOT_ALLOWED - vhost /prod refused");
        close.extend_from_slice(&10u16.to_be_bytes());
        close.extend_from_slice(&40u16.to_be_bytes());
        conn.write_method(0, 10, 50, &close);
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .virtual_host("/prod".to_owned())
        .heartbeat(0)
        .finish();
    let err = Connection::open(&args).unwrap_err();
    match err {
        lepus::error::Error::ConnectionClosed {
            reply_code,
            reply_text,
        } => {
            assert_eq!(530, reply_code);
            assert!(reply_text.contains("NOT_ALLOWED"));
        }
        other => panic!("unexpected error: {}", other),
    }
    broker.join().unwrap();
}
