use lepus::channel::BasicPublishArguments;
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::message::Message;
use lepus::{BasicProperties, DELIVERY_MODE_PERSISTENT};

mod common;

/// With a negotiated frame_max of 4096, a 10000-octet body must leave as
/// one method frame, one header declaring the full size, and body frames
/// of 4088, 4088 and 1824 octets, in that order on the wire.
#[test]
fn body_is_chunked_to_frame_max() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 4096, 0);
        conn.accept_channel_open(1);

        let mut publish = conn.expect_method(1, 60, 40);
        publish.u16(); // ticket
        assert_eq!("t.e", publish.shortstr());
        assert_eq!("t.q", publish.shortstr());

        let body_size = conn.expect_content_header(1);
        assert_eq!(10_000, body_size);
        let (body, sizes) = conn.expect_body(1, body_size);
        assert_eq!(vec![4088, 4088, 1824], sizes);
        assert!(body.iter().all(|b| *b == 0xAB));

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .frame_max(4096)
        .finish();
    let connection = Connection::open(&args).unwrap();
    assert_eq!(4096, connection.frame_max());

    let channel = connection.channel(None).unwrap();
    let message = Message::new(vec![0xAB; 10_000]).with_properties(
        BasicProperties::default()
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .finish(),
    );
    channel
        .basic_publish(message, BasicPublishArguments::new("t.e", "t.q"))
        .unwrap();

    connection.close().unwrap();
    broker.join().unwrap();
}

/// An empty body publishes as method + header only.
#[test]
fn empty_body_has_no_body_frame() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        conn.expect_method(1, 60, 40);
        assert_eq!(0, conn.expect_content_header(1));
        // next frame must be the connection close, not a body frame
        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .finish();
    let connection = Connection::open(&args).unwrap();
    let channel = connection.channel(None).unwrap();
    channel
        .basic_publish(Message::new(Vec::new()), BasicPublishArguments::new("", "q"))
        .unwrap();
    connection.close().unwrap();
    broker.join().unwrap();
}
