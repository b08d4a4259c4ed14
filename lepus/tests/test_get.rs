use lepus::channel::{BasicAckArguments, BasicGetArguments};
use lepus::connection::{Connection, OpenConnectionArguments};

mod common;

/// `basic_get` assembles get-ok + header + body into a message carrying
/// the delivery info; an empty queue yields `None`; the ack goes back
/// out with the same delivery tag.
#[test]
fn get_round_trip() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        // first get: a 5-octet message
        let mut get = conn.expect_method(1, 60, 70);
        get.u16(); // ticket
        assert_eq!("t.q", get.shortstr());
        assert_eq!(0, get.u8()); // no_ack

        let mut get_ok = Vec::new();
        get_ok.extend_from_slice(&1u64.to_be_bytes()); // delivery tag
        get_ok.push(0); // redelivered
        common::put_shortstr(&mut get_ok, b"t.e");
        common::put_shortstr(&mut get_ok, b"t.q");
        get_ok.extend_from_slice(&0u32.to_be_bytes()); // message count
        conn.write_content(1, 60, 71, &get_ok, &[b"hello"]);

        // ack for it
        let mut ack = conn.expect_method(1, 60, 80);
        assert_eq!(1, ack.u64());
        assert_eq!(0, ack.u8()); // multiple

        // second get: empty queue
        conn.expect_method(1, 60, 70);
        let mut get_empty = Vec::new();
        common::put_shortstr(&mut get_empty, b"");
        conn.write_method(1, 60, 72, &get_empty);

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .finish();
    let connection = Connection::open(&args).unwrap();
    let channel = connection.channel(None).unwrap();

    let message = channel
        .basic_get(BasicGetArguments::new("t.q"))
        .unwrap()
        .expect("message available");
    assert_eq!(b"hello", message.body());
    let delivery = message.delivery().expect("delivery info");
    assert_eq!(1, delivery.delivery_tag());
    assert!(!delivery.redelivered());
    assert_eq!("t.e", delivery.exchange());
    assert_eq!("t.q", delivery.routing_key());
    assert_eq!(Some(0), delivery.message_count());
    assert_eq!(None, delivery.consumer_tag());

    channel
        .basic_ack(BasicAckArguments::new(delivery.delivery_tag(), false))
        .unwrap();

    assert!(channel
        .basic_get(BasicGetArguments::new("t.q"))
        .unwrap()
        .is_none());

    connection.close().unwrap();
    broker.join().unwrap();
}
