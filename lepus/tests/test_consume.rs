use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lepus::channel::{BasicConsumeArguments, Channel};
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::consumer::Consumer;
use lepus::error::Error;
use lepus::message::Message;
use lepus::Cancel;

mod common;

struct RecordingConsumer {
    deliveries: Arc<Mutex<Vec<Message>>>,
    cancelled: Arc<AtomicBool>,
}

impl Consumer for RecordingConsumer {
    fn deliver(&mut self, _channel: &Channel, message: Message) {
        self.deliveries.lock().unwrap().push(message);
    }

    fn cancel(&mut self, _channel: &Channel, _cancel: &Cancel) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Consume: register, receive a delivery split over two body frames via
/// `drain_events`, then get cancelled by the server (consumer-cancel
/// notification) and confirm the client's `cancel-ok`.
#[test]
fn consume_deliver_and_server_cancel() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        // basic.consume -> consume-ok with a server-named tag
        let mut consume = conn.expect_method(1, 60, 20);
        consume.u16(); // ticket
        assert_eq!("t.q", consume.shortstr());
        assert_eq!("", consume.shortstr()); // client asked for a generated tag
        let mut consume_ok = Vec::new();
        common::put_shortstr(&mut consume_ok, b"amq.ctag-test");
        conn.write_method(1, 60, 21, &consume_ok);

        // one delivery, body split across two frames
        let mut deliver = Vec::new();
        common::put_shortstr(&mut deliver, b"amq.ctag-test");
        deliver.extend_from_slice(&7u64.to_be_bytes()); // delivery tag
        deliver.push(1); // redelivered
        common::put_shortstr(&mut deliver, b"t.e");
        common::put_shortstr(&mut deliver, b"t.q");
        conn.write_content(1, 60, 60, &deliver, &[b"hel", b"lo"]);

        // cancel the consumer server-side, expect cancel-ok back
        let mut cancel = Vec::new();
        common::put_shortstr(&mut cancel, b"amq.ctag-test");
        cancel.push(0); // no-wait
        conn.write_method(1, 60, 30, &cancel);
        let mut cancel_ok = conn.expect_method(1, 60, 31);
        assert_eq!("amq.ctag-test", cancel_ok.shortstr());

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .rpc_timeout(Duration::from_secs(5))
        .finish();
    let connection = Connection::open(&args).unwrap();
    let channel = connection.channel(None).unwrap();

    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let cancelled = Arc::new(AtomicBool::new(false));
    let consumer = RecordingConsumer {
        deliveries: deliveries.clone(),
        cancelled: cancelled.clone(),
    };
    let tag = channel
        .basic_consume(
            consumer,
            BasicConsumeArguments::new("t.q", "").no_ack(true).finish(),
        )
        .unwrap();
    assert_eq!("amq.ctag-test", tag);

    connection.drain_events(Some(Duration::from_secs(5))).unwrap();
    {
        let deliveries = deliveries.lock().unwrap();
        assert_eq!(1, deliveries.len());
        let message = &deliveries[0];
        assert_eq!(b"hello", message.body());
        let delivery = message.delivery().unwrap();
        assert_eq!(7, delivery.delivery_tag());
        assert!(delivery.redelivered());
        assert_eq!(Some("amq.ctag-test"), delivery.consumer_tag());
    }

    // no further deliveries: drain now times out
    assert!(matches!(
        connection.drain_events(Some(Duration::from_millis(300))),
        Err(Error::Timeout)
    ));

    // the server-side cancel reached the consumer
    let waited = std::time::Instant::now();
    while !cancelled.load(Ordering::SeqCst) {
        assert!(waited.elapsed() < Duration::from_secs(5), "cancel not seen");
        std::thread::sleep(Duration::from_millis(20));
    }

    connection.close().unwrap();
    broker.join().unwrap();
}
