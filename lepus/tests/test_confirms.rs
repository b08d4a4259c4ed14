use std::sync::{Arc, Mutex};
use std::time::Duration;

use lepus::callbacks::ChannelCallback;
use lepus::channel::{BasicPublishArguments, Channel, ConfirmSelectArguments};
use lepus::connection::{Connection, OpenConnectionArguments};
use lepus::error::Result;
use lepus::message::Message;
use lepus::{Ack, CloseChannel};

mod common;

struct AckRecorder {
    acks: Arc<Mutex<Vec<(u64, bool)>>>,
}

impl ChannelCallback for AckRecorder {
    fn close(&mut self, _channel: &Channel, _close: &CloseChannel) -> Result<()> {
        Ok(())
    }

    fn publish_ack(&mut self, _channel: &Channel, ack: &Ack) {
        self.acks.lock().unwrap().push((ack.delivery_tag(), ack.multiple()));
    }
}

/// Publisher confirms: sequence numbers start at 1 and increase per
/// publish, a multiple-ack resolves everything up to its tag, and
/// `basic_publish_confirm` blocks until its own tag is acked.
#[test]
fn confirms_resolve_in_publish_order() {
    common::setup_logging();

    let (port, broker) = common::spawn_broker(|mut conn| {
        conn.handshake(0, 131072, 0);
        conn.accept_channel_open(1);

        // confirm.select -> select-ok
        conn.expect_method(1, 85, 10);
        conn.write_method(1, 85, 11, &[]);

        // three plain publishes, acked with one multiple ack
        for _ in 0..3 {
            conn.expect_method(1, 60, 40);
            let size = conn.expect_content_header(1);
            conn.expect_body(1, size);
        }
        let mut ack = Vec::new();
        ack.extend_from_slice(&3u64.to_be_bytes());
        ack.push(1); // multiple
        conn.write_method(1, 60, 80, &ack);

        // a fourth publish, confirmed individually
        conn.expect_method(1, 60, 40);
        let size = conn.expect_content_header(1);
        conn.expect_body(1, size);
        let mut ack = Vec::new();
        ack.extend_from_slice(&4u64.to_be_bytes());
        ack.push(0);
        conn.write_method(1, 60, 80, &ack);

        conn.accept_connection_close();
    });

    let args = OpenConnectionArguments::new("127.0.0.1", port, "guest", "guest")
        .heartbeat(0)
        .rpc_timeout(Duration::from_secs(5))
        .finish();
    let connection = Connection::open(&args).unwrap();
    let channel = connection.channel(None).unwrap();

    let acks = Arc::new(Mutex::new(Vec::new()));
    channel.register_callback(AckRecorder { acks: acks.clone() });

    channel.confirm_select(ConfirmSelectArguments::default()).unwrap();

    let publish_args = BasicPublishArguments::new("t.e", "t.q");
    for body in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        channel
            .basic_publish(Message::new(body), publish_args.clone())
            .unwrap();
    }

    // the fourth only returns once its own confirm arrives
    let tag = channel
        .basic_publish_confirm(Message::new(b"four".to_vec()), publish_args)
        .unwrap();
    assert_eq!(4, tag);
    assert_eq!(0, channel.unconfirmed_count());

    // the callback observed both acks
    let observed = acks.lock().unwrap().clone();
    assert!(observed.contains(&(3, true)));
    assert!(observed.contains(&(4, false)));

    connection.close().unwrap();
    broker.join().unwrap();
}
