//! The consumer capability invoked for `basic.deliver`.

use tracing::{info, warn};

use crate::frame::Cancel;

use super::channel::Channel;
use super::message::Message;

/// Receives messages for one consumer tag.
///
/// `deliver` runs on the connection's reader thread. It must not block,
/// and in particular must not call a synchronous channel method (any
/// `*_declare`, `basic_get`, `close`); doing so deadlocks the connection
/// because the reply can only be read by the thread that is waiting.
/// Asynchronous methods such as `basic_ack` are fine.
pub trait Consumer: Send {
    fn deliver(&mut self, channel: &Channel, message: Message);

    /// Called when the broker cancels the consumer (queue deleted,
    /// failover). The consumer is already removed from the registry.
    fn cancel(&mut self, _channel: &Channel, cancel: &Cancel) {
        warn!("consumer {} cancelled by server", cancel.consumer_tag());
    }
}

/// Logs deliveries, optionally acking each one.
pub struct DefaultConsumer {
    no_ack: bool,
}

impl DefaultConsumer {
    /// Pass the `no_ack` value the consumer was started with, so manual
    /// acks are only sent when the broker expects them.
    pub fn new(no_ack: bool) -> Self {
        Self { no_ack }
    }
}

impl Consumer for DefaultConsumer {
    fn deliver(&mut self, channel: &Channel, message: Message) {
        let delivery = message.delivery().expect("delivered message");
        info!(
            "consumer {} received {} bytes from exchange '{}' on channel {}",
            delivery.consumer_tag().unwrap_or(""),
            message.body().len(),
            delivery.exchange(),
            channel.channel_id(),
        );
        if !self.no_ack {
            if let Err(err) = channel.basic_ack(super::channel::BasicAckArguments::new(
                delivery.delivery_tag(),
                false,
            )) {
                warn!("auto ack failed: {}", err);
            }
        }
    }
}
