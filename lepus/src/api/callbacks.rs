//! Callback capabilities for server-initiated events.
//!
//! Callbacks run on the connection's reader thread; the same rule as for
//! consumers applies, do not call synchronous channel methods from them.

use tracing::{error, info, warn};

use crate::frame::{Ack, BasicProperties, Cancel, Close, CloseChannel, Nack, Return};

use super::channel::Channel;
use super::connection::Connection;
use super::error::Result;

pub trait ConnectionCallback: Send {
    /// Server is closing the connection; the close-ok reply has already
    /// been sent when this runs.
    fn close(&mut self, connection: &Connection, close: &Close) -> Result<()>;

    /// `connection.blocked` (RabbitMQ): publishes will not be read until
    /// the block lifts.
    fn blocked(&mut self, _connection: &Connection, reason: &str) {
        warn!("connection blocked by server, reason: {}", reason);
    }

    fn unblocked(&mut self, _connection: &Connection) {
        info!("connection unblocked by server");
    }
}

pub struct DefaultConnectionCallback;

impl ConnectionCallback for DefaultConnectionCallback {
    fn close(&mut self, _connection: &Connection, close: &Close) -> Result<()> {
        error!("{}", close);
        Ok(())
    }
}

pub trait ChannelCallback: Send {
    /// Server is closing the channel, typically a channel exception such
    /// as 404 or 406.
    fn close(&mut self, channel: &Channel, close: &CloseChannel) -> Result<()>;

    /// `channel.flow` request; return the active state to report back.
    fn flow(&mut self, channel: &Channel, active: bool) -> Result<bool> {
        info!(
            "channel {} flow set to {} by server",
            channel.channel_id(),
            active
        );
        Ok(active)
    }

    /// Server-initiated `basic.cancel` for one of this channel's
    /// consumers (consumer-cancel notification).
    fn cancel(&mut self, channel: &Channel, cancel: &Cancel) -> Result<()> {
        warn!(
            "consumer {} on channel {} cancelled by server",
            cancel.consumer_tag(),
            channel.channel_id()
        );
        Ok(())
    }

    /// `basic.ack` from the broker in publisher-confirm mode.
    fn publish_ack(&mut self, _channel: &Channel, _ack: &Ack) {}

    /// `basic.nack` from the broker in publisher-confirm mode.
    fn publish_nack(&mut self, channel: &Channel, nack: &Nack) {
        warn!(
            "message with delivery tag {} nacked by broker on channel {}",
            nack.delivery_tag(),
            channel.channel_id()
        );
    }

    /// `basic.return` of an unroutable mandatory message.
    fn publish_return(
        &mut self,
        channel: &Channel,
        ret: Return,
        _properties: BasicProperties,
        body: Vec<u8>,
    ) {
        warn!(
            "message of {} bytes returned on channel {}, {}: {}",
            body.len(),
            channel.channel_id(),
            ret.reply_code(),
            ret.reply_text()
        );
    }
}

pub struct DefaultChannelCallback;

impl ChannelCallback for DefaultChannelCallback {
    fn close(&mut self, _channel: &Channel, close: &CloseChannel) -> Result<()> {
        error!("{}", close);
        Ok(())
    }
}
