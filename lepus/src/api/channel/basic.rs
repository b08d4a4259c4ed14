use std::sync::atomic::Ordering;
use std::time::Instant;

use lepus_serde::types::{AmqpDeliveryTag, FieldTable};

use crate::frame::{
    Ack, Cancel, Consume, ContentHeader, ContentHeaderCommon, Frame, Get, Nack, Publish, Qos,
    Recover, Reject,
};

use super::super::consumer::Consumer;
use super::super::error::{Error, Result};
use super::super::impl_chainable_setter;
use super::super::message::{DeliveryInfo, Message};
use super::{try_shortstr, Channel, ChannelState};

/// Arguments for [`basic_qos`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.qos).
///
/// [`basic_qos`]: struct.Channel.html#method.basic_qos
#[derive(Debug, Clone, Default)]
pub struct BasicQosArguments {
    /// Default: 0, no size limit.
    pub prefetch_size: u32,
    /// Default: 0, no count limit.
    pub prefetch_count: u16,
    /// Apply to the whole connection rather than this channel.
    /// Default: `false`.
    pub global: bool,
}

impl BasicQosArguments {
    /// Create new arguments with defaults.
    pub fn new(prefetch_size: u32, prefetch_count: u16, global: bool) -> Self {
        Self {
            prefetch_size,
            prefetch_count,
            global,
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        prefetch_size, u32
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        prefetch_count, u16
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        global, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`basic_consume`]
///
/// # Support chainable methods to build arguments
/// ```
/// # use lepus::channel::BasicConsumeArguments;
/// let args = BasicConsumeArguments::new("q", "tag-1")
///     .no_ack(true)
///     .exclusive(true)
///     .finish();
/// ```
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.consume).
///
/// [`basic_consume`]: struct.Channel.html#method.basic_consume
#[derive(Debug, Clone, Default)]
pub struct BasicConsumeArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Consumer tag; empty asks the server to generate one. Default: "".
    pub consumer_tag: String,
    /// Default: `false`.
    pub no_local: bool,
    /// Default: `false`.
    pub no_ack: bool,
    /// Default: `false`.
    pub exclusive: bool,
    /// Default: `false`.
    pub no_wait: bool,
    /// Default: empty table.
    pub arguments: FieldTable,
}

impl BasicConsumeArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str, consumer_tag: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            consumer_tag: consumer_tag.to_owned(),
            ..Default::default()
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        consumer_tag, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_local, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_ack, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exclusive, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        arguments, FieldTable
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`basic_cancel`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.cancel).
///
/// [`basic_cancel`]: struct.Channel.html#method.basic_cancel
#[derive(Debug, Clone, Default)]
pub struct BasicCancelArguments {
    /// Default: "".
    pub consumer_tag: String,
    /// Default: `false`.
    pub no_wait: bool,
}

impl BasicCancelArguments {
    /// Create new arguments with defaults.
    pub fn new(consumer_tag: &str) -> Self {
        Self {
            consumer_tag: consumer_tag.to_owned(),
            no_wait: false,
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        consumer_tag, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_wait, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`basic_get`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.get).
///
/// [`basic_get`]: struct.Channel.html#method.basic_get
#[derive(Debug, Clone, Default)]
pub struct BasicGetArguments {
    /// Queue name. Default: "".
    pub queue: String,
    /// Default: `false`.
    pub no_ack: bool,
}

impl BasicGetArguments {
    /// Create new arguments with defaults.
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            no_ack: false,
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        queue, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        no_ack, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// Arguments for [`basic_ack`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.ack).
///
/// [`basic_ack`]: struct.Channel.html#method.basic_ack
#[derive(Debug, Clone, Default)]
pub struct BasicAckArguments {
    /// Default: 0.
    pub delivery_tag: u64,
    /// Acknowledge all messages up to and including `delivery_tag`.
    /// Default: `false`.
    pub multiple: bool,
}

impl BasicAckArguments {
    /// Create new arguments with defaults.
    pub fn new(delivery_tag: AmqpDeliveryTag, multiple: bool) -> Self {
        Self {
            delivery_tag,
            multiple,
        }
    }
}

/// Arguments for [`basic_nack`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.nack).
///
/// [`basic_nack`]: struct.Channel.html#method.basic_nack
#[derive(Debug, Clone)]
pub struct BasicNackArguments {
    /// Default: 0.
    pub delivery_tag: u64,
    /// Default: `false`.
    pub multiple: bool,
    /// Default: `true`.
    pub requeue: bool,
}

impl Default for BasicNackArguments {
    fn default() -> Self {
        Self {
            delivery_tag: 0,
            multiple: false,
            requeue: true,
        }
    }
}

impl BasicNackArguments {
    /// Create new arguments with defaults.
    pub fn new(delivery_tag: AmqpDeliveryTag, multiple: bool, requeue: bool) -> Self {
        Self {
            delivery_tag,
            multiple,
            requeue,
        }
    }
}

/// Arguments for [`basic_reject`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.reject).
///
/// [`basic_reject`]: struct.Channel.html#method.basic_reject
#[derive(Debug, Clone)]
pub struct BasicRejectArguments {
    /// Default: 0.
    pub delivery_tag: u64,
    /// Default: `true`.
    pub requeue: bool,
}

impl Default for BasicRejectArguments {
    fn default() -> Self {
        Self {
            delivery_tag: 0,
            requeue: true,
        }
    }
}

impl BasicRejectArguments {
    /// Create new arguments with defaults.
    pub fn new(delivery_tag: AmqpDeliveryTag, requeue: bool) -> Self {
        Self {
            delivery_tag,
            requeue,
        }
    }
}

/// Arguments for [`basic_publish`]
///
/// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.publish).
///
/// [`basic_publish`]: struct.Channel.html#method.basic_publish
#[derive(Debug, Clone, Default)]
pub struct BasicPublishArguments {
    /// Exchange name; empty publishes to the default exchange.
    /// Default: "".
    pub exchange: String,
    /// Default: "".
    pub routing_key: String,
    /// Return the message if it cannot be routed to any queue.
    /// Default: `false`.
    pub mandatory: bool,
    /// Default: `false`.
    pub immediate: bool,
}

impl BasicPublishArguments {
    /// Create new arguments with defaults.
    pub fn new(exchange: &str, routing_key: &str) -> Self {
        Self {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            mandatory: false,
            immediate: false,
        }
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        exchange, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        routing_key, String
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        mandatory, bool
    }
    impl_chainable_setter! {
        /// Chainable setter method.
        immediate, bool
    }
    /// Finish chained configuration and return new arguments.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }
}

/// APIs for the AMQP basic class.
impl Channel {
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.qos)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_qos(&self, args: BasicQosArguments) -> Result<()> {
        self.check_open()?;
        let qos = Qos::new(args.prefetch_size, args.prefetch_count, args.global);
        match self.rpc_call(qos.into_frame())?.frame {
            Frame::QosOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to basic.qos",
                other
            ))),
        }
    }

    /// Start a consumer; `consumer` is invoked on the reader thread for
    /// every delivery until cancelled.
    ///
    /// Returns the consumer tag, server-generated when
    /// `args.consumer_tag` is empty.
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.consume)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure, and a usage error for
    /// `no_wait` without an explicit consumer tag.
    pub fn basic_consume<C>(&self, consumer: C, args: BasicConsumeArguments) -> Result<String>
    where
        C: Consumer + 'static,
    {
        self.check_open()?;
        let BasicConsumeArguments {
            queue,
            consumer_tag,
            no_local,
            no_ack,
            exclusive,
            no_wait,
            arguments,
        } = args;

        let mut consume = Consume::new(
            try_shortstr(&queue)?,
            try_shortstr(&consumer_tag)?,
            arguments,
        );
        consume.set_no_local(no_local);
        consume.set_no_ack(no_ack);
        consume.set_exclusive(exclusive);
        consume.set_no_wait(no_wait);

        if no_wait {
            if consumer_tag.is_empty() {
                return Err(Error::ChannelUse(
                    "no_wait consume needs an explicit consumer tag".into(),
                ));
            }
            self.register_consumer(consumer_tag.clone(), Box::new(consumer));
            self.conn.send_frame(self.core.id(), consume.into_frame())?;
            return Ok(consumer_tag);
        }

        let reply = self.rpc_call_with(consume.into_frame(), Some(Box::new(consumer)))?;
        match reply.frame {
            Frame::ConsumeOk(_, consume_ok) => Ok(consume_ok.consumer_tag().clone()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to basic.consume",
                other
            ))),
        }
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.ack)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_ack(&self, args: BasicAckArguments) -> Result<()> {
        self.check_open()?;
        let ack = Ack::new(args.delivery_tag, args.multiple);
        self.conn.send_frame(self.core.id(), ack.into_frame())
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.nack)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_nack(&self, args: BasicNackArguments) -> Result<()> {
        self.check_open()?;
        let mut nack = Nack::new(args.delivery_tag);
        nack.set_multiple(args.multiple);
        nack.set_requeue(args.requeue);
        self.conn.send_frame(self.core.id(), nack.into_frame())
    }

    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.reject)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_reject(&self, args: BasicRejectArguments) -> Result<()> {
        self.check_open()?;
        let reject = Reject::new(args.delivery_tag, args.requeue);
        self.conn.send_frame(self.core.id(), reject.into_frame())
    }

    /// Stop a consumer; its callback receives no further deliveries.
    ///
    /// Returns the consumer tag.
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.cancel)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_cancel(&self, args: BasicCancelArguments) -> Result<String> {
        self.check_open()?;
        let BasicCancelArguments {
            consumer_tag,
            no_wait,
        } = args;
        let cancel = Cancel::new(try_shortstr(&consumer_tag)?, no_wait);

        let consumer_tag = if no_wait {
            self.conn.send_frame(self.core.id(), cancel.into_frame())?;
            consumer_tag
        } else {
            match self.rpc_call(cancel.into_frame())?.frame {
                Frame::CancelOk(_, cancel_ok) => cancel_ok.consumer_tag().clone(),
                other => {
                    return Err(Error::UnexpectedFrame(format!(
                        "{} in reply to basic.cancel",
                        other
                    )))
                }
            }
        };
        self.core.remove_consumer(&consumer_tag);
        Ok(consumer_tag)
    }

    /// Synchronously fetch a single message.
    ///
    /// Returns [`None`] when the queue is empty; otherwise a [`Message`]
    /// whose [`delivery`](Message::delivery) carries the delivery tag and
    /// remaining message count.
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.get)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_get(&self, args: BasicGetArguments) -> Result<Option<Message>> {
        self.check_open()?;
        let get = Get::new(try_shortstr(&args.queue)?, args.no_ack);
        let reply = self.rpc_call(get.into_frame())?;
        match reply.frame {
            Frame::GetEmpty(..) => Ok(None),
            Frame::GetOk(_, get_ok) => {
                let (properties, body) = reply
                    .content
                    .ok_or_else(|| Error::Internal("get-ok completed without content".into()))?;
                Ok(Some(Message::delivered(
                    DeliveryInfo::from(&get_ok),
                    properties,
                    body,
                )))
            }
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to basic.get",
                other
            ))),
        }
    }

    /// Redeliver all unacknowledged messages on this channel.
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.recover)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure.
    pub fn basic_recover(&self, requeue: bool) -> Result<()> {
        self.check_open()?;
        match self.rpc_call(Recover::new(requeue).into_frame())?.frame {
            Frame::RecoverOk(..) => Ok(()),
            other => Err(Error::UnexpectedFrame(format!(
                "{} in reply to basic.recover",
                other
            ))),
        }
    }

    /// Publish `message` to `args.exchange` with `args.routing_key`.
    ///
    /// Asynchronous: errors the broker raises (unroutable mandatory
    /// message, channel exception) surface through the channel callback
    /// or a later operation.
    ///
    /// See [AMQP 0-9-1 Reference](https://www.rabbitmq.com/amqp-0-9-1-reference.html#basic.publish)
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure, on a closed channel,
    /// and while the server has stopped flow on this channel.
    pub fn basic_publish(&self, message: Message, args: BasicPublishArguments) -> Result<()> {
        self.publish_internal(message, &args).map(|_| ())
    }

    /// Publish in confirm mode and block until the broker confirms this
    /// specific message (or the channel closes, which fails the wait
    /// with the close reason).
    ///
    /// Returns the message's publish sequence number.
    ///
    /// # Errors
    ///
    /// Returns a usage error when the channel is not in confirm mode,
    /// `Timeout` when the confirm does not arrive within the RPC
    /// timeout, and the close reason when the channel or connection goes
    /// away mid-wait.
    pub fn basic_publish_confirm(
        &self,
        message: Message,
        args: BasicPublishArguments,
    ) -> Result<u64> {
        let tag = self.publish_internal(message, &args)?.ok_or_else(|| {
            Error::ChannelUse("basic_publish_confirm needs confirm_select first".into())
        })?;

        let deadline = Instant::now() + self.conn.rpc_timeout();
        let mut confirm = self.core.confirm.lock().expect("confirm state lock");
        loop {
            if !confirm.outstanding.contains(&tag) {
                return Ok(tag);
            }
            match self.core.state() {
                ChannelState::Open => {}
                ChannelState::Closed(Some((reply_code, reply_text))) => {
                    return Err(Error::ChannelClosed {
                        reply_code,
                        reply_text,
                    })
                }
                _ => {
                    return Err(Error::ChannelUse(format!(
                        "channel {} closed while awaiting confirm",
                        self.core.id()
                    )))
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = self
                .core
                .confirm_cv
                .wait_timeout(confirm, deadline - now)
                .expect("confirm state lock");
            confirm = guard;
        }
    }

    /// Publish sequence numbers not yet confirmed by the broker.
    pub fn unconfirmed_count(&self) -> usize {
        self.core
            .confirm
            .lock()
            .expect("confirm state lock")
            .outstanding
            .len()
    }

    fn publish_internal(
        &self,
        message: Message,
        args: &BasicPublishArguments,
    ) -> Result<Option<u64>> {
        self.check_open()?;
        if !self.core.flow_active.load(Ordering::SeqCst) {
            return Err(Error::ChannelUse(format!(
                "publishing on channel {} paused by channel.flow",
                self.core.id()
            )));
        }

        let (properties, body) = message.into_parts();
        let mut publish = Publish::new(
            try_shortstr(&args.exchange)?,
            try_shortstr(&args.routing_key)?,
        );
        publish.set_mandatory(args.mandatory);
        publish.set_immediate(args.immediate);

        let header = ContentHeader::new(
            ContentHeaderCommon {
                class: 60,
                weight: 0,
                body_size: body.len() as u64,
            },
            properties,
        );

        // the confirm lock is held across the send so sequence numbers
        // are assigned in wire order
        let mut confirm = self.core.confirm.lock().expect("confirm state lock");
        self.conn
            .send_content(self.core.id(), publish, header, &body)?;
        if confirm.enabled {
            let tag = confirm.next_tag;
            confirm.next_tag += 1;
            confirm.outstanding.insert(tag);
            Ok(Some(tag))
        } else {
            Ok(None)
        }
    }
}
