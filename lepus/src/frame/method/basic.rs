use lepus_serde::types::{
    AmqpConsumerTag, AmqpDeliveryTag, AmqpExchangeName, AmqpMessageCount, AmqpQueueName, Boolean,
    FieldTable, LongUint, Octect, ShortStr, ShortUint,
};
use serde::{Deserialize, Serialize};

mod bit_flag {
    pub mod consume {
        pub const NO_LOCAL: u8 = 0b0000_0001;
        pub const NO_ACK: u8 = 0b0000_0010;
        pub const EXCLUSIVE: u8 = 0b0000_0100;
        pub const NO_WAIT: u8 = 0b0000_1000;
    }
    pub mod publish {
        pub const MANDATORY: u8 = 0b0000_0001;
        pub const IMMEDIATE: u8 = 0b0000_0010;
    }
    pub mod nack {
        pub const MULTIPLE: u8 = 0b0000_0001;
        pub const REQUEUE: u8 = 0b0000_0010;
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Qos {
    prefetch_size: LongUint,
    prefetch_count: ShortUint,
    global: Boolean,
}

impl Qos {
    pub fn new(prefetch_size: LongUint, prefetch_count: ShortUint, global: bool) -> Self {
        Self {
            prefetch_size,
            prefetch_count,
            global: global as Boolean,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct QosOk;

#[derive(Debug, Serialize, Deserialize)]
pub struct Consume {
    ticket: ShortUint,
    queue: AmqpQueueName,
    consumer_tag: AmqpConsumerTag,
    bits: Octect,
    arguments: FieldTable,
}

impl Consume {
    pub fn new(queue: AmqpQueueName, consumer_tag: AmqpConsumerTag, arguments: FieldTable) -> Self {
        Self {
            ticket: 0,
            queue,
            consumer_tag,
            bits: 0,
            arguments,
        }
    }

    pub fn set_no_local(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::consume::NO_LOCAL;
        } else {
            self.bits &= !bit_flag::consume::NO_LOCAL;
        }
    }

    pub fn set_no_ack(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::consume::NO_ACK;
        } else {
            self.bits &= !bit_flag::consume::NO_ACK;
        }
    }

    pub fn set_exclusive(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::consume::EXCLUSIVE;
        } else {
            self.bits &= !bit_flag::consume::EXCLUSIVE;
        }
    }

    pub fn set_no_wait(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::consume::NO_WAIT;
        } else {
            self.bits &= !bit_flag::consume::NO_WAIT;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumeOk {
    consumer_tag: AmqpConsumerTag,
}

impl ConsumeOk {
    pub fn consumer_tag(&self) -> &String {
        self.consumer_tag.as_ref()
    }
}

/// `basic.cancel`: sent by the client to stop a consumer, and also by
/// RabbitMQ to notify the client of a consumer cancelled server-side
/// (queue deleted, node failover).
#[derive(Debug, Serialize, Deserialize)]
pub struct Cancel {
    consumer_tag: AmqpConsumerTag,
    no_wait: Boolean,
}

impl Cancel {
    pub fn new(consumer_tag: AmqpConsumerTag, no_wait: bool) -> Self {
        Self {
            consumer_tag,
            no_wait: no_wait as Boolean,
        }
    }

    pub fn consumer_tag(&self) -> &String {
        self.consumer_tag.as_ref()
    }

    pub fn no_wait(&self) -> bool {
        self.no_wait != 0
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelOk {
    consumer_tag: AmqpConsumerTag,
}

impl CancelOk {
    pub fn new(consumer_tag: AmqpConsumerTag) -> Self {
        Self { consumer_tag }
    }

    pub fn consumer_tag(&self) -> &String {
        self.consumer_tag.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Publish {
    ticket: ShortUint,
    exchange: AmqpExchangeName,
    routing_key: ShortStr,
    bits: Octect,
}

impl Publish {
    pub fn new(exchange: AmqpExchangeName, routing_key: ShortStr) -> Self {
        Self {
            ticket: 0,
            exchange,
            routing_key,
            bits: 0,
        }
    }

    pub fn set_mandatory(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::publish::MANDATORY;
        } else {
            self.bits &= !bit_flag::publish::MANDATORY;
        }
    }

    pub fn set_immediate(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::publish::IMMEDIATE;
        } else {
            self.bits &= !bit_flag::publish::IMMEDIATE;
        }
    }
}

/// `basic.return`: an unroutable mandatory/immediate message coming back.
#[derive(Debug, Serialize, Deserialize)]
pub struct Return {
    reply_code: ShortUint,
    reply_text: ShortStr,
    exchange: AmqpExchangeName,
    routing_key: ShortStr,
}

impl Return {
    pub fn reply_code(&self) -> u16 {
        self.reply_code
    }

    pub fn reply_text(&self) -> &String {
        self.reply_text.as_ref()
    }

    pub fn exchange(&self) -> &String {
        self.exchange.as_ref()
    }

    pub fn routing_key(&self) -> &String {
        self.routing_key.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deliver {
    consumer_tag: AmqpConsumerTag,
    delivery_tag: AmqpDeliveryTag,
    redelivered: Boolean,
    exchange: AmqpExchangeName,
    routing_key: ShortStr,
}

impl Deliver {
    pub fn consumer_tag(&self) -> &String {
        self.consumer_tag.as_ref()
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered != 0
    }

    pub fn exchange(&self) -> &String {
        self.exchange.as_ref()
    }

    pub fn routing_key(&self) -> &String {
        self.routing_key.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Get {
    ticket: ShortUint,
    queue: AmqpQueueName,
    no_ack: Boolean,
}

impl Get {
    pub fn new(queue: AmqpQueueName, no_ack: bool) -> Self {
        Self {
            ticket: 0,
            queue,
            no_ack: no_ack as Boolean,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetOk {
    delivery_tag: AmqpDeliveryTag,
    redelivered: Boolean,
    exchange: AmqpExchangeName,
    routing_key: ShortStr,
    message_count: AmqpMessageCount,
}

impl GetOk {
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered != 0
    }

    pub fn exchange(&self) -> &String {
        self.exchange.as_ref()
    }

    pub fn routing_key(&self) -> &String {
        self.routing_key.as_ref()
    }

    pub fn message_count(&self) -> u32 {
        self.message_count
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GetEmpty {
    /// Deprecated "cluster-id", must be empty.
    cluster_id: ShortStr,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Ack {
    delivery_tag: AmqpDeliveryTag,
    multiple: Boolean,
}

impl Ack {
    pub fn new(delivery_tag: AmqpDeliveryTag, multiple: bool) -> Self {
        Self {
            delivery_tag,
            multiple: multiple as Boolean,
        }
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn multiple(&self) -> bool {
        self.multiple != 0
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Reject {
    delivery_tag: AmqpDeliveryTag,
    requeue: Boolean,
}

impl Reject {
    pub fn new(delivery_tag: AmqpDeliveryTag, requeue: bool) -> Self {
        Self {
            delivery_tag,
            requeue: requeue as Boolean,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverAsync {
    requeue: Boolean,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Recover {
    requeue: Boolean,
}

impl Recover {
    pub fn new(requeue: bool) -> Self {
        Self {
            requeue: requeue as Boolean,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RecoverOk;

/// `basic.nack` (RabbitMQ extension): negative acknowledgement, also sent
/// by the broker in confirm mode when a message could not be handled.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Nack {
    delivery_tag: AmqpDeliveryTag,
    bits: Octect,
}

impl Nack {
    pub fn new(delivery_tag: AmqpDeliveryTag) -> Self {
        Self {
            delivery_tag,
            bits: 0,
        }
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn multiple(&self) -> bool {
        self.bits & bit_flag::nack::MULTIPLE != 0
    }

    pub fn requeue(&self) -> bool {
        self.bits & bit_flag::nack::REQUEUE != 0
    }

    pub fn set_multiple(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::nack::MULTIPLE;
        } else {
            self.bits &= !bit_flag::nack::MULTIPLE;
        }
    }

    pub fn set_requeue(&mut self, value: bool) {
        if value {
            self.bits |= bit_flag::nack::REQUEUE;
        } else {
            self.bits &= !bit_flag::nack::REQUEUE;
        }
    }
}
