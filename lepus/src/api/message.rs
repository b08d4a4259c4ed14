//! The user-facing message bundle.

use crate::frame::{BasicProperties, Deliver, GetOk};

/// Where a delivered message came from.
#[derive(Debug, Clone)]
pub struct DeliveryInfo {
    delivery_tag: u64,
    redelivered: bool,
    exchange: String,
    routing_key: String,
    consumer_tag: Option<String>,
    message_count: Option<u32>,
}

impl DeliveryInfo {
    /// Tag to pass to `basic_ack`/`basic_nack`/`basic_reject`.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Set for `basic.deliver`, absent for `basic.get-ok`.
    pub fn consumer_tag(&self) -> Option<&str> {
        self.consumer_tag.as_deref()
    }

    /// Messages left in the queue, reported by `basic.get-ok` only.
    pub fn message_count(&self) -> Option<u32> {
        self.message_count
    }
}

impl From<&Deliver> for DeliveryInfo {
    fn from(deliver: &Deliver) -> Self {
        Self {
            delivery_tag: deliver.delivery_tag(),
            redelivered: deliver.redelivered(),
            exchange: deliver.exchange().clone(),
            routing_key: deliver.routing_key().clone(),
            consumer_tag: Some(deliver.consumer_tag().clone()),
            message_count: None,
        }
    }
}

impl From<&GetOk> for DeliveryInfo {
    fn from(get_ok: &GetOk) -> Self {
        Self {
            delivery_tag: get_ok.delivery_tag(),
            redelivered: get_ok.redelivered(),
            exchange: get_ok.exchange().clone(),
            routing_key: get_ok.routing_key().clone(),
            consumer_tag: None,
            message_count: Some(get_ok.message_count()),
        }
    }
}

/// A message body with its properties; inbound messages also carry
/// [`DeliveryInfo`].
///
/// Acknowledge through the channel the message arrived on:
/// `channel.basic_ack(BasicAckArguments::new(tag, false))`.
#[derive(Debug, Clone, Default)]
pub struct Message {
    properties: BasicProperties,
    body: Vec<u8>,
    delivery: Option<DeliveryInfo>,
}

impl Message {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            properties: BasicProperties::default(),
            body,
            delivery: None,
        }
    }

    /// Chainable property configuration.
    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }

    pub(crate) fn delivered(
        delivery: DeliveryInfo,
        properties: BasicProperties,
        body: Vec<u8>,
    ) -> Self {
        Self {
            properties,
            body,
            delivery: Some(delivery),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn properties(&self) -> &BasicProperties {
        &self.properties
    }

    pub(crate) fn into_parts(self) -> (BasicProperties, Vec<u8>) {
        (self.properties, self.body)
    }

    /// `None` for messages built locally for publishing.
    pub fn delivery(&self) -> Option<&DeliveryInfo> {
        self.delivery.as_ref()
    }
}
