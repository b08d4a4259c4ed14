use std::fmt;

use lepus_serde::types::{FieldTable, LongLongUint, Octect, ShortStr, ShortUint, TimeStamp};
use serde::{de::Visitor, Deserialize, Serialize};

use super::Frame;

/// `delivery_mode` value for messages lost on broker restart.
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;
/// `delivery_mode` value for messages persisted to disk.
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// The header frame that follows every content-bearing method.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContentHeader {
    pub(crate) common: ContentHeaderCommon,
    pub(crate) basic_properties: BasicProperties,
}

impl ContentHeader {
    pub fn new(common: ContentHeaderCommon, basic_properties: BasicProperties) -> Self {
        Self {
            common,
            basic_properties,
        }
    }

    pub fn body_size(&self) -> u64 {
        self.common.body_size
    }

    pub(crate) fn into_frame(self) -> Frame {
        Frame::ContentHeader(self)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentHeaderCommon {
    pub(crate) class: ShortUint,
    pub(crate) weight: ShortUint,
    pub(crate) body_size: LongLongUint,
}

mod flag {
    // first flags octet
    pub const CONTENT_TYPE: u8 = 1 << 7;
    pub const CONTENT_ENCODING: u8 = 1 << 6;
    pub const HEADERS: u8 = 1 << 5;
    pub const DELIVERY_MODE: u8 = 1 << 4;
    pub const PRIORITY: u8 = 1 << 3;
    pub const CORRELATION_ID: u8 = 1 << 2;
    pub const REPLY_TO: u8 = 1 << 1;
    pub const EXPIRATION: u8 = 1 << 0;
    // second flags octet; bit 0 is the continuation bit, never set for
    // the fourteen basic-class properties
    pub const MESSAGE_ID: u8 = 1 << 7;
    pub const TIMESTAMP: u8 = 1 << 6;
    pub const TYP: u8 = 1 << 5;
    pub const USER_ID: u8 = 1 << 4;
    pub const APP_ID: u8 = 1 << 3;
    pub const CLUSTER_ID: u8 = 1 << 2;
}

/// The optional properties of a basic-class message.
///
/// The two flag octets record which properties are present; the setters
/// keep them consistent, so the derived `Serialize` emits a valid
/// property list.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BasicProperties {
    property_flags: [Octect; 2],
    content_type: Option<ShortStr>,
    content_encoding: Option<ShortStr>,
    headers: Option<FieldTable>,
    delivery_mode: Option<Octect>,
    priority: Option<Octect>,
    correlation_id: Option<ShortStr>,
    reply_to: Option<ShortStr>,
    expiration: Option<ShortStr>,
    message_id: Option<ShortStr>,
    timestamp: Option<TimeStamp>,
    typ: Option<ShortStr>,
    user_id: Option<ShortStr>,
    app_id: Option<ShortStr>,
    cluster_id: Option<ShortStr>,
}

macro_rules! impl_property_setter {
    ($(#[$meta:meta])* $with:ident, $field:ident, &str, $byte:literal, $flag:path) => {
        $(#[$meta])*
        pub fn $with(&mut self, value: &str) -> &mut Self {
            // a property value over 255 bytes cannot be represented
            if let Ok(v) = value.try_into() {
                self.property_flags[$byte] |= $flag;
                self.$field = Some(v);
            }
            self
        }
    };
    ($(#[$meta:meta])* $with:ident, $field:ident, $typ:ty, $byte:literal, $flag:path) => {
        $(#[$meta])*
        pub fn $with(&mut self, value: $typ) -> &mut Self {
            self.property_flags[$byte] |= $flag;
            self.$field = Some(value);
            self
        }
    };
}

impl BasicProperties {
    impl_property_setter! {
        /// MIME content type, e.g. `application/json`.
        with_content_type, content_type, &str, 0, flag::CONTENT_TYPE
    }
    impl_property_setter! {
        /// MIME content encoding, e.g. `gzip`.
        with_content_encoding, content_encoding, &str, 0, flag::CONTENT_ENCODING
    }
    impl_property_setter! {
        /// Application message headers.
        with_headers, headers, FieldTable, 0, flag::HEADERS
    }
    impl_property_setter! {
        /// [`DELIVERY_MODE_TRANSIENT`] or [`DELIVERY_MODE_PERSISTENT`].
        with_delivery_mode, delivery_mode, Octect, 0, flag::DELIVERY_MODE
    }
    impl_property_setter! {
        /// Message priority, 0 to 9.
        with_priority, priority, Octect, 0, flag::PRIORITY
    }
    impl_property_setter! {
        with_correlation_id, correlation_id, &str, 0, flag::CORRELATION_ID
    }
    impl_property_setter! {
        /// Address to reply to, commonly a queue name.
        with_reply_to, reply_to, &str, 0, flag::REPLY_TO
    }
    impl_property_setter! {
        /// Message expiration, milliseconds as a string.
        with_expiration, expiration, &str, 0, flag::EXPIRATION
    }
    impl_property_setter! {
        with_message_id, message_id, &str, 1, flag::MESSAGE_ID
    }
    impl_property_setter! {
        /// Message timestamp, POSIX seconds.
        with_timestamp, timestamp, TimeStamp, 1, flag::TIMESTAMP
    }
    impl_property_setter! {
        /// Application message type name.
        with_typ, typ, &str, 1, flag::TYP
    }
    impl_property_setter! {
        /// Creating user; RabbitMQ validates it against the connection.
        with_user_id, user_id, &str, 1, flag::USER_ID
    }
    impl_property_setter! {
        with_app_id, app_id, &str, 1, flag::APP_ID
    }
    impl_property_setter! {
        /// Deprecated, reserved for future use.
        with_cluster_id, cluster_id, &str, 1, flag::CLUSTER_ID
    }

    /// Finish chained configuration and return the properties.
    pub fn finish(&mut self) -> Self {
        self.clone()
    }

    pub fn content_type(&self) -> Option<&String> {
        self.content_type.as_ref().map(AsRef::as_ref)
    }

    pub fn content_encoding(&self) -> Option<&String> {
        self.content_encoding.as_ref().map(AsRef::as_ref)
    }

    pub fn headers(&self) -> Option<&FieldTable> {
        self.headers.as_ref()
    }

    pub fn delivery_mode(&self) -> Option<u8> {
        self.delivery_mode
    }

    pub fn priority(&self) -> Option<u8> {
        self.priority
    }

    pub fn correlation_id(&self) -> Option<&String> {
        self.correlation_id.as_ref().map(AsRef::as_ref)
    }

    pub fn reply_to(&self) -> Option<&String> {
        self.reply_to.as_ref().map(AsRef::as_ref)
    }

    pub fn expiration(&self) -> Option<&String> {
        self.expiration.as_ref().map(AsRef::as_ref)
    }

    pub fn message_id(&self) -> Option<&String> {
        self.message_id.as_ref().map(AsRef::as_ref)
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    pub fn typ(&self) -> Option<&String> {
        self.typ.as_ref().map(AsRef::as_ref)
    }

    pub fn user_id(&self) -> Option<&String> {
        self.user_id.as_ref().map(AsRef::as_ref)
    }

    pub fn app_id(&self) -> Option<&String> {
        self.app_id.as_ref().map(AsRef::as_ref)
    }

    pub fn cluster_id(&self) -> Option<&String> {
        self.cluster_id.as_ref().map(AsRef::as_ref)
    }
}

impl<'de> Deserialize<'de> for BasicProperties {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // flags octets plus the fourteen optional properties
        const FIELDS: &[&str] = &[
            "property_flags",
            "content_type",
            "content_encoding",
            "headers",
            "delivery_mode",
            "priority",
            "correlation_id",
            "reply_to",
            "expiration",
            "message_id",
            "timestamp",
            "typ",
            "user_id",
            "app_id",
            "cluster_id",
        ];

        struct BasicPropertiesVisitor;

        macro_rules! read_if_present {
            ($seq:ident, $props:ident, $byte:literal, $flag:path, $field:ident) => {
                if $props.property_flags[$byte] & $flag != 0 {
                    $props.$field = Some($seq.next_element()?.ok_or_else(|| {
                        serde::de::Error::custom(concat!(
                            "property ",
                            stringify!($field),
                            " flagged present but missing"
                        ))
                    })?);
                }
            };
        }

        impl<'de> Visitor<'de> for BasicPropertiesVisitor {
            type Value = BasicProperties;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("struct BasicProperties")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let flags: [Octect; 2] = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::custom("missing property flags"))?;
                let mut props = BasicProperties {
                    property_flags: flags,
                    ..Default::default()
                };
                read_if_present!(seq, props, 0, flag::CONTENT_TYPE, content_type);
                read_if_present!(seq, props, 0, flag::CONTENT_ENCODING, content_encoding);
                read_if_present!(seq, props, 0, flag::HEADERS, headers);
                read_if_present!(seq, props, 0, flag::DELIVERY_MODE, delivery_mode);
                read_if_present!(seq, props, 0, flag::PRIORITY, priority);
                read_if_present!(seq, props, 0, flag::CORRELATION_ID, correlation_id);
                read_if_present!(seq, props, 0, flag::REPLY_TO, reply_to);
                read_if_present!(seq, props, 0, flag::EXPIRATION, expiration);
                read_if_present!(seq, props, 1, flag::MESSAGE_ID, message_id);
                read_if_present!(seq, props, 1, flag::TIMESTAMP, timestamp);
                read_if_present!(seq, props, 1, flag::TYP, typ);
                read_if_present!(seq, props, 1, flag::USER_ID, user_id);
                read_if_present!(seq, props, 1, flag::APP_ID, app_id);
                read_if_present!(seq, props, 1, flag::CLUSTER_ID, cluster_id);
                Ok(props)
            }
        }
        deserializer.deserialize_struct("BasicProperties", FIELDS, BasicPropertiesVisitor)
    }
}
