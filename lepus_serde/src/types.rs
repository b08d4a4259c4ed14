//! AMQP 0-9-1 elementary domains and field-table value types.
//!
//! Integer layouts follow the RabbitMQ errata for field tables, see
//! <https://www.rabbitmq.com/amqp-0-9-1-errata.html#section_3>.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type Octect = u8;
pub type Boolean = Octect; // 0 = false, otherwise true
pub type ShortShortUint = u8;
pub type ShortShortInt = i8;
pub type ShortUint = u16;
pub type ShortInt = i16;
pub type LongUint = u32;
pub type LongInt = i32;
pub type LongLongUint = u64;
pub type LongLongInt = i64;
pub type TimeStamp = u64;
pub type Float = f32;
pub type Double = f64;

/// A bit argument, pre-packed into an octet by the method structs.
///
/// Consecutive bit arguments of a method share octets, filled LSB first.
pub type Bit = u8;

// Named protocol domains.
pub type AmqpChannelId = ShortUint;
pub type AmqpClassId = ShortUint;
pub type AmqpMethodId = ShortUint;
pub type AmqpReplyCode = ShortUint;
pub type AmqpDeliveryTag = LongLongUint;
pub type AmqpMessageCount = LongUint;
pub type AmqpQueueName = ShortStr;
pub type AmqpExchangeName = ShortStr;
pub type AmqpConsumerTag = ShortStr;
pub type AmqpVirtualHost = ShortStr;
pub type AmqpPeerProperties = FieldTable;

/// String of at most 255 bytes, length-prefixed by one octet on the wire.
///
/// The stored length octet is kept consistent by the constructors, so the
/// derived `Serialize` emits the correct prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct ShortStr(Octect, String);

impl ShortStr {
    pub fn as_str(&self) -> &str {
        &self.1
    }

    pub fn len(&self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<String> for ShortStr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let len = Octect::try_from(s.len()).map_err(|_| Error::StrTooLong)?;
        Ok(Self(len, s))
    }
}

impl TryFrom<&str> for ShortStr {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.to_owned().try_into()
    }
}

impl From<ShortStr> for String {
    fn from(s: ShortStr) -> Self {
        s.1
    }
}

impl AsRef<String> for ShortStr {
    fn as_ref(&self) -> &String {
        &self.1
    }
}

impl fmt::Display for ShortStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.1)
    }
}

/// String length-prefixed by a 32-bit integer; content is arbitrary bytes
/// in the protocol, represented here as UTF-8 text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct LongStr(LongUint, String);

impl LongStr {
    pub fn as_str(&self) -> &str {
        &self.1
    }

    pub fn len(&self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<String> for LongStr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let len = LongUint::try_from(s.len()).map_err(|_| Error::StrTooLong)?;
        Ok(Self(len, s))
    }
}

impl TryFrom<&str> for LongStr {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.to_owned().try_into()
    }
}

impl From<LongStr> for String {
    fn from(s: LongStr) -> Self {
        s.1
    }
}

impl AsRef<String> for LongStr {
    fn as_ref(&self) -> &String {
        &self.1
    }
}

impl fmt::Display for LongStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.1)
    }
}

/// Decimal: scale octet followed by an unsigned 32-bit mantissa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DecimalValue(pub Octect, pub LongUint);

/// Field array: 32-bit byte-length prefix followed by the encoded values.
///
/// The prefix is supplied by the codec (sequences are length-prefixed on
/// the wire), so this is a plain wrapper over the values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldArray(Vec<FieldValue>);

impl FieldArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: FieldValue) {
        self.0.push(value);
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.0
    }
}

impl From<Vec<FieldValue>> for FieldArray {
    fn from(values: Vec<FieldValue>) -> Self {
        Self(values)
    }
}

/// Byte array (RabbitMQ extension, tag `x`): 32-bit length prefix plus
/// opaque bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct ByteArray(Vec<Octect>);

impl ByteArray {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// A typed field-table value. Variant names are the single-letter wire
/// tags of the RabbitMQ dialect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[allow(non_camel_case_types)]
pub enum FieldValue {
    t(Boolean),
    b(ShortShortInt),
    B(ShortShortUint),
    // RabbitMQ uses 's' for signed 16-bit where the 0-9-1 spec says 'U'
    s(ShortInt),
    u(ShortUint),
    I(LongInt),
    i(LongUint),
    // RabbitMQ reads 'l' as signed where the 0-9-1 spec says unsigned
    l(LongLongInt),
    f(Float),
    d(Double),
    D(DecimalValue),
    S(LongStr),
    A(FieldArray),
    T(TimeStamp),
    F(FieldTable),
    V,
    x(ByteArray),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::t(v as Boolean)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::l(v)
    }
}

impl TryFrom<String> for FieldValue {
    type Error = Error;

    fn try_from(v: String) -> Result<Self, Self::Error> {
        Ok(FieldValue::S(v.try_into()?))
    }
}

impl TryFrom<&str> for FieldValue {
    type Error = Error;

    fn try_from(v: &str) -> Result<Self, Self::Error> {
        Ok(FieldValue::S(v.try_into()?))
    }
}

pub type FieldName = ShortStr;
pub type FieldTable = HashMap<FieldName, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_str_rejects_overlong_input() {
        let long = "x".repeat(256);
        assert_eq!(Err(Error::StrTooLong), ShortStr::try_from(long));
        let ok = ShortStr::try_from("x".repeat(255)).unwrap();
        assert_eq!(255, ok.len());
    }

    #[test]
    fn field_value_conversions() {
        assert_eq!(FieldValue::t(1), true.into());
        assert_eq!(FieldValue::l(-2), (-2i64).into());
        let v: FieldValue = "hello".try_into().unwrap();
        assert_eq!(FieldValue::S("hello".try_into().unwrap()), v);
    }
}
