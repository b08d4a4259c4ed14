use serde::de::{
    self, Deserialize, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};

use crate::error::{Error, Result};

/// Deserializes values from the packed big-endian wire layout.
///
/// The format is not self-describing: a length-prefixed value (string,
/// table, array) relies on the integer parsed immediately before it, which
/// the deserializer remembers in `last_parsed_len`. Byte-sized bookkeeping
/// for tables and arrays is done with `cursor`, since their length prefix
/// counts bytes rather than entries.
pub struct Deserializer<'de> {
    input: &'de [u8],
    last_parsed_len: Option<usize>,
    cursor: usize,
}

impl<'de> Deserializer<'de> {
    pub fn from_bytes(input: &'de [u8]) -> Self {
        Deserializer {
            input,
            last_parsed_len: None,
            cursor: 0,
        }
    }
}

pub fn from_bytes<'a, T>(input: &'a [u8]) -> Result<T>
where
    T: Deserialize<'a>,
{
    let mut deserializer = Deserializer::from_bytes(input);
    let t = T::deserialize(&mut deserializer)?;
    if deserializer.input.is_empty() {
        Ok(t)
    } else {
        Err(Error::TrailingBytes)
    }
}

macro_rules! impl_parse_num {
    ($func_name:ident, $typ:tt) => {
        fn $func_name(&mut self) -> Result<$typ> {
            const SIZE: usize = std::mem::size_of::<$typ>();
            if self.input.len() < SIZE {
                return Err(Error::Eof);
            }
            let (head, rest) = self.input.split_at(SIZE);
            self.input = rest;
            self.cursor += SIZE;
            self.last_parsed_len = None;
            let mut bytes = [0u8; SIZE];
            bytes.copy_from_slice(head);
            Ok(<$typ>::from_be_bytes(bytes))
        }
    };
}

impl<'de> Deserializer<'de> {
    fn next_byte(&mut self) -> Result<u8> {
        let v = *self.input.first().ok_or(Error::Eof)?;
        self.input = &self.input[1..];
        self.cursor += 1;
        Ok(v)
    }

    impl_parse_num!(parse_i8, i8);
    impl_parse_num!(parse_i16, i16);
    impl_parse_num!(parse_i32, i32);
    impl_parse_num!(parse_i64, i64);
    impl_parse_num!(parse_u16, u16);
    impl_parse_num!(parse_u64, u64);
    impl_parse_num!(parse_f32, f32);
    impl_parse_num!(parse_f64, f64);

    // u8 and u32 are the valid length-prefix types, so remember them
    fn parse_u8(&mut self) -> Result<u8> {
        let v = self.next_byte()?;
        self.last_parsed_len = Some(v as usize);
        Ok(v)
    }

    fn parse_u32(&mut self) -> Result<u32> {
        const SIZE: usize = std::mem::size_of::<u32>();
        if self.input.len() < SIZE {
            return Err(Error::Eof);
        }
        let (head, rest) = self.input.split_at(SIZE);
        self.input = rest;
        self.cursor += SIZE;
        let mut bytes = [0u8; SIZE];
        bytes.copy_from_slice(head);
        let v = u32::from_be_bytes(bytes);
        self.last_parsed_len = Some(v as usize);
        Ok(v)
    }

    fn take_parsed_length(&mut self) -> Result<usize> {
        let len = self.last_parsed_len.take().ok_or(Error::ExpectedLength)?;
        if self.input.len() < len {
            Err(Error::Syntax)
        } else {
            Ok(len)
        }
    }

    fn parse_str(&mut self) -> Result<&'de str> {
        let len = self.take_parsed_length()?;
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        self.cursor += len;
        std::str::from_utf8(head).map_err(|_| Error::Message(format!(
            "invalid utf8 string of length {}",
            len
        )))
    }

    fn parse_bytes(&mut self) -> Result<&'de [u8]> {
        let len = self.take_parsed_length()?;
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        self.cursor += len;
        Ok(head)
    }
}

impl<'de, 'a> de::Deserializer<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    // the wire format is not self-describing
    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::Message("format is not self-describing".into()))
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bool(self.next_byte()? != 0)
    }

    fn deserialize_i8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i8(self.parse_i8()?)
    }

    fn deserialize_i16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i16(self.parse_i16()?)
    }

    fn deserialize_i32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i32(self.parse_i32()?)
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i64(self.parse_i64()?)
    }

    fn deserialize_u8<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u8(self.parse_u8()?)
    }

    fn deserialize_u16<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u16(self.parse_u16()?)
    }

    fn deserialize_u32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u32(self.parse_u32()?)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u64(self.parse_u64()?)
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f32(self.parse_f32()?)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f64(self.parse_f64()?)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    // length must have been parsed just before (ShortStr/LongStr layout)
    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.parse_str()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_bytes(self.parse_bytes()?)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_byte_buf(self.parse_bytes()?.to_owned())
    }

    // presence of optional content properties is decided by the caller
    // from the property flags; reaching here means the value is present
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    // sequences carry their own 32-bit byte-length prefix
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.parse_u32()?;
        let len = self.take_parsed_length()?;
        visitor.visit_seq(ElementWalker::bytes(self, len))
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ElementWalker::fields(self, len))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ElementWalker::fields(self, len))
    }

    // field table: 32-bit prefix counting bytes, not entries
    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.parse_u32()?;
        let len = self.take_parsed_length()?;
        visitor.visit_map(ElementWalker::bytes(self, len))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ElementWalker::fields(self, fields.len()))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(TagAccess { de: self })
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }
}

/// Walks elements of a struct (counted by field) or of a table/array
/// (counted by encoded byte via the deserializer cursor).
struct ElementWalker<'a, 'de: 'a> {
    de: &'a mut Deserializer<'de>,
    remaining: usize,
    by_fields: bool,
}

impl<'a, 'de> ElementWalker<'a, 'de> {
    fn bytes(de: &'a mut Deserializer<'de>, len: usize) -> Self {
        ElementWalker {
            de,
            remaining: len,
            by_fields: false,
        }
    }

    fn fields(de: &'a mut Deserializer<'de>, len: usize) -> Self {
        ElementWalker {
            de,
            remaining: len,
            by_fields: true,
        }
    }

    fn step<T>(&mut self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        if self.by_fields {
            self.remaining -= 1;
            seed.deserialize(&mut *self.de)
        } else {
            let start = self.de.cursor;
            let res = seed.deserialize(&mut *self.de);
            let consumed = self.de.cursor - start;
            self.remaining = self.remaining.saturating_sub(consumed);
            res
        }
    }
}

impl<'de> SeqAccess<'de> for ElementWalker<'_, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.step(seed).map(Some)
    }
}

impl<'de> MapAccess<'de> for ElementWalker<'_, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.step(seed).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        self.step(seed)
    }
}

/// Field-table values are externally tagged by one ASCII letter.
struct TagAccess<'a, 'de: 'a> {
    de: &'a mut Deserializer<'de>,
}

impl<'de> EnumAccess<'de> for TagAccess<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let tag = self.de.next_byte()?;
        if !tag.is_ascii_alphabetic() {
            return Err(Error::UnknownTag(tag));
        }
        let buf = [tag];
        let variant = std::str::from_utf8(&buf).map_err(|_| Error::UnknownTag(tag))?;
        let val = seed.deserialize(variant.into_deserializer())?;
        Ok((val, self))
    }
}

impl<'de> VariantAccess<'de> for TagAccess<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.de)
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_tuple(self.de, len, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_tuple(self.de, fields.len(), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::from_bytes;
    use crate::to_bytes;
    use crate::types::*;
    use serde::Deserialize;

    #[test]
    fn packed_struct_round_trip() {
        #[derive(serde::Serialize, Deserialize, Debug, PartialEq)]
        struct Header {
            frame_type: Octect,
            channel: ShortUint,
            payload_size: LongUint,
        }

        let header = Header {
            frame_type: 1,
            channel: 9,
            payload_size: 1024,
        };
        let bytes = to_bytes(&header).unwrap();
        assert_eq!(7, bytes.len());
        assert_eq!(header, from_bytes(&bytes).unwrap());
    }

    #[test]
    fn strings_round_trip() {
        let short: ShortStr = "consumer-1".try_into().unwrap();
        let long: LongStr = "\0guest\0guest".try_into().unwrap();
        assert_eq!(short, from_bytes::<ShortStr>(&to_bytes(&short).unwrap()).unwrap());
        assert_eq!(long, from_bytes::<LongStr>(&to_bytes(&long).unwrap()).unwrap());
    }

    #[test]
    fn field_table_round_trip_all_tags() {
        let mut inner = FieldTable::new();
        inner.insert("depth".try_into().unwrap(), FieldValue::u(2));

        let mut array = FieldArray::new();
        array.push(FieldValue::S("elem".try_into().unwrap()));
        array.push(FieldValue::t(0));

        let mut table = FieldTable::new();
        table.insert("bool".try_into().unwrap(), FieldValue::t(1));
        table.insert("i8".try_into().unwrap(), FieldValue::b(-8));
        table.insert("u8".try_into().unwrap(), FieldValue::B(8));
        table.insert("i16".try_into().unwrap(), FieldValue::s(-16));
        table.insert("u16".try_into().unwrap(), FieldValue::u(16));
        table.insert("i32".try_into().unwrap(), FieldValue::I(-32));
        table.insert("u32".try_into().unwrap(), FieldValue::i(32));
        table.insert("i64".try_into().unwrap(), FieldValue::l(-64));
        table.insert("f32".try_into().unwrap(), FieldValue::f(1.5));
        table.insert("f64".try_into().unwrap(), FieldValue::d(-2.25));
        table.insert("dec".try_into().unwrap(), FieldValue::D(DecimalValue(2, 314)));
        table.insert("str".try_into().unwrap(), FieldValue::S("long".try_into().unwrap()));
        table.insert("arr".try_into().unwrap(), FieldValue::A(array));
        table.insert("ts".try_into().unwrap(), FieldValue::T(1_660_000_000));
        table.insert("tab".try_into().unwrap(), FieldValue::F(inner));
        table.insert("void".try_into().unwrap(), FieldValue::V);
        table.insert("bin".try_into().unwrap(), FieldValue::x(vec![0xDE, 0xAD].into()));

        let bytes = to_bytes(&table).unwrap();
        let decoded: FieldTable = from_bytes(&bytes).unwrap();
        assert_eq!(table, decoded);
        // and the re-encoding is the same length (bit-identical modulo
        // hash map iteration order)
        assert_eq!(bytes.len(), to_bytes(&decoded).unwrap().len());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let short: ShortStr = "truncate-me".try_into().unwrap();
        let bytes = to_bytes(&short).unwrap();
        assert!(from_bytes::<ShortStr>(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn trailing_bytes_is_an_error() {
        let mut bytes = to_bytes(&7u32).unwrap();
        bytes.push(0);
        assert!(from_bytes::<u32>(&bytes).is_err());
    }

    #[test]
    fn unknown_tag_is_an_error() {
        // name "k", tag '?' (not a letter)
        let input = [0, 0, 0, 4, 1, b'k', b'?', 0];
        assert!(from_bytes::<FieldTable>(&input).is_err());
    }
}
