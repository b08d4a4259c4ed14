use bytes::{BufMut, BytesMut};
use serde::{ser, Serialize};

use crate::error::{Error, Result};

/// Serializes values into the packed big-endian wire layout.
///
/// All multi-byte integers are network byte order. Tuples and structs emit
/// their elements back to back with no framing of their own; strings carry
/// the prefix of their wrapper type ([`ShortStr`](crate::types::ShortStr)
/// and friends). Sequences and maps (field arrays and tables) carry a
/// 32-bit byte-length prefix, reserved up front and patched once the body
/// size is known.
pub struct Serializer {
    output: BytesMut,
}

pub fn to_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut serializer = Serializer {
        output: BytesMut::new(),
    };
    value.serialize(&mut serializer)?;
    Ok(serializer.output.to_vec())
}

/// Serialize `value` onto the end of `buf`, returning the number of bytes
/// appended.
pub fn to_buffer<T>(value: &T, buf: &mut BytesMut) -> Result<usize>
where
    T: Serialize,
{
    let mut serializer = Serializer {
        output: std::mem::take(buf),
    };
    let start = serializer.output.len();
    let res = value.serialize(&mut serializer);
    *buf = serializer.output;
    res?;
    Ok(buf.len() - start)
}

macro_rules! impl_serialize_num {
    ($method:ident, $put:ident, $typ:ty) => {
        fn $method(self, v: $typ) -> Result<()> {
            self.output.$put(v);
            Ok(())
        }
    };
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = LengthPrefixed<'a>;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = LengthPrefixed<'a>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.output.put_u8(v as u8);
        Ok(())
    }

    impl_serialize_num!(serialize_i8, put_i8, i8);
    impl_serialize_num!(serialize_i16, put_i16, i16);
    impl_serialize_num!(serialize_i32, put_i32, i32);
    impl_serialize_num!(serialize_i64, put_i64, i64);
    impl_serialize_num!(serialize_u8, put_u8, u8);
    impl_serialize_num!(serialize_u16, put_u16, u16);
    impl_serialize_num!(serialize_u32, put_u32, u32);
    impl_serialize_num!(serialize_u64, put_u64, u64);
    impl_serialize_num!(serialize_f32, put_f32, f32);
    impl_serialize_num!(serialize_f64, put_f64, f64);

    fn serialize_char(self, v: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    // no length prefix; the wrapper types carry their own
    fn serialize_str(self, v: &str) -> Result<()> {
        self.output.put_slice(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.output.put_slice(v);
        Ok(())
    }

    // an absent optional contributes no bytes; presence is recorded in
    // the content header property flags
    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    // a unit variant is its single-letter wire tag
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        variant.serialize(&mut *self)?;
        value.serialize(&mut *self)
    }

    // sequences (field arrays, byte arrays) carry a 32-bit byte-length
    // prefix on the wire; reserve the slot and patch it in `end`
    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(LengthPrefixed::begin(self))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        variant.serialize(&mut *self)?;
        Ok(self)
    }

    // field table: same 32-bit byte-length prefix as sequences
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(LengthPrefixed::begin(self))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        variant.serialize(&mut *self)?;
        Ok(self)
    }
}

impl ser::SerializeTuple for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Reserves a 32-bit slot, serializes the body, then patches the slot
/// with the body's byte length.
pub struct LengthPrefixed<'a> {
    ser: &'a mut Serializer,
    start: usize,
}

impl<'a> LengthPrefixed<'a> {
    fn begin(ser: &'a mut Serializer) -> Self {
        let start = ser.output.len();
        ser.output.put_u32(0);
        Self { ser, start }
    }

    fn finish(self) {
        let body_len = (self.ser.output.len() - self.start - 4) as u32;
        self.ser.output[self.start..self.start + 4].copy_from_slice(&body_len.to_be_bytes());
    }
}

impl ser::SerializeSeq for LengthPrefixed<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish();
        Ok(())
    }
}

impl ser::SerializeMap for LengthPrefixed<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        key.serialize(&mut *self.ser)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_END;
    use crate::types::*;

    #[test]
    fn packed_struct_layout() {
        #[derive(Serialize)]
        struct Sample {
            type_id: Octect,
            channel_id: ShortUint,
            size: LongUint,
            payload: LongStr,
            end: Octect,
        }

        let sample = Sample {
            type_id: 1,
            channel_id: 2,
            size: 3,
            payload: "ABCD".try_into().unwrap(),
            end: FRAME_END,
        };
        let expected = vec![
            0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x04, b'A', b'B', b'C',
            b'D', 0xCE,
        ];
        assert_eq!(expected, to_bytes(&sample).unwrap());
    }

    #[test]
    fn table_length_prefix_is_patched() {
        let mut table = FieldTable::new();
        table.insert("A".try_into().unwrap(), FieldValue::t(1));
        table.insert("B".try_into().unwrap(), FieldValue::u(9));

        let result = to_bytes(&table).unwrap();
        // 4-byte prefix equals the size of the remaining body
        let prefix = u32::from_be_bytes(result[..4].try_into().unwrap());
        assert_eq!(prefix as usize, result.len() - 4);

        // entries appear as `len name tag value` (map order is unspecified)
        let a = result.iter().position(|v| v == &b'A').unwrap();
        assert_eq!(vec![0x01, b'A', b't', 0x01], result[a - 1..a + 3]);
        let b = result.iter().position(|v| v == &b'B').unwrap();
        assert_eq!(vec![0x01, b'B', b'u', 0x00, 0x09], result[b - 1..b + 4]);
    }

    #[test]
    fn nested_table() {
        let mut inner = FieldTable::new();
        inner.insert("k".try_into().unwrap(), FieldValue::I(-1));
        let mut outer = FieldTable::new();
        outer.insert("in".try_into().unwrap(), FieldValue::F(inner));

        let result = to_bytes(&outer).unwrap();
        // outer prefix, entry name, 'F' tag, inner prefix, inner entry
        let expected_len = 4 + (1 + 2) + 1 + 4 + (1 + 1) + 1 + 4;
        assert_eq!(expected_len, result.len());
        let inner_prefix_at = 4 + 3 + 1;
        let inner_len =
            u32::from_be_bytes(result[inner_prefix_at..inner_prefix_at + 4].try_into().unwrap());
        assert_eq!(inner_len as usize, result.len() - inner_prefix_at - 4);
    }

    #[test]
    fn to_buffer_appends() {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFF);
        let n = to_buffer(&7u16, &mut buf).unwrap();
        assert_eq!(2, n);
        assert_eq!(&[0xFF, 0x00, 0x07][..], &buf[..]);
    }

    #[test]
    fn field_array_prefix_counts_bytes() {
        let mut array = FieldArray::new();
        array.push(FieldValue::t(1));
        array.push(FieldValue::u(9));

        let result = to_bytes(&array).unwrap();
        // 't' tag + bool + 'u' tag + u16
        assert_eq!(&[0, 0, 0, 5, b't', 1, b'u', 0, 9][..], &result[..]);
    }

    #[test]
    fn byte_array_prefix_counts_bytes() {
        let array: ByteArray = vec![1u8, 2, 3].into();
        assert_eq!(
            &[0, 0, 0, 3, 1, 2, 3][..],
            &to_bytes(&FieldValue::x(array)).unwrap()[1..]
        );
    }
}
