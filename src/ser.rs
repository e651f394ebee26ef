//! Serialization of Rust data into values.
//!
//! The format itself is untyped, so this is one interpretation of Rust data on top of it:
//! - `bool` - Bytes holding a single 0 or 1
//! - Integers and floats - Bytes holding the big-endian representation, at the type's own width
//! - `char` and strings - Bytes holding the UTF-8 encoding
//! - `None` and unit - An empty Sequence
//! - `Some(v)` - A Sequence holding one element
//! - Sequences, tuples, and tuple structs - Sequence
//! - Maps and structs - Map. Map keys must serialize to Bytes.
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as Bytes
//! - Newtype - KeyValue. Key is variant name, value is the content
//! - Tuple - KeyValue. Key is variant name, value is the tuple as a Sequence
//! - Struct - KeyValue. Key is variant name, value is the struct as a Map

use std::collections::BTreeMap;
use std::io::Write;

use serde::ser::*;

use crate::encode::{encode, encode_to_vec};
use crate::error::{Error, Result};
use crate::value::{Value, KEY_VALUE_TOKEN};

/// Convert any serializable data into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Serialize data straight into its encoded form.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    encode_to_vec(&to_value(value)?)
}

/// Serialize data onto a writer, returning the number of bytes written.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<usize> {
    encode(writer, &to_value(value)?)
}

fn into_key(key: Value) -> Result<Vec<u8>> {
    match key {
        Value::Bytes(key) => Ok(key),
        other => Err(Error::SerdeFail(format!(
            "map key must serialize to Bytes, not {}",
            other.composite_type().name()
        ))),
    }
}

struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = TupleVariantSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = StructVariantSerializer;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bytes(vec![v as u8]))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Bytes(vec![v]))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Bytes(v.to_be_bytes().to_vec()))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        let mut buf = [0u8; 4];
        Ok(Value::from(v.encode_utf8(&mut buf) as &str))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_none(self) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Value> {
        Ok(Value::Sequence(vec![v.serialize(self)?]))
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Sequence(Vec::new()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        if name != KEY_VALUE_TOKEN {
            return value.serialize(self);
        }
        // A KeyValue travels as a (key, value) tuple
        match value.serialize(self)? {
            Value::Sequence(mut pair) if pair.len() == 2 => {
                let nested = pair.pop();
                let key = pair.pop();
                match (key, nested) {
                    (Some(Value::Bytes(key)), Some(nested)) => {
                        Ok(Value::KeyValue(key, Box::new(nested)))
                    }
                    _ => Err(Error::SerdeFail("KeyValue key must be Bytes".into())),
                }
            }
            _ => Err(Error::SerdeFail(
                "KeyValue must serialize as a (key, value) pair".into(),
            )),
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        Ok(Value::key_value(variant, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer> {
        Ok(SeqSerializer {
            seq: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TupleVariantSerializer> {
        Ok(TupleVariantSerializer {
            variant,
            seq: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapSerializer> {
        Ok(MapSerializer {
            map: BTreeMap::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapSerializer> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<StructVariantSerializer> {
        Ok(StructVariantSerializer {
            variant,
            map: BTreeMap::new(),
        })
    }
}

struct SeqSerializer {
    seq: Vec<Value>,
}

impl SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.seq.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Sequence(self.seq))
    }
}

impl SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        SerializeSeq::end(self)
    }
}

impl SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        SerializeSeq::end(self)
    }
}

struct TupleVariantSerializer {
    variant: &'static str,
    seq: Vec<Value>,
}

impl SerializeTupleVariant for TupleVariantSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.seq.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::key_value(self.variant, Value::Sequence(self.seq)))
    }
}

struct MapSerializer {
    map: BTreeMap<Vec<u8>, Value>,
    next_key: Option<Vec<u8>>,
}

impl SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(into_key(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| Error::SerdeFail("map value serialized before its key".into()))?;
        self.map.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Map(self.map))
    }
}

impl SerializeStruct for MapSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.map
            .insert(key.as_bytes().to_vec(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Map(self.map))
    }
}

struct StructVariantSerializer {
    variant: &'static str,
    map: BTreeMap<Vec<u8>, Value>,
}

impl SerializeStructVariant for StructVariantSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.map
            .insert(key.as_bytes().to_vec(), value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::key_value(self.variant, Value::Map(self.map)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Point {
        x: u16,
        y: i8,
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(u8),
        Line(u8, u8),
        Rect { w: u8, h: u8 },
    }

    mod scalars {
        use super::*;

        #[test]
        fn fixed_width() {
            assert_eq!(to_value(&true).unwrap(), Value::Bytes(vec![1]));
            assert_eq!(to_value(&0x0102u16).unwrap(), Value::Bytes(vec![1, 2]));
            assert_eq!(to_value(&-1i32).unwrap(), Value::Bytes(vec![0xff; 4]));
            assert_eq!(to_value(&7u64).unwrap().byte_length(), 8);
            assert_eq!(to_value(&7u128).unwrap().byte_length(), 16);
            assert_eq!(
                to_value(&1.5f64).unwrap(),
                Value::Bytes(1.5f64.to_be_bytes().to_vec())
            );
        }

        #[test]
        fn text() {
            assert_eq!(to_value("hello").unwrap(), Value::from("hello"));
            assert_eq!(to_value(&'é').unwrap(), Value::from("é"));
            assert_eq!(
                to_value(&serde_bytes::Bytes::new(b"\x00\x01")).unwrap(),
                Value::Bytes(vec![0, 1])
            );
        }

        #[test]
        fn options_and_unit() {
            assert_eq!(to_value(&()).unwrap(), Value::Sequence(Vec::new()));
            assert_eq!(to_value(&None::<u8>).unwrap(), Value::Sequence(Vec::new()));
            assert_eq!(
                to_value(&Some(3u8)).unwrap(),
                Value::Sequence(vec![Value::Bytes(vec![3])])
            );
        }
    }

    mod containers {
        use super::*;

        #[test]
        fn struct_is_map() {
            let val = to_value(&Point { x: 1, y: -1 }).unwrap();
            assert_eq!(val.get("x"), Some(&Value::Bytes(vec![0, 1])));
            assert_eq!(val.get("y"), Some(&Value::Bytes(vec![0xff])));
        }

        #[test]
        fn tuple_is_sequence() {
            let val = to_value(&(1u8, "a")).unwrap();
            assert_eq!(
                val,
                Value::Sequence(vec![Value::Bytes(vec![1]), Value::from("a")])
            );
        }

        #[test]
        fn map_keys() {
            let mut map = HashMap::new();
            map.insert(2u8, "b");
            map.insert(1u8, "a");
            let val = to_value(&map).unwrap();
            assert_eq!(val.get([1u8]), Some(&Value::from("a")));

            let mut bad = BTreeMap::new();
            bad.insert(vec![1u8], 1u8);
            let err = to_value(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Serde);
        }
    }

    #[test]
    fn enums() {
        assert_eq!(to_value(&Shape::Empty).unwrap(), Value::from("Empty"));
        assert_eq!(
            to_value(&Shape::Circle(4)).unwrap(),
            Value::key_value("Circle", Value::Bytes(vec![4]))
        );
        assert_eq!(
            to_value(&Shape::Line(1, 2)).unwrap(),
            Value::key_value(
                "Line",
                Value::Sequence(vec![Value::Bytes(vec![1]), Value::Bytes(vec![2])])
            )
        );
        let rect = to_value(&Shape::Rect { w: 3, h: 4 }).unwrap();
        let (key, nested) = rect.as_key_value().unwrap();
        assert_eq!(key, b"Rect");
        assert_eq!(nested.get("h"), Some(&Value::Bytes(vec![4])));
    }

    #[test]
    fn value_passes_through() {
        let value: Value = vec![
            ("entry", Value::key_value("id", "world")),
            ("list", Value::Sequence(vec![Value::Bytes(vec![9u8; 5000])])),
        ]
        .into_iter()
        .collect();
        assert_eq!(to_value(&value).unwrap(), value);
        assert_eq!(to_vec(&value).unwrap(), encode_to_vec(&value).unwrap());
    }

    #[test]
    fn writer() {
        let mut buf = Vec::new();
        let written = to_writer(&mut buf, &Point { x: 1, y: 2 }).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(buf, to_vec(&Point { x: 1, y: 2 }).unwrap());
    }
}
