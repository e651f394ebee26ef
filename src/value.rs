use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;

use serde::de::{Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_bytes::ByteBuf;

use crate::header::CompositeType;
use crate::value_ref::ValueRef;

/// Newtype name used to carry a [`Value::KeyValue`] through serde. This crate's serializer turns
/// it back into a key-value pair; any other serializer just sees a `(key, value)` tuple.
pub(crate) const KEY_VALUE_TOKEN: &str = "$prefixed_compact::KeyValue";

/// A decoded value. Byte payloads and keys carry no further type information.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Bytes(Vec<u8>),
    KeyValue(Vec<u8>, Box<Value>),
    Sequence(Vec<Value>),
    Map(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Build a key-value pair.
    pub fn key_value(key: impl Into<Vec<u8>>, value: impl Into<Value>) -> Self {
        Value::KeyValue(key.into(), Box::new(value.into()))
    }

    /// Borrow this value as a [`ValueRef`] without copying any bytes.
    pub fn to_ref(&self) -> ValueRef<'_> {
        match *self {
            Value::Bytes(ref v) => ValueRef::Bytes(Cow::Borrowed(v.as_slice())),
            Value::KeyValue(ref k, ref v) => {
                ValueRef::KeyValue(Cow::Borrowed(k.as_slice()), Box::new(v.to_ref()))
            }
            Value::Sequence(ref v) => ValueRef::Sequence(v.iter().map(Value::to_ref).collect()),
            Value::Map(ref v) => ValueRef::Map(
                v.iter()
                    .map(|(k, i)| (Cow::Borrowed(k.as_slice()), i.to_ref()))
                    .collect(),
            ),
        }
    }

    pub fn composite_type(&self) -> CompositeType {
        match self {
            Value::Bytes(_) => CompositeType::Bytes,
            Value::KeyValue(..) => CompositeType::KeyValue,
            Value::Sequence(_) => CompositeType::Sequence,
            Value::Map(_) => CompositeType::Map,
        }
    }

    /// Payload length for bytes, key length for key-value pairs, and element or entry count for
    /// sequences and maps.
    pub fn byte_length(&self) -> usize {
        match self {
            Value::Bytes(v) => v.len(),
            Value::KeyValue(k, _) => k.len(),
            Value::Sequence(v) => v.len(),
            Value::Map(v) => v.len(),
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }

    pub fn is_key_value(&self) -> bool {
        matches!(self, Value::KeyValue(..))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(ref val) = *self {
            Some(val.as_slice())
        } else {
            None
        }
    }

    /// Bytes payload as UTF-8, if it is both a bytes value and valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn as_key_value(&self) -> Option<(&[u8], &Value)> {
        if let Value::KeyValue(ref key, ref val) = *self {
            Some((key.as_slice(), &**val))
        } else {
            None
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        if let Value::Sequence(ref seq) = *self {
            Some(seq.as_slice())
        } else {
            None
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match *self {
            Value::Sequence(ref mut seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        if let Value::Map(ref map) = *self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<Vec<u8>, Value>> {
        match *self {
            Value::Map(ref mut map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key. Works on maps, and on a key-value pair whose key matches.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        let key = key.as_ref();
        match *self {
            Value::Map(ref map) => map.get(key),
            Value::KeyValue(ref k, ref v) if k.as_slice() == key => Some(&**v),
            _ => None,
        }
    }
}

impl<'a> PartialEq<ValueRef<'a>> for Value {
    fn eq(&self, other: &ValueRef<'a>) -> bool {
        other == self
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(v: &[u8; N]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Bytes(v.into_bytes())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl From<BTreeMap<Vec<u8>, Value>> for Value {
    fn from(v: BTreeMap<Vec<u8>, Value>) -> Self {
        Value::Map(v)
    }
}

impl<'a> From<ValueRef<'a>> for Value {
    fn from(v: ValueRef<'a>) -> Self {
        v.into_owned()
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Sequence(iter.into_iter().collect())
    }
}

impl<K: Into<Vec<u8>>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::KeyValue(k, v) => serializer
                .serialize_newtype_struct(KEY_VALUE_TOKEN, &(serde_bytes::Bytes::new(k), &**v)),
            Value::Sequence(v) => v.serialize(serializer),
            Value::Map(map) => {
                let mut ser = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    ser.serialize_entry(serde_bytes::Bytes::new(k), v)?;
                }
                ser.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.write_str("any valid prefixed-compact value")
            }

            fn visit_bool<E: Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Value::Bytes(vec![v as u8]))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v.to_be_bytes().to_vec()))
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v.to_be_bytes().to_vec()))
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v.to_bits().to_be_bytes().to_vec()))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Value::from(v))
            }

            fn visit_string<E: Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Value::from(v))
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v.into()))
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Value::Bytes(v))
            }

            fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Sequence(Vec::new()))
            }

            fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Sequence(Vec::new()))
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                Ok(Value::Sequence(vec![Value::deserialize(d)?]))
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                d: D,
            ) -> Result<Self::Value, D::Error> {
                Value::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                // Allocate with the size hint, but be conservative. 4096 is what serde uses
                // internally for collections, so we'll do likewise.
                let mut seq = match access.size_hint() {
                    Some(size) => Vec::with_capacity(size.min(4096)),
                    None => Vec::new(),
                };
                while let Some(elem) = access.next_element()? {
                    seq.push(elem);
                }
                Ok(Value::Sequence(seq))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, val)) = access.next_entry::<ByteBuf, Value>()? {
                    map.insert(key.into_vec(), val);
                }
                Ok(Value::Map(map))
            }

            /// Only reached for key-value pairs: this crate's deserializer presents them as an
            /// enum whose variant is the key.
            fn visit_enum<A: EnumAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
                let (key, access): (ByteBuf, _) = access.variant()?;
                let val: Value = access.newtype_variant()?;
                Ok(Value::KeyValue(key.into_vec(), Box::new(val)))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
