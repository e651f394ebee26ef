//! Deserialization of Rust data out of values.
//!
//! This reverses the mapping in the [`ser`](crate::ser) module. Fixed-width types must find Bytes
//! of exactly their own width: a `u32` wants 4 bytes, a `bool` wants 1. Payloads that were
//! borrowed from the input stay borrowed, so `&str` and `&[u8]` fields work with [`from_slice`].

use std::borrow::Cow;
use std::collections::btree_map;
use std::vec;

use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, Unexpected,
    VariantAccess, Visitor,
};
use serde::Deserialize;

use crate::decode::Decoder;
use crate::error::{Error, Result};
use crate::value_ref::ValueRef;

/// Deserialize Rust data from a decoded value.
pub fn from_value_ref<'de, T: Deserialize<'de>>(value: ValueRef<'de>) -> Result<T> {
    T::deserialize(value)
}

/// Decode and deserialize the single value held in `data`. Trailing bytes are an error.
pub fn from_slice<'de, T: Deserialize<'de>>(data: &'de [u8]) -> Result<T> {
    let mut decoder = Decoder::new(data);
    let value = decoder.decode_ref()?;
    if !decoder.is_empty() {
        return Err(Error::SerdeFail(format!(
            "{} trailing bytes after value",
            decoder.remaining().len()
        )));
    }
    from_value_ref(value)
}

impl<'de> ValueRef<'de> {
    fn unexpected(&self) -> Unexpected {
        match self {
            ValueRef::Bytes(v) => Unexpected::Bytes(&v[..]),
            ValueRef::KeyValue(..) => Unexpected::NewtypeVariant,
            ValueRef::Sequence(_) => Unexpected::Seq,
            ValueRef::Map(_) => Unexpected::Map,
        }
    }

    fn invalid_type<E: de::Expected>(&self, exp: &E) -> Error {
        de::Error::invalid_type(self.unexpected(), exp)
    }
}

/// Get exactly `N` bytes out of a Bytes value.
fn fixed<'de, const N: usize, V: Visitor<'de>>(
    value: ValueRef<'de>,
    visitor: &V,
) -> Result<[u8; N]> {
    match value {
        ValueRef::Bytes(bytes) => <[u8; N]>::try_from(&bytes[..])
            .map_err(|_| de::Error::invalid_length(bytes.len(), visitor)),
        other => Err(other.invalid_type(visitor)),
    }
}

macro_rules! deserialize_fixed {
    ($method:ident, $visit:ident, $ty:ty, $width:literal) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let bytes: [u8; $width] = fixed(self, &visitor)?;
            visitor.$visit(<$ty>::from_be_bytes(bytes))
        }
    };
}

fn visit_sequence<'de, V: Visitor<'de>>(seq: Vec<ValueRef<'de>>, visitor: V) -> Result<V::Value> {
    let len = seq.len();
    let mut access = SeqDeserializer {
        iter: seq.into_iter(),
    };
    let value = visitor.visit_seq(&mut access)?;
    if access.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer elements in sequence"))
    }
}

fn visit_map<'de, V: Visitor<'de>>(
    map: btree_map::BTreeMap<Cow<'de, [u8]>, ValueRef<'de>>,
    visitor: V,
) -> Result<V::Value> {
    let len = map.len();
    let mut access = MapDeserializer {
        iter: map.into_iter(),
        value: None,
    };
    let value = visitor.visit_map(&mut access)?;
    if access.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer elements in map"))
    }
}

impl<'de> Deserializer<'de> for ValueRef<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Bytes(Cow::Borrowed(v)) => visitor.visit_borrowed_bytes(v),
            ValueRef::Bytes(Cow::Owned(v)) => visitor.visit_byte_buf(v),
            ValueRef::KeyValue(key, nested) => visitor.visit_enum(EnumDeserializer {
                variant: key,
                value: Some(*nested),
            }),
            ValueRef::Sequence(v) => visit_sequence(v, visitor),
            ValueRef::Map(v) => visit_map(v, visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let [byte]: [u8; 1] = fixed(self, &visitor)?;
        match byte {
            0 => visitor.visit_bool(false),
            1 => visitor.visit_bool(true),
            n => Err(de::Error::invalid_value(
                Unexpected::Unsigned(n as u64),
                &visitor,
            )),
        }
    }

    deserialize_fixed!(deserialize_i8, visit_i8, i8, 1);
    deserialize_fixed!(deserialize_i16, visit_i16, i16, 2);
    deserialize_fixed!(deserialize_i32, visit_i32, i32, 4);
    deserialize_fixed!(deserialize_i64, visit_i64, i64, 8);
    deserialize_fixed!(deserialize_i128, visit_i128, i128, 16);
    deserialize_fixed!(deserialize_u8, visit_u8, u8, 1);
    deserialize_fixed!(deserialize_u16, visit_u16, u16, 2);
    deserialize_fixed!(deserialize_u32, visit_u32, u32, 4);
    deserialize_fixed!(deserialize_u64, visit_u64, u64, 8);
    deserialize_fixed!(deserialize_u128, visit_u128, u128, 16);
    deserialize_fixed!(deserialize_f32, visit_f32, f32, 4);
    deserialize_fixed!(deserialize_f64, visit_f64, f64, 8);

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = match self {
            ValueRef::Bytes(ref bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => s,
                Err(_) => {
                    return Err(de::Error::invalid_value(
                        Unexpected::Bytes(&bytes[..]),
                        &visitor,
                    ))
                }
            },
            ref other => return Err(other.invalid_type(&visitor)),
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Bytes(Cow::Borrowed(bytes)) => match std::str::from_utf8(bytes) {
                Ok(s) => visitor.visit_borrowed_str(s),
                Err(_) => Err(de::Error::invalid_value(Unexpected::Bytes(bytes), &visitor)),
            },
            ValueRef::Bytes(Cow::Owned(bytes)) => match String::from_utf8(bytes) {
                Ok(s) => visitor.visit_string(s),
                Err(e) => Err(de::Error::invalid_value(
                    Unexpected::Bytes(e.as_bytes()),
                    &visitor,
                )),
            },
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Bytes(Cow::Borrowed(v)) => visitor.visit_borrowed_bytes(v),
            ValueRef::Bytes(Cow::Owned(v)) => visitor.visit_byte_buf(v),
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Sequence(mut v) if v.len() <= 1 => match v.pop() {
                None => visitor.visit_none(),
                Some(inner) => visitor.visit_some(inner),
            },
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Sequence(ref v) if v.is_empty() => visitor.visit_unit(),
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Sequence(v) => visit_sequence(v, visitor),
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self {
            ValueRef::Map(v) => visit_map(v, visitor),
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self {
            ValueRef::Bytes(variant) => visitor.visit_enum(EnumDeserializer {
                variant,
                value: None,
            }),
            ValueRef::KeyValue(variant, nested) => visitor.visit_enum(EnumDeserializer {
                variant,
                value: Some(*nested),
            }),
            other => Err(other.invalid_type(&visitor)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        drop(self);
        visitor.visit_unit()
    }
}

struct SeqDeserializer<'de> {
    iter: vec::IntoIter<ValueRef<'de>>,
}

impl<'de> SeqAccess<'de> for SeqDeserializer<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(value).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer<'de> {
    iter: btree_map::IntoIter<Cow<'de, [u8]>, ValueRef<'de>>,
    value: Option<ValueRef<'de>>,
}

impl<'de> MapAccess<'de> for MapDeserializer<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(ValueRef::Bytes(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<T::Value> {
        match self.value.take() {
            Some(value) => seed.deserialize(value),
            None => Err(Error::SerdeFail("map value requested before its key".into())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Enum access over a variant name plus its optional content.
struct EnumDeserializer<'de> {
    variant: Cow<'de, [u8]>,
    value: Option<ValueRef<'de>>,
}

impl<'de> EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = Error;
    type Variant = VariantDeserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantDeserializer<'de>)> {
        let variant = seed.deserialize(ValueRef::Bytes(self.variant))?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer<'de> {
    value: Option<ValueRef<'de>>,
}

impl<'de> VariantAccess<'de> for VariantDeserializer<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(value) => <()>::deserialize(value),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        match self.value {
            Some(value) => seed.deserialize(value),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"newtype variant",
            )),
        }
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Some(value) => value.deserialize_seq(visitor),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"tuple variant",
            )),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Some(value) => value.deserialize_map(visitor),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"struct variant",
            )),
        }
    }
}
