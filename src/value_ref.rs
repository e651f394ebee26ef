use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::header::CompositeType;
use crate::value::Value;

/// A value decoded without copying. Payloads and keys that sat in a single chunk borrow straight
/// from the input; only values reassembled from several chunks own their bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueRef<'a> {
    Bytes(Cow<'a, [u8]>),
    KeyValue(Cow<'a, [u8]>, Box<ValueRef<'a>>),
    Sequence(Vec<ValueRef<'a>>),
    Map(BTreeMap<Cow<'a, [u8]>, ValueRef<'a>>),
}

impl<'a> ValueRef<'a> {
    pub fn into_owned(self) -> Value {
        match self {
            ValueRef::Bytes(v) => Value::Bytes(v.into_owned()),
            ValueRef::KeyValue(k, v) => Value::KeyValue(k.into_owned(), Box::new((*v).into_owned())),
            ValueRef::Sequence(v) => {
                Value::Sequence(v.into_iter().map(ValueRef::into_owned).collect())
            }
            ValueRef::Map(v) => Value::Map(
                v.into_iter()
                    .map(|(k, i)| (k.into_owned(), i.into_owned()))
                    .collect(),
            ),
        }
    }

    pub fn composite_type(&self) -> CompositeType {
        match self {
            ValueRef::Bytes(_) => CompositeType::Bytes,
            ValueRef::KeyValue(..) => CompositeType::KeyValue,
            ValueRef::Sequence(_) => CompositeType::Sequence,
            ValueRef::Map(_) => CompositeType::Map,
        }
    }

    pub fn byte_length(&self) -> usize {
        match self {
            ValueRef::Bytes(v) => v.len(),
            ValueRef::KeyValue(k, _) => k.len(),
            ValueRef::Sequence(v) => v.len(),
            ValueRef::Map(v) => v.len(),
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, ValueRef::Bytes(_))
    }

    pub fn is_key_value(&self) -> bool {
        matches!(self, ValueRef::KeyValue(..))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ValueRef::Sequence(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ValueRef::Map(_))
    }

    /// True if this value's own payload or key points into the input buffer. Says nothing about
    /// nested values.
    pub fn is_borrowed(&self) -> bool {
        match self {
            ValueRef::Bytes(v) | ValueRef::KeyValue(v, _) => matches!(v, Cow::Borrowed(_)),
            _ => false,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let ValueRef::Bytes(ref val) = *self {
            Some(val.as_ref())
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn as_key_value(&self) -> Option<(&[u8], &ValueRef<'a>)> {
        if let ValueRef::KeyValue(ref key, ref val) = *self {
            Some((key.as_ref(), &**val))
        } else {
            None
        }
    }

    pub fn as_sequence(&self) -> Option<&[ValueRef<'a>]> {
        if let ValueRef::Sequence(ref seq) = *self {
            Some(seq.as_slice())
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Cow<'a, [u8]>, ValueRef<'a>>> {
        if let ValueRef::Map(ref map) = *self {
            Some(map)
        } else {
            None
        }
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&ValueRef<'a>> {
        let key = key.as_ref();
        match *self {
            ValueRef::Map(ref map) => map.get(key),
            ValueRef::KeyValue(ref k, ref v) if k.as_ref() == key => Some(&**v),
            _ => None,
        }
    }
}

impl<'a> PartialEq<Value> for ValueRef<'a> {
    fn eq(&self, other: &Value) -> bool {
        match self {
            ValueRef::Bytes(s) => {
                if let Value::Bytes(o) = other {
                    s.as_ref() == o.as_slice()
                } else {
                    false
                }
            }
            ValueRef::KeyValue(ks, vs) => {
                if let Value::KeyValue(ko, vo) = other {
                    ks.as_ref() == ko.as_slice() && **vs == **vo
                } else {
                    false
                }
            }
            ValueRef::Sequence(s) => {
                if let Value::Sequence(o) = other {
                    s == o
                } else {
                    false
                }
            }
            ValueRef::Map(s) => {
                if let Value::Map(o) = other {
                    s.len() == o.len()
                        && s.iter()
                            .zip(o)
                            .all(|((ks, vs), (ko, vo))| ks.as_ref() == ko.as_slice() && vs == vo)
                } else {
                    false
                }
            }
        }
    }
}
