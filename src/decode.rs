//! Decoding values from a byte buffer.
//!
//! Decoding is recursive descent over a slice cursor. Nesting is bounded by
//! [`DecodeOptions::max_depth`], so hostile input can't exhaust the stack. Payloads that sit in a
//! single chunk are borrowed from the input; payloads spread over several chunks are copied into
//! one buffer.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::header::{CompositeType, Header};
use crate::options::DecodeOptions;
use crate::value::Value;
use crate::value_ref::ValueRef;

/// Decodes consecutive top-level values out of a buffer.
///
/// As an iterator it yields each top-level value in turn, stops at the end of the buffer, and
/// stops for good after the first error.
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    len: usize,
    options: DecodeOptions,
    depth: usize,
    errored: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecodeOptions) -> Self {
        Self {
            data,
            len: data.len(),
            options,
            depth: 0,
            errored: false,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.len - self.data.len()
    }

    /// The part of the buffer not yet decoded.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the next top-level value without copying single-chunk payloads.
    ///
    /// On failure the read position is left at the start of the value that failed, so a
    /// [`Truncated`](Error::Truncated) value can be retried once more data is available.
    pub fn decode_ref(&mut self) -> Result<ValueRef<'a>> {
        let start = self.data;
        self.depth = 0;
        let result = self.read_value();
        if result.is_err() {
            self.data = start;
            self.errored = true;
        }
        result
    }

    /// Decode the next top-level value into an owned [`Value`].
    pub fn decode_value(&mut self) -> Result<Value> {
        self.decode_ref().map(ValueRef::into_owned)
    }

    fn read_value(&mut self) -> Result<ValueRef<'a>> {
        let header = self.next_header()?;
        match header.composite_type {
            CompositeType::Bytes => Ok(ValueRef::Bytes(self.read_chunked(header)?)),
            CompositeType::KeyValue => {
                let key = self.read_chunked(header)?;
                self.enter()?;
                let nested = self.read_value()?;
                self.depth -= 1;
                Ok(ValueRef::KeyValue(key, Box::new(nested)))
            }
            CompositeType::Sequence => {
                self.enter()?;
                let seq = self.read_sequence(header)?;
                self.depth -= 1;
                Ok(ValueRef::Sequence(seq))
            }
            CompositeType::Map => {
                self.enter()?;
                let map = self.read_map(header)?;
                self.depth -= 1;
                Ok(ValueRef::Map(map))
            }
        }
    }

    fn next_header(&mut self) -> Result<Header> {
        let (used, header) = Header::decode(self.data)?;
        if self.options.requires_minimal_headers() && !header.is_minimal() {
            return Err(self.violation(format!(
                "{} header holds size {} in the long form",
                header.composite_type.name(),
                header.size
            )));
        }
        self.data = &self.data[used..];
        Ok(header)
    }

    // Continuation headers must repeat the composite type of the chunk they continue.
    fn next_continuation(&mut self, composite_type: CompositeType) -> Result<Header> {
        let header = self.next_header()?;
        if header.composite_type != composite_type {
            return Err(self.violation(format!(
                "{} continued by a {} chunk",
                composite_type.name(),
                header.composite_type.name()
            )));
        }
        Ok(header)
    }

    fn take(&mut self, len: usize, step: &'static str) -> Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(Error::Truncated {
                step,
                actual: self.data.len(),
                expected: len,
            });
        }
        let (bytes, data) = self.data.split_at(len);
        self.data = data;
        Ok(bytes)
    }

    /// Read a chunked byte payload, starting with an already-parsed header. Only copies if the
    /// payload spans more than one chunk.
    fn read_chunked(&mut self, first: Header) -> Result<Cow<'a, [u8]>> {
        let composite_type = first.composite_type;
        let step = if composite_type == CompositeType::KeyValue {
            "get key chunk"
        } else {
            "get Bytes chunk"
        };
        let chunk = self.take(first.size, step)?;
        if first.terminated {
            return Ok(Cow::Borrowed(chunk));
        }
        let mut buf = chunk.to_vec();
        let mut chunks = 1usize;
        loop {
            let header = self.next_continuation(composite_type)?;
            buf.extend_from_slice(self.take(header.size, step)?);
            chunks += 1;
            if header.terminated {
                break;
            }
        }
        trace!(
            len = buf.len(),
            chunks,
            "reassembled {} payload",
            composite_type.name()
        );
        Ok(Cow::Owned(buf))
    }

    fn read_sequence(&mut self, first: Header) -> Result<Vec<ValueRef<'a>>> {
        let mut header = first;
        // Every element takes at least one byte
        let mut seq = Vec::with_capacity(header.size.min(self.data.len()));
        loop {
            for _ in 0..header.size {
                seq.push(self.read_value()?);
            }
            if header.terminated {
                return Ok(seq);
            }
            header = self.next_continuation(CompositeType::Sequence)?;
        }
    }

    fn read_map(&mut self, first: Header) -> Result<BTreeMap<Cow<'a, [u8]>, ValueRef<'a>>> {
        let mut header = first;
        let mut map = BTreeMap::new();
        loop {
            for _ in 0..header.size {
                let key_header = self.next_header()?;
                if key_header.composite_type != CompositeType::KeyValue {
                    return Err(self.violation(format!(
                        "map key has type {}",
                        key_header.composite_type.name()
                    )));
                }
                let key = self.read_chunked(key_header)?;
                if self.options.rejects_duplicate_keys() && map.contains_key(&key) {
                    return Err(self.violation(format!(
                        "duplicate map key \"{}\"",
                        String::from_utf8_lossy(&key)
                    )));
                }
                let val = self.read_value()?;
                map.insert(key, val);
            }
            if header.terminated {
                return Ok(map);
            }
            header = self.next_continuation(CompositeType::Map)?;
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            debug!(
                offset = self.consumed(),
                max_depth = self.options.max_depth,
                "rejecting value: nesting too deep"
            );
            return Err(Error::ParseLimit(format!(
                "nesting deeper than {}",
                self.options.max_depth
            )));
        }
        Ok(())
    }

    fn violation(&self, msg: String) -> Error {
        debug!(offset = self.consumed(), "rejecting value: {}", msg);
        Error::ProtocolViolation(msg)
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<ValueRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored || self.data.is_empty() {
            return None;
        }
        Some(self.decode_ref())
    }
}

/// Decode the first value in `data`, returning the bytes it took up alongside it.
pub fn decode(data: &[u8]) -> Result<(usize, Value)> {
    let (used, val) = decode_ref(data)?;
    Ok((used, val.into_owned()))
}

/// Decode the first value in `data` without copying single-chunk payloads.
pub fn decode_ref(data: &[u8]) -> Result<(usize, ValueRef<'_>)> {
    decode_ref_with_options(data, DecodeOptions::default())
}

pub fn decode_ref_with_options(
    data: &[u8],
    options: DecodeOptions,
) -> Result<(usize, ValueRef<'_>)> {
    let mut decoder = Decoder::with_options(data, options);
    let val = decoder.decode_ref()?;
    Ok((decoder.consumed(), val))
}

/// Decode every top-level value in `data`. Fails if any of them fails, including a value cut
/// short at the end of the buffer.
pub fn decode_all(data: &[u8]) -> Result<Vec<Value>> {
    Decoder::new(data)
        .map(|val| val.map(ValueRef::into_owned))
        .collect()
}
