//! Encoding values onto a byte sink.
//!
//! Values larger than a single chunk are split: every chunk but the last carries exactly
//! [`MAX_CHUNK_LEN`] bytes or elements and has its termination bit clear. Map entries are written
//! in key order, so a given value always encodes to the same bytes.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::trace;

use crate::error::Result;
use crate::header::{CompositeType, Header};
use crate::value::Value;
use crate::{MAX_CHUNK_LEN, MAX_SHORT_LEN};

/// Writes values to any [`Write`] implementation.
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Encode one value, returning the number of bytes written. Only fails if the writer does.
    pub fn encode(&mut self, value: &Value) -> Result<usize> {
        match value {
            Value::Bytes(data) => self.write_chunked(CompositeType::Bytes, data),
            Value::KeyValue(key, nested) => {
                let written = self.write_chunked(CompositeType::KeyValue, key)?;
                Ok(written + self.encode(nested)?)
            }
            Value::Sequence(elements) => self.write_sequence(elements),
            Value::Map(entries) => self.write_map(entries),
        }
    }

    fn write_chunked(&mut self, composite_type: CompositeType, mut data: &[u8]) -> Result<usize> {
        if data.len() > MAX_CHUNK_LEN {
            trace!(
                len = data.len(),
                chunks = chunk_count(data.len()),
                "splitting {} payload",
                composite_type.name()
            );
        }
        let mut written = 0;
        loop {
            let (chunk, rest) = data.split_at(data.len().min(MAX_CHUNK_LEN));
            written += Header::new(composite_type, chunk.len(), rest.is_empty())
                .write(&mut self.writer)?;
            self.writer.write_all(chunk)?;
            written += chunk.len();
            if rest.is_empty() {
                return Ok(written);
            }
            data = rest;
        }
    }

    fn write_sequence(&mut self, mut elements: &[Value]) -> Result<usize> {
        if elements.len() > MAX_CHUNK_LEN {
            trace!(
                len = elements.len(),
                chunks = chunk_count(elements.len()),
                "splitting Sequence"
            );
        }
        let mut written = 0;
        loop {
            let (batch, rest) = elements.split_at(elements.len().min(MAX_CHUNK_LEN));
            written += Header::new(CompositeType::Sequence, batch.len(), rest.is_empty())
                .write(&mut self.writer)?;
            for elem in batch {
                written += self.encode(elem)?;
            }
            if rest.is_empty() {
                return Ok(written);
            }
            elements = rest;
        }
    }

    fn write_map(&mut self, map: &BTreeMap<Vec<u8>, Value>) -> Result<usize> {
        if map.len() > MAX_CHUNK_LEN {
            trace!(len = map.len(), chunks = chunk_count(map.len()), "splitting Map");
        }
        let mut written = 0;
        let mut remaining = map.len();
        let mut entries = map.iter();
        loop {
            let batch = remaining.min(MAX_CHUNK_LEN);
            remaining -= batch;
            written += Header::new(CompositeType::Map, batch, remaining == 0)
                .write(&mut self.writer)?;
            for (key, val) in entries.by_ref().take(batch) {
                written += self.write_chunked(CompositeType::KeyValue, key)?;
                written += self.encode(val)?;
            }
            if remaining == 0 {
                return Ok(written);
            }
        }
    }
}

/// Encode a single value to a writer, returning the number of bytes written.
pub fn encode<W: Write>(writer: W, value: &Value) -> Result<usize> {
    Encoder::new(writer).encode(value)
}

/// Encode a single value into a new byte vector.
pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    Encoder::new(&mut buf).encode(value)?;
    Ok(buf)
}

/// Exact number of bytes [`encode`] will write for this value.
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Bytes(data) => headers_len(data.len()) + data.len(),
        Value::KeyValue(key, nested) => headers_len(key.len()) + key.len() + encoded_len(nested),
        Value::Sequence(elements) => {
            headers_len(elements.len()) + elements.iter().map(encoded_len).sum::<usize>()
        }
        Value::Map(entries) => {
            headers_len(entries.len())
                + entries
                    .iter()
                    .map(|(k, v)| headers_len(k.len()) + k.len() + encoded_len(v))
                    .sum::<usize>()
        }
    }
}

fn chunk_count(len: usize) -> usize {
    if len == 0 {
        1
    } else {
        (len - 1) / MAX_CHUNK_LEN + 1
    }
}

// Total header bytes for a value of `len` bytes or elements.
fn headers_len(len: usize) -> usize {
    if len == 0 {
        return 1;
    }
    let full = (len - 1) / MAX_CHUNK_LEN;
    let last = len - full * MAX_CHUNK_LEN;
    full * 2 + if last <= MAX_SHORT_LEN { 1 } else { 2 }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use std::io;

    fn enc(value: &Value) -> Vec<u8> {
        let buf = encode_to_vec(value).unwrap();
        assert_eq!(buf.len(), encoded_len(value));
        buf
    }

    mod bytes {
        use super::*;

        #[test]
        fn known_bytes() {
            assert_eq!(enc(&Value::from("hello")), b"\x85hello");
            assert_eq!(enc(&Value::Bytes(Vec::new())), &[0x80]);
            let mut expected = vec![0x90, 0x0f];
            expected.extend_from_slice(&[7u8; 16]);
            assert_eq!(enc(&Value::Bytes(vec![7u8; 16])), expected);
        }

        #[test]
        fn exactly_one_chunk() {
            let buf = enc(&Value::Bytes(vec![1u8; 4096]));
            assert_eq!(buf.len(), 4098);
            assert_eq!(&buf[..2], &[0x9f, 0xff]);
        }

        #[test]
        fn one_byte_over() {
            let buf = enc(&Value::Bytes(vec![1u8; 4097]));
            assert_eq!(buf.len(), 2 + 4096 + 1 + 1);
            assert_eq!(&buf[..2], &[0x1f, 0xff]);
            assert_eq!(buf[4098], 0x81);
        }

        #[test]
        fn two_chunks() {
            let buf = enc(&Value::Bytes(vec![2u8; 6000]));
            assert_eq!(buf.len(), 2 + 4096 + 2 + 1904);
            assert_eq!(&buf[..2], &[0x1f, 0xff]);
            // 1904 - 1 = 0x76f
            assert_eq!(&buf[4098..4100], &[0x97, 0x6f]);
        }

        #[test]
        fn chunk_multiple() {
            let buf = enc(&Value::Bytes(vec![3u8; 8192]));
            assert_eq!(&buf[..2], &[0x1f, 0xff]);
            assert_eq!(&buf[4098..4100], &[0x9f, 0xff]);
            assert_eq!(buf.len(), 8196);
        }
    }

    mod key_value {
        use super::*;

        #[test]
        fn known_bytes() {
            assert_eq!(
                enc(&Value::key_value("id", "world")),
                b"\xc2id\x85world"
            );
        }

        #[test]
        fn long_key() {
            let key = vec![b'k'; 5000];
            let buf = enc(&Value::key_value(key, Vec::<u8>::new()));
            assert_eq!(&buf[..2], &[0x5f, 0xff]);
            // 904 - 1 = 0x387, KEYVALUE | HEADER_SIZE | TERMINATION
            assert_eq!(&buf[4098..4100], &[0xd3, 0x87]);
            assert_eq!(buf[buf.len() - 1], 0x80);
        }
    }

    mod sequence {
        use super::*;

        #[test]
        fn known_bytes() {
            assert_eq!(enc(&Value::Sequence(Vec::new())), &[0xa0]);
            let seq = Value::Sequence(vec![Value::from("a"), Value::Sequence(Vec::new())]);
            assert_eq!(enc(&seq), &[0xa2, 0x81, b'a', 0xa0]);
        }

        #[test]
        fn batches() {
            let seq = Value::Sequence(vec![Value::Bytes(Vec::new()); 5000]);
            let buf = enc(&seq);
            assert_eq!(&buf[..2], &[0x3f, 0xff]);
            assert!(buf[2..4098].iter().all(|b| *b == 0x80));
            assert_eq!(&buf[4098..4100], &[0xb3, 0x87]);
            assert_eq!(buf.len(), 4 + 5000);
        }
    }

    mod map {
        use super::*;

        #[test]
        fn known_bytes() {
            let map: Value = vec![
                ("test2", Value::from("world")),
                ("test1", Value::from("hello")),
            ]
            .into_iter()
            .collect();
            assert_eq!(
                enc(&map),
                b"\xe2\xc5test1\x85hello\xc5test2\x85world"
            );
            assert_eq!(enc(&Value::Map(BTreeMap::new())), &[0xe0]);
        }

        #[test]
        fn batches() {
            let map: Value = (0..4097u32)
                .map(|i| (i.to_be_bytes().to_vec(), Value::Bytes(Vec::new())))
                .collect();
            let buf = enc(&map);
            assert_eq!(&buf[..2], &[0x7f, 0xff]);
            // Each entry is a 5-byte key chunk plus an empty value
            let second = 2 + 4096 * 6;
            assert_eq!(buf[second], 0xe1);
            assert_eq!(buf.len(), second + 1 + 6);
        }
    }

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failure_propagates() {
        let err = encode(BrokenPipe, &Value::from("hello")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn reports_bytes_written() {
        let value = Value::Sequence(vec![
            Value::key_value("id", "world"),
            Value::Bytes(vec![9u8; 4500]),
        ]);
        let mut buf = Vec::new();
        let written = encode(&mut buf, &value).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(written, encoded_len(&value));
    }
}
