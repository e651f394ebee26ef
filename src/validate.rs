//! Checking encoded streams without building values.
//!
//! The validator walks the same grammar as the decoder, under the same [`DecodeOptions`], but
//! skips payload bytes instead of collecting them and keeps its position in an explicit stack
//! rather than recursing. It can therefore check arbitrarily large streams straight from any
//! [`Read`] source.

use std::io::{self, Read};

use tracing::debug;

use crate::depth_tracking::{DepthTracker, Next};
use crate::error::{Error, Result};
use crate::header::{CompositeType, Header};
use crate::options::DecodeOptions;

/// Validates the top-level values of a byte source one by one.
#[derive(Debug)]
pub struct Validator<R> {
    reader: R,
    options: DecodeOptions,
    tracker: DepthTracker,
    offset: u64,
    count: usize,
}

impl<R: Read> Validator<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, options: DecodeOptions) -> Self {
        Self {
            reader,
            tracker: DepthTracker::new(options.max_depth),
            options,
            offset: 0,
            count: 0,
        }
    }

    /// Bytes read from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Top-level values validated so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Validate every remaining value, returning the total number of top-level values seen.
    pub fn validate_all(mut self) -> Result<usize> {
        while self.validate_next()? {}
        Ok(self.count)
    }

    /// Validate the next top-level value. Returns `Ok(false)` if the source ended cleanly at a
    /// value boundary.
    pub fn validate_next(&mut self) -> Result<bool> {
        self.tracker.clear();
        let Some(header) = self.read_header(true)? else {
            return Ok(false);
        };
        self.value(header)?;
        while let Some(next) = self.tracker.next() {
            match next {
                Next::Value => {
                    let header = self.expect_header()?;
                    self.value(header)?;
                }
                Next::MapKey => {
                    let header = self.expect_header()?;
                    if header.composite_type != CompositeType::KeyValue {
                        return Err(self.violation(format!(
                            "map key has type {}",
                            header.composite_type.name()
                        )));
                    }
                    let key = self.skip_chunked(header, self.tracker.tracks_keys())?;
                    if !self.tracker.map_key(key.clone()) {
                        let key = key.unwrap_or_default();
                        return Err(self.violation(format!(
                            "duplicate map key \"{}\"",
                            String::from_utf8_lossy(&key)
                        )));
                    }
                }
                Next::Continuation(composite_type) => {
                    let header = self.expect_continuation(composite_type)?;
                    self.tracker.continue_chunk(header.size, header.terminated);
                }
            }
        }
        self.count += 1;
        Ok(true)
    }

    fn value(&mut self, header: Header) -> Result<()> {
        match header.composite_type {
            CompositeType::Bytes => {
                self.skip_chunked(header, false)?;
                self.tracker.value_done();
                Ok(())
            }
            CompositeType::KeyValue => {
                self.skip_chunked(header, false)?;
                self.tracker.open_key_value()
            }
            CompositeType::Sequence => self
                .tracker
                .open_sequence(header.size, header.terminated),
            CompositeType::Map => self.tracker.open_map(
                header.size,
                header.terminated,
                self.options.rejects_duplicate_keys(),
            ),
        }
    }

    /// Read a header. A clean end of input is only allowed where `at_boundary` is set.
    fn read_header(&mut self, at_boundary: bool) -> Result<Option<Header>> {
        let header = match Header::read(&mut self.reader)? {
            Some(header) => header,
            None if at_boundary => return Ok(None),
            None => {
                return Err(Error::Truncated {
                    step: "decode header",
                    actual: 0,
                    expected: 1,
                })
            }
        };
        self.offset += if header.is_long() { 2 } else { 1 };
        if self.options.requires_minimal_headers() && !header.is_minimal() {
            return Err(self.violation(format!(
                "{} header holds size {} in the long form",
                header.composite_type.name(),
                header.size
            )));
        }
        Ok(Some(header))
    }

    fn expect_header(&mut self) -> Result<Header> {
        self.read_header(false)?.ok_or(Error::Truncated {
            step: "decode header",
            actual: 0,
            expected: 1,
        })
    }

    fn expect_continuation(&mut self, composite_type: CompositeType) -> Result<Header> {
        let header = self.expect_header()?;
        if header.composite_type != composite_type {
            return Err(self.violation(format!(
                "{} continued by a {} chunk",
                composite_type.name(),
                header.composite_type.name()
            )));
        }
        Ok(header)
    }

    /// Get through a chunked byte payload, optionally keeping its bytes.
    fn skip_chunked(&mut self, first: Header, keep: bool) -> Result<Option<Vec<u8>>> {
        let composite_type = first.composite_type;
        let mut kept = if keep { Some(Vec::new()) } else { None };
        let mut header = first;
        loop {
            match kept {
                Some(ref mut buf) => self.read_payload(header.size, buf)?,
                None => self.skip_payload(header.size)?,
            }
            if header.terminated {
                return Ok(kept);
            }
            header = self.expect_continuation(composite_type)?;
        }
    }

    fn skip_payload(&mut self, len: usize) -> Result<()> {
        let skipped = io::copy(&mut self.reader.by_ref().take(len as u64), &mut io::sink())?;
        self.offset += skipped;
        if skipped < len as u64 {
            return Err(Error::Truncated {
                step: "get chunk payload",
                actual: skipped as usize,
                expected: len,
            });
        }
        Ok(())
    }

    fn read_payload(&mut self, len: usize, buf: &mut Vec<u8>) -> Result<()> {
        let read = self.reader.by_ref().take(len as u64).read_to_end(buf)?;
        self.offset += read as u64;
        if read < len {
            return Err(Error::Truncated {
                step: "get chunk payload",
                actual: read,
                expected: len,
            });
        }
        Ok(())
    }

    fn violation(&self, msg: String) -> Error {
        debug!(
            offset = self.offset,
            depth = self.tracker.depth(),
            "rejecting value: {}",
            msg
        );
        Error::ProtocolViolation(msg)
    }
}

/// Validate every value in a byte source, returning how many top-level values it held.
pub fn validate<R: Read>(reader: R) -> Result<usize> {
    Validator::new(reader).validate_all()
}

pub fn validate_with_options<R: Read>(reader: R, options: DecodeOptions) -> Result<usize> {
    Validator::with_options(reader, options).validate_all()
}

/// Validate every value in a byte slice.
pub fn validate_slice(data: &[u8]) -> Result<usize> {
    validate(data)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::encode_to_vec;
    use crate::error::ErrorKind;
    use crate::options::{DuplicateKeys, HeaderWidths};
    use crate::value::Value;

    fn kind_of(data: &[u8]) -> ErrorKind {
        validate_slice(data).unwrap_err().kind()
    }

    #[test]
    fn map_consumes_whole_buffer() {
        let map: Value = vec![
            ("test1", Value::from("hello")),
            ("test2", Value::from("world")),
        ]
        .into_iter()
        .collect();
        let enc = encode_to_vec(&map).unwrap();
        let mut validator = Validator::new(enc.as_slice());
        assert!(validator.validate_next().unwrap());
        assert_eq!(validator.offset(), enc.len() as u64);
        assert!(!validator.validate_next().unwrap());
        assert_eq!(validator.count(), 1);
    }

    #[test]
    fn counts_values() {
        assert_eq!(validate_slice(&[]).unwrap(), 0);
        let mut data = encode_to_vec(&Value::Bytes(vec![5u8; 9000])).unwrap();
        data.extend(encode_to_vec(&Value::Sequence(vec![Value::from("a"); 5000])).unwrap());
        data.extend(encode_to_vec(&Value::key_value("id", "world")).unwrap());
        assert_eq!(validate_slice(&data).unwrap(), 3);
    }

    #[test]
    fn nested_key_value_in_map() {
        let map: Value = vec![("entry", Value::key_value("id", "world"))]
            .into_iter()
            .collect();
        let enc = encode_to_vec(&map).unwrap();
        assert_eq!(validate_slice(&enc).unwrap(), 1);
    }

    #[test]
    fn truncated_prefixes() {
        let value = Value::Sequence(vec![
            Value::Bytes(vec![1u8; 4500]),
            vec![("test1", Value::from("hello"))].into_iter().collect(),
            Value::key_value("id", "world"),
        ]);
        let enc = encode_to_vec(&value).unwrap();
        for len in 1..enc.len() {
            assert_eq!(kind_of(&enc[..len]), ErrorKind::Truncated, "length {}", len);
        }
    }

    #[test]
    fn violations() {
        assert_eq!(kind_of(&[0x01, b'a', 0xc1, b'b']), ErrorKind::ProtocolViolation);
        assert_eq!(kind_of(&[0x21, 0x80, 0xe0]), ErrorKind::ProtocolViolation);
        assert_eq!(kind_of(&[0xe1, 0x81, b'k', 0x80]), ErrorKind::ProtocolViolation);
        assert_eq!(
            kind_of(&[0x61, 0xc1, b'k', 0x80, 0xa0]),
            ErrorKind::ProtocolViolation
        );
    }

    #[test]
    fn header_widths() {
        let data = [0x90, 0x02, b'a', b'b', b'c'];
        assert_eq!(kind_of(&data), ErrorKind::ProtocolViolation);
        let opts = DecodeOptions::new().with_header_widths(HeaderWidths::Lenient);
        assert_eq!(validate_with_options(&data[..], opts).unwrap(), 1);
    }

    #[test]
    fn duplicate_keys() {
        let data = [0xe2, 0xc1, b'k', 0x81, b'1', 0xc1, b'k', 0x81, b'2'];
        assert_eq!(validate_slice(&data).unwrap(), 1);
        let opts = DecodeOptions::new().with_duplicate_keys(DuplicateKeys::Reject);
        let err = validate_with_options(&data[..], opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn duplicate_keys_in_nested_maps_are_separate() {
        // {"k": {"k": ""}}
        let data = [0xe1, 0xc1, b'k', 0xe1, 0xc1, b'k', 0x80];
        let opts = DecodeOptions::new().with_duplicate_keys(DuplicateKeys::Reject);
        assert_eq!(validate_with_options(&data[..], opts).unwrap(), 1);
    }

    #[test]
    fn truncated_payload_reports_bytes_read() {
        // Key chunk announces 5 bytes but only 2 follow
        let data = [0xe1, 0xc5, b'a', b'b'];
        let opts = DecodeOptions::new().with_duplicate_keys(DuplicateKeys::Reject);
        for opts in [DecodeOptions::default(), opts] {
            let mut validator = Validator::with_options(&data[..], opts);
            match validator.validate_next() {
                Err(Error::Truncated {
                    step,
                    actual,
                    expected,
                }) => {
                    assert_eq!(step, "get chunk payload");
                    assert_eq!(actual, 2);
                    assert_eq!(expected, 5);
                }
                other => panic!("expected truncation, got {:?}", other),
            }
            assert_eq!(validator.offset(), data.len() as u64);
        }
    }

    #[test]
    fn depth_limit() {
        let mut data = vec![0xa1; 1_000_000];
        data.push(0x80);
        assert_eq!(kind_of(&data), ErrorKind::ParseLimit);

        let mut data = vec![0xa1; crate::MAX_DEPTH];
        data.push(0x80);
        assert_eq!(validate_slice(&data).unwrap(), 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn reader_failure() {
        let err = validate(FailingReader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn reads_through_chained_sources() {
        let enc = encode_to_vec(&Value::Bytes(vec![8u8; 6000])).unwrap();
        let (a, b) = enc.split_at(3000);
        assert_eq!(validate(a.chain(b)).unwrap(), 1);
    }
}
