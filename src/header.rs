//! Chunk headers.
//!
//! Every chunk starts with a 1- or 2-byte header:
//!
//! ```text
//!  byte 0                                          byte 1 (iff HEADER_SIZE)
//! +-------------+----------+--------------+-------------+-----------+  +-----------+
//! | TERMINATION | KEYVALUE | MULTIPLICITY | HEADER_SIZE | SIZE_HIGH |  | SIZE_LOW  |
//! |    0x80     |   0x40   |     0x20     |    0x10     |   0x0F    |  |   8 bits  |
//! +-------------+----------+--------------+-------------+-----------+  +-----------+
//! ```
//!
//! A short header holds sizes 0 to 15 directly. A long header holds `size - 1` in 12 bits, so it
//! covers 1 to 4096.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::{MAX_CHUNK_LEN, MAX_SHORT_LEN};

pub const TERMINATION_BIT: u8 = 0b1000_0000;
pub const KEYVALUE_BIT: u8 = 0b0100_0000;
pub const MULTIPLICITY_BIT: u8 = 0b0010_0000;
pub const HEADER_SIZE_BIT: u8 = 0b0001_0000;
pub const SIZE_HIGH_MASK: u8 = 0b0000_1111;

/// The four-way value discriminant carried by the KEYVALUE and MULTIPLICITY bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeType {
    Bytes,
    KeyValue,
    Sequence,
    Map,
}

impl CompositeType {
    /// Pull the composite type out of the first header byte. Every byte has one.
    pub fn from_u8(n: u8) -> CompositeType {
        match (n & KEYVALUE_BIT != 0, n & MULTIPLICITY_BIT != 0) {
            (false, false) => CompositeType::Bytes,
            (true, false) => CompositeType::KeyValue,
            (false, true) => CompositeType::Sequence,
            (true, true) => CompositeType::Map,
        }
    }

    /// The type flag bits, already in header position.
    pub fn flags(self) -> u8 {
        match self {
            CompositeType::Bytes => 0,
            CompositeType::KeyValue => KEYVALUE_BIT,
            CompositeType::Sequence => MULTIPLICITY_BIT,
            CompositeType::Map => KEYVALUE_BIT | MULTIPLICITY_BIT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompositeType::Bytes => "Bytes",
            CompositeType::KeyValue => "KeyValue",
            CompositeType::Sequence => "Sequence",
            CompositeType::Map => "Map",
        }
    }
}

/// A parsed chunk header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub composite_type: CompositeType,
    /// Payload length for Bytes and KeyValue chunks, element count for Sequence and Map chunks.
    pub size: usize,
    /// False if another chunk of the same type continues this value.
    pub terminated: bool,
    long: bool,
}

impl Header {
    pub fn new(composite_type: CompositeType, size: usize, terminated: bool) -> Self {
        Self {
            composite_type,
            size,
            terminated,
            long: size > MAX_SHORT_LEN,
        }
    }

    /// True if this header was read in the 2-byte form.
    pub fn is_long(&self) -> bool {
        self.long
    }

    /// False for a 2-byte header whose size would have fit in a single byte.
    pub fn is_minimal(&self) -> bool {
        !self.long || self.size > MAX_SHORT_LEN
    }

    /// Number of bytes [`Header::write`] produces for this header.
    pub fn encoded_len(&self) -> usize {
        if self.size <= MAX_SHORT_LEN {
            1
        } else {
            2
        }
    }

    /// Write the header out in its minimal form, returning the number of bytes written.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        if self.size > MAX_CHUNK_LEN {
            return Err(Error::Overflow {
                max: MAX_CHUNK_LEN,
                actual: self.size,
            });
        }
        let mut flags = self.composite_type.flags();
        if self.terminated {
            flags |= TERMINATION_BIT;
        }
        if self.size <= MAX_SHORT_LEN {
            writer.write_u8(flags | self.size as u8)?;
            Ok(1)
        } else {
            let word = (u16::from(flags | HEADER_SIZE_BIT) << 8) | (self.size - 1) as u16;
            writer.write_u16::<BigEndian>(word)?;
            Ok(2)
        }
    }

    /// Parse a header from the start of `data`, returning the bytes consumed alongside it.
    pub fn decode(data: &[u8]) -> Result<(usize, Header)> {
        let first = *data.first().ok_or(Error::Truncated {
            step: "decode header",
            actual: 0,
            expected: 1,
        })?;
        if first & HEADER_SIZE_BIT == 0 {
            return Ok((1, Header::from_short(first)));
        }
        let mut buf = data;
        let word = buf
            .read_u16::<BigEndian>()
            .map_err(|_| Error::Truncated {
                step: "decode long header",
                actual: data.len(),
                expected: 2,
            })?;
        Ok((2, Header::from_long(word)))
    }

    /// Read a header from a byte source. Returns `Ok(None)` if the source ended cleanly before
    /// the first header byte.
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Header>> {
        let mut first = [0u8; 1];
        loop {
            match reader.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let first = first[0];
        if first & HEADER_SIZE_BIT == 0 {
            return Ok(Some(Header::from_short(first)));
        }
        let low = reader
            .read_u8()
            .map_err(|e| eof_as_truncated(e, "decode long header", 1, 2))?;
        Ok(Some(Header::from_long(u16::from_be_bytes([first, low]))))
    }

    fn from_short(byte: u8) -> Header {
        Header {
            composite_type: CompositeType::from_u8(byte),
            size: (byte & SIZE_HIGH_MASK) as usize,
            terminated: byte & TERMINATION_BIT != 0,
            long: false,
        }
    }

    fn from_long(word: u16) -> Header {
        let first = (word >> 8) as u8;
        Header {
            composite_type: CompositeType::from_u8(first),
            size: (word & 0x0FFF) as usize + 1,
            terminated: first & TERMINATION_BIT != 0,
            long: true,
        }
    }
}

/// Map an unexpected end-of-file from a reader onto [`Error::Truncated`], passing any other I/O
/// failure through.
pub(crate) fn eof_as_truncated(
    err: io::Error,
    step: &'static str,
    actual: usize,
    expected: usize,
) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated {
            step,
            actual,
            expected,
        }
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    const TYPES: [CompositeType; 4] = [
        CompositeType::Bytes,
        CompositeType::KeyValue,
        CompositeType::Sequence,
        CompositeType::Map,
    ];

    fn encode(ty: CompositeType, size: usize, terminated: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        Header::new(ty, size, terminated).write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn roundtrip_all_counts() {
        for ty in TYPES {
            for terminated in [false, true] {
                for count in 0..=MAX_CHUNK_LEN {
                    let enc = encode(ty, count, terminated);
                    if count <= MAX_SHORT_LEN {
                        assert_eq!(enc.len(), 1, "count {} should use a short header", count);
                    } else {
                        assert_eq!(enc.len(), 2, "count {} should use a long header", count);
                    }
                    let (used, header) = Header::decode(&enc).unwrap();
                    assert_eq!(used, enc.len());
                    assert_eq!(header.composite_type, ty);
                    assert_eq!(header.size, count);
                    assert_eq!(header.terminated, terminated);
                    assert!(header.is_minimal());
                }
            }
        }
    }

    #[test]
    fn known_bytes() {
        assert_eq!(encode(CompositeType::Bytes, 5, true), &[0x85]);
        assert_eq!(encode(CompositeType::Bytes, 0, false), &[0x00]);
        assert_eq!(encode(CompositeType::KeyValue, 2, true), &[0xc2]);
        assert_eq!(encode(CompositeType::Sequence, 15, true), &[0xaf]);
        assert_eq!(encode(CompositeType::Map, 2, true), &[0xe2]);
        assert_eq!(encode(CompositeType::Bytes, 16, true), &[0x90, 0x0f]);
        assert_eq!(encode(CompositeType::Bytes, 4096, false), &[0x1f, 0xff]);
        assert_eq!(encode(CompositeType::Map, 4096, true), &[0xff, 0xff]);
    }

    #[test]
    fn overflow() {
        let mut buf = Vec::new();
        let err = Header::new(CompositeType::Bytes, MAX_CHUNK_LEN + 1, true)
            .write(&mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert!(buf.is_empty());
    }

    #[test]
    fn truncated() {
        let err = Header::decode(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
        let err = Header::decode(&[0x90]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn every_first_byte_parses() {
        for first in 0..=u8::MAX {
            let (used, header) = Header::decode(&[first, 0x00]).unwrap();
            assert_eq!(used, if first & HEADER_SIZE_BIT != 0 { 2 } else { 1 });
            assert_eq!(header.terminated, first & TERMINATION_BIT != 0);
        }
    }

    #[test]
    fn non_minimal_detected() {
        // Long form holding a size of 3
        let (_, header) = Header::decode(&[0x90, 0x02]).unwrap();
        assert_eq!(header.size, 3);
        assert!(header.is_long());
        assert!(!header.is_minimal());
        // Smallest long-form value that can't be short
        let (_, header) = Header::decode(&[0x90, 0x0f]).unwrap();
        assert_eq!(header.size, 16);
        assert!(header.is_minimal());
    }

    #[test]
    fn read_from_source() {
        let mut src: &[u8] = &[];
        assert!(Header::read(&mut src).unwrap().is_none());

        let mut src: &[u8] = &[0xe2, 0x90, 0x0f];
        let header = Header::read(&mut src).unwrap().unwrap();
        assert_eq!(header, Header::new(CompositeType::Map, 2, true));
        let header = Header::read(&mut src).unwrap().unwrap();
        assert_eq!(header, Header::new(CompositeType::Bytes, 16, true));
        assert!(Header::read(&mut src).unwrap().is_none());

        let mut src: &[u8] = &[0x90];
        let err = Header::read(&mut src).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }
}
