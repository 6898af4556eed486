//! Binary Codec
//!
//! A growable writer / borrowing reader pair used by every wire and file
//! format in the crate. The byte order is chosen per stream: live host/client
//! traffic is little-endian, replay containers are big-endian.
//!
//! ## Strings
//!
//! - `string`: varint byte length followed by UTF-8.
//! - `opt_string`: varint `0` for none, `N + 1` for a string of `N` bytes.
//! - `short_string`: single byte length followed by UTF-8.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

/// Maximum number of bytes a varint may occupy.
pub const MAX_VARINT_BYTES: usize = 5;

/// Byte order of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first (live protocol)
    Little,
    /// Most significant byte first (replay container)
    Big,
}

/// Errors raised while decoding binary data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Buffer ended before a value was complete.
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// String bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// String exceeds the length its field allows.
    #[error("string too long: {len} > {max}")]
    StringTooLong {
        /// Actual length
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// Payload could not be compressed.
    #[error("deflate failed: {0}")]
    Deflate(String),

    /// Deflate payload could not be decompressed.
    #[error("inflate failed: {0}")]
    Inflate(String),

    /// A type tag has no registered decoder.
    #[error("unknown {kind} tag {tag}")]
    UnknownTag {
        /// What was being decoded
        kind: &'static str,
        /// The offending tag
        tag: u8,
    },

    /// A field holds a value outside its domain.
    #[error("invalid value {value} for {field}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: i64,
    },

    /// Bytes decoded cleanly but describe an invalid object.
    #[error("invalid {kind}: {reason}")]
    Invalid {
        /// What was being decoded
        kind: &'static str,
        /// Validation failure
        reason: String,
    },
}

/// Result alias for decoding.
pub type CodecResult<T> = Result<T, CodecError>;

// =============================================================================
// WRITER
// =============================================================================

/// Growable byte buffer writer.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    buf: Vec<u8>,
    endian: Endian,
}

macro_rules! write_fixed {
    ($name:ident, $ty:ty, $size:expr, $method:ident) => {
        #[doc = concat!("Write a `", stringify!($ty), "` in the stream's byte order.")]
        #[inline]
        pub fn $name(&mut self, value: $ty) {
            let mut bytes = [0u8; $size];
            match self.endian {
                Endian::Little => LittleEndian::$method(&mut bytes, value),
                Endian::Big => BigEndian::$method(&mut bytes, value),
            }
            self.buf.extend_from_slice(&bytes);
        }
    };
}

impl StreamWriter {
    /// Create an empty writer.
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    /// Create a little-endian writer (live protocol).
    pub fn little() -> Self {
        Self::new(Endian::Little)
    }

    /// Create a big-endian writer (replay container).
    pub fn big() -> Self {
        Self::new(Endian::Big)
    }

    /// Byte order of this stream.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a signed byte.
    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    /// Write a boolean as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    write_fixed!(write_u16, u16, 2, write_u16);
    write_fixed!(write_i16, i16, 2, write_i16);
    write_fixed!(write_u32, u32, 4, write_u32);
    write_fixed!(write_i32, i32, 4, write_i32);
    write_fixed!(write_f32, f32, 4, write_f32);
    write_fixed!(write_f64, f64, 8, write_f64);

    /// Write a LEB128 varint (at most 5 bytes).
    pub fn write_varint(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Write raw bytes with no prefix.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a varint length followed by the bytes.
    pub fn write_len_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    /// Write a varint-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_len_bytes(value.as_bytes());
    }

    /// Write an optional string (`0` = none, `N + 1` = length `N`).
    pub fn write_opt_string(&mut self, value: Option<&str>) {
        match value {
            None => self.write_varint(0),
            Some(s) => {
                self.write_varint(s.len() as u32 + 1);
                self.write_bytes(s.as_bytes());
            }
        }
    }

    /// Write a string with a single byte length prefix.
    pub fn write_short_string(&mut self, value: &str) -> CodecResult<()> {
        let len = value.len();
        if len > u8::MAX as usize {
            return Err(CodecError::StringTooLong { len, max: u8::MAX as usize });
        }
        self.write_u8(len as u8);
        self.write_bytes(value.as_bytes());
        Ok(())
    }
}

// =============================================================================
// READER
// =============================================================================

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! read_fixed {
    ($name:ident, $ty:ty, $size:expr, $method:ident) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the stream's byte order.")]
        #[inline]
        pub fn $name(&mut self) -> CodecResult<$ty> {
            let bytes = self.take($size)?;
            Ok(match self.endian {
                Endian::Little => LittleEndian::$method(bytes),
                Endian::Big => BigEndian::$method(bytes),
            })
        }
    };
}

impl<'a> StreamReader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, pos: 0, endian }
    }

    /// Create a little-endian reader (live protocol).
    pub fn little(data: &'a [u8]) -> Self {
        Self::new(data, Endian::Little)
    }

    /// Create a big-endian reader (replay container).
    pub fn big(data: &'a [u8]) -> Self {
        Self::new(data, Endian::Big)
    }

    /// Byte order of this stream.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if the buffer is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, needed: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(CodecError::UnexpectedEof { needed, remaining });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> CodecResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a boolean (any non-zero byte is true).
    #[inline]
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_fixed!(read_u16, u16, 2, read_u16);
    read_fixed!(read_i16, i16, 2, read_i16);
    read_fixed!(read_u32, u32, 4, read_u32);
    read_fixed!(read_i32, i32, 4, read_i32);
    read_fixed!(read_f32, f32, 4, read_f32);
    read_fixed!(read_f64, f64, 8, read_f64);

    /// Read a LEB128 varint folded to `u32`.
    ///
    /// At most five bytes are consumed; bits beyond 32 are discarded.
    pub fn read_varint(&mut self) -> CodecResult<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u32).wrapping_shl(7 * i as u32);
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.take(len)
    }

    /// Read a varint length followed by that many bytes.
    pub fn read_len_bytes(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    /// Read everything left in the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    fn utf8(bytes: &[u8]) -> CodecResult<String> {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read a varint-length-prefixed string.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let bytes = self.read_len_bytes()?;
        Self::utf8(bytes)
    }

    /// Read an optional string (`0` = none, `N + 1` = length `N`).
    pub fn read_opt_string(&mut self) -> CodecResult<Option<String>> {
        match self.read_varint()? {
            0 => Ok(None),
            n => {
                let bytes = self.take(n as usize - 1)?;
                Self::utf8(bytes).map(Some)
            }
        }
    }

    /// Read a string with a single byte length prefix.
    pub fn read_short_string(&mut self) -> CodecResult<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Self::utf8(bytes)
    }

    /// Read a string and reject it when longer than `max` characters.
    pub fn read_string_max(&mut self, max: usize) -> CodecResult<String> {
        let s = self.read_string()?;
        let len = s.chars().count();
        if len > max {
            return Err(CodecError::StringTooLong { len, max });
        }
        Ok(s)
    }

    /// Read an optional string and reject it when longer than `max` characters.
    pub fn read_opt_string_max(&mut self, max: usize) -> CodecResult<Option<String>> {
        match self.read_opt_string()? {
            Some(s) if s.chars().count() > max => Err(CodecError::StringTooLong {
                len: s.chars().count(),
                max,
            }),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_width_endianness() {
        let mut le = StreamWriter::little();
        le.write_u32(0x0102_0304);
        assert_eq!(le.as_bytes(), &[4, 3, 2, 1]);

        let mut be = StreamWriter::big();
        be.write_u32(0x0102_0304);
        assert_eq!(be.as_bytes(), &[1, 2, 3, 4]);

        let mut r = StreamReader::big(be.as_bytes());
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert!(r.is_empty());
    }

    #[test]
    fn test_varint_encoding() {
        let mut w = StreamWriter::little();
        w.write_varint(0);
        w.write_varint(127);
        w.write_varint(128);
        w.write_varint(u32::MAX);
        assert_eq!(w.as_bytes(), &[0, 127, 0x80, 1, 0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn test_varint_stops_after_five_bytes() {
        // Continuation bit set on all five bytes: the 5th ends the varint anyway.
        let data = [0xff, 0xff, 0xff, 0xff, 0xff, 0x07];
        let mut r = StreamReader::little(&data);
        assert_eq!(r.read_varint().unwrap(), u32::MAX);
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_optional_string() {
        let mut w = StreamWriter::little();
        w.write_opt_string(None);
        w.write_opt_string(Some(""));
        w.write_opt_string(Some("gol"));
        assert_eq!(w.as_bytes(), &[0, 1, 4, b'g', b'o', b'l']);

        let mut r = StreamReader::little(w.as_bytes());
        assert_eq!(r.read_opt_string().unwrap(), None);
        assert_eq!(r.read_opt_string().unwrap(), Some(String::new()));
        assert_eq!(r.read_opt_string().unwrap(), Some("gol".to_string()));
    }

    #[test]
    fn test_truncated_buffer() {
        let mut r = StreamReader::little(&[1, 2]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::UnexpectedEof { needed: 4, remaining: 2 })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut r = StreamReader::little(&[2, 0xc3, 0x28]);
        assert_eq!(r.read_string(), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_short_string_limit() {
        let mut w = StreamWriter::little();
        let long = "x".repeat(300);
        assert!(matches!(
            w.write_short_string(&long),
            Err(CodecError::StringTooLong { len: 300, max: 255 })
        ));
        w.write_short_string("br").unwrap();
        assert_eq!(w.as_bytes(), &[2, b'b', b'r']);
    }

    proptest! {
        #[test]
        fn prop_varint_roundtrip(value in any::<u32>()) {
            let mut w = StreamWriter::little();
            w.write_varint(value);
            prop_assert!(w.len() <= MAX_VARINT_BYTES);
            let mut r = StreamReader::little(w.as_bytes());
            prop_assert_eq!(r.read_varint().unwrap(), value);
        }

        #[test]
        fn prop_string_roundtrip(s in "\\PC{0,64}") {
            let mut w = StreamWriter::big();
            w.write_string(&s);
            let mut r = StreamReader::big(w.as_bytes());
            prop_assert_eq!(r.read_string().unwrap(), s);
        }
    }
}
