//! Record stream
//!
//! A write record is a flat sequence of `(property uid, encoded value)` pairs
//! with no count and no terminator: the consumer stops when the stream is
//! exhausted. Every scalar is little-endian; blobs and strings carry a `u32`
//! length prefix.
//!
//! ```text
//! +-----------+---------------+-----------+---------------+----
//! | uid (i32) | value (n1 B)  | uid (i32) | value (n2 B)  | ...
//! +-----------+---------------+-----------+---------------+----
//! ```
//!
//! The cursor only moves forward. A handler that reads more or less than its
//! own value desynchronizes every pair after it.

use super::PropertyUid;

/// Decoding errors raised by [`RecordStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Fewer bytes remain than the next read needs
    Truncated { wanted: usize, remaining: usize },

    /// A string value is not valid UTF-8
    InvalidUtf8 { position: usize },
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Truncated { wanted, remaining } => write!(
                f,
                "record truncated: wanted {} bytes, {} remaining",
                wanted, remaining
            ),
            StreamError::InvalidUtf8 { position } => {
                write!(f, "invalid UTF-8 string at offset {}", position)
            }
        }
    }
}

impl std::error::Error for StreamError {}

/// Forward-only cursor over one entity's write record
#[derive(Debug, Clone)]
pub struct RecordStream<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Read a little-endian `", stringify!($ty), "`")]
        pub fn $name(&mut self) -> Result<$ty, StreamError> {
            let bytes = self.take(std::mem::size_of::<$ty>())?;
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            buf.copy_from_slice(bytes);
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

impl<'a> RecordStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StreamError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(StreamError::Truncated {
                wanted: n,
                remaining,
            });
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    read_le!(read_i8, i8);
    read_le!(read_u8, u8);
    read_le!(read_i16, i16);
    read_le!(read_u16, u16);
    read_le!(read_i32, i32);
    read_le!(read_u32, u32);
    read_le!(read_i64, i64);
    read_le!(read_u64, u64);
    read_le!(read_f32, f32);
    read_le!(read_f64, f64);

    /// Read the uid heading the next pair
    pub fn read_uid(&mut self) -> Result<PropertyUid, StreamError> {
        self.read_i32()
    }

    /// Read exactly `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], StreamError> {
        self.take(n)
    }

    /// Read a `u32` length-prefixed blob
    ///
    /// The length prefix is consumed even if the body turns out truncated.
    pub fn read_blob(&mut self) -> Result<&'a [u8], StreamError> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Read a `u32` length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<&'a str, StreamError> {
        let position = self.pos;
        let bytes = self.read_blob()?;
        std::str::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8 { position })
    }
}

/// Builder producing a write record in the [`RecordStream`] layout
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    buf: Vec<u8>,
}

macro_rules! write_le {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Append a little-endian `", stringify!($ty), "`")]
        pub fn $name(&mut self, v: $ty) -> &mut Self {
            self.buf.extend_from_slice(&v.to_le_bytes());
            self
        }
    };
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pair by writing its property uid
    pub fn uid(&mut self, uid: PropertyUid) -> &mut Self {
        self.put_i32(uid)
    }

    write_le!(put_i8, i8);
    write_le!(put_u8, u8);
    write_le!(put_i16, i16);
    write_le!(put_u16, u16);
    write_le!(put_i32, i32);
    write_le!(put_u32, u32);
    write_le!(put_i64, i64);
    write_le!(put_u64, u64);
    write_le!(put_f32, f32);
    write_le!(put_f64, f64);

    /// Append raw bytes without a length prefix
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a `u32` length-prefixed blob
    pub fn put_blob(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u32(bytes.len() as u32);
        self.put_bytes(bytes)
    }

    pub fn put_string(&mut self, s: &str) -> &mut Self {
        self.put_blob(s.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_scalars() {
        let mut b = RecordBuilder::new();
        b.put_i8(-3).put_u16(512).put_i32(-70000).put_u64(1 << 40);
        b.put_f32(1.5).put_f64(-2.25);
        let bytes = b.into_bytes();

        let mut s = RecordStream::new(&bytes);
        assert_eq!(s.read_i8().unwrap(), -3);
        assert_eq!(s.read_u16().unwrap(), 512);
        assert_eq!(s.read_i32().unwrap(), -70000);
        assert_eq!(s.read_u64().unwrap(), 1 << 40);
        assert_eq!(s.read_f32().unwrap(), 1.5);
        assert_eq!(s.read_f64().unwrap(), -2.25);
        assert!(s.is_empty());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut b = RecordBuilder::new();
        b.uid(1);
        assert_eq!(b.as_bytes(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_strings_and_blobs() {
        let mut b = RecordBuilder::new();
        b.put_string("hello").put_blob(&[9, 8, 7]);
        let bytes = b.into_bytes();

        let mut s = RecordStream::new(&bytes);
        assert_eq!(s.read_string().unwrap(), "hello");
        assert_eq!(s.position(), 9);
        assert_eq!(s.read_blob().unwrap(), &[9, 8, 7]);
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn test_truncated_read() {
        let bytes = [1u8, 2];
        let mut s = RecordStream::new(&bytes);
        assert_eq!(
            s.read_i32(),
            Err(StreamError::Truncated {
                wanted: 4,
                remaining: 2
            })
        );
        // A failed read does not move the cursor
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn test_truncated_blob_body() {
        let mut b = RecordBuilder::new();
        b.put_u32(10).put_bytes(&[1, 2, 3]);
        let bytes = b.into_bytes();

        let mut s = RecordStream::new(&bytes);
        assert_eq!(
            s.read_blob(),
            Err(StreamError::Truncated {
                wanted: 10,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut b = RecordBuilder::new();
        b.put_blob(&[0xff, 0xfe]);
        let bytes = b.into_bytes();

        let mut s = RecordStream::new(&bytes);
        assert_eq!(
            s.read_string(),
            Err(StreamError::InvalidUtf8 { position: 0 })
        );
    }
}
