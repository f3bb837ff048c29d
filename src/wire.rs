//! Little-endian primitives for the container byte layout
//!
//! All integers are little-endian. Strings are UTF-8 with a u16 or u32
//! length prefix; byte blobs carry a u64 length prefix.

use crate::error::{DamdError, Result};

/// Append-only encoder over a byte buffer
#[derive(Debug, Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn put_raw(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Strings short enough for a u16 prefix (keys, checksums)
    pub fn put_str16(&mut self, value: &str) {
        debug_assert!(value.len() <= u16::MAX as usize);
        self.put_u16(value.len() as u16);
        self.put_raw(value.as_bytes());
    }

    pub fn put_str32(&mut self, value: &str) {
        debug_assert!(value.len() <= u32::MAX as usize);
        self.put_u32(value.len() as u32);
        self.put_raw(value.as_bytes());
    }

    pub fn put_blob(&mut self, value: &[u8]) {
        self.put_u64(value.len() as u64);
        self.put_raw(value);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bounds-checked decoder over a borrowed byte slice
///
/// Every read that would run past the end fails with `MalformedRecord`.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(DamdError::malformed(format!(
                "{} needs {} bytes at offset {}, only {} left",
                what,
                len,
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N, what)?);
        Ok(array)
    }

    pub fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take_array::<1>(what)?[0])
    }

    pub fn u16(&mut self, what: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array(what)?))
    }

    pub fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array(what)?))
    }

    pub fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array(what)?))
    }

    pub fn f64(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_bits(self.u64(what)?))
    }

    pub fn str16(&mut self, what: &str) -> Result<String> {
        let len = self.u16(what)? as usize;
        self.utf8(len, what)
    }

    pub fn str32(&mut self, what: &str) -> Result<String> {
        let len = self.u32(what)? as usize;
        self.utf8(len, what)
    }

    pub fn blob(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u64(what)?;
        let len = usize::try_from(len)
            .map_err(|_| DamdError::malformed(format!("{} length {} overflows", what, len)))?;
        self.take(len, what)
    }

    fn utf8(&mut self, len: usize, what: &str) -> Result<String> {
        let raw = self.take(len, what)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| DamdError::malformed(format!("{} is not valid UTF-8", what)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut w = Writer::with_capacity(64);
        w.put_u8(7);
        w.put_u16(0xBEEF);
        w.put_u32(42);
        w.put_f64(1.5);
        w.put_str16("key");
        w.put_str32("text/plain");
        w.put_blob(&[1, 2, 3]);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.u8("a").unwrap(), 7);
        assert_eq!(r.u16("b").unwrap(), 0xBEEF);
        assert_eq!(r.u32("c").unwrap(), 42);
        assert_eq!(r.f64("d").unwrap(), 1.5);
        assert_eq!(r.str16("e").unwrap(), "key");
        assert_eq!(r.str32("f").unwrap(), "text/plain");
        assert_eq!(r.blob("g").unwrap(), &[1, 2, 3]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read_is_malformed() {
        let mut r = Reader::new(&[1, 0]);
        assert!(matches!(r.u32("count"), Err(DamdError::MalformedRecord(_))));

        // Length prefix claims more than is present
        let mut w = Writer::default();
        w.put_u64(1_000);
        w.put_raw(b"abc");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(r.blob("stored"), Err(DamdError::MalformedRecord(_))));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut w = Writer::default();
        w.put_u16(2);
        w.put_raw(&[0xC3, 0x28]);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(r.str16("key"), Err(DamdError::MalformedRecord(_))));
    }
}
