use std::mem::size_of;

use Error::BufferTooSmall;

use crate::MAX_STRING_LEN;
use crate::error::Error;

/// Cursor over an XDR-style buffer: big-endian integers, strings
/// length-prefixed and zero-padded so every field starts on a 4-byte
/// boundary.
pub struct XdrCursor<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> XdrCursor<'a> {
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Reset the cursor to the beginning
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Read an u32 in big-endian format, advancing the cursor
    #[inline]
    pub fn try_get_u32(&mut self) -> Result<u32, Error> {
        const SIZE: usize = size_of::<u32>();

        if self.remaining() < SIZE {
            return Err(BufferTooSmall(SIZE, self.remaining()));
        }

        let bytes = &self.data[self.position..self.position + SIZE];
        let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.position += SIZE;
        Ok(value)
    }

    /// Write an u32 in big-endian format, advancing the cursor
    #[inline]
    pub fn try_put_u32(&mut self, value: u32) -> Result<(), Error> {
        const SIZE: usize = size_of::<u32>();

        if self.remaining() < SIZE {
            return Err(BufferTooSmall(SIZE, self.remaining()));
        }

        self.data[self.position..self.position + SIZE].copy_from_slice(&value.to_be_bytes());
        self.position += SIZE;
        Ok(())
    }

    /// Read a length-prefixed string, consuming the zero padding that
    /// aligns the next field.
    pub fn try_get_string(&mut self) -> Result<String, Error> {
        let len = self.try_get_u32()? as usize;

        if len > MAX_STRING_LEN {
            return Err(Error::StringTooLong(len));
        }

        let padded = padded_len(len);
        if self.remaining() < padded {
            return Err(BufferTooSmall(padded, self.remaining()));
        }

        let bytes = &self.data[self.position..self.position + len];
        let value = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidUtf8)?
            .to_string();
        self.position += padded;
        Ok(value)
    }

    /// Write a length-prefixed string, zero-padding to the next 4-byte
    /// boundary.
    pub fn try_put_string(&mut self, value: &str) -> Result<(), Error> {
        let len = value.len();

        if len > MAX_STRING_LEN {
            return Err(Error::StringTooLong(len));
        }

        self.try_put_u32(len as u32)?;

        let padded = padded_len(len);
        if self.remaining() < padded {
            return Err(BufferTooSmall(padded, self.remaining()));
        }

        self.data[self.position..self.position + len].copy_from_slice(value.as_bytes());
        self.data[self.position + len..self.position + padded].fill(0);
        self.position += padded;
        Ok(())
    }
}

/// A string's byte count rounded up to the next 4-byte boundary.
#[inline]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Wire footprint of a length-prefixed string: the length word plus the
/// padded bytes.
#[inline]
pub fn string_wire_size(value: &str) -> usize {
    size_of::<u32>() + padded_len(value.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trip_is_big_endian() {
        let mut buf = [0u8; 8];
        let mut cursor = XdrCursor::new(&mut buf);

        cursor.try_put_u32(0x12345678).unwrap();
        assert_eq!(cursor.position(), 4);

        cursor.reset();
        assert_eq!(cursor.try_get_u32().unwrap(), 0x12345678);
        assert_eq!(&buf[0..4], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn u32_bounds() {
        let mut buf = [0u8; 2];
        let mut cursor = XdrCursor::new(&mut buf);

        assert!(cursor.try_get_u32().is_err());
        assert!(cursor.try_put_u32(7).is_err());
    }

    #[test]
    fn string_padding() {
        // "cpu" occupies 4 bytes length + 3 bytes data + 1 pad byte
        let mut buf = [0xffu8; 8];
        let mut cursor = XdrCursor::new(&mut buf);

        cursor.try_put_string("cpu").unwrap();
        assert_eq!(cursor.position(), 8, "field ends on a 4-byte boundary");
        assert_eq!(&buf, &[0, 0, 0, 3, b'c', b'p', b'u', 0]);

        let mut cursor = XdrCursor::new(&mut buf);
        assert_eq!(cursor.try_get_string().unwrap(), "cpu");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn string_exact_multiple_has_no_padding() {
        let mut buf = [0u8; 8];
        let mut cursor = XdrCursor::new(&mut buf);

        cursor.try_put_string("load").unwrap();
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn string_too_long() {
        let long = "x".repeat(MAX_STRING_LEN + 1);
        let mut buf = vec![0u8; 2048];
        let mut cursor = XdrCursor::new(&mut buf);

        match cursor.try_put_string(&long) {
            Err(Error::StringTooLong(n)) => assert_eq!(n, MAX_STRING_LEN + 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn string_length_claims_more_than_buffer() {
        let mut buf = [0u8; 8];
        {
            let mut cursor = XdrCursor::new(&mut buf);
            cursor.try_put_u32(100).unwrap();
        }

        let mut cursor = XdrCursor::new(&mut buf);
        match cursor.try_get_string() {
            Err(Error::BufferTooSmall(needed, _)) => assert_eq!(needed, 100),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let mut buf = [0u8, 0, 0, 2, 0xff, 0xfe, 0, 0];
        let mut cursor = XdrCursor::new(&mut buf);

        assert!(matches!(cursor.try_get_string(), Err(Error::InvalidUtf8)));
    }

    #[test]
    fn padded_sizes() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(5), 8);
        assert_eq!(string_wire_size(""), 4);
        assert_eq!(string_wire_size("abcde"), 12);
    }
}
