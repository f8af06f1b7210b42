// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

// A cursor over an immutable byte slice, used by every packet decoder to pull fixed-width
// integers, length-prefixed strings and binary blobs off the wire without copying the whole
// buffer up front.

use byteorder::{BigEndian, ByteOrder};

use crate::error::DecodeError;

pub struct ByteArray<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteArray<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if the buffer is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if fewer than two bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(BigEndian::read_u16(bytes))
    }

    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if fewer than four bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(BigEndian::read_u32(bytes))
    }

    /// Reads a two-byte-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if the buffer runs out, or
    /// `DecodeError::InvalidUtf8String` if the bytes are not well-formed UTF-8.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8String)
    }

    /// Reads a two-byte-length-prefixed binary blob.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if the buffer runs out.
    pub fn read_binary(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u16()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Reads the remainder of the buffer verbatim (used for PUBLISH payloads, which have no
    /// length prefix of their own — the outer remaining-length bounds them).
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.offset..];
        self.offset = self.data.len();
        slice
    }
}

/// Append a two-byte-length-prefixed UTF-8 string to `buf`.
pub fn write_string(s: &str, buf: &mut Vec<u8>) {
    #[allow(clippy::cast_possible_truncation)]
    let len = s.len() as u16;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Append a two-byte-length-prefixed binary blob to `buf`.
pub fn write_binary(data: &[u8], buf: &mut Vec<u8>) {
    #[allow(clippy::cast_possible_truncation)]
    let len = data.len() as u16;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
}

/// Byte length a string will occupy on the wire, including its two-byte length prefix.
#[must_use]
pub fn string_bytes(s: &str) -> usize {
    2 + s.len()
}

/// Byte length a binary blob will occupy on the wire, including its two-byte length prefix.
#[must_use]
pub fn binary_bytes(data: &[u8]) -> usize {
    2 + data.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_in_order() {
        let buf = [0x00, 0x03, b'a', b'b', b'c', 0x01, 0x02];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_string().unwrap(), "abc");
        assert_eq!(ba.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let buf = [0x00, 0x01, 0xff];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_string(), Err(DecodeError::InvalidUtf8String));
    }

    #[test]
    fn read_past_end_is_unexpected_eof() {
        let buf = [0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(ba.read_u16(), Err(DecodeError::UnexpectedEof));
    }
}
