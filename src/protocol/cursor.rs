//! Primitive big-endian decoders over an in-memory byte buffer.
//!
//! This is the leaf of the pipeline: everything above it (the typed-value
//! decoder, the command parser, the reliable-message parser) reads through
//! a [`ByteReader`] rather than touching the buffer directly.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

use super::error::DecodeError;

/// A cursor over a byte slice that reads Photon's big-endian primitives.
///
/// Unlike a reader built on a `dyn BufRead` to support streaming from a
/// socket, this wraps a plain slice: packet bodies arrive as a single
/// reassembled buffer, never as a partial stream.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn require(&self, n: usize) -> Result<(), DecodeError> {
        if self.remaining() < n {
            Err(DecodeError::TruncatedInput)
        } else {
            Ok(())
        }
    }

    /// Reads a single unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.require(1)?;
        let v = self.rest().read_u8()?;
        self.pos += 1;
        Ok(v)
    }

    /// Reads a single signed byte.
    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.require(1)?;
        let v = self.rest().read_i8()?;
        self.pos += 1;
        Ok(v)
    }

    /// Reads a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.require(2)?;
        let v = self.rest().read_u16::<BigEndian>()?;
        self.pos += 2;
        Ok(v)
    }

    /// Reads a big-endian i16.
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.require(2)?;
        let v = self.rest().read_i16::<BigEndian>()?;
        self.pos += 2;
        Ok(v)
    }

    /// Reads a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.require(4)?;
        let v = self.rest().read_u32::<BigEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.require(4)?;
        let v = self.rest().read_i32::<BigEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.require(8)?;
        let v = self.rest().read_i64::<BigEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    /// Reads a big-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.require(4)?;
        let v = self.rest().read_f32::<BigEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads a big-endian f64.
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.require(8)?;
        let v = self.rest().read_f64::<BigEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.require(len)?;
        let v = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(v)
    }

    /// Reads a u16 length-prefixed UTF-8 string, replacing invalid sequences.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a u32 length-prefixed slice of signed bytes.
    pub fn read_i8_slice(&mut self) -> Result<Vec<i8>, DecodeError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().map(|&b| b as i8).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn reads_primitives_big_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let buf = [0x01];
        let mut r = ByteReader::new(&buf);
        assert_matches!(r.read_u32(), Err(DecodeError::TruncatedInput));
    }

    #[test]
    fn string_is_length_prefixed() {
        let buf = [0x00, 0x03, b'f', b'o', b'o'];
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "foo");
        assert_eq!(r.remaining(), 0);
    }
}
