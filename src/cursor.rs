//! Bounded little-endian reader over a byte slice.
//!
//! Every stream read goes through here, so a malformed or truncated stream
//! fails with [`LercError::UnexpectedEof`] instead of reading out of bounds.

use crate::error::LercError;

#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], LercError> {
        if n > self.data.len() {
            return Err(LercError::UnexpectedEof);
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    /// Split off a sub-cursor over the next `n` bytes and advance past them.
    ///
    /// Length-prefixed payloads are parsed through the sub-cursor, so they
    /// cannot read past their declared end no matter what they contain.
    pub(crate) fn take(&mut self, n: usize) -> Result<Cursor<'a>, LercError> {
        Ok(Cursor::new(self.read_bytes(n)?))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, LercError> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, LercError> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, LercError> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Little-endian unsigned integer stored in `width` bytes, `width <= 4`.
    pub(crate) fn read_uint(&mut self, width: usize) -> Result<u32, LercError> {
        let b = self.read_bytes(width)?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(b);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, LercError> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, LercError> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}
