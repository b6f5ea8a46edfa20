//! Bounds-checked big-endian reads over an envelope buffer.

use bytes::Buf;

use super::envelope::EnvelopeError;

/// Cursor over the raw envelope that never panics on short input.
pub struct Reader<'a> {
    start: &'a [u8],
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            start: bytes,
            buf: bytes,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.start.len() - self.buf.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Everything consumed since offset `from`.
    pub fn consumed_since(&self, from: usize) -> &'a [u8] {
        &self.start[from..self.position()]
    }

    fn ensure(&self, n: usize, what: &'static str) -> Result<(), EnvelopeError> {
        if self.buf.remaining() < n {
            return Err(EnvelopeError::Truncated(what));
        }
        Ok(())
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8, EnvelopeError> {
        self.ensure(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self, what: &'static str) -> Result<u16, EnvelopeError> {
        self.ensure(2, what)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32, EnvelopeError> {
        self.ensure(4, what)?;
        Ok(self.buf.get_u32())
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64, EnvelopeError> {
        self.ensure(8, what)?;
        Ok(self.buf.get_u64())
    }

    /// Borrow the next `n` bytes.
    pub fn bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], EnvelopeError> {
        self.ensure(n, what)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Read a `u16` length prefix followed by that many bytes.
    pub fn u16_prefixed(&mut self, what: &'static str) -> Result<&'a [u8], EnvelopeError> {
        let len = self.u16(what)? as usize;
        self.bytes(len, what)
    }

    /// Read a fixed-size array.
    pub fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], EnvelopeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N, what)?);
        Ok(out)
    }
}
