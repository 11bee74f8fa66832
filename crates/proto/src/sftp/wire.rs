//! Primitive SFTP wire encoding helpers.
//!
//! All integers are big-endian. Strings are `uint32 length` followed by raw
//! bytes.

use bytes::{Buf, BufMut, BytesMut};
use skein_platform::{SkeinError, SkeinResult};

/// Appends an SFTP `string` (length-prefixed bytes).
pub(crate) fn put_string(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

/// Bounds-checked cursor over an SFTP payload.
#[derive(Debug)]
pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, len: usize, field: &str) -> SkeinResult<()> {
        if self.buf.len() < len {
            return Err(SkeinError::Protocol(format!(
                "Truncated {}: need {} bytes, have {}",
                field,
                len,
                self.buf.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn read_u32(&mut self, field: &str) -> SkeinResult<u32> {
        self.need(4, field)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn read_u64(&mut self, field: &str) -> SkeinResult<u64> {
        self.need(8, field)?;
        Ok(self.buf.get_u64())
    }

    pub(crate) fn read_string(&mut self, field: &str) -> SkeinResult<&'a [u8]> {
        let len = self.read_u32(field)? as usize;
        self.need(len, field)?;
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }

    /// Reads a string and decodes it as UTF-8, replacing invalid sequences.
    pub(crate) fn read_utf8_lossy(&mut self, field: &str) -> SkeinResult<String> {
        Ok(String::from_utf8_lossy(self.read_string(field)?).into_owned())
    }
}
