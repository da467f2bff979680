//! The in-memory buffer (§4.2). The decoder issues many small reads and seeks while parsing;
//! those are cheapest against a `Vec<u8>` than against the upstream [`crate::io::IoAdapter`],
//! so the whole file is slurped once at open time and everything after that is served from here.

use crate::io::{IoAdapter, Whence};
use log::{debug, trace};

/// Bytes are slurped in this-sized increments until the upstream source reports EOF.
const GROWTH_INCREMENT: usize = 64 * 1024;

/// A random-access, in-memory copy of the whole file.
pub(crate) struct Buffer {
    data: Vec<u8>,
    pos: usize,
}

impl Buffer {
    /// Read `adapter`/`handle` to exhaustion and keep the result in memory.
    pub(crate) fn slurp<A: IoAdapter>(
        adapter: &A,
        handle: &mut A::Handle,
    ) -> crate::error::DecoderResult<Self> {
        let mut data = Vec::with_capacity(GROWTH_INCREMENT);
        loop {
            let start = data.len();
            data.resize(start + GROWTH_INCREMENT, 0);
            let n = adapter.read(handle, &mut data[start..])?;
            data.truncate(start + n);
            if n == 0 {
                break;
            }
        }
        data.shrink_to_fit();
        debug!("slurped {} bytes into memory", data.len());
        Ok(Self { data, pos: 0 })
    }

    #[cfg(test)]
    pub(crate) fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn tell(&self) -> usize {
        self.pos
    }

    pub(crate) fn seek(&mut self, offset: i64, whence: Whence) -> crate::error::DecoderResult<()> {
        let base: i64 = match whence {
            Whence::Begin => 0,
            Whence::Current => self.pos as i64,
            Whence::End => self.data.len() as i64,
        };
        let target = base
            .checked_add(offset)
            .ok_or_else(|| format_err!("seek offset overflow"))?;
        if target < 0 || target as usize > self.data.len() {
            return Err(format_err!(
                "seek target {} out of range [0, {}]",
                target,
                self.data.len()
            ));
        }
        trace!("seek to {}", target);
        self.pos = target as usize;
        Ok(())
    }

    /// Read up to `n` bytes starting at the current position, advancing it. Returns fewer than
    /// `n` bytes only at end-of-buffer.
    pub(crate) fn read(&mut self, n: usize) -> &[u8] {
        let end = (self.pos + n).min(self.data.len());
        let slice = &self.data[self.pos..end];
        self.pos = end;
        slice
    }

    /// Read exactly one byte, failing if at end-of-buffer.
    pub(crate) fn read_u8(&mut self) -> crate::error::DecoderResult<u8> {
        let slice = self.read(1);
        slice
            .first()
            .copied()
            .ok_or_else(|| format_err!("unexpected end of file at offset {}", self.pos))
    }

    pub(crate) fn read_exact(&mut self, n: usize) -> crate::error::DecoderResult<&[u8]> {
        if self.pos + n > self.data.len() {
            return Err(format_err!(
                "unexpected end of file: wanted {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.data.len() - self.pos
            ));
        }
        Ok(self.read(n))
    }
}
