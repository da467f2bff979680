//! The pluggable byte-source abstraction (§4.1). A decoder uses this exactly once, at `open`
//! time, to slurp the whole file into the in-memory [`crate::buffer::Buffer`]; nothing after
//! that touches it again.

use crate::error::Error;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom as StdSeekFrom};
use std::path::Path;

/// The three origins a seek may be relative to, matching `{BEGIN, CURRENT, END}` in §6.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Whence {
    Begin,
    Current,
    End,
}

/// A pluggable I/O backend: `{open, read, seek, tell, close}` from §4.1/§6.
///
/// Implementations are free to represent `Handle` however suits their backend (a file
/// descriptor, a `Vec<u8>` cursor, a network socket wrapper, ...). The default
/// implementation, [`FileIoAdapter`], wraps [`std::fs::File`].
pub trait IoAdapter {
    type Handle;

    fn open(&self, path: &Path) -> Result<Self::Handle, Error>;
    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, Error>;
    fn seek(&self, handle: &mut Self::Handle, offset: i64, whence: Whence) -> Result<u64, Error>;
    fn tell(&self, handle: &mut Self::Handle) -> Result<u64, Error>;
    fn close(&self, handle: Self::Handle) -> Result<(), Error>;
}

/// The default byte-source adapter, used when a caller passes no [`IoAdapter`]: plain
/// `std::fs::File` access.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileIoAdapter;

impl IoAdapter for FileIoAdapter {
    type Handle = File;

    fn open(&self, path: &Path) -> Result<File, Error> {
        File::open(path).map_err(|e| -> Error { io_err!(e).into() })
    }

    fn read(&self, handle: &mut File, buf: &mut [u8]) -> Result<usize, Error> {
        handle.read(buf).map_err(|e| -> Error { io_err!(e).into() })
    }

    fn seek(&self, handle: &mut File, offset: i64, whence: Whence) -> Result<u64, Error> {
        let pos = match whence {
            Whence::Begin => StdSeekFrom::Start(offset as u64),
            Whence::Current => StdSeekFrom::Current(offset),
            Whence::End => StdSeekFrom::End(offset),
        };
        handle.seek(pos).map_err(|e| -> Error { io_err!(e).into() })
    }

    fn tell(&self, handle: &mut File) -> Result<u64, Error> {
        handle.stream_position().map_err(|e| -> Error { io_err!(e).into() })
    }

    fn close(&self, handle: File) -> Result<(), Error> {
        drop(handle);
        Ok(())
    }
}
