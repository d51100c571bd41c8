//! Per-OS file and mapping primitives.
//!
//! [`MappedBuffer`](crate::MappedBuffer) drives the same algorithm on every
//! target; only the operations below differ. Exactly one implementation is
//! compiled in and exported as [`Native`].

use std::{fs::File, io, ops::Deref, path::Path};

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::Access;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::Unix as Native;
#[cfg(windows)]
pub use windows::Windows as Native;

/// File and mapping operations the buffer is built on.
///
/// No operation retries. Each either succeeds or reports the OS error and
/// leaves cleanup to the caller.
pub trait Platform {
    /// Opens or creates `path` with the flags matching `access`.
    fn open_file(&self, path: &Path, access: Access) -> io::Result<File>;

    fn file_size(&self, file: &File) -> io::Result<u64>;

    /// Grows the file to at least `len` bytes. Never shrinks it.
    fn extend_file(&self, file: &File, len: u64) -> io::Result<()> {
        if self.file_size(file)? < len {
            file.set_len(len)?;
        }
        Ok(())
    }

    /// Sets the file length to exactly `len` bytes.
    fn truncate_file(&self, file: &File, len: u64) -> io::Result<()> {
        file.set_len(len)
    }

    /// Maps the first `len` bytes of `file`. `len` must be non-zero.
    fn map_region(&self, file: &File, len: u64, writable: bool) -> io::Result<Region> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map a zero-length region",
            ));
        }
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "mapping too large"))?;
        let mut options = MmapOptions::new();
        options.len(len);
        // SAFETY: the buffer owns `file` exclusively for the lifetime of the
        // mapping and never truncates it below `len` while mapped.
        Ok(if writable {
            Region::ReadWrite(unsafe { options.map_mut(file)? })
        } else {
            Region::ReadOnly(unsafe { options.map(file)? })
        })
    }

    /// Releases a mapping. Dirty pages of a writable view are scheduled for
    /// write-back first so that failures surface here instead of being lost.
    fn unmap_region(&self, region: Region) -> io::Result<()> {
        let res = match &region {
            Region::ReadOnly(_) => Ok(()),
            Region::ReadWrite(mmap) => mmap.flush_async(),
        };
        drop(region);
        res
    }

    /// Closes the handle, reporting the OS result.
    fn close_file(&self, file: File) -> io::Result<()>;

    /// Allocation granularity; every mapping size is a multiple of it.
    fn granularity(&self) -> u64;
}

/// An active mapping, read-only or read-write.
#[derive(Debug)]
pub enum Region {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Region {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::ReadOnly(m) => m.deref(),
            Self::ReadWrite(m) => m.deref(),
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::ReadOnly(_) => None,
            Self::ReadWrite(m) => Some(m.as_mut()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
