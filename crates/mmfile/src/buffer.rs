use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use log::{debug, error, warn};

use crate::{
    Access, CloseFailures, Error, Native, OpenMode, OpenStep, Platform, Region, Result, SeekDir,
    TeardownStep,
};

/// Growable memory-mapped view over a single file.
///
/// The whole file is addressed as one contiguous region with a byte cursor.
/// Writes past the mapped capacity grow the file and remap it in multiples of
/// the platform granularity; closing a writable buffer truncates the file back
/// to the number of bytes actually written.
///
/// Two sizes are tracked while open:
/// - [`size`](Self::size): bytes currently mapped (physical capacity)
/// - [`logical_size`](Self::logical_size): high-water mark of written or
///   pre-existing bytes, persisted as the file length on close
///
/// A buffer is single-owner and single-threaded. Dropping an open buffer
/// closes it and logs any teardown failure; call [`close`](Self::close) to
/// observe that failure instead.
#[derive(Debug)]
#[must_use = "Buffer should be stored to keep the file open"]
pub struct MappedBuffer<P: Platform = Native> {
    platform: P,
    session: Option<Session>,
}

/// State that exists only while a file is open. The handle and the mapping
/// are acquired together and released together.
#[derive(Debug)]
struct Session {
    path: PathBuf,
    file: File,
    /// `None` only after a failed growth, until `close()`.
    region: Option<Region>,
    physical: u64,
    logical: u64,
    cursor: u64,
    writable: bool,
}

impl MappedBuffer {
    /// Creates a closed buffer backed by the native platform.
    pub fn new() -> Self {
        Self::with_platform(Native::default())
    }
}

impl<P: Platform + Default> Default for MappedBuffer<P> {
    fn default() -> Self {
        Self::with_platform(P::default())
    }
}

impl<P: Platform> MappedBuffer<P> {
    /// Creates a closed buffer backed by a custom platform implementation.
    pub fn with_platform(platform: P) -> Self {
        Self {
            platform,
            session: None,
        }
    }

    /// Opens `path` with the given mode and maps its whole content.
    ///
    /// Unsupported mode combinations are rejected before any OS call. Empty
    /// files opened for writing are extended to one granularity unit, since a
    /// zero-length mapping is invalid. Any failure releases whatever was
    /// acquired and leaves the buffer closed.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let access = mode.resolve()?;
        let path = path.as_ref();

        let file = self
            .platform
            .open_file(path, access)
            .map_err(|source| Error::Open {
                step: OpenStep::Open,
                source,
            })?;
        debug!("File {} opened ({access:?}).", path.display());

        let len = match self.platform.file_size(&file) {
            Ok(len) => len,
            Err(source) => {
                if let Err(e) = self.platform.close_file(file) {
                    warn!("Failed to close {} after size query error: {e}", path.display());
                }
                return Err(Error::Open {
                    step: OpenStep::QuerySize,
                    source,
                });
            }
        };

        self.session = Some(Session {
            path: path.to_owned(),
            file,
            region: None,
            physical: len,
            logical: len,
            cursor: 0,
            writable: access.is_writable(),
        });

        if let Err(e) = self.map_opened(access, mode.at_end()) {
            if let Err(close_err) = self.close() {
                warn!("Failed to release {} after open error: {close_err}", path.display());
            }
            return Err(e);
        }

        Ok(())
    }

    fn map_opened(&mut self, access: Access, at_end: bool) -> Result<()> {
        let granularity = self.platform.granularity();
        let Self { platform, session } = self;
        let session = session.as_mut().ok_or(Error::NotOpen)?;

        if access.is_writable() {
            // Writable mappings always cover whole granularity units, and at
            // least one so that a new or truncated file can be mapped.
            let capacity = round_up(session.physical, granularity)
                .ok_or(Error::TooLarge {
                    len: session.physical,
                })?
                .max(granularity);
            if capacity != session.physical {
                platform
                    .extend_file(&session.file, capacity)
                    .map_err(|source| Error::Open {
                        step: OpenStep::Bootstrap,
                        source,
                    })?;
                debug!("File extended to {capacity} bytes.");
                session.physical = capacity;
            }
        }

        let region = platform
            .map_region(&session.file, session.physical, session.writable)
            .map_err(|source| Error::Open {
                step: OpenStep::Map,
                source,
            })?;
        debug!("Mmap created ({} bytes).", session.physical);
        session.region = Some(region);
        session.cursor = 0;

        if at_end {
            let end = i64::try_from(session.logical).map_err(|_| Error::TooLarge {
                len: session.logical,
            })?;
            self.seek(end, SeekDir::Begin).map_err(|e| Error::Open {
                step: OpenStep::Placement,
                source: io::Error::other(e),
            })?;
        }

        Ok(())
    }

    /// Releases the mapping, truncates the file to the logical size when
    /// writable, then closes the handle.
    ///
    /// Every step is attempted once even if an earlier one fails, and the
    /// buffer ends up closed either way. Failed steps are returned together
    /// as [`Error::Close`].
    pub fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Err(Error::NotOpen);
        };
        let Session {
            path,
            file,
            region,
            logical,
            writable,
            ..
        } = session;

        let mut failures = CloseFailures::default();
        if let Some(region) = region {
            failures.record(TeardownStep::Unmap, self.platform.unmap_region(region));
        }
        if writable {
            failures.record(
                TeardownStep::Truncate,
                self.platform.truncate_file(&file, logical),
            );
        }
        failures.record(TeardownStep::CloseHandle, self.platform.close_file(file));
        debug!(
            "File {} closed ({} failed step(s)).",
            path.display(),
            failures.len()
        );

        failures.into_result()
    }

    /// Moves the cursor and returns its new position.
    ///
    /// [`SeekDir::End`] is relative to the mapped size. Negative targets fail
    /// and leave the cursor untouched; targets past the end are allowed.
    pub fn seek(&mut self, offset: i64, dir: SeekDir) -> Result<u64> {
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        let base = match dir {
            SeekDir::Begin => 0,
            SeekDir::Current => session.cursor,
            SeekDir::End => session.physical,
        };
        let position = i128::from(base) + i128::from(offset);
        let cursor =
            u64::try_from(position).map_err(|_| Error::SeekOutOfRange { position })?;
        session.cursor = cursor;
        Ok(cursor)
    }

    /// Copies up to `buf.len()` bytes at the cursor without moving it.
    ///
    /// The count is bounded by the mapped size, not the logical size, so the
    /// unused tail of the last granularity unit reads as zeroes.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let Some(session) = &self.session else {
            return 0;
        };
        let Some(region) = &session.region else {
            return 0;
        };
        let available = session.physical.saturating_sub(session.cursor);
        let n = available.min(buf.len() as u64) as usize;
        if n == 0 {
            return 0;
        }
        let start = session.cursor as usize;
        buf[..n].copy_from_slice(&region.as_slice()[start..start + n]);
        n
    }

    /// Like [`peek`](Self::peek), then advances the cursor by the returned
    /// count. A count below `buf.len()` is a short read.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.peek(buf);
        if let Some(session) = self.session.as_mut() {
            session.cursor += n as u64;
        }
        n
    }

    /// Writes `data` at the cursor, growing the mapping as needed.
    ///
    /// Either all of `data` is written or nothing is. After a growth failure
    /// the buffer has no mapping left and only [`close`](Self::close) is
    /// meaningful.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let granularity = self.platform.granularity();
        let Self { platform, session } = self;
        let session = session.as_mut().ok_or(Error::NotOpen)?;
        if !session.writable {
            return Err(Error::WriteOnReadOnly);
        }

        let len = data.len() as u64;
        let end = session
            .cursor
            .checked_add(len)
            .ok_or(Error::TooLarge { len })?;
        if end > session.physical {
            session.grow(&*platform, granularity, end)?;
        }

        let mmap = session
            .region
            .as_mut()
            .and_then(Region::as_mut_slice)
            .ok_or(Error::Unmapped)?;
        let start = session.cursor as usize;
        mmap[start..start + data.len()].copy_from_slice(data);

        session.cursor = end;
        if session.cursor >= session.logical {
            session.logical = session.cursor;
        }
        Ok(data.len())
    }

    /// Synchronously writes dirty pages back to the file.
    pub fn flush(&self) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::NotOpen)?;
        match &session.region {
            Some(Region::ReadWrite(mmap)) => Ok(mmap.flush()?),
            Some(Region::ReadOnly(_)) => Ok(()),
            None => Err(Error::Unmapped),
        }
    }

    /// Platform granularity. Valid whether open or not.
    #[inline]
    pub fn granularity(&self) -> u64 {
        self.platform.granularity()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.writable)
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.cursor)
    }

    /// Mapped size in bytes, 0 when closed.
    #[inline]
    pub fn size(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.physical)
    }

    #[inline]
    pub fn logical_size(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.logical)
    }

    /// The whole mapped region, for zero-copy access.
    ///
    /// The borrow ends before any call that may remap.
    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.session
            .as_ref()
            .and_then(|s| s.region.as_ref())
            .map(Region::as_slice)
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }
}

impl Session {
    /// Unmaps, extends the file and remaps so that at least `required` bytes
    /// are mapped, in whole granularity units.
    ///
    /// On failure no mapping is left behind.
    fn grow<P: Platform>(&mut self, platform: &P, granularity: u64, required: u64) -> Result<()> {
        let from = self.physical;
        let to = round_up(required - from, granularity)
            .and_then(|added| from.checked_add(added))
            .ok_or(Error::TooLarge { len: required })?;

        let region = self.region.take().ok_or(Error::Unmapped)?;
        let remapped = platform
            .unmap_region(region)
            .and_then(|()| platform.extend_file(&self.file, to))
            .and_then(|()| platform.map_region(&self.file, to, true));

        match remapped {
            Ok(region) => {
                self.region = Some(region);
                self.physical = to;
                debug!("Mmap grown from {from} to {to} bytes.");
                Ok(())
            }
            Err(source) => Err(Error::Growth { from, to, source }),
        }
    }
}

impl<P: Platform> Drop for MappedBuffer<P> {
    fn drop(&mut self) {
        let Some(path) = self.path().map(Path::to_path_buf) else {
            return;
        };
        if let Err(e) = self.close() {
            error!("{}: {e}", path.display());
        }
    }
}

impl<P: Platform> io::Read for MappedBuffer<P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(MappedBuffer::read(self, buf))
    }
}

impl<P: Platform> io::Write for MappedBuffer<P> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(MappedBuffer::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(MappedBuffer::flush(self)?)
    }
}

impl<P: Platform> io::Seek for MappedBuffer<P> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, dir) = match pos {
            io::SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| Error::SeekOutOfRange {
                    position: i128::from(n),
                })?,
                SeekDir::Begin,
            ),
            io::SeekFrom::Current(n) => (n, SeekDir::Current),
            io::SeekFrom::End(n) => (n, SeekDir::End),
        };
        Ok(MappedBuffer::seek(self, offset, dir)?)
    }
}

/// Rounds `len` up to a multiple of `granularity`.
#[inline]
fn round_up(len: u64, granularity: u64) -> Option<u64> {
    len.checked_next_multiple_of(granularity)
}
