use std::{fmt, ops, path::Path};

use crate::{Error, MappedBuffer, Native, OpenMode, Platform, SeekDir};

/// Stream state of a [`MappedFile`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IoState(u8);

impl IoState {
    pub const GOOD: Self = Self(0);
    /// The last operation failed; the device may still be usable.
    pub const FAIL: Self = Self(1);
    /// A read stopped before the requested count.
    pub const END: Self = Self(1 << 1);
    /// A write could not be completed; the content may be inconsistent.
    pub const ERROR: Self = Self(1 << 2);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for IoState {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for IoState {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for IoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_good() {
            return f.write_str("GOOD");
        }
        let names = [
            (Self::FAIL, "FAIL"),
            (Self::END, "END"),
            (Self::ERROR, "ERROR"),
        ];
        let set: Vec<_> = names
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();
        f.write_str(&set.join(" | "))
    }
}

/// Random-access file device over a [`MappedBuffer`].
///
/// Operations never return errors; outcomes are folded into an [`IoState`]
/// the caller inspects afterwards, and the buffer error behind the latest
/// failure is kept in [`last_error`](Self::last_error).
#[derive(Debug, Default)]
pub struct MappedFile<P: Platform = Native> {
    buffer: MappedBuffer<P>,
    state: IoState,
    last_error: Option<Error>,
}

impl MappedFile {
    pub fn new() -> Self {
        Self::with_buffer(MappedBuffer::new())
    }
}

impl<P: Platform> MappedFile<P> {
    pub fn with_buffer(buffer: MappedBuffer<P>) -> Self {
        Self {
            buffer,
            state: IoState::GOOD,
            last_error: None,
        }
    }

    /// Opens `path`. Sets `FAIL` on any failure and clears the state on
    /// success. A previously opened file must be closed first.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) {
        if let Err(e) = mode.resolve() {
            self.fail(IoState::FAIL, e);
            return;
        }
        match self.buffer.open(path, mode) {
            Ok(()) => self.clear(),
            Err(e) => self.fail(IoState::FAIL, e),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.buffer.is_open()
    }

    /// Sets `FAIL` if the file was not open or teardown failed.
    pub fn close(&mut self) {
        if let Err(e) = self.buffer.close() {
            self.fail(IoState::FAIL, e);
        }
    }

    /// Copies bytes at the current position without moving it. Never
    /// changes the state.
    #[inline]
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        self.buffer.peek(buf)
    }

    /// Fills `buf`. A short read sets `FAIL | END`.
    pub fn read(&mut self, buf: &mut [u8]) {
        if self.buffer.read(buf) != buf.len() {
            self.set_state(IoState::FAIL | IoState::END);
        }
    }

    /// Writes `data`. Writing to a read-only file sets `FAIL` without
    /// touching the buffer; any other incomplete write sets `ERROR`.
    pub fn write(&mut self, data: &[u8]) {
        if !self.buffer.is_writable() {
            self.fail(IoState::FAIL, Error::WriteOnReadOnly);
            return;
        }
        match self.buffer.write(data) {
            Ok(n) if n == data.len() => {}
            Ok(_) => self.set_state(IoState::ERROR),
            Err(e) => self.fail(IoState::ERROR, e),
        }
    }

    /// Moves the position. Ignored while a failure is pending.
    pub fn seek(&mut self, offset: i64, dir: SeekDir) {
        if self.has_failure() {
            return;
        }
        if let Err(e) = self.buffer.seek(offset, dir) {
            self.fail(IoState::FAIL, e);
        }
    }

    /// Current position, or `None` while a failure is pending.
    pub fn tell(&self) -> Option<u64> {
        if self.has_failure() || !self.buffer.is_open() {
            return None;
        }
        Some(self.buffer.position())
    }

    /// Always `false`: any position can be reached with [`seek`](Self::seek).
    #[inline]
    pub fn is_sequential(&self) -> bool {
        false
    }

    /// The whole mapped region. Invalidated by the next growing write.
    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.buffer.data()
    }

    /// Mapped size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    #[inline]
    pub fn state(&self) -> IoState {
        self.state
    }

    #[inline]
    pub fn set_state(&mut self, state: IoState) {
        self.state |= state;
    }

    pub fn clear(&mut self) {
        self.state = IoState::GOOD;
        self.last_error = None;
    }

    #[inline]
    pub fn has_failure(&self) -> bool {
        self.state.intersects(IoState::FAIL | IoState::ERROR)
    }

    #[inline]
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    #[inline]
    pub fn buffer(&self) -> &MappedBuffer<P> {
        &self.buffer
    }

    fn fail(&mut self, state: IoState, error: Error) {
        self.set_state(state);
        self.last_error = Some(error);
    }
}
