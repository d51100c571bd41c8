use std::{fmt, io, result};

use smallvec::SmallVec;
use thiserror::Error;

use crate::OpenMode;

pub type Result<T, E = Error> = result::Result<T, E>;

/// Error types for mmfile operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] io::Error),

    // Open errors
    #[error("Unsupported open mode: {0:?}")]
    InvalidMode(OpenMode),

    #[error("Buffer is already open")]
    AlreadyOpen,

    #[error("Buffer is not open")]
    NotOpen,

    #[error("Failed to open file ({step}): {source}")]
    Open { step: OpenStep, source: io::Error },

    // Cursor errors
    #[error("Seek to out-of-range position {position}")]
    SeekOutOfRange { position: i128 },

    // Write errors
    #[error("Cannot write to a buffer opened in read-only mode")]
    WriteOnReadOnly,

    #[error("Buffer lost its mapping during a failed growth and must be closed")]
    Unmapped,

    #[error("Failed to grow mapping from {from} to {to} bytes: {source}")]
    Growth {
        from: u64,
        to: u64,
        source: io::Error,
    },

    #[error("Size {len} cannot be addressed on this target")]
    TooLarge { len: u64 },

    // Teardown errors
    #[error("Close failed, data may be corrupted: {0}")]
    Close(CloseFailures),
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::IO(e) => e,
            Error::InvalidMode(_) | Error::SeekOutOfRange { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, value)
            }
            Error::WriteOnReadOnly => io::Error::new(io::ErrorKind::PermissionDenied, value),
            e => io::Error::other(e),
        }
    }
}

/// Stage of `open()` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStep {
    Open,
    QuerySize,
    Bootstrap,
    Map,
    Placement,
}

impl fmt::Display for OpenStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::QuerySize => "size query",
            Self::Bootstrap => "bootstrap extend",
            Self::Map => "map",
            Self::Placement => "end placement",
        })
    }
}

/// Resource release step performed by `close()`, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Unmap,
    Truncate,
    CloseHandle,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unmap => "unmap",
            Self::Truncate => "truncate",
            Self::CloseHandle => "close handle",
        })
    }
}

#[derive(Debug)]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub source: io::Error,
}

/// Every teardown step that failed during a single `close()`.
///
/// All steps are attempted regardless of earlier failures, so this holds at
/// most one entry per [`TeardownStep`].
#[derive(Debug, Default)]
pub struct CloseFailures(SmallVec<[TeardownFailure; 3]>);

impl CloseFailures {
    pub(crate) fn record(&mut self, step: TeardownStep, res: io::Result<()>) {
        if let Err(source) = res {
            self.0.push(TeardownFailure { step, source });
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeardownFailure> {
        self.0.iter()
    }

    pub fn contains(&self, step: TeardownStep) -> bool {
        self.0.iter().any(|f| f.step == step)
    }

    pub(crate) fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(self))
        }
    }
}

impl fmt::Display for CloseFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} failed: {}", failure.step, failure.source)?;
        }
        Ok(())
    }
}
