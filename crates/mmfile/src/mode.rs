use std::{fmt, ops};

use crate::{Error, Result};

/// Requested open mode, a combination of [`OpenMode::IN`], [`OpenMode::OUT`],
/// [`OpenMode::TRUNCATE`], [`OpenMode::APPEND`] and [`OpenMode::AT_END`].
///
/// Only the combinations accepted by [`OpenMode::resolve`] can be opened.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenMode(u8);

impl OpenMode {
    pub const IN: Self = Self(1);
    pub const OUT: Self = Self(1 << 1);
    pub const TRUNCATE: Self = Self(1 << 2);
    pub const APPEND: Self = Self(1 << 3);
    /// Cursor placement after opening, not an access mode.
    pub const AT_END: Self = Self(1 << 4);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[inline]
    pub const fn at_end(self) -> bool {
        self.contains(Self::AT_END)
    }

    /// Translates the mode, minus [`OpenMode::AT_END`], into the access the
    /// platform must request.
    pub fn resolve(self) -> Result<Access> {
        const OUT: u8 = OpenMode::OUT.0;
        const OUT_TRUNC: u8 = OpenMode::OUT.0 | OpenMode::TRUNCATE.0;
        const OUT_APPEND: u8 = OpenMode::OUT.0 | OpenMode::APPEND.0;
        const IN: u8 = OpenMode::IN.0;
        const IN_OUT: u8 = OpenMode::IN.0 | OpenMode::OUT.0;
        const IN_OUT_TRUNC: u8 = IN_OUT | OpenMode::TRUNCATE.0;

        Ok(match self.without(Self::AT_END).0 {
            OUT | OUT_TRUNC => Access::Create,
            OUT_APPEND => Access::Append,
            IN => Access::ReadOnly,
            IN_OUT => Access::ReadWrite,
            IN_OUT_TRUNC => Access::ReadWriteTruncate,
            _ => return Err(Error::InvalidMode(self)),
        })
    }
}

impl ops::BitOr for OpenMode {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for OpenMode {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OpenMode, &str); 5] = [
            (OpenMode::IN, "IN"),
            (OpenMode::OUT, "OUT"),
            (OpenMode::TRUNCATE, "TRUNCATE"),
            (OpenMode::APPEND, "APPEND"),
            (OpenMode::AT_END, "AT_END"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("(empty)")?;
        }
        Ok(())
    }
}

/// Access intent resolved from a legal [`OpenMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `OUT`, `OUT | TRUNCATE`: create or truncate, read-write.
    Create,
    /// `OUT | APPEND`: create if absent, append positioning.
    Append,
    /// `IN`: read-only, must exist.
    ReadOnly,
    /// `IN | OUT`: read-write, must exist.
    ReadWrite,
    /// `IN | OUT | TRUNCATE`: read-write, create or truncate.
    ReadWriteTruncate,
}

impl Access {
    #[inline]
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Origin of a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDir {
    Begin,
    Current,
    /// Relative to the mapped (physical) size.
    End,
}
