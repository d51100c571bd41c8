use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::{
        fs::OpenOptionsExt,
        io::{AsRawFd, IntoRawFd},
    },
    path::Path,
    sync::OnceLock,
};

use super::Platform;
use crate::Access;

/// POSIX implementation (`open`, `fstat`, `ftruncate`, `mmap`, `munmap`, `close`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Unix;

static PAGE_SIZE: OnceLock<u64> = OnceLock::new();

impl Platform for Unix {
    fn open_file(&self, path: &Path, access: Access) -> io::Result<File> {
        let mut options = OpenOptions::new();
        // S_IRWXU for newly created files
        options.mode(0o700);
        match access {
            Access::Create | Access::ReadWriteTruncate => {
                options.read(true).write(true).create(true).truncate(true)
            }
            // MAP_SHARED with PROT_WRITE needs a readable descriptor
            Access::Append => options.read(true).append(true).create(true),
            Access::ReadOnly => options.read(true),
            Access::ReadWrite => options.read(true).write(true),
        };
        options.open(path)
    }

    fn file_size(&self, file: &File) -> io::Result<u64> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::fstat(file.as_raw_fd(), &mut stat) };
        if result == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(stat.st_size as u64)
    }

    fn close_file(&self, file: File) -> io::Result<()> {
        let fd = file.into_raw_fd();
        // SAFETY: `into_raw_fd` released ownership, so the descriptor is closed exactly once.
        if unsafe { libc::close(fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn granularity(&self) -> u64 {
        *PAGE_SIZE.get_or_init(|| {
            let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if size > 0 { size as u64 } else { 4096 }
        })
    }
}
