use std::{
    fs::{File, OpenOptions},
    io,
    os::windows::{fs::OpenOptionsExt, io::IntoRawHandle},
    path::Path,
    sync::OnceLock,
};

use windows_sys::Win32::{
    Foundation::CloseHandle,
    Storage::FileSystem::{FILE_ATTRIBUTE_TEMPORARY, FILE_SHARE_READ, FILE_SHARE_WRITE},
    System::SystemInformation::{GetSystemInfo, SYSTEM_INFO},
};

use super::Platform;
use crate::Access;

/// Windows implementation (`CreateFile`, `CreateFileMapping`, `MapViewOfFile`,
/// `SetEndOfFile`, `CloseHandle`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Windows;

static ALLOCATION_GRANULARITY: OnceLock<u64> = OnceLock::new();

impl Platform for Windows {
    fn open_file(&self, path: &Path, access: Access) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match access {
            Access::ReadOnly => {
                options.read(true).share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE);
            }
            _ => {
                options
                    .read(true)
                    .write(true)
                    .share_mode(FILE_SHARE_READ)
                    .attributes(FILE_ATTRIBUTE_TEMPORARY);
                match access {
                    Access::Create | Access::ReadWriteTruncate => {
                        options.create(true).truncate(true);
                    }
                    Access::Append => {
                        options.create(true);
                    }
                    Access::ReadWrite | Access::ReadOnly => {}
                }
            }
        }
        options.open(path)
    }

    fn file_size(&self, file: &File) -> io::Result<u64> {
        Ok(file.metadata()?.len())
    }

    fn close_file(&self, file: File) -> io::Result<()> {
        let handle = file.into_raw_handle();
        // SAFETY: `into_raw_handle` released ownership, so the handle is closed exactly once.
        if unsafe { CloseHandle(handle) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn granularity(&self) -> u64 {
        *ALLOCATION_GRANULARITY.get_or_init(|| {
            let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
            unsafe { GetSystemInfo(&mut info) };
            u64::from(info.dwAllocationGranularity)
        })
    }
}
