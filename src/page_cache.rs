// src/page_cache.rs
//
//! Page cache control on Linux
//!
//! Flushing dirty pages and asking the kernel to drop clean ones, so the next
//! measured operation hits the device instead of memory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{DROP_CACHES_DIRECTIVE, DROP_CACHES_PATH};
use crate::error::CacheError;

/// Flush every filesystem's dirty pages (sync(2))
#[cfg(unix)]
pub fn sync_filesystems() {
    unsafe { libc::sync() }
}

#[cfg(not(unix))]
pub fn sync_filesystems() {}

/// Drop page cache for a region of one file (whole file when `length` is 0)
#[cfg(target_os = "linux")]
pub fn drop_cache_region<F: std::os::unix::io::AsRawFd>(fd: &F, offset: i64, length: i64) -> std::io::Result<()> {
    use libc::{posix_fadvise, POSIX_FADV_DONTNEED};

    let result = unsafe { posix_fadvise(fd.as_raw_fd(), offset, length, POSIX_FADV_DONTNEED) };
    if result != 0 {
        return Err(std::io::Error::from_raw_os_error(result));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn drop_cache_region<F>(_fd: &F, _offset: i64, _length: i64) -> std::io::Result<()> {
    Ok(())
}

/// Handle on the host's drop-caches control file
///
/// The control file is opened once; if that fails (no such file, not root)
/// every purge reports [`CacheError::ControlUnavailable`] and the caller
/// carries on.
#[derive(Debug)]
pub struct CacheDropper {
    path: PathBuf,
    control: Result<File, std::io::ErrorKind>,
}

impl CacheDropper {
    /// Open the default control file (`/proc/sys/vm/drop_caches`)
    pub fn new() -> Self {
        Self::with_control_path(DROP_CACHES_PATH)
    }

    pub fn with_control_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let control = OpenOptions::new().write(true).open(&path).map_err(|e| {
            warn!("Cannot open {:?} ({}); page cache will not be dropped", path, e);
            e.kind()
        });
        Self { path, control }
    }

    /// Whether the control file could be opened
    pub fn is_available(&self) -> bool {
        self.control.is_ok()
    }

    /// Sync, then write the purge directive
    pub fn drop_caches(&mut self) -> Result<(), CacheError> {
        sync_filesystems();

        let control = match &mut self.control {
            Ok(file) => file,
            Err(kind) => {
                return Err(CacheError::ControlUnavailable {
                    path: self.path.clone(),
                    source: std::io::Error::from(*kind),
                });
            }
        };

        control.write_all(DROP_CACHES_DIRECTIVE).map_err(CacheError::DropRejected)?;
        debug!("Dropped page cache via {:?}", self.path);
        Ok(())
    }
}

impl Default for CacheDropper {
    fn default() -> Self {
        Self::new()
    }
}
