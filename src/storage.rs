// src/storage.rs
//
// Storage targets for replay: the capability interface and the file backend
// that opens with O_DIRECT when the filesystem allows it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::DROP_CACHES_PATH;
use crate::error::{CacheError, IoReplayError};
use crate::page_cache::{drop_cache_region, CacheDropper};
use crate::types::OpKind;

/// What the replay engine needs from a storage target
pub trait StorageTarget {
    /// Move the handle to an absolute byte offset
    fn position(&mut self, offset: u64) -> std::io::Result<u64>;

    /// Read into `buf` or write `buf` out, depending on `kind`; one call, no retry
    fn transfer(&mut self, kind: OpKind, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Flush pending writes and ask the host to drop cached pages
    fn bypass_cache(&mut self) -> Result<(), CacheError>;
}

impl<T: StorageTarget + ?Sized> StorageTarget for &mut T {
    fn position(&mut self, offset: u64) -> std::io::Result<u64> {
        (**self).position(offset)
    }

    fn transfer(&mut self, kind: OpKind, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).transfer(kind, buf)
    }

    fn bypass_cache(&mut self) -> Result<(), CacheError> {
        (**self).bypass_cache()
    }
}

/// Options for [`FileTarget`]
#[derive(Debug, Clone)]
pub struct FileTargetConfig {
    /// Request O_DIRECT (Linux); falls back to buffered I/O if refused
    pub direct_io: bool,
    /// Open with O_SYNC so writes reach the device before returning
    pub sync_writes: bool,
    /// Host cache-drop control file
    pub drop_caches_path: PathBuf,
}

impl Default for FileTargetConfig {
    fn default() -> Self {
        Self {
            direct_io: true,
            sync_writes: true,
            drop_caches_path: PathBuf::from(DROP_CACHES_PATH),
        }
    }
}

impl FileTargetConfig {
    /// Buffered variant, for filesystems (tmpfs) that reject O_DIRECT
    pub fn buffered() -> Self {
        Self { direct_io: false, ..Default::default() }
    }
}

/// Local file or block device opened read/write
#[derive(Debug)]
pub struct FileTarget {
    file: File,
    path: PathBuf,
    direct: bool,
    dropper: CacheDropper,
}

impl FileTarget {
    pub fn open<P: AsRef<Path>>(path: P, config: &FileTargetConfig) -> Result<Self, IoReplayError> {
        let path = path.as_ref();
        let target_err = |source: std::io::Error| IoReplayError::TargetOpen { path: path.to_path_buf(), source };

        let (file, direct) = if config.direct_io {
            match open_with_flags(path, config.sync_writes, true) {
                Ok(file) => (file, true),
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                    warn!("O_DIRECT not supported for {:?}; falling back to buffered I/O", path);
                    (open_with_flags(path, config.sync_writes, false).map_err(target_err)?, false)
                }
                Err(e) => return Err(target_err(e)),
            }
        } else {
            (open_with_flags(path, config.sync_writes, false).map_err(target_err)?, false)
        };

        info!("Opened target {:?} (direct: {}, sync: {})", path, direct, config.sync_writes);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            direct,
            dropper: CacheDropper::with_control_path(&config.drop_caches_path),
        })
    }

    /// Whether O_DIRECT is actually in effect
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(target_os = "linux")]
fn open_with_flags(path: &Path, sync: bool, direct: bool) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut flags = 0;
    if sync {
        flags |= libc::O_SYNC;
    }
    if direct {
        flags |= libc::O_DIRECT;
    }
    OpenOptions::new().read(true).write(true).custom_flags(flags).open(path)
}

#[cfg(not(target_os = "linux"))]
fn open_with_flags(path: &Path, _sync: bool, direct: bool) -> std::io::Result<File> {
    if direct {
        // Reported as EINVAL so the caller takes the buffered fallback path.
        return Err(std::io::Error::from_raw_os_error(libc::EINVAL));
    }
    OpenOptions::new().read(true).write(true).open(path)
}

impl StorageTarget for FileTarget {
    fn position(&mut self, offset: u64) -> std::io::Result<u64> {
        self.file.seek(SeekFrom::Start(offset))
    }

    fn transfer(&mut self, kind: OpKind, buf: &mut [u8]) -> std::io::Result<usize> {
        match kind {
            OpKind::Read => self.file.read(buf),
            OpKind::Write => self.file.write(buf),
        }
    }

    fn bypass_cache(&mut self) -> Result<(), CacheError> {
        self.file.sync_data().map_err(CacheError::Flush)?;
        if let Err(e) = drop_cache_region(&self.file, 0, 0) {
            warn!("posix_fadvise(DONTNEED) failed on {:?}: {}", self.path, e);
        }
        self.dropper.drop_caches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn config_for_tests() -> FileTargetConfig {
        FileTargetConfig {
            direct_io: false,
            sync_writes: false,
            drop_caches_path: PathBuf::from("/nonexistent/drop_caches"),
        }
    }

    #[test]
    fn test_position_and_transfer() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0u8; 2048]).unwrap();

        let mut target = FileTarget::open(file.path(), &config_for_tests()).unwrap();
        assert!(!target.is_direct());

        assert_eq!(target.position(1024).unwrap(), 1024);
        let mut data = vec![7u8; 512];
        assert_eq!(target.transfer(OpKind::Write, &mut data).unwrap(), 512);

        target.position(1024).unwrap();
        let mut back = vec![0u8; 512];
        assert_eq!(target.transfer(OpKind::Read, &mut back).unwrap(), 512);
        assert_eq!(back, data);
    }

    #[test]
    fn test_bypass_cache_without_control_file_is_error() {
        let file = NamedTempFile::new().unwrap();
        let mut target = FileTarget::open(file.path(), &config_for_tests()).unwrap();
        assert!(matches!(target.bypass_cache(), Err(CacheError::ControlUnavailable { .. })));
    }

    #[test]
    fn test_direct_request_opens_or_falls_back() {
        let file = NamedTempFile::new().unwrap();
        let config = FileTargetConfig { direct_io: true, ..config_for_tests() };
        assert!(FileTarget::open(file.path(), &config).is_ok());
    }

    #[test]
    fn test_missing_target_is_error() {
        let err = FileTarget::open("/nonexistent/ioreplay/data", &config_for_tests()).unwrap_err();
        assert!(matches!(err, IoReplayError::TargetOpen { .. }));
    }
}
