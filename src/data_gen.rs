// src/data_gen.rs
//
//! Backing data file creation
//!
//! The file is filled with random bytes so that neither the device nor the
//! filesystem can shortcut reads of zero pages.

use anyhow::{Context, Result};
use rand::RngCore;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::constants::DATA_GEN_CHUNK_SIZE;
use crate::page_cache::CacheDropper;

/// Create `path` with `size` random bytes unless it already holds at least that much.
///
/// Returns `true` when the file was (re)written.
pub fn make_file_if_necessary<P: AsRef<Path>>(path: P, size: u64) -> Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.len() >= size => {
            info!("Data file {:?} already holds {} bytes", path, meta.len());
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat data file: {}", path.display()));
        }
    }

    info!("Creating data file {:?} of {} bytes", path, size);
    let file = File::create(path)
        .with_context(|| format!("Failed to create data file: {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(DATA_GEN_CHUNK_SIZE, file);

    let mut rng = rand::rng();
    let mut chunk = vec![0u8; DATA_GEN_CHUNK_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(DATA_GEN_CHUNK_SIZE as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        writer
            .write_all(&chunk[..n])
            .with_context(|| format!("Failed to write data file: {}", path.display()))?;
        remaining -= n as u64;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
        .with_context(|| format!("Failed to sync data file: {}", path.display()))?;

    if let Err(e) = CacheDropper::new().drop_caches() {
        warn!("Cache drop after data file creation failed (need root?): {}", e);
    }
    Ok(true)
}
