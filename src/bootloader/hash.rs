// CLASSIFICATION: PRIVATE
// Filename: hash.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-07-09

//! Streaming SHA-256 hash engine.
//!
//! Hashes an addressable byte range in fixed 4 KiB chunks without
//! ever holding the whole image in memory. Any read error aborts
//! the computation; a partial digest is never returned.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::bootloader::config::CHUNK_SIZE;
use crate::bootloader::digest::FirmwareDigest;
use crate::bootloader::error::{BootError, BootResult};

const PROGRESS_INTERVAL: u64 = 1024 * 1024;

fn chunk_buffer() -> BootResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(CHUNK_SIZE).map_err(|_| BootError::OutOfMemory)?;
    buf.resize(CHUNK_SIZE, 0);
    Ok(buf)
}

/// Hash exactly `length` bytes from `source`.
///
/// Tolerates lengths that are not a multiple of the chunk size; a
/// source that ends early surfaces as an I/O error.
pub fn hash_range<R: Read>(source: &mut R, length: u64) -> BootResult<FirmwareDigest> {
    let mut ctx = Sha256::new();
    let mut buf = chunk_buffer()?;
    let mut remaining = length;
    let mut processed = 0u64;

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        source.read_exact(&mut buf[..want])?;
        ctx.update(&buf[..want]);
        remaining -= want as u64;
        processed += want as u64;
        if processed % PROGRESS_INTERVAL == 0 {
            debug!("hash progress: {}/{} bytes", processed, length);
        }
    }

    Ok(FirmwareDigest::from_bytes(ctx.finalize().into()))
}

/// Hash an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> FirmwareDigest {
    FirmwareDigest::from_bytes(Sha256::digest(data).into())
}

/// Hash a whole file, returning its digest and byte length.
pub fn hash_file(path: &Path) -> BootResult<(FirmwareDigest, u64)> {
    let mut file = File::open(path)?;
    let length = file.metadata()?.len();
    let digest = hash_range(&mut file, length)?;
    info!("hashed {} ({} bytes)", path.display(), length);
    Ok((digest, length))
}
