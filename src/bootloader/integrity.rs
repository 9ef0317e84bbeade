// CLASSIFICATION: PRIVATE
// Filename: integrity.rs v0.8
// Author: Lukas Bower
// Date Modified: 2027-07-30

//! Running-image integrity checker.
//!
//! Compares a freshly computed SHA-256 of the running application
//! image against the persisted baseline. A missing baseline is the
//! first-boot case: the current digest becomes the baseline and the
//! image is accepted. Trust-on-first-contact is deliberate — it only
//! protects against corruption that happens *after* the first flash.

use std::path::Path;

use log::{error, info, warn};

use crate::bootloader::config::is_valid_firmware_size;
use crate::bootloader::digest::FirmwareDigest;
use crate::bootloader::error::{BootError, BootResult};
use crate::bootloader::hash;
use crate::bootloader::header::FirmwareHeader;
use crate::bootloader::platform::AppImage;
use crate::bootloader::store::{BaselineRepository, KvStore};

/// Snapshot produced by one integrity check. Never persisted; only
/// the baseline digest inside the store outlives the boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub is_valid: bool,
    pub size: u32,
    pub calculated_digest: FirmwareDigest,
    pub stored_digest: FirmwareDigest,
    pub digest_matches: bool,
    /// Present only when a standalone image file carried a header.
    pub header: Option<FirmwareHeader>,
}

/// Verify the running application image against the baseline.
///
/// On mismatch the returned `IntegrityMismatch` carries the full
/// `FirmwareInfo` so the caller can report both digests.
pub fn verify_running_image(
    app: &dyn AppImage,
    store: &mut dyn KvStore,
) -> BootResult<FirmwareInfo> {
    let size = app.size()?;
    if !is_valid_firmware_size(size) {
        error!("running image size out of range: {size} bytes");
        return Err(BootError::InvalidSize { what: "running image", actual: size });
    }

    let mut reader = app.open()?;
    let calculated = hash::hash_range(&mut reader, size)?;

    let stored = match store.read_digest()? {
        Some(digest) => digest,
        None => {
            // First boot: the freshly measured digest becomes the
            // baseline and the image is trusted as-is.
            warn!("no baseline digest found; treating as first boot");
            store.store_digest(&calculated)?;
            return Ok(FirmwareInfo {
                is_valid: true,
                size: size as u32,
                calculated_digest: calculated,
                stored_digest: calculated,
                digest_matches: true,
                header: None,
            });
        }
    };

    let matches = calculated == stored;
    let info = FirmwareInfo {
        is_valid: matches,
        size: size as u32,
        calculated_digest: calculated,
        stored_digest: stored,
        digest_matches: matches,
        header: None,
    };

    if matches {
        info!("running image integrity verified ({size} bytes)");
        Ok(info)
    } else {
        error!("running image digest mismatch");
        error!("  calculated: {calculated}");
        error!("  stored:     {stored}");
        Err(BootError::IntegrityMismatch { what: "running image", info: Some(Box::new(info)) })
    }
}

/// Size-range check for a standalone image file.
pub fn validate_image_file(path: &Path) -> BootResult<u64> {
    let meta = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BootError::NotFound("image file")
        } else {
            BootError::Io(e)
        }
    })?;
    let size = meta.len();
    if !is_valid_firmware_size(size) {
        return Err(BootError::InvalidSize { what: "image file", actual: size });
    }
    Ok(size)
}

/// Measure a standalone image file and report what was found,
/// including its header when it carries one. Used by operator
/// tooling; does not touch the baseline.
pub fn inspect_image_file(path: &Path) -> BootResult<FirmwareInfo> {
    let size = validate_image_file(path)?;
    let header = FirmwareHeader::probe_file(path)?;
    let (calculated, _) = hash::hash_file(path)?;
    Ok(FirmwareInfo {
        is_valid: true,
        size: size as u32,
        calculated_digest: calculated,
        stored_digest: calculated,
        digest_matches: true,
        header,
    })
}
