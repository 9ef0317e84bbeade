// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-07-02

//! Constants for the boot-integrity subsystem.
//!
//! Sizes, retry limits, store keys and media paths are fixed for
//! compatibility with fielded devices and with the tooling that
//! prepares recovery media; do not change them lightly.

/// Subsystem version reported by the operator tooling.
pub const BOOTLOADER_VERSION: &str = "1.0.0";

/// Sentinel marking a file that carries a firmware header.
pub const FIRMWARE_MAGIC: u32 = 0xDEAD_BEEF;

/// Smallest byte size accepted for an application image.
pub const FIRMWARE_MIN_SIZE: u64 = 1024 * 1024;

/// Largest byte size accepted for an application image.
pub const FIRMWARE_MAX_SIZE: u64 = 9 * 1024 * 1024;

/// Chunk size for all streaming reads and writes.
pub const CHUNK_SIZE: usize = 4096;

/// Namespace under which the subsystem persists its state.
pub const STORE_NAMESPACE: &str = "bootloader";

/// Store key holding the 32-byte integrity baseline.
pub const KEY_APP_HASH: &str = "app_hash";

/// Store key holding the serialized boot statistics record.
pub const KEY_STATS: &str = "stats";

/// Consecutive failed boots tolerated before recovery is forced.
pub const MAX_BOOT_ATTEMPTS: u8 = 3;

/// Failed recovery attempts tolerated before the emergency state.
pub const MAX_RECOVERY_ATTEMPTS: u8 = 3;

/// Recovery directory, relative to the media mount root.
pub const RECOVERY_DIR: &str = "recovery";

/// Pending-update image file name (discovery priority 1).
pub const UPDATE_IMAGE: &str = "update.bin";

/// Detached digest file for the pending-update image.
pub const UPDATE_DIGEST: &str = "update.bin.sha256";

/// Last-known-good factory image file name (discovery priority 2).
pub const BASE_IMAGE: &str = "base_firmware.bin";

/// Detached digest file for the factory image.
pub const BASE_DIGEST: &str = "base_firmware.bin.sha256";

/// Append-only human-readable recovery log on the media.
pub const RECOVERY_LOG: &str = "recovery.log";

/// True when `size` is inside the accepted application-image range.
pub fn is_valid_firmware_size(size: u64) -> bool {
    (FIRMWARE_MIN_SIZE..=FIRMWARE_MAX_SIZE).contains(&size)
}
