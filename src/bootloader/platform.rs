// CLASSIFICATION: COMMUNITY
// Filename: platform.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-07-23

//! Hardware seams for the boot subsystem.
//!
//! The decision engine only ever sees these traits: an `AppImage`
//! it can measure, and an `ImageWriter` it can stream a verified
//! recovery image through. The file-backed implementations serve
//! hosted and simulator builds; device builds supply partition-backed
//! ones.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::bootloader::error::{BootError, BootResult};

/// Read access to the currently running application image region.
pub trait AppImage {
    /// Declared byte size of the image region.
    fn size(&self) -> BootResult<u64>;
    /// Open a fresh sequential reader over the region.
    fn open(&self) -> BootResult<Box<dyn Read>>;
}

/// Application image backed by a plain file.
pub struct FileImage {
    path: PathBuf,
}

impl FileImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AppImage for FileImage {
    fn size(&self) -> BootResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn open(&self) -> BootResult<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Opaque flash-write capability.
///
/// Lifecycle: `begin` → sequential `write` calls → `finalize` →
/// `activate`. Any failure mid-transfer must be answered with
/// `abort` so a half-committed image is never left behind.
pub trait ImageWriter {
    /// Open a new transfer for an image of `expected_size` bytes.
    fn begin(&mut self, expected_size: u64) -> BootResult<()>;
    /// Append one chunk to the open transfer.
    fn write(&mut self, chunk: &[u8]) -> BootResult<()>;
    /// Close the transfer and make the written bytes durable.
    fn finalize(&mut self) -> BootResult<()>;
    /// Switch the boot target to the finalized image.
    fn activate(&mut self) -> BootResult<()>;
    /// Discard an in-progress or finalized-but-unactivated transfer.
    fn abort(&mut self);
}

enum WritePhase {
    Idle,
    Open { file: File, written: u64, expected: u64 },
    Finalized,
}

/// Image writer that stages into `<target>.staging` and installs the
/// image with an atomic rename on `activate`. The hosted analog of
/// the device's write-to-inactive-then-switch flash primitive.
pub struct FileImageWriter {
    target: PathBuf,
    staging: PathBuf,
    phase: WritePhase,
}

impl FileImageWriter {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let staging = {
            let mut name = target.as_os_str().to_os_string();
            name.push(".staging");
            PathBuf::from(name)
        };
        Self { target, staging, phase: WritePhase::Idle }
    }
}

impl ImageWriter for FileImageWriter {
    fn begin(&mut self, expected_size: u64) -> BootResult<()> {
        if !matches!(self.phase, WritePhase::Idle) {
            return Err(BootError::InvalidState("image transfer already open"));
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.staging)?;
        info!("image transfer opened ({} bytes expected)", expected_size);
        self.phase = WritePhase::Open { file, written: 0, expected: expected_size };
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> BootResult<()> {
        let WritePhase::Open { file, written, .. } = &mut self.phase else {
            return Err(BootError::InvalidState("write without an open transfer"));
        };
        file.write_all(chunk)?;
        *written += chunk.len() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> BootResult<()> {
        let WritePhase::Open { file, written, expected } = &mut self.phase else {
            return Err(BootError::InvalidState("finalize without an open transfer"));
        };
        if *written != *expected {
            return Err(BootError::InvalidSize { what: "transferred image", actual: *written });
        }
        file.sync_all()?;
        self.phase = WritePhase::Finalized;
        Ok(())
    }

    fn activate(&mut self) -> BootResult<()> {
        if !matches!(self.phase, WritePhase::Finalized) {
            return Err(BootError::InvalidState("activate before finalize"));
        }
        fs::rename(&self.staging, &self.target)?;
        self.phase = WritePhase::Idle;
        info!("boot target switched to {}", self.target.display());
        Ok(())
    }

    fn abort(&mut self) {
        self.phase = WritePhase::Idle;
        if self.staging.exists() {
            if let Err(e) = fs::remove_file(&self.staging) {
                warn!("could not remove staging image: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn staged_write_then_activate_installs_image() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.bin");
        fs::write(&target, b"old image").unwrap();

        let mut writer = FileImageWriter::new(&target);
        writer.begin(9).unwrap();
        writer.write(b"new ").unwrap();
        writer.write(b"image").unwrap();
        writer.finalize().unwrap();
        writer.activate().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new image");
        assert!(!dir.path().join("app.bin.staging").exists());
    }

    #[test]
    fn write_without_begin_is_invalid_state() {
        let dir = tempdir().unwrap();
        let mut writer = FileImageWriter::new(dir.path().join("app.bin"));
        assert!(matches!(writer.write(b"x"), Err(BootError::InvalidState(_))));
    }

    #[test]
    fn short_transfer_fails_finalize() {
        let dir = tempdir().unwrap();
        let mut writer = FileImageWriter::new(dir.path().join("app.bin"));
        writer.begin(10).unwrap();
        writer.write(b"abc").unwrap();
        assert!(matches!(writer.finalize(), Err(BootError::InvalidSize { actual: 3, .. })));
        writer.abort();
        assert!(!dir.path().join("app.bin.staging").exists());
    }

    #[test]
    fn abort_leaves_old_image_untouched() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.bin");
        fs::write(&target, b"old image").unwrap();

        let mut writer = FileImageWriter::new(&target);
        writer.begin(100).unwrap();
        writer.write(b"partial").unwrap();
        writer.abort();

        assert_eq!(fs::read(&target).unwrap(), b"old image");
    }
}
