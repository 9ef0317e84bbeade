// CLASSIFICATION: PRIVATE
// Filename: sd_recovery.rs v0.9
// Author: Lukas Bower
// Date Modified: 2027-08-06

//! External-media recovery pipeline.
//!
//! Discovers candidate images on the recovery medium, verifies their
//! detached digests and streams them through the image writer, driven
//! by a strictly forward-progressing state machine:
//!
//! `Idle → SdMount → FirmwareVerify → Flashing → Cleanup → Success`
//!
//! Any step's failure short-circuits to `Failed`. The state is
//! written back through an output parameter at every transition so a
//! caller can report progress even when the attempt dies half-way.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info, warn};

use crate::bootloader::config::{
    BASE_DIGEST, BASE_IMAGE, CHUNK_SIZE, RECOVERY_DIR, RECOVERY_LOG, UPDATE_DIGEST, UPDATE_IMAGE,
};
use crate::bootloader::digest::FirmwareDigest;
use crate::bootloader::error::{BootError, BootResult};
use crate::bootloader::hash;
use crate::bootloader::integrity::FirmwareInfo;
use crate::bootloader::platform::{AppImage, ImageWriter};
use crate::bootloader::store::{BaselineRepository, KvStore};

/// Progress of one recovery attempt. Scoped to the attempt; never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Idle,
    Checking,
    SdMount,
    FirmwareVerify,
    Flashing,
    Cleanup,
    Success,
    Failed,
}

impl RecoveryState {
    fn rank(self) -> u8 {
        match self {
            RecoveryState::Idle => 0,
            RecoveryState::Checking => 1,
            RecoveryState::SdMount => 2,
            RecoveryState::FirmwareVerify => 3,
            RecoveryState::Flashing => 4,
            RecoveryState::Cleanup => 5,
            RecoveryState::Success => 6,
            RecoveryState::Failed => 7,
        }
    }

    /// True for the two states a finished attempt can end in.
    pub fn is_terminal(self) -> bool {
        matches!(self, RecoveryState::Success | RecoveryState::Failed)
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RecoveryState::Idle => "idle",
            RecoveryState::Checking => "checking integrity",
            RecoveryState::FirmwareVerify => "verifying firmware",
            RecoveryState::SdMount => "mounting SD",
            RecoveryState::Flashing => "flashing",
            RecoveryState::Cleanup => "cleaning up",
            RecoveryState::Success => "success",
            RecoveryState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Move the externally visible state strictly forward. `Failed` is
/// reachable from anywhere; everything else must increase rank.
pub(crate) fn advance(state: &mut RecoveryState, next: RecoveryState) {
    debug_assert!(
        next == RecoveryState::Failed || next.rank() > state.rank(),
        "recovery state may not move backward"
    );
    *state = next;
}

/// Which of the two well-known images a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Pending, not-yet-applied update (priority 1).
    Update,
    /// Last-known-good factory image (priority 2).
    Base,
}

/// An (image, digest-file) pair discovered on the medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryImageCandidate {
    pub kind: CandidateKind,
    pub image_path: PathBuf,
    pub digest_path: PathBuf,
}

/// Mountable external medium exposing a conventional file hierarchy.
pub trait RecoveryMedium {
    /// Make the medium available and return its mount root.
    /// Idempotent: mounting an already mounted medium is a no-op.
    fn mount(&mut self) -> BootResult<PathBuf>;
    fn unmount(&mut self) -> BootResult<()>;
    fn is_mounted(&self) -> bool;
}

/// Medium backed by a host directory. Mounting checks that the
/// directory actually exists, which is how an absent or unreadable
/// card presents on hosted builds.
pub struct DirMedium {
    dir: PathBuf,
    mounted: bool,
}

impl DirMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), mounted: false }
    }
}

impl RecoveryMedium for DirMedium {
    fn mount(&mut self) -> BootResult<PathBuf> {
        if !self.mounted {
            let meta = fs::metadata(&self.dir)?;
            if !meta.is_dir() {
                return Err(BootError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "mount root is not a directory",
                )));
            }
            self.mounted = true;
            info!("recovery medium mounted at {}", self.dir.display());
        }
        Ok(self.dir.clone())
    }

    fn unmount(&mut self) -> BootResult<()> {
        self.mounted = false;
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }
}

/// Recovery media adapter: discovery, verification, flashing and
/// cleanup of candidate images, plus the on-media recovery log.
pub struct SdRecovery {
    medium: Box<dyn RecoveryMedium>,
    root: Option<PathBuf>,
}

impl SdRecovery {
    pub fn new(medium: Box<dyn RecoveryMedium>) -> Self {
        Self { medium, root: None }
    }

    /// Mount the medium and remember its root.
    pub fn mount(&mut self) -> BootResult<PathBuf> {
        let root = self.medium.mount()?;
        self.root = Some(root.clone());
        Ok(root)
    }

    pub fn unmount(&mut self) -> BootResult<()> {
        self.root = None;
        self.medium.unmount()
    }

    fn recovery_dir(&self) -> BootResult<PathBuf> {
        let root = self.root.as_ref().ok_or(BootError::InvalidState("medium not mounted"))?;
        Ok(root.join(RECOVERY_DIR))
    }

    /// Find the highest-priority candidate: a pending update first,
    /// the factory image second. A candidate only counts when both
    /// its image and its digest file are present.
    pub fn discover_candidate(&mut self) -> BootResult<RecoveryImageCandidate> {
        self.mount()?;
        let dir = self.recovery_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let pairs = [
            (CandidateKind::Update, UPDATE_IMAGE, UPDATE_DIGEST),
            (CandidateKind::Base, BASE_IMAGE, BASE_DIGEST),
        ];
        for (kind, image, digest) in pairs {
            let image_path = dir.join(image);
            let digest_path = dir.join(digest);
            if image_path.exists() && digest_path.exists() {
                info!("recovery candidate found: {}", image_path.display());
                return Ok(RecoveryImageCandidate { kind, image_path, digest_path });
            }
        }

        warn!("no recovery candidate on medium");
        Err(BootError::NotFound("recovery candidate"))
    }

    /// Check a candidate's content against its detached digest file.
    ///
    /// Returns the image's byte length. A well-formed digest file
    /// with the wrong digest is an integrity mismatch, deliberately
    /// distinct from the medium being unreadable.
    pub fn verify_candidate(&self, candidate: &RecoveryImageCandidate) -> BootResult<u64> {
        let text = match fs::read_to_string(&candidate.digest_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BootError::NotFound("digest file"))
            }
            Err(e) => return Err(e.into()),
        };
        let expected = FirmwareDigest::from_hex(&text)?;

        let (calculated, size) = hash::hash_file(&candidate.image_path)?;
        if calculated == expected {
            info!("candidate verified: {} ({} bytes)", candidate.image_path.display(), size);
            return Ok(size);
        }

        error!("candidate digest mismatch: {}", candidate.image_path.display());
        error!("  calculated: {calculated}");
        error!("  expected:   {expected}");
        let info = FirmwareInfo {
            is_valid: false,
            size: size as u32,
            calculated_digest: calculated,
            stored_digest: expected,
            digest_matches: false,
            header: None,
        };
        Err(BootError::IntegrityMismatch { what: "recovery image", info: Some(Box::new(info)) })
    }

    /// Stream a verified candidate through the image writer. On any
    /// write-phase failure the transfer is aborted before the error
    /// propagates; a half-committed image is never left behind.
    pub fn write_candidate(
        &self,
        candidate: &RecoveryImageCandidate,
        size: u64,
        writer: &mut dyn ImageWriter,
    ) -> BootResult<()> {
        let mut file = File::open(&candidate.image_path)?;
        writer.begin(size)?;

        let result = (|| -> BootResult<()> {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let mut written = 0u64;
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                writer.write(&buf[..n])?;
                written += n as u64;
            }
            info!("flashed {written} bytes from {}", candidate.image_path.display());
            writer.finalize()?;
            writer.activate()?;
            Ok(())
        })();

        if let Err(e) = result {
            error!("flash failed, aborting transfer: {e}");
            writer.abort();
            return Err(e);
        }
        Ok(())
    }

    /// Remove a consumed pending update so a stale image is not
    /// re-applied by a future, unrelated recovery. Failures are
    /// logged, never fatal.
    pub fn cleanup(&self) -> BootResult<()> {
        let dir = self.recovery_dir()?;
        for name in [UPDATE_IMAGE, UPDATE_DIGEST] {
            let path = dir.join(name);
            if path.exists() {
                match fs::remove_file(&path) {
                    Ok(()) => info!("removed {}", path.display()),
                    Err(e) => warn!("could not remove {}: {e}", path.display()),
                }
            }
        }
        Ok(())
    }

    /// Append a timestamped line to the on-media recovery log.
    /// Callers treat failures as non-fatal; losing a log line must
    /// never abort a recovery.
    pub fn write_log(&self, severity: &str, message: &str) -> BootResult<()> {
        let dir = self.recovery_dir()?;
        fs::create_dir_all(&dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(dir.join(RECOVERY_LOG))?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{stamp}] [{severity}] {message}")?;
        Ok(())
    }

    /// Mount plus a write-delete probe: distinguishes "card present
    /// and writable" from everything else.
    pub fn check_accessibility(&mut self) -> BootResult<()> {
        let root = self.mount()?;
        let probe = root.join("access_probe.tmp");
        fs::write(&probe, b"probe")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Write a digest out in the detached hex format. Used by the
    /// tooling that prepares recovery media.
    pub fn write_digest_file(path: &Path, digest: &FirmwareDigest) -> BootResult<()> {
        let mut file = File::create(path)?;
        file.write_all(digest.to_hex().as_bytes())?;
        Ok(())
    }

    /// Run one full recovery attempt to a terminal state.
    ///
    /// mount → discover → verify → flash (+ re-baseline) → cleanup.
    /// After a successful flash the new running image is re-hashed
    /// and stored as the fresh integrity baseline.
    pub fn run(
        &mut self,
        app: &dyn AppImage,
        writer: &mut dyn ImageWriter,
        store: &mut dyn KvStore,
        state: &mut RecoveryState,
    ) -> BootResult<()> {
        info!("=== starting recovery from external medium ===");

        advance(state, RecoveryState::SdMount);
        if let Err(e) = self.mount() {
            error!("medium mount failed: {e}");
            advance(state, RecoveryState::Failed);
            return Err(e);
        }

        let candidate = match self.discover_candidate() {
            Ok(c) => c,
            Err(e) => {
                self.log_failure("no usable recovery candidate");
                advance(state, RecoveryState::Failed);
                return Err(e);
            }
        };

        advance(state, RecoveryState::FirmwareVerify);
        let size = match self.verify_candidate(&candidate) {
            Ok(size) => size,
            Err(e) => {
                self.log_failure("candidate failed verification");
                advance(state, RecoveryState::Failed);
                return Err(e);
            }
        };

        advance(state, RecoveryState::Flashing);
        if let Err(e) = self.write_candidate(&candidate, size, writer) {
            self.log_failure("flashing failed");
            advance(state, RecoveryState::Failed);
            return Err(e);
        }

        // The flashed image is the running image now; its digest
        // becomes the new baseline.
        match self.rebaseline(app, store) {
            Ok(()) => {}
            Err(e) => {
                self.log_failure("baseline update failed after flash");
                advance(state, RecoveryState::Failed);
                return Err(e);
            }
        }

        advance(state, RecoveryState::Cleanup);
        let _ = self.cleanup();

        advance(state, RecoveryState::Success);
        let _ = self.write_log("INFO", "recovery completed successfully");
        info!("=== recovery completed successfully ===");
        Ok(())
    }

    fn rebaseline(&self, app: &dyn AppImage, store: &mut dyn KvStore) -> BootResult<()> {
        let size = app.size()?;
        let mut reader = app.open()?;
        let digest = hash::hash_range(&mut reader, size)?;
        store.store_digest(&digest)
    }

    fn log_failure(&self, message: &str) {
        if self.write_log("ERROR", message).is_err() {
            warn!("could not write recovery log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::hash::hash_bytes;
    use tempfile::tempdir;

    fn place_candidate(root: &Path, image: &str, digest: &str, content: &[u8]) {
        let dir = root.join(RECOVERY_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(image), content).unwrap();
        let d = hash_bytes(content);
        fs::write(dir.join(digest), d.to_hex()).unwrap();
    }

    #[test]
    fn update_takes_priority_over_base() {
        let root = tempdir().unwrap();
        place_candidate(root.path(), UPDATE_IMAGE, UPDATE_DIGEST, b"update image");
        place_candidate(root.path(), BASE_IMAGE, BASE_DIGEST, b"base image");

        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        let candidate = sd.discover_candidate().unwrap();
        assert_eq!(candidate.kind, CandidateKind::Update);
    }

    #[test]
    fn base_found_when_update_is_incomplete() {
        let root = tempdir().unwrap();
        // Image without its digest file does not count as a candidate.
        let dir = root.path().join(RECOVERY_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(UPDATE_IMAGE), b"orphan").unwrap();
        place_candidate(root.path(), BASE_IMAGE, BASE_DIGEST, b"base image");

        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        assert_eq!(sd.discover_candidate().unwrap().kind, CandidateKind::Base);
    }

    #[test]
    fn empty_medium_reports_not_found() {
        let root = tempdir().unwrap();
        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        let err = sd.discover_candidate().unwrap_err();
        assert!(err.is_not_found());
        // Discovery also created the recovery directory for the operator.
        assert!(root.path().join(RECOVERY_DIR).is_dir());
    }

    #[test]
    fn tampered_candidate_is_integrity_mismatch_not_io() {
        let root = tempdir().unwrap();
        place_candidate(root.path(), BASE_IMAGE, BASE_DIGEST, b"good bytes");
        fs::write(root.path().join(RECOVERY_DIR).join(BASE_IMAGE), b"evil bytes").unwrap();

        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        let candidate = sd.discover_candidate().unwrap();
        let err = sd.verify_candidate(&candidate).unwrap_err();
        assert!(err.is_integrity_mismatch());
    }

    #[test]
    fn malformed_digest_file_is_invalid_size() {
        let root = tempdir().unwrap();
        let dir = root.path().join(RECOVERY_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(BASE_IMAGE), b"content").unwrap();
        fs::write(dir.join(BASE_DIGEST), "deadbeef\n").unwrap();

        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        let candidate = sd.discover_candidate().unwrap();
        assert!(matches!(
            sd.verify_candidate(&candidate),
            Err(BootError::InvalidSize { actual: 9, .. })
        ));
    }

    #[test]
    fn mount_failure_short_circuits_to_failed() {
        use crate::bootloader::platform::{FileImageWriter, FileImage};
        use crate::bootloader::store::MemKvStore;

        let scratch = tempdir().unwrap();
        let mut sd =
            SdRecovery::new(Box::new(DirMedium::new(scratch.path().join("missing-card"))));
        let app = FileImage::new(scratch.path().join("app.bin"));
        let mut writer = FileImageWriter::new(scratch.path().join("app.bin"));
        let mut store = MemKvStore::new();
        let mut state = RecoveryState::Idle;

        let err = sd.run(&app, &mut writer, &mut store, &mut state).unwrap_err();
        assert!(matches!(err, BootError::Io(_)));
        assert_eq!(state, RecoveryState::Failed);
    }

    #[test]
    fn digest_file_writer_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img.sha256");
        let digest = hash_bytes(b"tool output");
        SdRecovery::write_digest_file(&path, &digest).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.len(), 64);
        assert_eq!(FirmwareDigest::from_hex(&text).unwrap(), digest);
    }

    #[test]
    fn recovery_log_appends_tagged_lines() {
        let root = tempdir().unwrap();
        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        sd.mount().unwrap();
        sd.write_log("INFO", "first").unwrap();
        sd.write_log("ERROR", "second").unwrap();

        let text = fs::read_to_string(root.path().join(RECOVERY_DIR).join(RECOVERY_LOG)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[INFO] first"));
        assert!(lines[1].contains("[ERROR] second"));
    }

    #[test]
    fn accessibility_probe_leaves_no_droppings() {
        let root = tempdir().unwrap();
        let mut sd = SdRecovery::new(Box::new(DirMedium::new(root.path())));
        sd.check_accessibility().unwrap();
        assert!(!root.path().join("access_probe.tmp").exists());
    }
}
