// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.3
// Author: Lukas Bower
// Date Modified: 2027-07-02

//! Error taxonomy for the boot-integrity subsystem.
//!
//! Every component returns `BootResult`; only the escalation
//! controller turns these into control-flow decisions. `NotFound`
//! variants are expected conditions with defined fallbacks, not
//! exceptional failures.

use std::io;

use thiserror::Error;

use crate::bootloader::integrity::FirmwareInfo;

/// Result alias used throughout the subsystem.
pub type BootResult<T> = Result<T, BootError>;

#[derive(Error, Debug)]
pub enum BootError {
    /// Expected item absent: no baseline digest, or no recovery
    /// candidate on the media.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A length is outside its contract (image size range, digest
    /// file length, stored blob length).
    #[error("invalid {what} size: {actual} bytes")]
    InvalidSize { what: &'static str, actual: u64 },

    /// Computed digest differs from the expected one, or a header
    /// sentinel does not match. The central corruption signal.
    #[error("integrity mismatch: {what}")]
    IntegrityMismatch {
        what: &'static str,
        /// Populated when a full verification produced diagnostics.
        info: Option<Box<FirmwareInfo>>,
    },

    /// Media or store unreadable/unwritable.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// Chunk buffer allocation failed.
    #[error("out of memory allocating chunk buffer")]
    OutOfMemory,

    /// API misuse, e.g. writing before a transfer was opened.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl BootError {
    /// True for conditions with a defined non-fatal fallback.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BootError::NotFound(_))
    }

    /// True when the error represents detected corruption rather
    /// than an access failure. Callers use this to distinguish
    /// "media unreadable" from "media readable but untrustworthy".
    pub fn is_integrity_mismatch(&self) -> bool {
        matches!(self, BootError::IntegrityMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_classification() {
        let err = BootError::IntegrityMismatch { what: "running image", info: None };
        assert!(err.is_integrity_mismatch());
        assert!(!err.is_not_found());
    }

    #[test]
    fn io_error_converts() {
        fn fails() -> BootResult<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(BootError::Io(_))));
    }
}
