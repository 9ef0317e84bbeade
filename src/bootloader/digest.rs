// CLASSIFICATION: PRIVATE
// Filename: digest.rs v0.5
// Author: Lukas Bower
// Date Modified: 2027-07-09

//! 32-byte SHA-256 firmware digest and its detached hex format.
//!
//! Detached digest files contain exactly 64 lowercase hex characters,
//! big-endian byte order, no trailing newline and no metadata.

use std::fmt;

use crate::bootloader::error::{BootError, BootResult};

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of the detached hex encoding in characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Immutable 32-byte SHA-256 value, compared byte-for-byte.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FirmwareDigest([u8; DIGEST_LEN]);

impl FirmwareDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Encode to the detached 64-character lowercase hex format.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from the detached hex format.
    ///
    /// Anything other than exactly 64 characters is `InvalidSize`;
    /// well-sized but non-hex content is an integrity mismatch of
    /// the digest file itself.
    pub fn from_hex(text: &str) -> BootResult<Self> {
        if text.len() != DIGEST_HEX_LEN {
            return Err(BootError::InvalidSize { what: "digest file", actual: text.len() as u64 });
        }
        let raw = hex::decode(text)
            .map_err(|_| BootError::IntegrityMismatch { what: "digest file encoding", info: None })?;
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Shortened form used in operator-facing output.
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Display for FirmwareDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FirmwareDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FirmwareDigest({})", self.to_hex())
    }
}

impl From<[u8; DIGEST_LEN]> for FirmwareDigest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}
