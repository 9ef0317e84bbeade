// CLASSIFICATION: COMMUNITY
// Filename: header.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-07-16

//! Fixed-layout firmware header.
//!
//! Standalone image files may begin with a 116-byte header. The
//! layout is explicit byte offsets with little-endian fields and no
//! padding; it is parsed field by field because the header arrives
//! from arbitrary external files, never by reinterpreting memory.
//!
//! ```text
//! offset  size  field
//!      0     4  magic      (0xDEADBEEF)
//!      4     4  version
//!      8     4  size
//!     12    32  sha256
//!     44     4  crc32
//!     48     4  timestamp
//!     52    64  build_info
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::bootloader::config::{is_valid_firmware_size, FIRMWARE_MAGIC};
use crate::bootloader::digest::{FirmwareDigest, DIGEST_LEN};
use crate::bootloader::error::{BootError, BootResult};

/// Serialized header length in bytes.
pub const HEADER_LEN: usize = 116;

const BUILD_INFO_LEN: usize = 64;

/// Parsed firmware header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub sha256: FirmwareDigest,
    pub crc32: u32,
    pub timestamp: u32,
    pub build_info: [u8; BUILD_INFO_LEN],
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

impl FirmwareHeader {
    /// Parse and validate a header from the start of `data`.
    ///
    /// The sentinel must match and the declared size must be inside
    /// the accepted firmware range and not exceed the bytes actually
    /// available after the header.
    pub fn parse(data: &[u8], available: u64) -> BootResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(BootError::InvalidSize { what: "firmware header", actual: data.len() as u64 });
        }

        let magic = read_u32(data, 0);
        if magic != FIRMWARE_MAGIC {
            return Err(BootError::IntegrityMismatch { what: "firmware header magic", info: None });
        }

        let size = read_u32(data, 8);
        if !is_valid_firmware_size(u64::from(size)) || u64::from(size) > available {
            return Err(BootError::InvalidSize { what: "declared firmware", actual: u64::from(size) });
        }

        let mut sha256 = [0u8; DIGEST_LEN];
        sha256.copy_from_slice(&data[12..12 + DIGEST_LEN]);
        let mut build_info = [0u8; BUILD_INFO_LEN];
        build_info.copy_from_slice(&data[52..52 + BUILD_INFO_LEN]);

        Ok(Self {
            magic,
            version: read_u32(data, 4),
            size,
            sha256: FirmwareDigest::from_bytes(sha256),
            crc32: read_u32(data, 44),
            timestamp: read_u32(data, 48),
            build_info,
        })
    }

    /// Try to parse a header from the front of an image file.
    ///
    /// `Ok(None)` means the file simply does not carry a header
    /// (wrong sentinel or too short), which is the common case for
    /// raw partition dumps.
    pub fn probe_file(path: &Path) -> BootResult<Option<Self>> {
        let mut file = File::open(path)?;
        let available = file.metadata()?.len();
        let mut buf = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                return Ok(None);
            }
            filled += n;
        }
        match Self::parse(&buf, available) {
            Ok(header) => Ok(Some(header)),
            Err(BootError::IntegrityMismatch { what: "firmware header magic", .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Serialize back to the fixed layout. Used by image tooling and
    /// round-trip tests.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.size.to_le_bytes());
        out[12..44].copy_from_slice(self.sha256.as_bytes());
        out[44..48].copy_from_slice(&self.crc32.to_le_bytes());
        out[48..52].copy_from_slice(&self.timestamp.to_le_bytes());
        out[52..116].copy_from_slice(&self.build_info);
        out
    }

    /// Build-info field as trimmed text.
    pub fn build_info_str(&self) -> String {
        let end = self.build_info.iter().position(|&b| b == 0).unwrap_or(BUILD_INFO_LEN);
        String::from_utf8_lossy(&self.build_info[..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::config::FIRMWARE_MIN_SIZE;
    use crate::bootloader::hash::hash_bytes;

    fn sample() -> FirmwareHeader {
        let mut build_info = [0u8; BUILD_INFO_LEN];
        build_info[..5].copy_from_slice(b"v2.1\0");
        FirmwareHeader {
            magic: FIRMWARE_MAGIC,
            version: 7,
            size: FIRMWARE_MIN_SIZE as u32,
            sha256: hash_bytes(b"payload"),
            crc32: 0xCAFE_F00D,
            timestamp: 1_766_000_000,
            build_info,
        }
    }

    #[test]
    fn encode_parse_round_trip() {
        let header = sample();
        let raw = header.encode();
        let parsed = FirmwareHeader::parse(&raw, u64::from(header.size)).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.build_info_str(), "v2.1");
    }

    #[test]
    fn truncated_header_is_invalid_size() {
        let raw = sample().encode();
        let err = FirmwareHeader::parse(&raw[..50], FIRMWARE_MIN_SIZE).unwrap_err();
        assert!(matches!(err, BootError::InvalidSize { actual: 50, .. }));
    }

    #[test]
    fn wrong_magic_is_mismatch() {
        let mut raw = sample().encode();
        raw[0] ^= 0xFF;
        let err = FirmwareHeader::parse(&raw, FIRMWARE_MIN_SIZE).unwrap_err();
        assert!(err.is_integrity_mismatch());
    }

    #[test]
    fn declared_size_must_fit_available_bytes() {
        let raw = sample().encode();
        let err = FirmwareHeader::parse(&raw, FIRMWARE_MIN_SIZE / 2).unwrap_err();
        assert!(matches!(err, BootError::InvalidSize { .. }));
    }
}
