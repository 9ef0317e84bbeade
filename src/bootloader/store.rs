// CLASSIFICATION: PRIVATE
// Filename: store.rs v0.7
// Author: Lukas Bower
// Date Modified: 2027-07-23

//! Namespaced persisted key-value store and the typed repositories
//! layered on top of it.
//!
//! The boot logic never touches the raw store API directly; it goes
//! through `BaselineRepository` (the known-good image digest) and
//! `StatsRepository` (the serialized `BootStatistics` blob under a
//! single `stats` key, written through on every mutation).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::bootloader::config::{KEY_APP_HASH, KEY_STATS};
use crate::bootloader::digest::{FirmwareDigest, DIGEST_LEN};
use crate::bootloader::error::{BootError, BootResult};
use crate::bootloader::stats::BootStatistics;

/// Minimal persisted key-value surface. Mirrors the shape of the
/// target's non-volatile storage: open namespace, get/put blobs,
/// erase keys.
pub trait KvStore {
    fn get(&self, key: &str) -> BootResult<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, value: &[u8]) -> BootResult<()>;
    fn delete(&mut self, key: &str) -> BootResult<()>;
}

/// Directory-backed store: one file per key under
/// `<root>/<namespace>/`. Stand-in for the device's NVS partition on
/// hosted targets, and the production store for the simulator build.
pub struct FsKvStore {
    dir: PathBuf,
}

impl FsKvStore {
    /// Open (creating if needed) the namespace directory.
    pub fn open(root: &Path, namespace: &str) -> BootResult<Self> {
        let dir = root.join(namespace);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KvStore for FsKvStore {
    fn get(&self, key: &str) -> BootResult<Option<Vec<u8>>> {
        match fs::read(self.key_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> BootResult<()> {
        // Write then rename so a power cut mid-write cannot leave a
        // torn value under the key.
        let tmp = self.dir.join(format!("{key}.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.key_path(key))?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> BootResult<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store used by unit tests and the simulator harness.
#[derive(Default)]
pub struct MemKvStore {
    map: HashMap<String, Vec<u8>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> BootResult<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> BootResult<()> {
        self.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> BootResult<()> {
        self.map.remove(key);
        Ok(())
    }
}

/// Typed access to the persisted integrity baseline.
///
/// Shared with the application-update module: after a successful
/// network update it stores the freshly flashed image's digest here
/// so the boot-time and post-update baselines stay consistent.
pub trait BaselineRepository {
    /// Read the known-good digest; `Ok(None)` when no baseline has
    /// ever been stored (the first-boot case).
    fn read_digest(&self) -> BootResult<Option<FirmwareDigest>>;
    /// Persist `digest` as the new known-good baseline.
    fn store_digest(&mut self, digest: &FirmwareDigest) -> BootResult<()>;
    /// Erase the baseline entirely.
    fn clear_digest(&mut self) -> BootResult<()>;
}

impl<S: KvStore + ?Sized> BaselineRepository for S {
    fn read_digest(&self) -> BootResult<Option<FirmwareDigest>> {
        let Some(raw) = self.get(KEY_APP_HASH)? else {
            return Ok(None);
        };
        if raw.len() != DIGEST_LEN {
            warn!("stored baseline has wrong length: {} bytes", raw.len());
            return Err(BootError::InvalidSize { what: "stored baseline", actual: raw.len() as u64 });
        }
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&raw);
        Ok(Some(FirmwareDigest::from_bytes(bytes)))
    }

    fn store_digest(&mut self, digest: &FirmwareDigest) -> BootResult<()> {
        self.put(KEY_APP_HASH, digest.as_bytes())?;
        info!("integrity baseline stored ({}…)", digest.short());
        Ok(())
    }

    fn clear_digest(&mut self) -> BootResult<()> {
        self.delete(KEY_APP_HASH)
    }
}

/// Typed access to the persisted boot statistics blob.
pub trait StatsRepository {
    /// Load the statistics record; `Ok(None)` on a fresh store.
    fn load_stats(&self) -> BootResult<Option<BootStatistics>>;
    /// Persist the record (write-through, no batching).
    fn save_stats(&mut self, stats: &BootStatistics) -> BootResult<()>;
}

impl<S: KvStore + ?Sized> StatsRepository for S {
    fn load_stats(&self) -> BootResult<Option<BootStatistics>> {
        let Some(raw) = self.get(KEY_STATS)? else {
            return Ok(None);
        };
        let stats = serde_json::from_slice(&raw)
            .map_err(|e| BootError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(Some(stats))
    }

    fn save_stats(&mut self, stats: &BootStatistics) -> BootResult<()> {
        let blob = serde_json::to_vec(stats)
            .map_err(|e| BootError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.put(KEY_STATS, &blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::hash::hash_bytes;
    use tempfile::tempdir;

    #[test]
    fn baseline_round_trip_in_memory() {
        let mut store = MemKvStore::new();
        assert!(store.read_digest().unwrap().is_none());
        let digest = hash_bytes(b"image");
        store.store_digest(&digest).unwrap();
        assert_eq!(store.read_digest().unwrap(), Some(digest));
        store.clear_digest().unwrap();
        assert!(store.read_digest().unwrap().is_none());
    }

    #[test]
    fn truncated_baseline_is_invalid_size() {
        let mut store = MemKvStore::new();
        store.put(KEY_APP_HASH, &[1, 2, 3]).unwrap();
        assert!(matches!(
            store.read_digest(),
            Err(BootError::InvalidSize { actual: 3, .. })
        ));
    }

    #[test]
    fn stats_survive_reopen_on_disk() {
        let root = tempdir().unwrap();
        let mut store = FsKvStore::open(root.path(), "bootloader").unwrap();
        assert!(store.load_stats().unwrap().is_none());
        let stats = BootStatistics::first_boot();
        store.save_stats(&stats).unwrap();
        drop(store);

        let reopened = FsKvStore::open(root.path(), "bootloader").unwrap();
        assert_eq!(reopened.load_stats().unwrap(), Some(stats));
    }

    #[test]
    fn undecodable_stats_blob_is_io_error() {
        let mut store = MemKvStore::new();
        store.put(KEY_STATS, b"not json").unwrap();
        assert!(matches!(store.load_stats(), Err(BootError::Io(_))));
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let root = tempdir().unwrap();
        let mut store = FsKvStore::open(root.path(), "bootloader").unwrap();
        store.delete("nope").unwrap();
    }
}
