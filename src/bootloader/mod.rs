// CLASSIFICATION: PRIVATE
// Filename: mod.rs · Thermacore bootloader subsystem
// Date Modified: 2027-08-21
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// Thermacore · Boot‑Integrity & Recovery Subsystem (root module)
//
// Runs single‑threaded at power‑up, before any application task
// is started, and answers one question: is the installed image
// trustworthy?  If not, the device repairs itself from external
// media, escalating from automatic recovery to operator‑driven
// recovery and finally to an emergency halt.
//
// Sub‑modules
// -----------
// * `config`        – size limits, store keys, media paths
// * `error`         – typed error taxonomy for the whole subsystem
// * `digest`        – 32‑byte SHA‑256 value + detached hex format
// * `hash`          – streaming hash engine (fixed 4 KiB chunks)
// * `header`        – fixed‑layout firmware header parsing
// * `stats`         – boot reasons and persisted boot statistics
// * `store`         – namespaced key‑value persistence + repositories
// * `platform`      – hardware seams: app image, image writer
// * `integrity`     – baseline comparison of the running image
// * `sd_recovery`   – media adapter + recovery state machine
// * `recovery_mode` – operator‑facing recovery driver and UI seam
// * `orchestrator`  – boot decision engine and escalation chain
// ─────────────────────────────────────────────────────────────

/// Compile-time constants shared across the subsystem.
pub mod config;

/// Error taxonomy.
pub mod error;

/// Firmware digest value type.
pub mod digest;

/// Streaming SHA-256 hash engine.
pub mod hash;

/// Fixed-layout firmware header.
pub mod header;

/// Boot reasons and persisted statistics.
pub mod stats;

/// Persisted key-value store and typed repositories.
pub mod store;

/// Hardware abstraction seams.
pub mod platform;

/// Running-image integrity checker.
pub mod integrity;

/// External-media recovery pipeline.
pub mod sd_recovery;

/// Manual recovery mode and UI collaborator seam.
pub mod recovery_mode;

/// Boot orchestrator and recovery escalation controller.
pub mod orchestrator;

pub use digest::FirmwareDigest;
pub use error::{BootError, BootResult};
pub use integrity::FirmwareInfo;
pub use orchestrator::{BootOutcome, BootloaderContext};
pub use sd_recovery::{RecoveryImageCandidate, RecoveryState};
pub use stats::{BootReason, BootStatistics};
