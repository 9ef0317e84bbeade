// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v1.0
// Date Modified: 2027-08-21
// Author: Lukas Bower

//! Root library for the Thermacore heat-controller firmware platform.
//!
//! The crate currently carries the boot-integrity and recovery subsystem:
//! everything the firmware needs to decide, at power-up, whether the
//! installed application image can be trusted, and to repair the device
//! from external media when it cannot.

/// Boot-integrity verification, persisted boot statistics and the
/// SD-recovery escalation chain.
pub mod bootloader;

pub use bootloader::orchestrator::{BootOutcome, BootloaderContext};
