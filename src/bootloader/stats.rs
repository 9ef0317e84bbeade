// CLASSIFICATION: COMMUNITY
// Filename: stats.rs v0.5
// Author: Lukas Bower
// Date Modified: 2027-07-16

//! Boot reasons and persisted boot statistics.
//!
//! `BootStatistics` is one of only two records that outlive a boot
//! (the other is the integrity baseline). It is persisted write-through
//! after every mutation so an interrupted reboot loses at most the last
//! change.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Why the current boot path was taken. Persisted with the
/// statistics and rendered by the recovery UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootReason {
    Normal,
    Corruption,
    UpdateFailed,
    Recovery,
    MultipleFailures,
    SdRecovery,
    Emergency,
}

impl fmt::Display for BootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BootReason::Normal => "normal boot",
            BootReason::Corruption => "corruption detected",
            BootReason::UpdateFailed => "update failed",
            BootReason::Recovery => "recovery mode",
            BootReason::MultipleFailures => "multiple consecutive failures",
            BootReason::SdRecovery => "recovered from SD",
            BootReason::Emergency => "emergency mode",
        };
        f.write_str(text)
    }
}

/// Persisted boot and recovery counters.
///
/// `boot_attempts` and `recovery_attempts` only ever reset when the
/// application reports a healthy boot; `total_boots` and
/// `total_recoveries` grow monotonically over the device lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootStatistics {
    pub boot_attempts: u8,
    pub recovery_attempts: u8,
    pub total_boots: u32,
    pub total_recoveries: u32,
    pub last_boot_reason: BootReason,
    pub last_recovery_timestamp: u32,
    pub first_boot: bool,
}

impl BootStatistics {
    /// Record created when the store holds no statistics yet: the
    /// very first power-up of the device.
    pub fn first_boot() -> Self {
        Self {
            boot_attempts: 1,
            recovery_attempts: 0,
            total_boots: 1,
            total_recoveries: 0,
            last_boot_reason: BootReason::Normal,
            last_recovery_timestamp: 0,
            first_boot: true,
        }
    }

    /// Register one more power-up on an existing record.
    pub fn register_boot(&mut self) {
        self.boot_attempts = self.boot_attempts.saturating_add(1);
        self.total_boots = self.total_boots.wrapping_add(1);
        self.first_boot = false;
    }

    /// Reset both attempt counters after a proven-healthy boot.
    pub fn reset_attempts(&mut self) {
        self.boot_attempts = 0;
        self.recovery_attempts = 0;
    }

    /// Register a completed recovery.
    pub fn register_recovery_success(&mut self) {
        self.total_recoveries = self.total_recoveries.wrapping_add(1);
        self.recovery_attempts = 0;
        self.last_boot_reason = BootReason::SdRecovery;
        self.last_recovery_timestamp = now_ts();
    }

    /// Register a failed recovery attempt.
    pub fn register_recovery_failure(&mut self) {
        self.recovery_attempts = self.recovery_attempts.saturating_add(1);
        self.last_boot_reason = BootReason::Recovery;
        self.last_recovery_timestamp = now_ts();
    }
}

/// Wall-clock seconds since the epoch, truncated to the 32-bit field
/// the fielded record format carries.
pub fn now_ts() -> u32 {
    Utc::now().timestamp() as u32
}
