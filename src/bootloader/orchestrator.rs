// CLASSIFICATION: PRIVATE
// Filename: orchestrator.rs v0.9
// Author: Lukas Bower
// Date Modified: 2027-08-13

//! Boot orchestrator and recovery escalation controller.
//!
//! `BootloaderContext` is the single owned handle for the whole
//! subsystem: construction loads (or creates) the persisted boot
//! statistics, and `decide_boot_path` runs the three-tier escalation:
//! integrity check → automatic recovery → manual recovery →
//! emergency. It is the only place where errors become control-flow.

use log::{error, info, warn};

use crate::bootloader::config::{MAX_BOOT_ATTEMPTS, MAX_RECOVERY_ATTEMPTS};
use crate::bootloader::digest::FirmwareDigest;
use crate::bootloader::error::{BootError, BootResult};
use crate::bootloader::integrity;
use crate::bootloader::platform::{AppImage, ImageWriter};
use crate::bootloader::recovery_mode::{self, RecoveryUi};
use crate::bootloader::sd_recovery::{RecoveryMedium, RecoveryState, SdRecovery};
use crate::bootloader::stats::{BootReason, BootStatistics};
use crate::bootloader::store::{BaselineRepository, KvStore, StatsRepository};

/// Terminal verdict of one boot decision.
///
/// `Restarting` is contractually terminal: the caller logs it and
/// invokes the platform reboot primitive instead of continuing to
/// run stale application code out of RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Image trusted; hand control to the application.
    ContinueNormalBoot,
    /// Recovery flashed a fresh image; the device must restart now.
    Restarting,
    /// Automatic and manual recovery both exhausted. The device
    /// stays in the bootloader context awaiting physical
    /// intervention; the application must not be started.
    CriticalFailure,
}

/// Outcome of the operator-triggered self test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    pub stats_readable: bool,
    pub integrity_ok: bool,
    pub media_accessible: bool,
}

impl SelfTestReport {
    /// Hard pass/fail; integrity and media trouble are warnings.
    pub fn passed(&self) -> bool {
        self.stats_readable
    }
}

/// Owned state of the boot subsystem. Built once by [`init`], then
/// passed by handle to every subsequent call; there are no ambient
/// globals.
///
/// [`init`]: BootloaderContext::init
pub struct BootloaderContext {
    store: Box<dyn KvStore>,
    app: Box<dyn AppImage>,
    sd: SdRecovery,
    writer: Box<dyn ImageWriter>,
    ui: Box<dyn RecoveryUi>,
    stats: BootStatistics,
}

impl BootloaderContext {
    /// Initialize the subsystem: load the persisted statistics
    /// (creating the first-boot record when absent), register this
    /// power-up and persist the updated record.
    pub fn init(
        store: Box<dyn KvStore>,
        app: Box<dyn AppImage>,
        medium: Box<dyn RecoveryMedium>,
        writer: Box<dyn ImageWriter>,
        ui: Box<dyn RecoveryUi>,
    ) -> BootResult<Self> {
        let mut store = store;
        let stats = match store.load_stats()? {
            Some(mut stats) => {
                stats.register_boot();
                info!(
                    "boot #{} (consecutive attempts: {})",
                    stats.total_boots, stats.boot_attempts
                );
                stats
            }
            None => {
                info!("no statistics record; first device boot");
                BootStatistics::first_boot()
            }
        };
        store.save_stats(&stats)?;

        Ok(Self { store, app, sd: SdRecovery::new(medium), writer, ui, stats })
    }

    fn persist_stats(&mut self) -> BootResult<()> {
        self.store.save_stats(&self.stats)
    }

    fn should_force_recovery(&self) -> bool {
        if self.stats.boot_attempts >= MAX_BOOT_ATTEMPTS {
            warn!(
                "too many consecutive boot failures ({} >= {}); forcing recovery",
                self.stats.boot_attempts, MAX_BOOT_ATTEMPTS
            );
            return true;
        }
        if self.stats.recovery_attempts >= MAX_RECOVERY_ATTEMPTS {
            warn!(
                "too many recovery attempts ({} >= {}); forcing recovery",
                self.stats.recovery_attempts, MAX_RECOVERY_ATTEMPTS
            );
            return true;
        }
        false
    }

    /// The boot decision engine.
    ///
    /// 1. Exhausted counters force the recovery path regardless of
    ///    actual image integrity.
    /// 2. Otherwise a clean integrity check is the single success
    ///    exit: counters reset, normal boot continues.
    /// 3. Automatic recovery, then manual recovery, then the
    ///    emergency state.
    pub fn decide_boot_path(&mut self) -> BootResult<BootOutcome> {
        info!("=== boot integrity decision ===");

        let forced = self.should_force_recovery();
        if forced {
            self.stats.last_boot_reason = BootReason::MultipleFailures;
            self.persist_stats()?;
        } else {
            match integrity::verify_running_image(&*self.app, &mut *self.store) {
                Ok(_info) => {
                    info!("firmware intact; continuing normal boot");
                    self.stats.reset_attempts();
                    self.persist_stats()?;
                    return Ok(BootOutcome::ContinueNormalBoot);
                }
                Err(e) => {
                    warn!("firmware integrity check failed: {e}");
                    self.stats.last_boot_reason = BootReason::Corruption;
                    self.persist_stats()?;
                }
            }
        }

        // Tier 1: automatic recovery from the external medium.
        info!("=== attempting automatic recovery ===");
        let mut auto_state = RecoveryState::Idle;
        match self.sd.run(&*self.app, &mut *self.writer, &mut *self.store, &mut auto_state) {
            Ok(()) => {
                self.stats.register_recovery_success();
                self.persist_stats()?;
                self.ui.notify(
                    BootReason::SdRecovery,
                    "automatic recovery complete; restarting",
                    Some(100),
                );
                return Ok(BootOutcome::Restarting);
            }
            Err(e) => {
                error!("automatic recovery failed in state '{auto_state}': {e}");
                self.stats.register_recovery_failure();
                self.persist_stats()?;
            }
        }

        // Tier 2: operator-driven recovery.
        info!("=== escalating to manual recovery ===");
        let reason = self.stats.last_boot_reason;
        let mut manual_state = RecoveryState::Idle;
        match recovery_mode::enter_recovery_mode(
            &mut self.sd,
            &*self.app,
            &mut *self.writer,
            &mut *self.store,
            &mut *self.ui,
            reason,
            &mut manual_state,
        ) {
            Ok(()) => {
                self.stats.register_recovery_success();
                self.persist_stats()?;
                self.ui.notify(
                    BootReason::SdRecovery,
                    "manual recovery complete; restarting",
                    Some(100),
                );
                Ok(BootOutcome::Restarting)
            }
            Err(e) => {
                // Tier 3: nothing left to try.
                error!("manual recovery failed: {e}");
                self.stats.register_recovery_failure();
                self.stats.last_boot_reason = BootReason::Emergency;
                self.persist_stats()?;
                self.ui.notify_critical(-1, "all recovery methods failed", false);
                Ok(BootOutcome::CriticalFailure)
            }
        }
    }

    /// Thin wrapper for the application's startup sequence: the
    /// emergency state surfaces as an error so startup code halts
    /// instead of continuing.
    pub fn decide_and_proceed(&mut self) -> BootResult<BootOutcome> {
        match self.decide_boot_path()? {
            BootOutcome::CriticalFailure => {
                Err(BootError::InvalidState("recovery exhausted; device in emergency state"))
            }
            outcome => Ok(outcome),
        }
    }

    /// Called by the application once its own health checks passed.
    /// Breaks the forced-recovery escalation chain.
    pub fn mark_boot_successful(&mut self) -> BootResult<()> {
        self.stats.reset_attempts();
        self.persist_stats()?;
        info!("boot marked successful; attempt counters reset");
        Ok(())
    }

    /// Mark the boot successful, then re-verify integrity as a
    /// confirmation. Integrity trouble is reported but the counters
    /// stay reset.
    pub fn post_boot_check(&mut self) -> BootResult<()> {
        self.mark_boot_successful()?;
        match integrity::verify_running_image(&*self.app, &mut *self.store) {
            Ok(_) => {
                info!("post-boot integrity confirmation passed");
                Ok(())
            }
            Err(e) => {
                warn!("post-boot integrity confirmation failed: {e}");
                Err(e)
            }
        }
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> &BootStatistics {
        &self.stats
    }

    /// Replace and persist the statistics record. Used by the
    /// application-update module after it finishes an update cycle.
    pub fn store_stats(&mut self, stats: BootStatistics) -> BootResult<()> {
        self.stats = stats;
        self.persist_stats()
    }

    /// Read the persisted integrity baseline.
    pub fn read_baseline(&self) -> BootResult<Option<FirmwareDigest>> {
        self.store.read_digest()
    }

    /// Persist a new integrity baseline. The application-update
    /// module calls this after a successful download-and-flash so
    /// the boot-time baseline matches the new image.
    pub fn store_baseline(&mut self, digest: &FirmwareDigest) -> BootResult<()> {
        self.store.store_digest(digest)
    }

    /// Operator- or self-test-triggered recovery, independent of the
    /// integrity verdict.
    pub fn force_recovery(&mut self) -> BootResult<BootOutcome> {
        info!("recovery forced by operator request");
        let mut state = RecoveryState::Idle;
        match self.sd.run(&*self.app, &mut *self.writer, &mut *self.store, &mut state) {
            Ok(()) => {
                self.stats.register_recovery_success();
                self.persist_stats()?;
                Ok(BootOutcome::Restarting)
            }
            Err(e) => {
                error!("forced recovery failed in state '{state}': {e}");
                self.stats.register_recovery_failure();
                self.persist_stats()?;
                Err(e)
            }
        }
    }

    /// Wipe the baseline and reset the statistics to the first-boot
    /// record.
    pub fn factory_reset(&mut self) -> BootResult<()> {
        warn!("factory reset of the boot subsystem");
        self.store.clear_digest()?;
        self.stats = BootStatistics::first_boot();
        self.persist_stats()?;
        info!("factory reset complete");
        Ok(())
    }

    /// Deliberately corrupt the stored baseline so the next boot is
    /// forced into recovery. Debug/test facility.
    pub fn simulate_corruption(&mut self) -> BootResult<()> {
        warn!("overwriting baseline with a poisoned digest; next boot will recover");
        self.store.store_digest(&FirmwareDigest::from_bytes([0xFF; 32]))
    }

    /// Quick sequential health check of the subsystem.
    pub fn run_self_test(&mut self) -> BootResult<SelfTestReport> {
        info!("=== bootloader self test ===");

        let stats_readable = self.store.load_stats().is_ok();
        if stats_readable {
            info!("self test: statistics store readable (boots: {})", self.stats.total_boots);
        } else {
            error!("self test: statistics store unreadable");
        }

        let integrity_ok = integrity::verify_running_image(&*self.app, &mut *self.store).is_ok();
        if !integrity_ok {
            warn!("self test: integrity problem detected");
        }

        let media_accessible = self.sd.check_accessibility().is_ok();
        if !media_accessible {
            warn!("self test: recovery medium not accessible");
        }

        Ok(SelfTestReport { stats_readable, integrity_ok, media_accessible })
    }
}
