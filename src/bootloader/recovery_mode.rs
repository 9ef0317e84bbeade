// CLASSIFICATION: COMMUNITY
// Filename: recovery_mode.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-08-06

//! Manual recovery mode and the UI collaborator seam.
//!
//! This layer owns no rendering. It emits structured events through
//! [`RecoveryUi`]; whether they end up on a panel, a UART console or
//! a log file is entirely the collaborator's business.

use log::{error, info};

use crate::bootloader::error::BootResult;
use crate::bootloader::platform::{AppImage, ImageWriter};
use crate::bootloader::sd_recovery::{RecoveryState, SdRecovery};
use crate::bootloader::stats::BootReason;
use crate::bootloader::store::KvStore;

/// Structured notifications consumed by the display/UART collaborator.
pub trait RecoveryUi {
    /// Progress or status event. `progress` is a percentage when
    /// known, `None` when the step has no meaningful fraction.
    fn notify(&mut self, reason: BootReason, details: &str, progress: Option<i32>);

    /// Terminal failure notification. `recovery_possible = false`
    /// means the device is awaiting physical intervention.
    fn notify_critical(&mut self, code: i32, message: &str, recovery_possible: bool);
}

/// Default collaborator: renders events into the system log. Device
/// builds replace this with the panel/UART front-end.
#[derive(Default)]
pub struct LogUi;

impl RecoveryUi for LogUi {
    fn notify(&mut self, reason: BootReason, details: &str, progress: Option<i32>) {
        match progress {
            Some(p) => info!("[recovery] {reason}: {details} ({p}%)"),
            None => info!("[recovery] {reason}: {details}"),
        }
    }

    fn notify_critical(&mut self, code: i32, message: &str, recovery_possible: bool) {
        error!("[recovery] CRITICAL ({code}): {message}");
        if !recovery_possible {
            error!("[recovery] device is irrecoverable without physical intervention");
        }
    }
}

/// Operator-triggered recovery: announce the situation, retry the
/// full recovery pipeline once more, and leave usable instructions
/// behind when it fails too.
pub fn enter_recovery_mode(
    sd: &mut SdRecovery,
    app: &dyn AppImage,
    writer: &mut dyn ImageWriter,
    store: &mut dyn KvStore,
    ui: &mut dyn RecoveryUi,
    reason: BootReason,
    state: &mut RecoveryState,
) -> BootResult<()> {
    info!("=== entering manual recovery mode ===");
    ui.notify(reason, "device entered recovery mode", None);
    ui.notify(reason, "retrying recovery from external medium", None);

    match sd.run(app, writer, store, state) {
        Ok(()) => {
            ui.notify(BootReason::SdRecovery, "manual recovery succeeded", Some(100));
            Ok(())
        }
        Err(e) => {
            ui.notify(BootReason::Emergency, "manual recovery failed", None);
            // Keep the operator checklist on the wire even when the
            // medium itself is the problem.
            ui.notify(reason, "check that the card holds a valid image", None);
            ui.notify(reason, "copy base_firmware.bin and its .sha256 into /recovery/", None);
            ui.notify(reason, "then power-cycle the device", None);
            Err(e)
        }
    }
}
