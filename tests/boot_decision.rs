// CLASSIFICATION: COMMUNITY
// Filename: boot_decision.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-08-13

//! End-to-end boot decision scenarios across simulated power cycles.
//!
//! Each test builds the subsystem the way the firmware startup path
//! does, against a scratch directory standing in for the state
//! partition, the application image region and the SD card.

use std::fs;
use std::path::Path;

use thermacore::bootloader::config::{
    BASE_DIGEST, BASE_IMAGE, FIRMWARE_MIN_SIZE, RECOVERY_DIR, STORE_NAMESPACE,
};
use thermacore::bootloader::error::BootError;
use thermacore::bootloader::hash::hash_bytes;
use thermacore::bootloader::platform::{FileImage, FileImageWriter};
use thermacore::bootloader::recovery_mode::LogUi;
use thermacore::bootloader::sd_recovery::{DirMedium, SdRecovery};
use thermacore::bootloader::stats::BootReason;
use thermacore::bootloader::store::FsKvStore;
use thermacore::{BootOutcome, BootloaderContext};

fn write_image(root: &Path, fill: u8) {
    fs::write(root.join("app.bin"), vec![fill; FIRMWARE_MIN_SIZE as usize]).unwrap();
}

/// One simulated power-up. The card directory is only wired in when
/// it exists, matching a physically absent card otherwise.
fn power_up(root: &Path) -> BootloaderContext {
    let image = root.join("app.bin");
    BootloaderContext::init(
        Box::new(FsKvStore::open(root, STORE_NAMESPACE).unwrap()),
        Box::new(FileImage::new(&image)),
        Box::new(DirMedium::new(root.join("card"))),
        Box::new(FileImageWriter::new(&image)),
        Box::new(LogUi),
    )
    .unwrap()
}

fn place_base_candidate(root: &Path, content: &[u8]) {
    let dir = root.join("card").join(RECOVERY_DIR);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(BASE_IMAGE), content).unwrap();
    SdRecovery::write_digest_file(&dir.join(BASE_DIGEST), &hash_bytes(content)).unwrap();
}

#[test]
fn fresh_device_trusts_image_and_stores_baseline() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);
    fs::create_dir_all(root.path().join("card")).unwrap();

    let mut ctx = power_up(root.path());
    assert!(ctx.stats().first_boot);
    assert_eq!(ctx.stats().total_boots, 1);

    let outcome = ctx.decide_boot_path().unwrap();
    assert_eq!(outcome, BootOutcome::ContinueNormalBoot);
    assert!(ctx.read_baseline().unwrap().is_some());
    assert_eq!(ctx.stats().boot_attempts, 0);
}

#[test]
fn corruption_with_valid_card_recovers_and_restarts() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);
    let good_image = vec![0x42u8; FIRMWARE_MIN_SIZE as usize];
    place_base_candidate(root.path(), &good_image);

    // Establish a baseline, then poison it behind the device's back.
    let mut ctx = power_up(root.path());
    assert_eq!(ctx.decide_boot_path().unwrap(), BootOutcome::ContinueNormalBoot);
    ctx.simulate_corruption().unwrap();
    drop(ctx);

    let mut ctx = power_up(root.path());
    let outcome = ctx.decide_boot_path().unwrap();
    assert_eq!(outcome, BootOutcome::Restarting);
    assert_eq!(ctx.stats().total_recoveries, 1);
    assert_eq!(ctx.stats().recovery_attempts, 0);
    assert_eq!(ctx.stats().last_boot_reason, BootReason::SdRecovery);
    drop(ctx);

    // After the mandated restart the flashed image must verify clean.
    let mut ctx = power_up(root.path());
    assert_eq!(ctx.decide_boot_path().unwrap(), BootOutcome::ContinueNormalBoot);
}

#[test]
fn absent_card_escalates_to_critical_failure() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);
    // No card directory at all: every mount attempt fails.

    let mut ctx = power_up(root.path());
    ctx.decide_boot_path().unwrap();
    ctx.simulate_corruption().unwrap();
    drop(ctx);

    let mut ctx = power_up(root.path());
    let outcome = ctx.decide_boot_path().unwrap();
    assert_eq!(outcome, BootOutcome::CriticalFailure);
    // Automatic and manual tiers each record one failed attempt.
    assert_eq!(ctx.stats().recovery_attempts, 2);
    assert_eq!(ctx.stats().last_boot_reason, BootReason::Emergency);
}

#[test]
fn emergency_state_surfaces_as_error_to_startup_code() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);

    let mut ctx = power_up(root.path());
    ctx.decide_boot_path().unwrap();
    ctx.simulate_corruption().unwrap();
    drop(ctx);

    let mut ctx = power_up(root.path());
    let err = ctx.decide_and_proceed().unwrap_err();
    assert!(matches!(err, BootError::InvalidState(_)));
}

#[test]
fn exhausted_boot_attempts_force_recovery_despite_intact_image() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);
    let good_image = vec![0x42u8; FIRMWARE_MIN_SIZE as usize];
    place_base_candidate(root.path(), &good_image);

    // Three power-ups with no mark_boot_successful in between: the
    // application never came up, whatever the image digest says.
    drop(power_up(root.path()));
    drop(power_up(root.path()));
    let mut ctx = power_up(root.path());
    assert_eq!(ctx.stats().boot_attempts, 3);

    let outcome = ctx.decide_boot_path().unwrap();
    assert_eq!(outcome, BootOutcome::Restarting);
    assert_eq!(ctx.stats().total_recoveries, 1);
}

#[test]
fn successful_boot_breaks_the_escalation_chain() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), 0x42);
    fs::create_dir_all(root.path().join("card")).unwrap();

    drop(power_up(root.path()));
    drop(power_up(root.path()));
    let mut ctx = power_up(root.path());
    ctx.mark_boot_successful().unwrap();
    drop(ctx);

    // The next power-up starts from a clean attempt counter.
    let mut ctx = power_up(root.path());
    assert_eq!(ctx.stats().boot_attempts, 1);
    assert_eq!(ctx.decide_boot_path().unwrap(), BootOutcome::ContinueNormalBoot);
}
