// CLASSIFICATION: COMMUNITY
// Filename: bootctl.rs v0.5
// Author: Lukas Bower
// Date Modified: 2027-08-13

//! Operator CLI for the Thermacore boot subsystem.
//!
//! Drives the same library the firmware startup path uses: boot
//! decision, statistics, self test, forced recovery and the debug
//! facilities. Intended for the simulator build and bench rigs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use thermacore::bootloader::config::{BOOTLOADER_VERSION, STORE_NAMESPACE};
use thermacore::bootloader::integrity;
use thermacore::bootloader::platform::{FileImage, FileImageWriter};
use thermacore::bootloader::recovery_mode::LogUi;
use thermacore::bootloader::sd_recovery::DirMedium;
use thermacore::bootloader::store::FsKvStore;
use thermacore::{BootOutcome, BootloaderContext};

#[derive(Parser)]
#[command(name = "bootctl", version, about = "Thermacore boot-integrity control")]
struct Cli {
    /// Directory holding the persisted bootloader state.
    #[arg(long, default_value = "/var/lib/thermacore")]
    data_dir: PathBuf,

    /// Path of the application image region.
    #[arg(long, default_value = "/var/lib/thermacore/app.bin")]
    image: PathBuf,

    /// Mount root of the recovery medium.
    #[arg(long, default_value = "/sdcard")]
    media: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the boot decision and report the outcome.
    Check,
    /// Reset the attempt counters after a healthy boot.
    MarkSuccess,
    /// Print the persisted boot statistics.
    Stats,
    /// Trigger recovery from the medium regardless of integrity.
    ForceRecovery,
    /// Run the subsystem self test.
    SelfTest,
    /// Wipe baseline and statistics back to first-boot state.
    FactoryReset,
    /// Poison the stored baseline to force recovery on next boot.
    SimulateCorruption,
    /// Measure a standalone image file and show its header if any.
    Inspect { file: PathBuf },
}

fn open_context(cli: &Cli) -> anyhow::Result<BootloaderContext> {
    let store = FsKvStore::open(&cli.data_dir, STORE_NAMESPACE)
        .with_context(|| format!("opening state store under {}", cli.data_dir.display()))?;
    BootloaderContext::init(
        Box::new(store),
        Box::new(FileImage::new(&cli.image)),
        Box::new(DirMedium::new(&cli.media)),
        Box::new(FileImageWriter::new(&cli.image)),
        Box::new(LogUi),
    )
    .context("initializing boot subsystem")
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Command::Inspect { file } = &cli.command {
        let report = integrity::inspect_image_file(file)?;
        println!("size:   {} bytes", report.size);
        println!("sha256: {}", report.calculated_digest);
        match report.header {
            Some(header) => {
                println!("header: version {} ({})", header.version, header.build_info_str());
            }
            None => println!("header: none"),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut ctx = open_context(&cli)?;
    match cli.command {
        Command::Inspect { .. } => unreachable!("handled above"),
        Command::Check => match ctx.decide_and_proceed()? {
            BootOutcome::ContinueNormalBoot => {
                println!("image trusted; normal boot may continue");
            }
            BootOutcome::Restarting => {
                // On the device this is the point of no return.
                println!("recovery flashed a new image; restart the device now");
            }
            BootOutcome::CriticalFailure => unreachable!("surfaced as error"),
        },
        Command::MarkSuccess => {
            ctx.mark_boot_successful()?;
            println!("attempt counters reset");
        }
        Command::Stats => {
            let stats = ctx.stats();
            println!("bootloader version:  {BOOTLOADER_VERSION}");
            println!("total boots:         {}", stats.total_boots);
            println!("boot attempts:       {}", stats.boot_attempts);
            println!("total recoveries:    {}", stats.total_recoveries);
            println!("recovery attempts:   {}", stats.recovery_attempts);
            println!("first boot:          {}", if stats.first_boot { "yes" } else { "no" });
            println!("last boot reason:    {}", stats.last_boot_reason);
            println!("last recovery stamp: {}", stats.last_recovery_timestamp);
        }
        Command::ForceRecovery => {
            ctx.force_recovery()?;
            println!("recovery complete; restart the device now");
        }
        Command::SelfTest => {
            let report = ctx.run_self_test()?;
            println!("stats store: {}", if report.stats_readable { "ok" } else { "FAIL" });
            println!("integrity:   {}", if report.integrity_ok { "ok" } else { "warning" });
            println!("media:       {}", if report.media_accessible { "ok" } else { "warning" });
            if !report.passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::FactoryReset => {
            ctx.factory_reset()?;
            println!("baseline and statistics reset");
        }
        Command::SimulateCorruption => {
            ctx.simulate_corruption()?;
            println!("baseline poisoned; next boot will enter recovery");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    info!("bootctl v{BOOTLOADER_VERSION}");
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bootctl: {e:#}");
            ExitCode::FAILURE
        }
    }
}
