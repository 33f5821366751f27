//! Apply command - provision the host
//!
//! new host → hoststrap → nginx, MySQL, PHP and phpMyAdmin, wired together

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Config;
use crate::host::{self, Host, RecordLockProbe, SystemOracle};
use crate::progress::StepProgress;
use crate::steps;
use crate::summary;
use crate::ui;
use stepkit::LockArbiter;

pub fn run(ctx: &Context, mut config: Config, args: &ApplyArgs) -> Result<()> {
    if args.no_reinstall {
        config.credential.reinstall_on_failure = false;
    }

    if !host::is_root() {
        bail!("hoststrap apply must run as root (try: sudo hoststrap apply)");
    }

    let host = Host::system(&config)?;
    let pipeline = steps::build_pipeline(&config, &host);
    let arbiter = LockArbiter::new(config.lock_config(), RecordLockProbe);
    let oracle = SystemOracle::new(host);

    if !ctx.quiet {
        ui::header("Provisioning host");
        ui::kv("Steps", &pipeline.len().to_string());
        ui::kv("PHP", &config.runtime.versions.join(", "));
        if !config.credential.reinstall_on_failure {
            ui::kv("Reinstall on failure", &"disabled".yellow().to_string());
        }
        println!();
    }

    let started = chrono::Local::now();
    let mut progress = StepProgress::new(ctx.quiet);
    let report = stepkit::run(&pipeline, &oracle, &arbiter, &mut progress)?;
    let elapsed = chrono::Local::now() - started;

    if report.is_noop() {
        ui::success("Nothing to do - host is already provisioned");
    } else {
        ui::success(&format!(
            "{} step(s) applied, {} already done",
            report.changed().to_string().bold(),
            report.skipped()
        ));
    }
    for warning in report.warnings() {
        ui::warn(&format!("{} did not complete", warning.name));
    }

    ui::header("Summary");
    print!("{}", summary::render(&report.summary));
    println!();
    ui::dim(&format!(
        "Finished {} in {}s",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        elapsed.num_seconds()
    ));

    Ok(())
}
