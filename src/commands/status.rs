use anyhow::Result;
use colored::Colorize;

use crate::cli::StatusArgs;
use crate::config::Config;
use crate::host::{self, Host, SystemOracle};
use crate::steps;
use crate::ui;

/// Evaluate every step's precondition without applying anything
pub fn run(config: &Config, args: &StatusArgs) -> Result<()> {
    if !host::is_root() {
        log::warn!("Not running as root; the credential check may be inaccurate");
    }

    let host = Host::system(config)?;
    let pipeline = steps::build_pipeline(config, &host);
    let statuses = stepkit::status(&pipeline, &SystemOracle::new(host));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    ui::header("Host Status");
    for status in &statuses {
        println!(
            "  {} {:<32} {}",
            ui::check_mark(status.satisfied, status.critical),
            status.name,
            status.check.dimmed()
        );
    }

    let pending = statuses.iter().filter(|s| !s.satisfied).count();
    println!();
    if pending == 0 {
        ui::success("Host is fully provisioned");
    } else {
        ui::info(&format!(
            "{} of {} steps pending; run `hoststrap apply`",
            pending.to_string().bold(),
            statuses.len()
        ));
    }
    Ok(())
}
