//! Progress indicators for hoststrap CLI.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use stepkit::{ProgressCallback, StepOutcome};

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "✓".green(), msg);
}

pub fn finish_skip(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "·".dimmed(), msg.dimmed());
}

pub fn finish_warn(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("{} {}", "⚠".yellow(), msg);
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    eprintln!("{} {}", "✗".red(), msg);
}

/// One spinner per step, replaced by a status line when the step ends
pub struct StepProgress {
    current: Option<ProgressBar>,
    quiet: bool,
}

impl StepProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            current: None,
            quiet,
        }
    }
}

impl ProgressCallback for StepProgress {
    fn on_step_start(&mut self, index: usize, total: usize, name: &str) {
        if self.quiet {
            return;
        }
        let label = format!("[{index}/{total}]").blue().bold();
        self.current = Some(spinner(&format!("{label} {name}")));
    }

    fn on_step_complete(&mut self, name: &str, outcome: &StepOutcome) {
        let Some(pb) = self.current.take() else {
            return;
        };
        match outcome {
            StepOutcome::Skipped { .. } => finish_skip(&pb, &format!("{name} (already done)")),
            StepOutcome::Applied => finish_success(&pb, name),
            StepOutcome::Recovered { attempts } => {
                finish_success(&pb, &format!("{name} (recovered on attempt {attempts})"));
            }
            StepOutcome::Warned { error } => finish_warn(&pb, &format!("{name}: {error}")),
        }
    }

    fn on_remediation(&mut self, name: &str, _error: &str) {
        if let Some(pb) = &self.current {
            pb.set_message(format!("{name} (first attempt failed, remediating)"));
        }
    }

    fn on_step_failed(&mut self, name: &str, error: &str) {
        if let Some(pb) = self.current.take() {
            finish_error(&pb, &format!("{name}: {error}"));
        }
    }
}
