mod cli;
mod commands;
mod config;
mod host;
mod progress;
mod runner;
mod steps;
mod summary;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{ApplyArgs, Cli, Command};
use config::Config;
use std::io;
use std::process::ExitCode;
use stepkit::PipelineError;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context { quiet: cli.quiet };
    let config_path = cli.config;

    match cli.command.unwrap_or_else(|| Command::Apply(ApplyArgs::default())) {
        Command::Apply(args) => {
            let config = Config::load(config_path.as_deref())?;
            commands::apply::run(&ctx, config, &args)
        }
        Command::Status(args) => {
            let config = Config::load(config_path.as_deref())?;
            commands::status::run(&config, &args)
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "hoststrap", &mut io::stdout());
            Ok(())
        }
    }
}

/// Process exit status for an error
///
/// 2 lock timeout, 3 critical step failed, 4 credential bootstrap failed
/// after its reinstall, 5 proxy configuration rejected, 1 anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::LockTimeout { .. }) => 2,
        Some(PipelineError::FatalStepFailure { .. }) => 3,
        Some(PipelineError::RecoveryExhausted { .. }) => 4,
        Some(PipelineError::ConfigValidationFailed { .. }) => 5,
        None => 1,
    }
}
