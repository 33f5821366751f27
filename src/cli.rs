use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hoststrap")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a web + database + PHP host, idempotently", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file [default: /etc/hoststrap/config.toml]
    #[arg(short, long, global = true, env = "HOSTSTRAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision the host (default)
    Apply(ApplyArgs),

    /// Show which steps are already satisfied, changing nothing
    Status(StatusArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Default)]
pub struct ApplyArgs {
    /// Never purge and reinstall the database server if the credential
    /// bootstrap fails
    #[arg(long)]
    pub no_reinstall: bool,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
