//! Core types for idempotent step orchestration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A query about live system state that decides whether a step must run
///
/// Every step carries one of these as its precondition. When it already
/// holds, the step is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Precondition {
    /// The package registry reports the package present, any version
    PackageInstalled { name: String },
    /// The long-running service is enabled and running
    UnitActive { name: String },
    /// A source-list entry matching the pattern exists
    RepositoryPresent { pattern: String },
    /// The marker substring is present in the file
    FileContains { path: PathBuf, marker: String },
    /// The database account already authenticates with a password
    CredentialConfigured { user: String },
}

impl Precondition {
    pub fn package(name: impl Into<String>) -> Self {
        Self::PackageInstalled { name: name.into() }
    }

    pub fn unit(name: impl Into<String>) -> Self {
        Self::UnitActive { name: name.into() }
    }

    pub fn repository(pattern: impl Into<String>) -> Self {
        Self::RepositoryPresent {
            pattern: pattern.into(),
        }
    }

    pub fn file_contains(path: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        Self::FileContains {
            path: path.into(),
            marker: marker.into(),
        }
    }

    pub fn credential(user: impl Into<String>) -> Self {
        Self::CredentialConfigured { user: user.into() }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageInstalled { name } => write!(f, "package {name} installed"),
            Self::UnitActive { name } => write!(f, "unit {name} active"),
            Self::RepositoryPresent { pattern } => write!(f, "repository {pattern} present"),
            Self::FileContains { path, marker } => {
                write!(f, "{} contains '{marker}'", path.display())
            }
            Self::CredentialConfigured { user } => write!(f, "credential for {user} configured"),
        }
    }
}

/// Outcome of running a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Precondition already held, nothing was mutated
    Skipped { reason: String },
    /// Apply ran and the postcondition holds
    Applied,
    /// First attempt failed, remediation plus a second attempt succeeded
    Recovered { attempts: u32 },
    /// Non-critical step failed, the run continued
    Warned { error: String },
}

impl StepOutcome {
    /// Check if the step changed the system
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Applied | Self::Recovered { .. })
    }

    /// Check if the step ended in the desired state
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, Self::Warned { .. })
    }
}

/// Per-step record kept in the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Which attempt of a step is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attempt {
    /// Normal first attempt
    First,
    /// The single retry after a remediation
    AfterRemediation,
}

impl Attempt {
    /// 1-indexed attempt number
    pub fn number(self) -> u32 {
        match self {
            Self::First => 1,
            Self::AfterRemediation => 2,
        }
    }
}

/// Output from a command run by a capability implementation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
