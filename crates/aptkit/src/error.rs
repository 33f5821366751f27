//! Error types for apt operations.
//!
//! Errors are categorized to enable smart retry logic and appropriate
//! user feedback. Each error type includes contextual information to
//! help users understand what went wrong and how to fix it.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of apt errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable)
    Network,
    /// Package lock held by another process (transient, caller waits)
    Locked,
    /// Package has no installation candidate
    NotFound,
    /// Unmet dependencies or an interrupted dpkg run
    Broken,
    /// Not running as root
    Permission,
    /// apt-get not found
    AptNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the client should relaunch the command itself.
    ///
    /// Lock contention is left to the caller, which owns the wait budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Locked => "Package database locked",
            Self::NotFound => "Package not found",
            Self::Broken => "Broken package state",
            Self::Permission => "Permission denied",
            Self::AptNotFound => "apt not installed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and mirror configuration",
            Self::Locked => "Wait for the other package operation (e.g. unattended-upgrades) to finish",
            Self::NotFound => "Verify the package name or add the repository that provides it",
            Self::Broken => "Run 'dpkg --configure -a' and 'apt-get -f install'",
            Self::Permission => "Run as root",
            Self::AptNotFound => "This tool supports Debian and Ubuntu hosts only",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during apt operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error (mirror unreachable, DNS, etc.)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// Another process holds the dpkg or apt lists lock
    #[error("package database locked: {message}")]
    Locked {
        /// Message reported by apt
        message: String,
    },

    /// Package has no installation candidate
    #[error("package not found: {name}")]
    NotFound {
        /// Name of the package that could not be found
        name: String,
    },

    /// Unmet dependencies or interrupted dpkg
    #[error("broken packages: {message}")]
    Broken {
        /// Description reported by apt
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// apt-get is not installed or not found in PATH
    #[error("apt-get not found; only Debian-based hosts are supported")]
    AptNotFound,

    /// Source list could not be read
    #[error("could not read source list {path}: {source}")]
    SourceList {
        /// Path of the source list
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Command execution failed
    #[error("{message}{}", stderr_suffix(.stderr))]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Broken { .. } => ErrorCategory::Broken,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::AptNotFound => ErrorCategory::AptNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from apt/dpkg command output.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_apt_output(stderr: &str, package_name: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();

        // Non-root callers also get a lock error; report the real cause
        if stderr_lower.contains("are you root")
            || stderr_lower.contains("permission denied")
            || stderr_lower.contains("operation not permitted")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        // Lock contention
        if stderr_lower.contains("could not get lock")
            || stderr_lower.contains("unable to acquire the dpkg frontend lock")
            || stderr_lower.contains("unable to lock directory")
            || stderr_lower.contains("is another process using it")
        {
            return Error::Locked {
                message: stderr.trim().to_string(),
            };
        }

        // Network errors
        if stderr_lower.contains("temporary failure resolving")
            || stderr_lower.contains("could not resolve")
            || stderr_lower.contains("failed to fetch")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("hash sum mismatch")
            || stderr_lower.contains("some index files failed to download")
        {
            return Error::Network {
                message: stderr.trim().to_string(),
            };
        }

        // Not found errors
        if stderr_lower.contains("unable to locate package")
            || stderr_lower.contains("has no installation candidate")
            || stderr_lower.contains("couldn't find any package")
        {
            return Error::NotFound {
                name: package_name.unwrap_or("unknown").to_string(),
            };
        }

        // Broken state
        if stderr_lower.contains("unmet dependencies")
            || stderr_lower.contains("dpkg was interrupted")
            || stderr_lower.contains("held broken packages")
        {
            return Error::Broken {
                message: stderr.trim().to_string(),
            };
        }

        // Default to command failed
        Error::CommandFailed {
            message: format!(
                "apt command failed{}",
                package_name
                    .map(|n| format!(" for {n}"))
                    .unwrap_or_default()
            ),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for apt operations.
pub type Result<T> = std::result::Result<T, Error>;
