//! # aptkit
//!
//! Rust library for apt/dpkg package management on Debian-family hosts.
//!
//! This crate provides functionality for:
//! - Querying whether packages are installed and at which version
//! - Installing and purging packages with smart retry logic
//! - Registering third-party repositories and detecting existing ones
//!
//! ## Example
//!
//! ```no_run
//! use aptkit::{Client, Package, Repository};
//!
//! let client = Client::new().expect("apt not available");
//!
//! let php = Repository::ppa("ondrej/php");
//! if !client.has_repository(&php.pattern).unwrap() {
//!     client.add_repository(&php).unwrap();
//!     client.refresh_index().unwrap();
//! }
//!
//! client.install(&[Package::new("nginx")]).expect("Install failed");
//! ```
//!
//! ## Retry Logic
//!
//! Network errors during mutations are retried with exponential backoff.
//! Configure retry behavior with [`RetryConfig`]. Lock contention surfaces
//! as [`Error::Locked`] on the first attempt so the caller can wait for the
//! lock on its own budget.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod sources;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{Package, Repository, RetryConfig};

use backend::{Backend, apt::AptBackend};

/// High-level client for apt operations.
///
/// The client wraps a backend and adds retry behavior on top of it.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a new Client with the default backend.
    ///
    /// Returns an error if apt-get is not installed.
    pub fn new() -> Result<Self> {
        let backend = AptBackend::new()?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry configuration used by mutating operations.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check if a package is installed.
    pub fn is_installed(&self, package: &Package) -> Result<bool> {
        self.backend.is_installed(package)
    }

    /// Check if a repository matching `pattern` is configured.
    pub fn has_repository(&self, pattern: &str) -> Result<bool> {
        self.backend.has_repository(pattern)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Install packages, retrying network failures.
    pub fn install(&self, packages: &[Package]) -> Result<()> {
        self.install_with_callback(packages, &retry::LogCallback)
    }

    /// Install packages with retry and custom callback.
    pub fn install_with_callback(
        &self,
        packages: &[Package],
        callback: &dyn retry::RetryCallback,
    ) -> Result<()> {
        retry::with_retry(&self.retry, Some(callback), || self.backend.install(packages))
    }

    /// Purge a package and its configuration files.
    pub fn remove_purge(&self, package: &Package) -> Result<()> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.backend.remove_purge(package)
        })
    }

    /// Seed debconf answers ahead of an install.
    pub fn preseed(&self, selections: &[String]) -> Result<()> {
        self.backend.preseed(selections)
    }

    /// Register a repository.
    pub fn add_repository(&self, repository: &Repository) -> Result<()> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.backend.add_repository(repository)
        })
    }

    /// Refresh the package index.
    pub fn refresh_index(&self) -> Result<()> {
        retry::with_retry(&self.retry, Some(&retry::LogCallback), || {
            self.backend.refresh_index()
        })
    }
}
