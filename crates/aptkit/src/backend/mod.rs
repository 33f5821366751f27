//! Backend abstraction for apt operations.
//!
//! The [`Backend`] trait defines the interface for interacting with the
//! package manager, allowing for different implementations (real CLI,
//! in-memory fakes for testing).

pub mod apt;

use crate::error::Result;
use crate::types::{Package, Repository};

/// Backend trait for package-manager operations.
///
/// Query methods have no side effects. Mutating methods must only be called
/// once the package lock is known to be free; the backend itself does not
/// wait for it, and reports a held lock as [`Error::Locked`](crate::Error::Locked).
pub trait Backend: Send + Sync {
    /// Check if a package is installed, regardless of version.
    fn is_installed(&self, package: &Package) -> Result<bool>;

    /// Install packages in one transaction.
    fn install(&self, packages: &[Package]) -> Result<()>;

    /// Remove a package together with its configuration files.
    fn remove_purge(&self, package: &Package) -> Result<()>;

    /// Seed debconf answers so a later install runs without prompting.
    ///
    /// Each selection is one `debconf-set-selections` line, e.g.
    /// `phpmyadmin phpmyadmin/dbconfig-install boolean false`.
    fn preseed(&self, selections: &[String]) -> Result<()>;

    /// Register a third-party repository.
    fn add_repository(&self, repository: &Repository) -> Result<()>;

    /// Check if an active source entry matches the pattern.
    fn has_repository(&self, pattern: &str) -> Result<bool>;

    /// Refresh the package index (`apt-get update`).
    fn refresh_index(&self) -> Result<()>;
}
