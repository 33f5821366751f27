//! Database credential bootstrap
//!
//! A fresh database server authenticates its administrative account by OS
//! identity. The bootstrap switches that account to a generated secret. If
//! the change is rejected, [`ReinstallDatabase`] wipes the server and the
//! executor retries the bootstrap exactly once with a new secret.

use crate::host::{self, Host};
use anyhow::{Context, Result};
use aptkit::Package;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use stepkit::{Action, ApplyContext, Recovery, Secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Success,
    Failed,
}

/// What one bootstrap attempt produced
#[derive(Debug)]
pub struct CredentialBootstrapResult {
    pub attempt_number: u32,
    pub outcome: BootstrapOutcome,
    /// Only present on success
    pub generated_secret: Option<Secret>,
}

impl fmt::Display for CredentialBootstrapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            BootstrapOutcome::Success => "success",
            BootstrapOutcome::Failed => "failed",
        };
        write!(f, "credential bootstrap attempt {}: {outcome}", self.attempt_number)?;
        if let Some(secret) = &self.generated_secret {
            write!(f, " (secret {secret}, {} chars)", secret.len())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct BootstrapCredential {
    host: Host,
    user: String,
    scope: String,
    secret_bytes: usize,
}

impl BootstrapCredential {
    pub fn new(host: &Host, user: &str, scope: &str, secret_bytes: usize) -> Self {
        Self {
            host: host.clone(),
            user: user.to_string(),
            scope: scope.to_string(),
            secret_bytes,
        }
    }
}

impl Action for BootstrapCredential {
    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        // Never reuse a secret from an earlier attempt
        let secret = self
            .host
            .secrets
            .random_hex(self.secret_bytes)
            .context("Failed to generate secret")?;

        let changed = self
            .host
            .database
            .set_credential(&self.user, &self.scope, &secret);

        let result = CredentialBootstrapResult {
            attempt_number: ctx.attempt.number(),
            outcome: if changed.is_ok() {
                BootstrapOutcome::Success
            } else {
                BootstrapOutcome::Failed
            },
            generated_secret: changed.is_ok().then(|| secret.clone()),
        };
        log::info!("{result}");

        changed.with_context(|| format!("Failed to set credential for {}", self.user))?;
        ctx.summary.set_credential(self.user.as_str(), secret);
        Ok(())
    }
}

/// Purge the database server with its data, install it again, start it
#[derive(Debug)]
pub struct ReinstallDatabase {
    host: Host,
    package: Package,
    unit: String,
    data_dirs: Vec<PathBuf>,
}

impl ReinstallDatabase {
    pub fn new(host: &Host, package: &str, unit: &str, data_dirs: Vec<PathBuf>) -> Self {
        Self {
            host: host.clone(),
            package: Package::new(package),
            unit: unit.to_string(),
            data_dirs,
        }
    }
}

impl Recovery for ReinstallDatabase {
    fn description(&self) -> String {
        format!("purge and reinstall {}", self.package)
    }

    fn remediate(&self, ctx: &mut ApplyContext) -> Result<()> {
        log::warn!("Reinstalling {}; existing databases are discarded", self.package);

        ctx.package_op(|| host::apt(self.host.apt.remove_purge(&self.package)))
            .with_context(|| format!("Failed to purge {}", self.package))?;

        for dir in &self.data_dirs {
            match fs::remove_dir_all(dir) {
                Ok(()) => log::info!("Removed {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", dir.display()));
                }
            }
        }

        ctx.package_op(|| host::apt(self.host.apt.install(std::slice::from_ref(&self.package))))
            .with_context(|| format!("Failed to reinstall {}", self.package))?;

        self.host
            .services
            .enable_and_start(&self.unit)
            .with_context(|| format!("Failed to start {}", self.unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use stepkit::{Attempt, RunSummary};

    #[test]
    fn test_result_display_redacts() {
        let result = CredentialBootstrapResult {
            attempt_number: 2,
            outcome: BootstrapOutcome::Success,
            generated_secret: Some(Secret::new("0123456789abcdef")),
        };
        let line = result.to_string();
        assert!(line.contains("attempt 2: success"));
        assert!(line.contains("16 chars"));
        assert!(!line.contains("0123456789abcdef"));
    }

    #[test]
    fn test_apply_records_credential() {
        let fake = FakeHost::new();
        let action = BootstrapCredential::new(&fake.host(), "root", "localhost", 16);
        let mut summary = RunSummary::new();
        let mut ctx = ApplyContext::new("bootstrap", Attempt::First, &mut summary, None);

        action.apply(&mut ctx).unwrap();
        let credential = summary.credential.unwrap();
        assert_eq!(credential.user, "root");
        assert_eq!(credential.secret.expose(), "secret-1");
    }

    #[test]
    fn test_failed_apply_leaves_summary_empty() {
        let fake = FakeHost::new();
        fake.fail_credential(1);
        let action = BootstrapCredential::new(&fake.host(), "root", "localhost", 16);
        let mut summary = RunSummary::new();
        let mut ctx = ApplyContext::new("bootstrap", Attempt::First, &mut summary, None);

        assert!(action.apply(&mut ctx).is_err());
        assert!(summary.credential.is_none());
    }

    #[test]
    fn test_remediation_wipes_data_dirs() {
        use stepkit::{LockArbiter, LockConfig, LockProbe};
        use std::path::Path;
        use std::time::Duration;

        struct Free;
        impl LockProbe for Free {
            fn is_held(&self, _path: &Path) -> Result<bool> {
                Ok(false)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("mysql");
        fs::create_dir_all(data.join("mysql")).unwrap();
        let missing = dir.path().join("never-created");

        let fake = FakeHost::new();
        fake.install_now("mysql-server");
        let recovery = ReinstallDatabase::new(
            &fake.host(),
            "mysql-server",
            "mysql",
            vec![data.clone(), missing],
        );
        let lock = LockArbiter::new(
            LockConfig::new(vec![], Duration::from_millis(1), Duration::from_millis(1)),
            Free,
        );
        let mut summary = RunSummary::new();
        let mut ctx =
            ApplyContext::new("bootstrap", Attempt::AfterRemediation, &mut summary, Some(&lock));

        recovery.remediate(&mut ctx).unwrap();
        assert!(!data.exists());
        assert_eq!(
            fake.events(),
            vec!["purge mysql-server", "install mysql-server", "enable mysql"]
        );
    }
}
