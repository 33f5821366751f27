//! In-memory host for tests
//!
//! One shared state behind every capability, plus an event log of each
//! mutating call in order.

use super::{DatabaseServer, Host, HostFacts, ProxyValidator, SecretGenerator, ServiceManager};
use anyhow::{Result, bail};
use aptkit::backend::Backend;
use aptkit::{Package, Repository, RetryConfig};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use stepkit::Secret;

#[derive(Debug, Default)]
pub struct FakeState {
    pub installed: BTreeSet<String>,
    pub active: BTreeSet<String>,
    pub repositories: Vec<String>,
    pub broken_packages: BTreeSet<String>,
    pub locked_installs: u32,
    pub credential_failures: u32,
    pub password_set: bool,
    pub secrets_issued: u32,
    pub reject_config: bool,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn host(&self) -> Host {
        let apt = aptkit::Client::with_backend(Box::new(self.clone()))
            .with_retry_config(RetryConfig::no_retry());
        Host {
            apt: Arc::new(apt),
            services: Arc::new(self.clone()),
            database: Arc::new(self.clone()),
            secrets: Arc::new(self.clone()),
            facts: Arc::new(self.clone()),
            proxy: Arc::new(self.clone()),
        }
    }

    pub fn install_now(&self, name: &str) {
        self.state().installed.insert(name.to_string());
    }

    pub fn activate(&self, unit: &str) {
        self.state().active.insert(unit.to_string());
    }

    /// Installing `name` fails with a non-retryable error
    pub fn break_package(&self, name: &str) {
        self.state().broken_packages.insert(name.to_string());
    }

    /// The next `n` installs find the dpkg lock held
    pub fn lock_installs(&self, n: u32) {
        self.state().locked_installs = n;
    }

    /// The next `n` credential changes fail
    pub fn fail_credential(&self, n: u32) {
        self.state().credential_failures = n;
    }

    pub fn reject_config(&self) {
        self.state().reject_config = true;
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    /// Number of logged events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn record(&self, event: String) {
        self.state().events.push(event);
    }
}

impl Backend for FakeHost {
    fn is_installed(&self, package: &Package) -> aptkit::Result<bool> {
        Ok(self.state().installed.contains(&package.name))
    }

    fn install(&self, packages: &[Package]) -> aptkit::Result<()> {
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        self.record(format!("install {}", names.join(" ")));

        let mut state = self.state();
        if state.locked_installs > 0 {
            state.locked_installs -= 1;
            return Err(aptkit::Error::Locked {
                message: "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 812 (unattended-upgr)".to_string(),
            });
        }
        if let Some(broken) = names.iter().find(|n| state.broken_packages.contains(**n)) {
            return Err(aptkit::Error::NotFound {
                name: (*broken).to_string(),
            });
        }
        state.installed.extend(names.iter().map(ToString::to_string));
        Ok(())
    }

    fn remove_purge(&self, package: &Package) -> aptkit::Result<()> {
        self.record(format!("purge {}", package.name));
        let mut state = self.state();
        state.installed.remove(&package.name);
        state.password_set = false;
        Ok(())
    }

    fn preseed(&self, selections: &[String]) -> aptkit::Result<()> {
        self.record(format!("preseed {}", selections.len()));
        Ok(())
    }

    fn add_repository(&self, repository: &Repository) -> aptkit::Result<()> {
        self.record(format!("add-repository {}", repository.spec));
        self.state().repositories.push(repository.pattern.clone());
        Ok(())
    }

    fn has_repository(&self, pattern: &str) -> aptkit::Result<bool> {
        Ok(self.state().repositories.iter().any(|r| r == pattern))
    }

    fn refresh_index(&self) -> aptkit::Result<()> {
        self.record("refresh".to_string());
        Ok(())
    }
}

impl ServiceManager for FakeHost {
    fn is_active(&self, unit: &str) -> Result<bool> {
        Ok(self.state().active.contains(unit))
    }

    fn enable_and_start(&self, unit: &str) -> Result<()> {
        self.record(format!("enable {unit}"));
        self.state().active.insert(unit.to_string());
        Ok(())
    }

    fn reload(&self, unit: &str) -> Result<()> {
        self.record(format!("reload {unit}"));
        Ok(())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.record(format!("restart {unit}"));
        self.state().active.insert(unit.to_string());
        Ok(())
    }
}

impl DatabaseServer for FakeHost {
    fn set_credential(&self, user: &str, _scope: &str, secret: &Secret) -> Result<()> {
        self.record(format!("set-credential {user} {}", secret.expose()));
        let mut state = self.state();
        if state.credential_failures > 0 {
            state.credential_failures -= 1;
            bail!("ERROR 1396 (HY000): Operation ALTER USER failed");
        }
        state.password_set = true;
        Ok(())
    }

    fn uses_password_auth(&self, _user: &str) -> Result<bool> {
        Ok(self.state().password_set)
    }
}

impl SecretGenerator for FakeHost {
    fn random_hex(&self, _byte_length: usize) -> Result<Secret> {
        let mut state = self.state();
        state.secrets_issued += 1;
        Ok(Secret::new(format!("secret-{}", state.secrets_issued)))
    }
}

impl HostFacts for FakeHost {
    fn primary_ip_address(&self) -> Result<String> {
        Ok("203.0.113.10".to_string())
    }
}

impl ProxyValidator for FakeHost {
    fn validate(&self, config: &Path) -> Result<()> {
        self.record(format!("validate {}", config.display()));
        if self.state().reject_config {
            bail!("unexpected \"}}\" in {}:12", config.display());
        }
        Ok(())
    }
}
