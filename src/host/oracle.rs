//! Idempotency oracle backed by the live host

use super::Host;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use stepkit::{Oracle, Precondition};

pub struct SystemOracle {
    host: Host,
}

impl SystemOracle {
    pub fn new(host: Host) -> Self {
        Self { host }
    }
}

impl Oracle for SystemOracle {
    fn is_satisfied(&self, precondition: &Precondition) -> Result<bool> {
        match precondition {
            Precondition::PackageInstalled { name } => Ok(self
                .host
                .apt
                .is_installed(&aptkit::Package::new(name.as_str()))?),
            Precondition::UnitActive { name } => self.host.services.is_active(name),
            Precondition::RepositoryPresent { pattern } => {
                Ok(self.host.apt.has_repository(pattern)?)
            }
            Precondition::FileContains { path, marker } => match fs::read_to_string(path) {
                Ok(content) => Ok(content.contains(marker.as_str())),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e).with_context(|| format!("Could not read {}", path.display())),
            },
            Precondition::CredentialConfigured { user } => {
                self.host.database.uses_password_auth(user)
            }
        }
    }
}
