//! Capabilities of the host being provisioned
//!
//! Steps only talk to the host through these traits. [`Host::system`] wires
//! the real implementations; tests use the in-memory fake.

pub mod database;
pub mod facts;
pub mod lock;
pub mod oracle;
pub mod secret;
pub mod service;

#[cfg(test)]
pub mod fake;

use crate::config::Config;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use stepkit::LockContended;

pub use database::{DatabaseServer, MysqlCli};
pub use facts::{HostFacts, Hostname, NginxTest, ProxyValidator};
pub use lock::RecordLockProbe;
pub use oracle::SystemOracle;
pub use secret::{OsSecretGenerator, SecretGenerator};
pub use service::{ServiceManager, Systemctl};

/// Shared handles to every host capability
#[derive(Clone)]
pub struct Host {
    pub apt: Arc<aptkit::Client>,
    pub services: Arc<dyn ServiceManager>,
    pub database: Arc<dyn DatabaseServer>,
    pub secrets: Arc<dyn SecretGenerator>,
    pub facts: Arc<dyn HostFacts>,
    pub proxy: Arc<dyn ProxyValidator>,
}

impl Host {
    /// Real implementations for a systemd + apt host
    pub fn system(config: &Config) -> Result<Self> {
        let apt = aptkit::Client::new()
            .context("apt-get not found; hoststrap only supports Debian-family hosts")?
            .with_retry_config(config.retry_config());

        Ok(Self {
            apt: Arc::new(apt),
            services: Arc::new(Systemctl),
            database: Arc::new(MysqlCli::new(config.database.auth_plugin.as_str())),
            secrets: Arc::new(OsSecretGenerator),
            facts: Arc::new(Hostname),
            proxy: Arc::new(NginxTest),
        })
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Host")
    }
}

/// Lift an apt result into an action error
///
/// apt finding the dpkg lock held becomes [`LockContended`], so the arbiter
/// waits again before the operation is launched a second time.
pub fn apt<T>(result: aptkit::Result<T>) -> Result<T> {
    result.map_err(|err| match err {
        aptkit::Error::Locked { message } => LockContended { resource: message }.into(),
        other => other.into(),
    })
}

/// Whether the process runs with root privileges
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}
