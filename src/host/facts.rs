//! Host facts and configuration validation

use crate::runner;
use anyhow::{Context, Result, bail};
use std::path::Path;

pub trait HostFacts {
    /// Address the host is reachable on
    fn primary_ip_address(&self) -> Result<String>;
}

/// Reads addresses from `hostname -I`
pub struct Hostname;

impl HostFacts for Hostname {
    fn primary_ip_address(&self) -> Result<String> {
        let out = runner::run_capture("hostname", &["-I"])?;
        first_address(&out).context("hostname -I reported no addresses")
    }
}

fn first_address(output: &str) -> Option<String> {
    output.split_whitespace().next().map(ToString::to_string)
}

/// Checks a reverse-proxy configuration before it is loaded
pub trait ProxyValidator {
    fn validate(&self, config: &Path) -> Result<()>;
}

/// `nginx -t`
///
/// nginx tests its whole configuration tree; `config` only names the file
/// that changed.
pub struct NginxTest;

impl ProxyValidator for NginxTest {
    fn validate(&self, config: &Path) -> Result<()> {
        let out = runner::output("nginx", &["-t", "-q"])?;
        if !out.success {
            bail!(
                "nginx -t rejected {}: {}",
                config.display(),
                out.stderr_str().trim()
            );
        }
        Ok(())
    }
}
