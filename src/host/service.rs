//! Service manager capability

use crate::runner;
use anyhow::{Result, bail};

/// Start, enable and reload system services
pub trait ServiceManager {
    /// Whether the unit is currently running
    fn is_active(&self, unit: &str) -> Result<bool>;

    /// Enable the unit at boot and start it now
    fn enable_and_start(&self, unit: &str) -> Result<()>;

    /// Ask the unit to re-read its configuration
    fn reload(&self, unit: &str) -> Result<()>;

    /// Stop and start the unit
    fn restart(&self, unit: &str) -> Result<()>;
}

/// systemd via `systemctl`
pub struct Systemctl;

impl ServiceManager for Systemctl {
    fn is_active(&self, unit: &str) -> Result<bool> {
        // is-active exits 0 for active, 3 for inactive/unknown
        let out = runner::output("systemctl", &["is-active", "--quiet", unit])?;
        Ok(out.success)
    }

    fn enable_and_start(&self, unit: &str) -> Result<()> {
        let out = runner::output("systemctl", &["enable", "--now", unit])?;
        if !out.success {
            bail!("systemctl enable --now {unit}: {}", out.stderr_str().trim());
        }
        Ok(())
    }

    fn reload(&self, unit: &str) -> Result<()> {
        let out = runner::output("systemctl", &["reload", unit])?;
        if !out.success {
            bail!("systemctl reload {unit}: {}", out.stderr_str().trim());
        }
        Ok(())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        let out = runner::output("systemctl", &["restart", unit])?;
        if !out.success {
            bail!("systemctl restart {unit}: {}", out.stderr_str().trim());
        }
        Ok(())
    }
}
