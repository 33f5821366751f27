use crate::host::Host;
use anyhow::{Context, Result};
use stepkit::{Action, ApplyContext};

/// Enable a unit at boot and start it
#[derive(Debug)]
pub struct EnableService {
    host: Host,
    unit: String,
}

impl EnableService {
    pub fn new(host: &Host, unit: &str) -> Self {
        Self {
            host: host.clone(),
            unit: unit.to_string(),
        }
    }
}

impl Action for EnableService {
    fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
        self.host
            .services
            .enable_and_start(&self.unit)
            .with_context(|| format!("Failed to start {}", self.unit))
    }
}
