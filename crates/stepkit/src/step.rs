//! Step model
//!
//! A step is a named action guarded by a precondition and verified by a
//! postcondition. Steps are built once and never mutated; the pipeline owns
//! them in execution order.

use crate::context::ApplyContext;
use crate::summary::RunSummary;
use crate::types::Precondition;
use anyhow::Result;
use std::fmt;

/// The side-effecting part of a step
pub trait Action: fmt::Debug {
    /// Perform the mutation
    ///
    /// Mutating package calls must go through [`ApplyContext::package_op`].
    fn apply(&self, ctx: &mut ApplyContext) -> Result<()>;

    /// Record summary facts once the step's goal is known to hold
    ///
    /// Called after a skip as well as after a verified apply, so facts show up
    /// on re-runs too.
    fn record(&self, _summary: &mut RunSummary) {}
}

/// Destructive remediation run between the two attempts of a critical step
pub trait Recovery: fmt::Debug {
    /// Human-readable description, shown before remediating
    fn description(&self) -> String;

    /// Bring the failing subsystem back to a clean state
    fn remediate(&self, ctx: &mut ApplyContext) -> Result<()>;
}

/// Atomic unit of provisioning
#[derive(Debug)]
pub struct Step {
    name: String,
    precondition: Precondition,
    postcondition: Precondition,
    critical: bool,
    mutates_packages: bool,
    action: Box<dyn Action>,
    recovery: Option<Box<dyn Recovery>>,
}

impl Step {
    /// Create a critical, non-mutating step whose postcondition equals its
    /// precondition
    pub fn new(
        name: impl Into<String>,
        precondition: Precondition,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            postcondition: precondition.clone(),
            precondition,
            critical: true,
            mutates_packages: false,
            action: Box::new(action),
            recovery: None,
        }
    }

    /// Failure is logged and the run continues
    pub fn optional(mut self) -> Self {
        self.critical = false;
        self
    }

    /// The action mutates the package database and must wait on the lock
    pub fn mutating_packages(mut self) -> Self {
        self.mutates_packages = true;
        self
    }

    /// Verify something other than the precondition after apply
    pub fn verify(mut self, postcondition: Precondition) -> Self {
        self.postcondition = postcondition;
        self
    }

    /// Attach a single remediation-then-retry policy
    pub fn with_recovery(mut self, recovery: impl Recovery + 'static) -> Self {
        self.recovery = Some(Box::new(recovery));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    pub fn postcondition(&self) -> &Precondition {
        &self.postcondition
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn mutates_packages(&self) -> bool {
        self.mutates_packages
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }

    pub fn recovery(&self) -> Option<&dyn Recovery> {
        self.recovery.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop;

    impl Action for Noop {
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults() {
        let step = Step::new("install-nginx", Precondition::package("nginx"), Noop);
        assert!(step.is_critical());
        assert!(!step.mutates_packages());
        assert!(step.recovery().is_none());
        assert_eq!(step.postcondition(), step.precondition());
    }

    #[test]
    fn test_builders() {
        let step = Step::new("ext", Precondition::package("php8.3-gd"), Noop)
            .optional()
            .mutating_packages()
            .verify(Precondition::package("php8.3-gd"));
        assert!(!step.is_critical());
        assert!(step.mutates_packages());
    }
}
