//! Idempotency oracle
//!
//! Answers "is this already done?" for every precondition kind. Queries have
//! no side effects.

use crate::types::Precondition;
use anyhow::Result;
use log::warn;

/// Query layer over live system state
pub trait Oracle {
    /// Whether the precondition currently holds
    fn is_satisfied(&self, precondition: &Precondition) -> Result<bool>;
}

/// Evaluate a precondition, treating a failed query as "not satisfied"
///
/// A query error causes an apply attempt instead of a silent skip.
pub fn check(oracle: &dyn Oracle, precondition: &Precondition) -> bool {
    match oracle.is_satisfied(precondition) {
        Ok(satisfied) => satisfied,
        Err(e) => {
            warn!("Could not evaluate '{precondition}', assuming unsatisfied: {e:#}");
            false
        }
    }
}
