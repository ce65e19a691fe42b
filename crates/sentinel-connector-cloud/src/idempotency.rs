//! Idempotency contracts
//!
//! A step that may collide with an existing resource declares which
//! provider failures mean "the resource is already in the desired state".
//! This is the only place such failures are recognised.

use crate::error::{CloudError, Result};
use crate::step::{Step, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyContract {
    pub step: Step,
    /// HTTP statuses equivalent to success
    pub statuses: &'static [u16],
    /// Provider error codes equivalent to success (case-insensitive)
    pub codes: &'static [&'static str],
}

/// Table PUT: explicit "already exists" codes and any 409 conflict
pub const TABLE_CREATION: IdempotencyContract = IdempotencyContract {
    step: Step::Tables,
    statuses: &[409],
    codes: &["AlreadyExists", "ResourceAlreadyExists", "TableAlreadyExists"],
};

/// Role assignment PUT: the identical assignment already exists
pub const ROLE_ASSIGNMENT: IdempotencyContract = IdempotencyContract {
    step: Step::RoleAssignment,
    statuses: &[409],
    codes: &["RoleAssignmentExists"],
};

impl IdempotencyContract {
    /// Whether `err` is equivalent to success for this step
    pub fn absorbs(&self, err: &CloudError) -> bool {
        match err {
            CloudError::ResourceAlreadyExists(_) => true,
            CloudError::Api { status, code, .. } => {
                self.statuses.contains(status)
                    || code
                        .as_deref()
                        .is_some_and(|c| self.codes.iter().any(|k| k.eq_ignore_ascii_case(c)))
            }
            _ => false,
        }
    }

    /// Map a create call's result: success → `Created`, absorbed conflict →
    /// `AlreadyExists`, anything else propagates.
    pub fn settle(&self, result: Result<()>, subject: &str) -> Result<StepStatus> {
        match result {
            Ok(()) => Ok(StepStatus::Created),
            Err(err) if self.absorbs(&err) => {
                tracing::warn!(step = %self.step, subject, error = %err, "already exists, continuing");
                Ok(StepStatus::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }
}
