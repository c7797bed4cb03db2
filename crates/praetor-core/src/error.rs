use thiserror::Error;

use crate::types::Outcome;

/// Construction-time violations of the core value types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid method reference: {0}")]
    InvalidMethodRef(String),

    #[error("trigger must be Permit or Deny, got {0}")]
    InvalidTrigger(Outcome),
}

pub type CoreResult<T> = Result<T, CoreError>;
