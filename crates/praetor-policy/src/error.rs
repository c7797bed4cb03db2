use praetor_core::{AttributeKey, CoreError, MethodRef};
use std::fmt;
use thiserror::Error;

/// Kind of callable a method reference must resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Condition or effect: `(context) -> bool`.
    Logical,
    /// Obligation or advice body: `(context) -> ()`.
    Action,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Logical => write!(f, "logical"),
            MethodKind::Action => write!(f, "action"),
        }
    }
}

/// Errors raised while building, compiling or loading policies.
///
/// Evaluation itself never fails; every variant here is a construction-time
/// or load-time contract violation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("all-of group must contain at least one attribute")]
    EmptyAllOf,

    #[error("attribute '{0}' appears twice in one all-of group")]
    DuplicateAttribute(AttributeKey),

    #[error("policy '{0}' must contain at least one rule")]
    EmptyPolicy(String),

    #[error("policy set '{0}' must contain at least one policy or policy set")]
    EmptyPolicySet(String),

    #[error("{kind} method '{method}' is not registered")]
    UnresolvedMethod { method: MethodRef, kind: MethodKind },

    #[error("method '{0}' is already registered")]
    DuplicateMethod(MethodRef),

    #[error("policy load error: {0}")]
    LoadError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
