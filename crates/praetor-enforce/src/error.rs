use praetor_core::{MethodError, MethodRef};
use thiserror::Error;

/// Failures of the enforcement point. Decisions themselves never fail; only
/// running triggered obligations or advice can.
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("obligation '{method}' failed: {source}")]
    ObligationFailed {
        method: MethodRef,
        #[source]
        source: MethodError,
    },

    #[error("advice '{method}' failed: {source}")]
    AdviceFailed {
        method: MethodRef,
        #[source]
        source: MethodError,
    },
}

impl EnforcementError {
    pub fn method(&self) -> &MethodRef {
        match self {
            EnforcementError::ObligationFailed { method, .. }
            | EnforcementError::AdviceFailed { method, .. } => method,
        }
    }
}

pub type EnforcementResult<T> = Result<T, EnforcementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforcement_error_display() {
        let err = EnforcementError::ObligationFailed {
            method: MethodRef::new("audit", "log").unwrap(),
            source: MethodError::Failed("disk full".into()),
        };
        assert_eq!(err.to_string(), "obligation 'audit::log' failed: method failed: disk full");
        assert_eq!(err.method().symbol(), "log");
        assert!(std::error::Error::source(&err).is_some());
    }
}
