use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::types::{AttributeKey, AttributeValue, MethodRef};

// ---------------------------------------------------------------------------
// Collaborator failures
// ---------------------------------------------------------------------------

/// An attribute lookup failed. The engine maps this to an indeterminate
/// outcome and never lets it escape `evaluate`.
///
/// Display never includes attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("attribute '{0}' is not defined")]
    Missing(AttributeKey),

    #[error("attribute '{0}' is not available yet")]
    Unavailable(AttributeKey),

    #[error("attribute '{key}' could not be resolved: {reason}")]
    Resolution { key: AttributeKey, reason: String },
}

/// A condition, effect, obligation or advice body failed.
#[derive(Debug, Error)]
pub enum MethodError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("method '{0}' is not registered")]
    Unresolved(MethodRef),

    #[error("method failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Context — attribute source consumed by the engine
// ---------------------------------------------------------------------------

/// Attribute source for one evaluation.
///
/// Both lookups may fail. The engine does not cache: `get` can be called
/// several times for the same key within one evaluation.
pub trait Context {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError>;
    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError>;
}

impl Context for HashMap<AttributeKey, AttributeValue> {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError> {
        Ok(self.contains_key(key))
    }

    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError> {
        HashMap::get(self, key)
            .cloned()
            .ok_or_else(|| AttributeError::Missing(key.clone()))
    }
}

impl Context for BTreeMap<AttributeKey, AttributeValue> {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError> {
        Ok(self.contains_key(key))
    }

    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError> {
        BTreeMap::get(self, key)
            .cloned()
            .ok_or_else(|| AttributeError::Missing(key.clone()))
    }
}
