use praetor_core::{Context, MethodError, MethodRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::encoder::EncodedItem;
use crate::error::{MethodKind, PolicyError, PolicyResult};
use crate::model::Triggered;

/// Condition or effect body.
pub type LogicalMethod = Arc<dyn Fn(&dyn Context) -> Result<bool, MethodError> + Send + Sync>;

/// Obligation or advice body.
pub type ActionMethod = Arc<dyn Fn(&dyn Context) -> Result<(), MethodError> + Send + Sync>;

/// Resolves [`MethodRef`]s to host callables.
///
/// Compiled policies store references only; the registry supplied to the
/// decision point binds them.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    logical: HashMap<MethodRef, LogicalMethod>,
    action: HashMap<MethodRef, ActionMethod>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_logical<F>(&mut self, method: MethodRef, body: F) -> PolicyResult<()>
    where
        F: Fn(&dyn Context) -> Result<bool, MethodError> + Send + Sync + 'static,
    {
        if self.logical.contains_key(&method) {
            return Err(PolicyError::DuplicateMethod(method));
        }
        self.logical.insert(method, Arc::new(body));
        Ok(())
    }

    pub fn register_action<F>(&mut self, method: MethodRef, body: F) -> PolicyResult<()>
    where
        F: Fn(&dyn Context) -> Result<(), MethodError> + Send + Sync + 'static,
    {
        if self.action.contains_key(&method) {
            return Err(PolicyError::DuplicateMethod(method));
        }
        self.action.insert(method, Arc::new(body));
        Ok(())
    }

    pub fn logical(&self, method: &MethodRef) -> Option<&LogicalMethod> {
        self.logical.get(method)
    }

    pub fn action(&self, method: &MethodRef) -> Option<&ActionMethod> {
        self.action.get(method)
    }

    pub fn call_logical(&self, method: &MethodRef, ctx: &dyn Context) -> Result<bool, MethodError> {
        let body = self
            .logical(method)
            .ok_or_else(|| MethodError::Unresolved(method.clone()))?;
        body(ctx)
    }

    pub fn call_action(&self, method: &MethodRef, ctx: &dyn Context) -> Result<(), MethodError> {
        let body = self
            .action(method)
            .ok_or_else(|| MethodError::Unresolved(method.clone()))?;
        body(ctx)
    }

    /// Check that every reference in a compiled tree is registered with the
    /// right kind.
    pub fn check(&self, root: &EncodedItem) -> PolicyResult<()> {
        let mut missing: Option<PolicyError> = None;
        root.walk(&mut |item: &EncodedItem| {
            if missing.is_some() {
                return;
            }
            for method in item.condition().into_iter().chain(item.effect()) {
                if !self.logical.contains_key(method) {
                    missing = Some(unresolved(method, MethodKind::Logical));
                    return;
                }
            }
            let actions = item
                .obligations()
                .iter()
                .map(Triggered::method)
                .chain(item.advice().iter().map(Triggered::method));
            for method in actions {
                if !self.action.contains_key(method) {
                    missing = Some(unresolved(method, MethodKind::Action));
                    return;
                }
            }
        });
        missing.map_or(Ok(()), Err)
    }
}

fn unresolved(method: &MethodRef, kind: MethodKind) -> PolicyError {
    PolicyError::UnresolvedMethod {
        method: method.clone(),
        kind,
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut logical: Vec<String> = self.logical.keys().map(ToString::to_string).collect();
        let mut action: Vec<String> = self.action.keys().map(ToString::to_string).collect();
        logical.sort();
        action.sort();
        f.debug_struct("MethodRegistry")
            .field("logical", &logical)
            .field("action", &action)
            .finish()
    }
}
