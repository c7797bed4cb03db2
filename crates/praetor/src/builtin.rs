use praetor_core::MethodRef;
use praetor_policy::{MethodRegistry, PolicyResult};
use tracing::info;

pub const UNIT: &str = "builtin";

/// Registry with the methods every praetor installation provides:
/// `builtin::permit` and `builtin::deny` effects and the `builtin::log` action.
pub fn builtin_registry() -> PolicyResult<MethodRegistry> {
    let mut registry = MethodRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

/// Add the builtin methods to an existing registry.
pub fn register_builtins(registry: &mut MethodRegistry) -> PolicyResult<()> {
    registry.register_logical(MethodRef::new(UNIT, "permit")?, |_| Ok(true))?;
    registry.register_logical(MethodRef::new(UNIT, "deny")?, |_| Ok(false))?;
    registry.register_action(MethodRef::new(UNIT, "log")?, |_| {
        info!("builtin log action executed");
        Ok(())
    })?;
    Ok(())
}
