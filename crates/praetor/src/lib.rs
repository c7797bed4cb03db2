//! Praetor
//!
//! Attribute-based access control in the XACML manner. This crate ties the
//! engine crates together: TOML configuration, an aggregated error type,
//! the builtin method registry, and helpers that build decision and
//! enforcement points from configuration.
//!
//! # Architecture
//!
//! - `praetor-core`: value types and the `Context` trait
//! - `praetor-policy`: model, encoder, combining algorithms, decision point
//! - `praetor-enforce`: requests, information point, enforcement point

pub mod builtin;
pub mod config;
pub mod error;
pub mod report;

pub use builtin::{builtin_registry, register_builtins};
pub use config::{DecisionConfig, EnforcementConfig, LoggingConfig, PraetorConfig};
pub use error::{RootError, RootResult};
pub use report::render_tree;

pub use praetor_core::{
    AttributeError, AttributeKey, AttributeValue, Context, MethodError, MethodRef, Outcome,
    TargetMatch, Trigger,
};
pub use praetor_enforce::{
    ContextDefinition, EnforcementError, InformationPoint, PolicyEnforcementPoint,
    PolicyInformationPoint, Request,
};
pub use praetor_policy::{
    Advice, AllOf, AnyOf, CombiningAlgorithm, EncodedItem, Encoder, EncoderOptions, Evaluation,
    InMemoryEvaluationSink, MethodRegistry, Obligation, Policy, PolicyDecisionPoint, PolicyError,
    PolicySet, Rule, Target,
};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Compile `policy_set` with the encoder settings from `config`.
pub fn build_decision_point(
    config: &PraetorConfig,
    policy_set: &PolicySet,
    registry: Arc<MethodRegistry>,
) -> RootResult<PolicyDecisionPoint> {
    let encoder = Encoder::new(config.encoder_options());
    Ok(PolicyDecisionPoint::with_encoder(policy_set, &encoder, registry)?)
}

/// Load a cached compiled policy set from `path`, honouring
/// `decision.max_policy_bytes`.
pub fn load_decision_point(
    config: &PraetorConfig,
    path: &Path,
    registry: Arc<MethodRegistry>,
) -> RootResult<PolicyDecisionPoint> {
    let max_bytes = config.decision.max_policy_bytes;
    let size = std::fs::metadata(path)?.len();
    if size > max_bytes as u64 {
        return Err(PolicyError::LoadError(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            size,
            max_bytes
        ))
        .into());
    }
    let bytes = std::fs::read(path)?;
    let pdp = PolicyDecisionPoint::load(&bytes, max_bytes, registry)?;
    info!(path = %path.display(), bytes = bytes.len(), "loaded encoded policy set");
    Ok(pdp)
}

/// Write the compiled form of `pdp` to `path` for later [`load_decision_point`].
pub fn save_decision_point(pdp: &PolicyDecisionPoint, path: &Path) -> RootResult<()> {
    let bytes = pdp.to_json()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Enforcement point with advice execution taken from `config`.
pub fn build_enforcement_point(
    config: &PraetorConfig,
    pip: Arc<dyn PolicyInformationPoint>,
    pdp: PolicyDecisionPoint,
) -> PolicyEnforcementPoint {
    PolicyEnforcementPoint::new(pip, pdp).with_execute_advice(config.enforcement.execute_advice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> PolicySet {
        let rules = vec![
            Rule::named("index").with_target(Target::single("action", "index").unwrap()),
            Rule::named("delete")
                .with_target(Target::single("action", "delete").unwrap())
                .with_effect(MethodRef::parse("builtin::deny").unwrap()),
        ];
        let policy = Policy::new("Posts", rules, CombiningAlgorithm::FirstApplicable).unwrap();
        PolicySet::new("App", vec![policy.into()], CombiningAlgorithm::DenyUnlessPermit).unwrap()
    }

    #[test]
    fn test_build_decision_point_honours_switch_setting() {
        let registry = Arc::new(builtin_registry().unwrap());
        let mut config = PraetorConfig::default();
        config.decision.switch_optimization = false;
        let pdp = build_decision_point(&config, &sample_set(), registry.clone()).unwrap();
        let posts = &pdp.encoded().combining().unwrap().items[0];
        assert!(!posts.combining().unwrap().targets.is_switch());

        let pdp = build_decision_point(&PraetorConfig::default(), &sample_set(), registry).unwrap();
        let posts = &pdp.encoded().combining().unwrap().items[0];
        assert!(posts.combining().unwrap().targets.is_switch());
    }

    #[test]
    fn test_save_and_load_decision_point() {
        let dir = std::env::temp_dir().join("praetor-test-encoded");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("app.json");

        let registry = Arc::new(builtin_registry().unwrap());
        let config = PraetorConfig::default();
        let pdp = build_decision_point(&config, &sample_set(), registry.clone()).unwrap();
        save_decision_point(&pdp, &path).unwrap();

        let loaded = load_decision_point(&config, &path, registry.clone()).unwrap();
        assert_eq!(loaded.encoded(), pdp.encoded());

        let mut tight = PraetorConfig::default();
        tight.decision.max_policy_bytes = 8;
        assert!(matches!(
            load_decision_point(&tight, &path, registry),
            Err(RootError::Policy(PolicyError::LoadError(_)))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_decision_point_missing_file() {
        let registry = Arc::new(builtin_registry().unwrap());
        let result = load_decision_point(
            &PraetorConfig::default(),
            Path::new("/nonexistent/praetor/app.json"),
            registry,
        );
        assert!(matches!(result, Err(RootError::Io(_))));
    }

    #[test]
    fn test_build_enforcement_point_uses_config() {
        let registry = Arc::new(builtin_registry().unwrap());
        let mut config = PraetorConfig::default();
        config.enforcement.execute_advice = false;
        let pdp = build_decision_point(&config, &sample_set(), registry).unwrap();
        let pep = build_enforcement_point(&config, Arc::new(InformationPoint::default()), pdp);
        assert!(!pep.executes_advice());

        assert!(pep.authorize(&Request::new().with("action", "index")).unwrap());
        assert!(!pep.authorize(&Request::new().with("action", "delete")).unwrap());
    }
}
