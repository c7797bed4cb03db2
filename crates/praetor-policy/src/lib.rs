//! Praetor Policy Engine
//!
//! XACML-style attribute-based decision engine. Rules, policies and policy
//! sets are compiled once into a read-only tree, then evaluated against a
//! request context to produce one of seven outcomes plus the obligations and
//! advice triggered by that outcome.
//!
//! Key features:
//! - Five combining algorithms (first-applicable, deny/permit-unless, deny/permit-overrides)
//! - Switch dispatch over children that test one shared attribute key
//! - Lazy child evaluation, so short-circuiting algorithms skip the rest
//! - Behaviour stored as `unit::symbol` references, so compiled trees can be cached as JSON
//! - Evaluation never fails: lookup and method failures become indeterminate outcomes

pub mod algorithm;
pub mod encoder;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod pdp;
pub mod registry;
pub mod sink;
pub mod target;

// Re-export primary types for convenience
pub use algorithm::CombiningAlgorithm;
pub use encoder::{
    load_encoded_policy_set, select_triggered, Combining, EncodedContainer, EncodedItem,
    EncodedRule, Encoder, EncoderOptions, ItemKind,
};
pub use error::{MethodKind, PolicyError, PolicyResult};
pub use evaluate::{indeterminate_target_outcome, Evaluation};
pub use model::{Advice, AllOf, AnyOf, Obligation, Policy, PolicyNode, PolicySet, Rule, Target, Triggered};
pub use pdp::PolicyDecisionPoint;
pub use registry::{ActionMethod, LogicalMethod, MethodRegistry};
pub use sink::{EvaluationEvent, EvaluationEventKind, EvaluationSink, InMemoryEvaluationSink};
pub use target::{match_target, optimize_targets, OptimizedTargets, SwitchTable, TargetMatches};
