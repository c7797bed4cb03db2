use praetor_core::{Context, Outcome, TargetMatch};
use std::sync::Arc;
use tracing::{debug, info};

use crate::encoder::{load_encoded_policy_set, EncodedItem, Encoder, ItemKind};
use crate::error::{PolicyError, PolicyResult};
use crate::evaluate::{Evaluation, Evaluator};
use crate::model::PolicySet;
use crate::registry::MethodRegistry;
use crate::sink::{EvaluationEvent, EvaluationEventKind, EvaluationSink};
use crate::target::match_target;

// ---------------------------------------------------------------------------
// PolicyDecisionPoint
// ---------------------------------------------------------------------------

/// Evaluates a compiled root policy set against a context.
///
/// The compiled tree is read-only after construction, so one decision point
/// can serve concurrent evaluations from many threads.
#[derive(Clone)]
pub struct PolicyDecisionPoint {
    root: Arc<EncodedItem>,
    registry: Arc<MethodRegistry>,
    sink: Option<Arc<dyn EvaluationSink>>,
}

impl PolicyDecisionPoint {
    /// Compile `policy_set` with the default encoder.
    pub fn new(policy_set: &PolicySet, registry: Arc<MethodRegistry>) -> PolicyResult<Self> {
        Self::with_encoder(policy_set, &Encoder::default(), registry)
    }

    pub fn with_encoder(
        policy_set: &PolicySet,
        encoder: &Encoder,
        registry: Arc<MethodRegistry>,
    ) -> PolicyResult<Self> {
        Self::from_encoded(encoder.encode_policy_set(policy_set), registry)
    }

    /// Build from an already-compiled root, e.g. one loaded from a cache.
    pub fn from_encoded(root: EncodedItem, registry: Arc<MethodRegistry>) -> PolicyResult<Self> {
        if root.kind() != ItemKind::PolicySet {
            return Err(PolicyError::ValidationError(format!(
                "root must be a policy set, got a {}",
                root.kind()
            )));
        }
        root.validate()?;
        registry.check(&root)?;
        info!(policy_set = ?root.name(), "policy decision point ready");
        Ok(Self {
            root: Arc::new(root),
            registry,
            sink: None,
        })
    }

    /// Load a compiled root from JSON bytes, rejecting input over `max_bytes`.
    pub fn load(
        bytes: &[u8],
        max_bytes: usize,
        registry: Arc<MethodRegistry>,
    ) -> PolicyResult<Self> {
        Self::from_encoded(load_encoded_policy_set(bytes, max_bytes)?, registry)
    }

    pub fn with_sink(mut self, sink: Arc<dyn EvaluationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn encoded(&self) -> &EncodedItem {
        &self.root
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Serialize the compiled root for caching.
    pub fn to_json(&self) -> PolicyResult<Vec<u8>> {
        serde_json::to_vec(self.root.as_ref())
            .map_err(|e| PolicyError::SerializationError(e.to_string()))
    }

    /// Decide. Never fails: lookup and method failures become indeterminate
    /// outcomes.
    pub fn evaluate(&self, ctx: &dyn Context) -> Evaluation {
        let root = self.root.as_ref();
        let evaluator = Evaluator::new(&self.registry, self.sink.as_deref());
        evaluator.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::DecisionStarted, root.kind(), root.name())
        });

        let target_match = match_target(ctx, root.target());
        debug!(policy_set = ?root.name(), target_match = %target_match, "root target matched");
        let result = if target_match == TargetMatch::NotMatch {
            Evaluation::new(Outcome::NotApplicable)
        } else {
            evaluator.evaluate_item(ctx, target_match, root)
        };

        info!(
            policy_set = ?root.name(),
            outcome = %result.outcome,
            obligations = result.obligations.len(),
            advice = result.advice.len(),
            "decision"
        );
        evaluator.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::DecisionCompleted, root.kind(), root.name())
                .with_target_match(target_match)
                .with_outcome(result.outcome)
        });
        result
    }
}

impl std::fmt::Debug for PolicyDecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDecisionPoint")
            .field("root", &self.root.name())
            .field("registry", &self.registry)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
