use praetor_core::{Context, MethodRef, Outcome, TargetMatch};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::encoder::{select_triggered, EncodedContainer, EncodedItem, EncodedRule, ItemKind};
use crate::registry::MethodRegistry;
use crate::sink::{EvaluationEvent, EvaluationEventKind, EvaluationSink};

// ---------------------------------------------------------------------------
// Evaluation result
// ---------------------------------------------------------------------------

/// Outcome of evaluating an item, with the obligations and advice that
/// survived trigger filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub obligations: Vec<MethodRef>,
    pub advice: Vec<MethodRef>,
}

impl Evaluation {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn is_permit(&self) -> bool {
        self.outcome == Outcome::Permit
    }
}

/// Outcome of a policy or policy set whose own target was indeterminate.
///
/// A decisive child result becomes the matching indeterminate outcome;
/// NotApplicable stays NotApplicable.
pub fn indeterminate_target_outcome(combined: Outcome) -> Outcome {
    match combined {
        Outcome::Permit => Outcome::IndeterminatePermit,
        Outcome::Deny => Outcome::IndeterminateDeny,
        Outcome::Indeterminate => Outcome::IndeterminateDenyOrPermit,
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Per-call evaluation state. Holds only borrows; the compiled tree is never
/// mutated.
pub(crate) struct Evaluator<'a> {
    registry: &'a MethodRegistry,
    sink: Option<&'a dyn EvaluationSink>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(registry: &'a MethodRegistry, sink: Option<&'a dyn EvaluationSink>) -> Self {
        Self { registry, sink }
    }

    pub(crate) fn evaluate_item(
        &self,
        ctx: &dyn Context,
        target_match: TargetMatch,
        item: &EncodedItem,
    ) -> Evaluation {
        debug!(kind = %item.kind(), name = ?item.name(), target_match = %target_match, "item started");
        self.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::ItemStarted, item.kind(), item.name())
                .with_target_match(target_match)
        });

        let result = match item {
            EncodedItem::Rule(rule) => self.evaluate_rule(ctx, target_match, rule),
            EncodedItem::Policy(container) | EncodedItem::PolicySet(container) => {
                self.evaluate_container(ctx, target_match, item.kind(), container)
            }
        };

        debug!(
            kind = %item.kind(),
            name = ?item.name(),
            outcome = %result.outcome,
            obligations = result.obligations.len(),
            advice = result.advice.len(),
            "item evaluated"
        );
        self.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::ItemEvaluated, item.kind(), item.name())
                .with_target_match(target_match)
                .with_outcome(result.outcome)
        });
        result
    }

    fn evaluate_rule(
        &self,
        ctx: &dyn Context,
        target_match: TargetMatch,
        rule: &EncodedRule,
    ) -> Evaluation {
        let outcome = match target_match {
            TargetMatch::NotMatch => Outcome::NotApplicable,
            TargetMatch::Indeterminate => {
                if self.permit_intended(ctx, rule) {
                    Outcome::IndeterminatePermit
                } else {
                    Outcome::IndeterminateDeny
                }
            }
            TargetMatch::Match | TargetMatch::NoTarget => {
                let permit = self.permit_intended(ctx, rule);
                match self.condition_holds(ctx, rule) {
                    Ok(false) => Outcome::NotApplicable,
                    Ok(true) if permit => Outcome::Permit,
                    Ok(true) => Outcome::Deny,
                    Err(()) if permit => Outcome::IndeterminatePermit,
                    Err(()) => Outcome::IndeterminateDeny,
                }
            }
        };
        Evaluation {
            outcome,
            obligations: select_triggered(outcome, &rule.obligations),
            advice: select_triggered(outcome, &rule.advice),
        }
    }

    /// Effect polarity. No effect means Permit; a failing effect counts as Deny.
    fn permit_intended(&self, ctx: &dyn Context, rule: &EncodedRule) -> bool {
        let Some(effect) = &rule.effect else {
            return true;
        };
        match self.registry.call_logical(effect, ctx) {
            Ok(permit) => permit,
            Err(e) => {
                warn!(rule = ?rule.name, effect = %effect, error = %e, "effect failed, treating as deny");
                false
            }
        }
    }

    fn condition_holds(&self, ctx: &dyn Context, rule: &EncodedRule) -> Result<bool, ()> {
        let Some(condition) = &rule.condition else {
            return Ok(true);
        };
        self.registry.call_logical(condition, ctx).map_err(|e| {
            warn!(rule = ?rule.name, condition = %condition, error = %e, "condition failed");
        })
    }

    fn evaluate_container(
        &self,
        ctx: &dyn Context,
        target_match: TargetMatch,
        kind: ItemKind,
        container: &EncodedContainer,
    ) -> Evaluation {
        match target_match {
            TargetMatch::NotMatch => Evaluation::new(Outcome::NotApplicable),
            TargetMatch::Match | TargetMatch::NoTarget => {
                let mut result = self.combine(ctx, kind, container);
                result
                    .obligations
                    .extend(select_triggered(result.outcome, &container.obligations));
                result
                    .advice
                    .extend(select_triggered(result.outcome, &container.advice));
                result
            }
            TargetMatch::Indeterminate => {
                let combined = self.combine(ctx, kind, container);
                let outcome = indeterminate_target_outcome(combined.outcome);
                warn!(name = %container.name, combined = %combined.outcome, outcome = %outcome, "target indeterminate");
                Evaluation::new(outcome)
            }
        }
    }

    fn combine(&self, ctx: &dyn Context, kind: ItemKind, container: &EncodedContainer) -> Evaluation {
        let algorithm = container.combining.algorithm;
        info!(%algorithm, name = %container.name, items = container.combining.items.len(), "combining");
        self.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::AlgorithmStarted, kind, Some(container.name.as_str()))
                .with_algorithm(algorithm)
        });

        let result = algorithm.combine(self, ctx, &container.combining);

        info!(%algorithm, name = %container.name, outcome = %result.outcome, "combined");
        self.emit(|| {
            EvaluationEvent::new(EvaluationEventKind::AlgorithmCompleted, kind, Some(container.name.as_str()))
                .with_algorithm(algorithm)
                .with_outcome(result.outcome)
        });
        result
    }

    pub(crate) fn emit(&self, event: impl FnOnce() -> EvaluationEvent) {
        if let Some(sink) = self.sink {
            sink.record(&event());
        }
    }
}
