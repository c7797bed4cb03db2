use std::sync::{Mutex, MutexGuard};

use praetor_core::{Outcome, TargetMatch};
use serde::{Deserialize, Serialize};

use crate::algorithm::CombiningAlgorithm;
use crate::encoder::ItemKind;

// ---------------------------------------------------------------------------
// Evaluation events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationEventKind {
    DecisionStarted,
    DecisionCompleted,
    AlgorithmStarted,
    AlgorithmCompleted,
    ItemStarted,
    ItemEvaluated,
}

/// One step of an evaluation, in the order it happened.
///
/// Events carry names and outcomes only, never attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    pub kind: EvaluationEventKind,
    pub item_kind: ItemKind,
    pub name: Option<String>,
    pub target_match: Option<TargetMatch>,
    pub algorithm: Option<CombiningAlgorithm>,
    pub outcome: Option<Outcome>,
}

impl EvaluationEvent {
    pub fn new(kind: EvaluationEventKind, item_kind: ItemKind, name: Option<&str>) -> Self {
        Self {
            kind,
            item_kind,
            name: name.map(str::to_string),
            target_match: None,
            algorithm: None,
            outcome: None,
        }
    }

    pub fn with_target_match(mut self, target_match: TargetMatch) -> Self {
        self.target_match = Some(target_match);
        self
    }

    pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

// ---------------------------------------------------------------------------
// EvaluationSink trait
// ---------------------------------------------------------------------------

/// Observer of evaluation steps.
///
/// Recording must not fail the evaluation, so the method has no error path.
pub trait EvaluationSink: Send + Sync {
    fn record(&self, event: &EvaluationEvent);
}

/// In-memory sink for tests and the CLI trace output.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationSink {
    events: Mutex<Vec<EvaluationEvent>>,
}

impl InMemoryEvaluationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EvaluationEvent> {
        self.lock().clone()
    }

    /// Names of items that reached `ItemEvaluated`, in evaluation order.
    pub fn evaluated_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.kind == EvaluationEventKind::ItemEvaluated)
            .filter_map(|e| e.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EvaluationEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EvaluationSink for InMemoryEvaluationSink {
    fn record(&self, event: &EvaluationEvent) {
        self.lock().push(event.clone());
    }
}
