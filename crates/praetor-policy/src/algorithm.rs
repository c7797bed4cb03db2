use praetor_core::{Context, MethodRef, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::encoder::Combining;
use crate::evaluate::{Evaluation, Evaluator};

/// Strategy for folding child outcomes into one. Used at both rule level and
/// policy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombiningAlgorithm {
    FirstApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
    DenyOverrides,
    PermitOverrides,
}

impl CombiningAlgorithm {
    pub const ALL: [CombiningAlgorithm; 5] = [
        CombiningAlgorithm::FirstApplicable,
        CombiningAlgorithm::DenyUnlessPermit,
        CombiningAlgorithm::PermitUnlessDeny,
        CombiningAlgorithm::DenyOverrides,
        CombiningAlgorithm::PermitOverrides,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CombiningAlgorithm::FirstApplicable => "first-applicable",
            CombiningAlgorithm::DenyUnlessPermit => "deny-unless-permit",
            CombiningAlgorithm::PermitUnlessDeny => "permit-unless-deny",
            CombiningAlgorithm::DenyOverrides => "deny-overrides",
            CombiningAlgorithm::PermitOverrides => "permit-overrides",
        }
    }

    /// Evaluate the children of `combining` lazily and fold their results.
    pub(crate) fn combine(
        self,
        evaluator: &Evaluator<'_>,
        ctx: &dyn Context,
        combining: &Combining,
    ) -> Evaluation {
        let results = combining
            .targets
            .matches(ctx)
            .filter_map(|(target_match, index)| {
                combining
                    .items
                    .get(index)
                    .map(|item| evaluator.evaluate_item(ctx, target_match, item))
            });
        match self {
            CombiningAlgorithm::FirstApplicable => first_applicable(results),
            CombiningAlgorithm::DenyUnlessPermit => {
                unless(results, Outcome::Permit, Outcome::Deny)
            }
            CombiningAlgorithm::PermitUnlessDeny => {
                unless(results, Outcome::Deny, Outcome::Permit)
            }
            CombiningAlgorithm::DenyOverrides => overrides(results, deny_overrides),
            CombiningAlgorithm::PermitOverrides => overrides(results, permit_overrides),
        }
    }
}

impl fmt::Display for CombiningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Short-circuiting algorithms
// ---------------------------------------------------------------------------

/// First child that is Permit or Deny wins; indeterminate children are skipped.
pub fn first_applicable(results: impl IntoIterator<Item = Evaluation>) -> Evaluation {
    results
        .into_iter()
        .find(|r| r.outcome.is_decisive())
        .unwrap_or_else(|| Evaluation::new(Outcome::NotApplicable))
}

/// The first child equal to `wanted` wins with its obligations; otherwise
/// `fallback` with none.
pub fn unless(
    results: impl IntoIterator<Item = Evaluation>,
    wanted: Outcome,
    fallback: Outcome,
) -> Evaluation {
    results
        .into_iter()
        .find(|r| r.outcome == wanted)
        .unwrap_or_else(|| Evaluation::new(fallback))
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Which outcomes were seen during an overrides scan. Plain `Indeterminate`
/// and `NotApplicable` set nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Seen {
    pub deny: bool,
    pub permit: bool,
    pub indeterminate_deny: bool,
    pub indeterminate_permit: bool,
    pub indeterminate_deny_or_permit: bool,
}

impl Seen {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deny => self.deny = true,
            Outcome::Permit => self.permit = true,
            Outcome::IndeterminateDeny => self.indeterminate_deny = true,
            Outcome::IndeterminatePermit => self.indeterminate_permit = true,
            Outcome::IndeterminateDenyOrPermit => self.indeterminate_deny_or_permit = true,
            Outcome::Indeterminate | Outcome::NotApplicable => {}
        }
    }
}

pub fn deny_overrides(seen: Seen) -> Outcome {
    if seen.deny {
        Outcome::Deny
    } else if seen.indeterminate_deny_or_permit {
        Outcome::IndeterminateDenyOrPermit
    } else if seen.indeterminate_deny && (seen.indeterminate_permit || seen.permit) {
        Outcome::IndeterminateDenyOrPermit
    } else if seen.indeterminate_deny {
        Outcome::IndeterminateDeny
    } else if seen.permit {
        Outcome::Permit
    } else if seen.indeterminate_permit {
        Outcome::IndeterminatePermit
    } else {
        Outcome::NotApplicable
    }
}

pub fn permit_overrides(seen: Seen) -> Outcome {
    if seen.permit {
        Outcome::Permit
    } else if seen.indeterminate_deny_or_permit {
        Outcome::IndeterminateDenyOrPermit
    } else if seen.indeterminate_permit && (seen.indeterminate_deny || seen.deny) {
        Outcome::IndeterminateDenyOrPermit
    } else if seen.indeterminate_permit {
        Outcome::IndeterminatePermit
    } else if seen.deny {
        Outcome::Deny
    } else if seen.indeterminate_deny {
        Outcome::IndeterminateDeny
    } else {
        Outcome::NotApplicable
    }
}

/// Scan every child, collect obligations and advice per outcome, and keep
/// only those of the final outcome.
pub fn overrides(
    results: impl IntoIterator<Item = Evaluation>,
    decide: fn(Seen) -> Outcome,
) -> Evaluation {
    let mut seen = Seen::default();
    let mut obligations: BTreeMap<Outcome, Vec<MethodRef>> = BTreeMap::new();
    let mut advice: BTreeMap<Outcome, Vec<MethodRef>> = BTreeMap::new();
    for result in results {
        seen.record(result.outcome);
        obligations
            .entry(result.outcome)
            .or_default()
            .extend(result.obligations);
        advice.entry(result.outcome).or_default().extend(result.advice);
    }
    let outcome = decide(seen);
    Evaluation {
        outcome,
        obligations: obligations.remove(&outcome).unwrap_or_default(),
        advice: advice.remove(&outcome).unwrap_or_default(),
    }
}
