use praetor_core::{MethodRef, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::algorithm::CombiningAlgorithm;
use crate::error::{PolicyError, PolicyResult};
use crate::model::{Advice, Obligation, Policy, PolicyNode, PolicySet, Rule, Target, Triggered};
use crate::target::{check_target, optimize_targets, OptimizedTargets};

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Rule,
    Policy,
    PolicySet,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Rule => write!(f, "rule"),
            ItemKind::Policy => write!(f, "policy"),
            ItemKind::PolicySet => write!(f, "policy set"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<MethodRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<MethodRef>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
    #[serde(default)]
    pub advice: Vec<Advice>,
}

/// Children of a policy or policy set plus the dispatch over their targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combining {
    pub algorithm: CombiningAlgorithm,
    pub targets: OptimizedTargets,
    pub items: Vec<EncodedItem>,
}

/// Compiled policy or policy set. Both share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedContainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub combining: Combining,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
    #[serde(default)]
    pub advice: Vec<Advice>,
}

/// Immutable compiled item, safe to share across threads and to cache as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodedItem {
    Rule(EncodedRule),
    Policy(EncodedContainer),
    PolicySet(EncodedContainer),
}

impl EncodedItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            EncodedItem::Rule(_) => ItemKind::Rule,
            EncodedItem::Policy(_) => ItemKind::Policy,
            EncodedItem::PolicySet(_) => ItemKind::PolicySet,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            EncodedItem::Rule(rule) => rule.name.as_deref(),
            EncodedItem::Policy(c) | EncodedItem::PolicySet(c) => Some(&c.name),
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            EncodedItem::Rule(rule) => rule.target.as_ref(),
            EncodedItem::Policy(c) | EncodedItem::PolicySet(c) => c.target.as_ref(),
        }
    }

    pub fn condition(&self) -> Option<&MethodRef> {
        match self {
            EncodedItem::Rule(rule) => rule.condition.as_ref(),
            _ => None,
        }
    }

    pub fn effect(&self) -> Option<&MethodRef> {
        match self {
            EncodedItem::Rule(rule) => rule.effect.as_ref(),
            _ => None,
        }
    }

    pub fn combining(&self) -> Option<&Combining> {
        match self {
            EncodedItem::Rule(_) => None,
            EncodedItem::Policy(c) | EncodedItem::PolicySet(c) => Some(&c.combining),
        }
    }

    pub fn obligations(&self) -> &[Obligation] {
        match self {
            EncodedItem::Rule(rule) => &rule.obligations,
            EncodedItem::Policy(c) | EncodedItem::PolicySet(c) => &c.obligations,
        }
    }

    pub fn advice(&self) -> &[Advice] {
        match self {
            EncodedItem::Rule(rule) => &rule.advice,
            EncodedItem::Policy(c) | EncodedItem::PolicySet(c) => &c.advice,
        }
    }

    /// Visit this item and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a EncodedItem)) {
        visit(self);
        if let Some(combining) = self.combining() {
            for item in &combining.items {
                item.walk(visit);
            }
        }
    }

    /// Structural checks for a compiled tree that did not come from the
    /// encoder, e.g. one read back from JSON.
    pub fn validate(&self) -> PolicyResult<()> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::ValidationError(errors.join("; ")))
        }
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        let label = format!("{} '{}'", self.kind(), self.name().unwrap_or("<unnamed>"));
        if let Some(target) = self.target() {
            if let Err(e) = check_target(target) {
                errors.push(format!("{}: {}", label, e));
            }
        }
        let Some(combining) = self.combining() else {
            return;
        };
        if combining.items.is_empty() {
            errors.push(format!("{}: has no children", label));
        }
        if let Err(e) = combining.targets.check(combining.items.len()) {
            errors.push(format!("{}: {}", label, e));
        }
        for item in &combining.items {
            let allowed = match self.kind() {
                ItemKind::Policy => item.kind() == ItemKind::Rule,
                _ => item.kind() != ItemKind::Rule,
            };
            if !allowed {
                errors.push(format!("{}: cannot contain a {}", label, item.kind()));
            }
            item.collect_errors(errors);
        }
    }
}

/// Load a compiled policy set from cached JSON bytes.
///
/// Input is size-limited and fully validated before use.
pub fn load_encoded_policy_set(bytes: &[u8], max_bytes: usize) -> PolicyResult<EncodedItem> {
    if bytes.is_empty() {
        return Err(PolicyError::LoadError("input is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(PolicyError::LoadError(format!(
            "input is {} bytes, limit is {}",
            bytes.len(),
            max_bytes
        )));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PolicyError::LoadError(format!("input is not UTF-8: {}", e)))?;
    let item: EncodedItem = serde_json::from_str(text)
        .map_err(|e| PolicyError::DeserializationError(e.to_string()))?;
    if item.kind() != ItemKind::PolicySet {
        return Err(PolicyError::ValidationError(format!(
            "root must be a policy set, got a {}",
            item.kind()
        )));
    }
    item.validate()?;
    Ok(item)
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOptions {
    pub switch_optimization: bool,
    pub min_switch_cases: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            switch_optimization: true,
            min_switch_cases: 2,
        }
    }
}

/// Compiles the policy model into [`EncodedItem`] trees.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncoderOptions,
}

impl Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    /// Encoder that never builds switch tables.
    pub fn linear() -> Self {
        Self::new(EncoderOptions {
            switch_optimization: false,
            ..EncoderOptions::default()
        })
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn encode_rule(&self, rule: &Rule) -> EncodedItem {
        EncodedItem::Rule(EncodedRule {
            name: rule.name().map(str::to_string),
            target: normalize(rule.target()),
            condition: rule.condition().cloned(),
            effect: rule.effect().cloned(),
            obligations: rule.obligations().to_vec(),
            advice: rule.advice().to_vec(),
        })
    }

    pub fn encode_policy(&self, policy: &Policy) -> EncodedItem {
        let items = policy.rules().iter().map(|r| self.encode_rule(r)).collect();
        debug!(policy = policy.name(), rules = policy.rules().len(), "encoding policy");
        EncodedItem::Policy(EncodedContainer {
            name: policy.name().to_string(),
            target: normalize(policy.target()),
            combining: self.combining(policy.algorithm(), items),
            obligations: policy.obligations().to_vec(),
            advice: policy.advice().to_vec(),
        })
    }

    pub fn encode_policy_set(&self, set: &PolicySet) -> EncodedItem {
        let items = set
            .children()
            .iter()
            .map(|child| match child {
                PolicyNode::Policy(policy) => self.encode_policy(policy),
                PolicyNode::PolicySet(inner) => self.encode_policy_set(inner),
            })
            .collect();
        let encoded = EncodedItem::PolicySet(EncodedContainer {
            name: set.name().to_string(),
            target: normalize(set.target()),
            combining: self.combining(set.algorithm(), items),
            obligations: set.obligations().to_vec(),
            advice: set.advice().to_vec(),
        });
        info!(
            policy_set = set.name(),
            children = set.children().len(),
            switch = encoded.combining().is_some_and(|c| c.targets.is_switch()),
            "encoded policy set"
        );
        encoded
    }

    fn combining(&self, algorithm: CombiningAlgorithm, items: Vec<EncodedItem>) -> Combining {
        let targets = items.iter().map(|item| item.target().cloned()).collect();
        Combining {
            algorithm,
            targets: optimize_targets(
                targets,
                self.options.switch_optimization,
                self.options.min_switch_cases,
            ),
            items,
        }
    }
}

/// An empty disjunction is the same as no target.
fn normalize(target: Option<&Target>) -> Option<Target> {
    target.filter(|t| !t.is_empty()).cloned()
}

/// Methods of the entries whose trigger equals `outcome`, in list order.
///
/// Indeterminate and NotApplicable outcomes select nothing.
pub fn select_triggered<T: Triggered>(outcome: Outcome, list: &[T]) -> Vec<MethodRef> {
    list.iter()
        .filter(|entry| entry.trigger().matches(outcome))
        .map(|entry| entry.method().clone())
        .collect()
}
