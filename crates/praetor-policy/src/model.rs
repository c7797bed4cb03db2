use praetor_core::{AttributeKey, AttributeValue, MethodRef, Outcome, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::algorithm::CombiningAlgorithm;
use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Conjunction of attribute equalities. Never empty, keys are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllOf {
    pairs: Vec<(AttributeKey, AttributeValue)>,
}

impl AllOf {
    pub fn new<I, K, V>(pairs: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<AttributeKey>,
        V: Into<AttributeValue>,
    {
        let pairs: Vec<(AttributeKey, AttributeValue)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_pairs(pairs)
    }

    fn from_pairs(pairs: Vec<(AttributeKey, AttributeValue)>) -> PolicyResult<Self> {
        if pairs.is_empty() {
            return Err(PolicyError::EmptyAllOf);
        }
        let mut seen = HashSet::new();
        for (key, _) in &pairs {
            if !seen.insert(key) {
                return Err(PolicyError::DuplicateAttribute(key.clone()));
            }
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(AttributeKey, AttributeValue)] {
        &self.pairs
    }

    /// The only pair, if this group tests exactly one attribute.
    pub fn single(&self) -> Option<(&AttributeKey, &AttributeValue)> {
        match self.pairs.as_slice() {
            [(key, value)] => Some((key, value)),
            _ => None,
        }
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        Self::from_pairs(self.pairs.clone())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Disjunction of [`AllOf`] groups. An empty disjunction means "no target".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyOf {
    all_of: Vec<AllOf>,
}

impl AnyOf {
    pub fn new(all_of: Vec<AllOf>) -> Self {
        Self { all_of }
    }

    pub fn all_of(&self) -> &[AllOf] {
        &self.all_of
    }

    pub fn is_empty(&self) -> bool {
        self.all_of.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    any_of: AnyOf,
}

impl Target {
    pub fn new(any_of: AnyOf) -> Self {
        Self { name: None, any_of }
    }

    /// Target testing a single `key == value` equality.
    pub fn single(
        key: impl Into<AttributeKey>,
        value: impl Into<AttributeValue>,
    ) -> PolicyResult<Self> {
        Ok(Self::new(AnyOf::new(vec![AllOf::new([(key, value)])?])))
    }

    /// Target requiring every listed equality at once.
    pub fn all<I, K, V>(pairs: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<AttributeKey>,
        V: Into<AttributeValue>,
    {
        Ok(Self::new(AnyOf::new(vec![AllOf::new(pairs)?])))
    }

    /// Target matching when `key` equals any of `values`.
    pub fn any_value<I, V>(key: impl Into<AttributeKey>, values: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        let key = key.into();
        let all_of = values
            .into_iter()
            .map(|value| AllOf::new([(key.clone(), value.into())]))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self::new(AnyOf::new(all_of)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn any_of(&self) -> &AnyOf {
        &self.any_of
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Obligations and advice
// ---------------------------------------------------------------------------

/// Something attached to an item that fires when the item's outcome equals
/// its trigger.
pub trait Triggered {
    fn trigger(&self) -> Trigger;
    fn method(&self) -> &MethodRef;
}

/// Action the enforcement point must run, failing the request if it errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    trigger: Trigger,
    method: MethodRef,
}

impl Obligation {
    pub fn new(trigger: Trigger, method: MethodRef) -> Self {
        Self { trigger, method }
    }

    /// Build from an outcome; only `Permit` and `Deny` are accepted.
    pub fn on(outcome: Outcome, method: MethodRef) -> PolicyResult<Self> {
        Ok(Self::new(Trigger::try_from(outcome)?, method))
    }
}

impl Triggered for Obligation {
    fn trigger(&self) -> Trigger {
        self.trigger
    }

    fn method(&self) -> &MethodRef {
        &self.method
    }
}

/// Best-effort action; the enforcement point may skip it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    trigger: Trigger,
    method: MethodRef,
}

impl Advice {
    pub fn new(trigger: Trigger, method: MethodRef) -> Self {
        Self { trigger, method }
    }

    pub fn on(outcome: Outcome, method: MethodRef) -> PolicyResult<Self> {
        Ok(Self::new(Trigger::try_from(outcome)?, method))
    }
}

impl Triggered for Advice {
    fn trigger(&self) -> Trigger {
        self.trigger
    }

    fn method(&self) -> &MethodRef {
        &self.method
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Leaf decision unit.
///
/// Every field is optional: no target means "always applies", no condition
/// means "true", and no effect means Permit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    name: Option<String>,
    target: Option<Target>,
    condition: Option<MethodRef>,
    effect: Option<MethodRef>,
    obligations: Vec<Obligation>,
    advice: Vec<Advice>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, condition: MethodRef) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_effect(mut self, effect: MethodRef) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn condition(&self) -> Option<&MethodRef> {
        self.condition.as_ref()
    }

    pub fn effect(&self) -> Option<&MethodRef> {
        self.effect.as_ref()
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn advice(&self) -> &[Advice] {
        &self.advice
    }
}

// ---------------------------------------------------------------------------
// Policy and PolicySet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    target: Option<Target>,
    rules: Vec<Rule>,
    algorithm: CombiningAlgorithm,
    obligations: Vec<Obligation>,
    advice: Vec<Advice>,
}

impl Policy {
    pub fn new(
        name: impl Into<String>,
        rules: Vec<Rule>,
        algorithm: CombiningAlgorithm,
    ) -> PolicyResult<Self> {
        let name = name.into();
        if rules.is_empty() {
            return Err(PolicyError::EmptyPolicy(name));
        }
        Ok(Self {
            name,
            target: None,
            rules,
            algorithm,
            obligations: Vec::new(),
            advice: Vec::new(),
        })
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn advice(&self) -> &[Advice] {
        &self.advice
    }
}

/// Child of a [`PolicySet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyNode {
    Policy(Policy),
    PolicySet(PolicySet),
}

impl From<Policy> for PolicyNode {
    fn from(policy: Policy) -> Self {
        PolicyNode::Policy(policy)
    }
}

impl From<PolicySet> for PolicyNode {
    fn from(set: PolicySet) -> Self {
        PolicyNode::PolicySet(set)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    name: String,
    target: Option<Target>,
    children: Vec<PolicyNode>,
    algorithm: CombiningAlgorithm,
    obligations: Vec<Obligation>,
    advice: Vec<Advice>,
}

impl PolicySet {
    pub fn new(
        name: impl Into<String>,
        children: Vec<PolicyNode>,
        algorithm: CombiningAlgorithm,
    ) -> PolicyResult<Self> {
        let name = name.into();
        if children.is_empty() {
            return Err(PolicyError::EmptyPolicySet(name));
        }
        Ok(Self {
            name,
            target: None,
            children,
            algorithm,
            obligations: Vec::new(),
            advice: Vec::new(),
        })
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn children(&self) -> &[PolicyNode] {
        &self.children
    }

    pub fn algorithm(&self) -> CombiningAlgorithm {
        self.algorithm
    }

    pub fn obligations(&self) -> &[Obligation] {
        &self.obligations
    }

    pub fn advice(&self) -> &[Advice] {
        &self.advice
    }
}
