use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// AttributeKey — identifier of a request/context attribute
// ---------------------------------------------------------------------------

/// Attribute identifier. Either a symbolic name or an integer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeKey {
    Index(i64),
    Name(String),
}

impl AttributeKey {
    pub fn name(name: impl Into<String>) -> Self {
        AttributeKey::Name(name.into())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::Index(id) => write!(f, "#{}", id),
            AttributeKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for AttributeKey {
    fn from(name: &str) -> Self {
        AttributeKey::Name(name.to_string())
    }
}

impl From<String> for AttributeKey {
    fn from(name: String) -> Self {
        AttributeKey::Name(name)
    }
}

impl From<i64> for AttributeKey {
    fn from(id: i64) -> Self {
        AttributeKey::Index(id)
    }
}

// ---------------------------------------------------------------------------
// Float — totally ordered f64
// ---------------------------------------------------------------------------

/// `f64` compared by bit pattern, so it can key the switch index.
///
/// `0.0` and `-0.0` are different values; `NaN` equals itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Float(f64);

impl Float {
    pub fn new(value: f64) -> Self {
        Float(value)
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Float {
    fn from(value: f64) -> Self {
        Float(value)
    }
}

// ---------------------------------------------------------------------------
// AttributeValue — scalar or list attribute value
// ---------------------------------------------------------------------------

/// Attribute value as seen by target matching and method bodies.
///
/// Equality and hashing are structural, which is what lets single-attribute
/// targets be collapsed into a hash lookup without changing match results.
/// `Int(1)` and `Float(1.0)` are different values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(Float),
    Str(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(x) => Some(x.get()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::Str(s) => write!(f, "{}", s),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        AttributeValue::Float(Float(x))
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(items: Vec<T>) -> Self {
        AttributeValue::List(items.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Outcome — seven-valued evaluation result
// ---------------------------------------------------------------------------

/// Result of evaluating a rule, policy or policy set.
///
/// Exhaustive so that adding a value forces review of every combining
/// algorithm's match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    Permit,
    Deny,
    Indeterminate,
    NotApplicable,
    IndeterminatePermit,
    IndeterminateDeny,
    IndeterminateDenyOrPermit,
}

impl Outcome {
    /// Permit or Deny, the only outcomes that carry obligations and advice.
    pub fn is_decisive(self) -> bool {
        matches!(self, Outcome::Permit | Outcome::Deny)
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(
            self,
            Outcome::Indeterminate
                | Outcome::IndeterminatePermit
                | Outcome::IndeterminateDeny
                | Outcome::IndeterminateDenyOrPermit
        )
    }

    pub fn trigger(self) -> Option<Trigger> {
        match self {
            Outcome::Permit => Some(Trigger::Permit),
            Outcome::Deny => Some(Trigger::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Permit => write!(f, "Permit"),
            Outcome::Deny => write!(f, "Deny"),
            Outcome::Indeterminate => write!(f, "Indeterminate"),
            Outcome::NotApplicable => write!(f, "NotApplicable"),
            Outcome::IndeterminatePermit => write!(f, "IndeterminatePermit"),
            Outcome::IndeterminateDeny => write!(f, "IndeterminateDeny"),
            Outcome::IndeterminateDenyOrPermit => write!(f, "IndeterminateDenyOrPermit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger — the outcome an obligation or advice is attached to
// ---------------------------------------------------------------------------

/// Decision an obligation or advice fires on. Only Permit and Deny exist,
/// so an out-of-range trigger cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Permit,
    Deny,
}

impl Trigger {
    pub fn matches(self, outcome: Outcome) -> bool {
        Outcome::from(self) == outcome
    }
}

impl From<Trigger> for Outcome {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Permit => Outcome::Permit,
            Trigger::Deny => Outcome::Deny,
        }
    }
}

impl TryFrom<Outcome> for Trigger {
    type Error = CoreError;

    fn try_from(outcome: Outcome) -> CoreResult<Self> {
        outcome.trigger().ok_or(CoreError::InvalidTrigger(outcome))
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Outcome::from(*self))
    }
}

// ---------------------------------------------------------------------------
// TargetMatch — result of matching a target against a context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetMatch {
    Match,
    NotMatch,
    /// The item has no target and therefore always applies.
    NoTarget,
    /// An attribute lookup failed while matching.
    Indeterminate,
}

impl TargetMatch {
    /// Match or NoTarget.
    pub fn applies(self) -> bool {
        matches!(self, TargetMatch::Match | TargetMatch::NoTarget)
    }
}

impl fmt::Display for TargetMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMatch::Match => write!(f, "Match"),
            TargetMatch::NotMatch => write!(f, "NotMatch"),
            TargetMatch::NoTarget => write!(f, "NoTarget"),
            TargetMatch::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

// ---------------------------------------------------------------------------
// MethodRef — qualified static reference to a condition/effect/action body
// ---------------------------------------------------------------------------

/// Stable two-part reference (`unit::symbol`) to an externally registered
/// method. Only the reference is stored in policies and in the compiled
/// form; resolving it to something callable is the registry's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodRef {
    unit: String,
    symbol: String,
}

impl MethodRef {
    pub fn new(unit: impl Into<String>, symbol: impl Into<String>) -> CoreResult<Self> {
        let unit = unit.into();
        let symbol = symbol.into();
        validate_part("unit", &unit)?;
        validate_part("symbol", &symbol)?;
        if unit.starts_with(':') || unit.ends_with(':') {
            return Err(CoreError::InvalidMethodRef(
                "unit must not start or end with ':'".to_string(),
            ));
        }
        // The last '::' of the qualified form must be the separator.
        if symbol.contains(':') {
            return Err(CoreError::InvalidMethodRef(
                "symbol must not contain ':'".to_string(),
            ));
        }
        Ok(Self { unit, symbol })
    }

    /// Parse `unit::symbol`. The unit may itself be a path (`app::posts::is_owner`
    /// has unit `app::posts`).
    pub fn parse(qualified: &str) -> CoreResult<Self> {
        let (unit, symbol) = qualified.rsplit_once("::").ok_or_else(|| {
            CoreError::InvalidMethodRef("expected the form 'unit::symbol'".to_string())
        })?;
        Self::new(unit, symbol)
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

fn validate_part(what: &str, part: &str) -> CoreResult<()> {
    if part.is_empty() {
        return Err(CoreError::InvalidMethodRef(format!("{} must not be empty", what)));
    }
    if part.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidMethodRef(format!(
            "{} must not contain whitespace",
            what
        )));
    }
    Ok(())
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.unit, self.symbol)
    }
}

impl TryFrom<String> for MethodRef {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<MethodRef> for String {
    fn from(method: MethodRef) -> Self {
        method.to_string()
    }
}
