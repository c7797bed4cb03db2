use praetor_core::{AttributeError, AttributeKey, AttributeValue, Context, TargetMatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::model::{AllOf, AnyOf, Target};

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Match a target against a context.
///
/// `None` or an empty disjunction is `NoTarget`. Any lookup failure makes the
/// whole target `Indeterminate`.
pub fn match_target(ctx: &dyn Context, target: Option<&Target>) -> TargetMatch {
    let target = match target {
        Some(t) if !t.is_empty() => t,
        _ => return TargetMatch::NoTarget,
    };
    match match_any_of(ctx, target.any_of()) {
        Ok(true) => TargetMatch::Match,
        Ok(false) => TargetMatch::NotMatch,
        Err(e) => {
            warn!(target_name = ?target.name(), error = %e, "target lookup failed");
            TargetMatch::Indeterminate
        }
    }
}

fn match_any_of(ctx: &dyn Context, any_of: &AnyOf) -> Result<bool, AttributeError> {
    for all_of in any_of.all_of() {
        if match_all_of(ctx, all_of)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn match_all_of(ctx: &dyn Context, all_of: &AllOf) -> Result<bool, AttributeError> {
    for (key, expected) in all_of.pairs() {
        match lookup(ctx, key)? {
            Some(actual) if &actual == expected => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// `has` then `get`; an absent key is `Ok(None)`.
fn lookup(ctx: &dyn Context, key: &AttributeKey) -> Result<Option<AttributeValue>, AttributeError> {
    if !ctx.has(key)? {
        return Ok(None);
    }
    ctx.get(key).map(Some)
}

// ---------------------------------------------------------------------------
// Optimized targets
// ---------------------------------------------------------------------------

/// Per-container dispatch structure over the children's targets.
///
/// Both forms yield the same `(TargetMatch, index)` sequence for every
/// context, up to items whose target would not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OptimizedTargets {
    Linear { targets: Vec<Option<Target>> },
    Switch(SwitchTable),
}

impl OptimizedTargets {
    pub fn is_switch(&self) -> bool {
        matches!(self, OptimizedTargets::Switch(_))
    }

    /// Number of children this structure dispatches over.
    pub fn len(&self) -> usize {
        match self {
            OptimizedTargets::Linear { targets } => targets.len(),
            OptimizedTargets::Switch(table) => table.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily yield candidate children in declaration order.
    ///
    /// Matching happens as the iterator advances, so a combining algorithm
    /// that stops early never touches the remaining targets.
    pub fn matches<'a>(&'a self, ctx: &'a dyn Context) -> TargetMatches<'a> {
        match self {
            OptimizedTargets::Linear { targets } => TargetMatches {
                ctx,
                state: MatchState::Linear { targets, next: 0 },
            },
            OptimizedTargets::Switch(table) => TargetMatches {
                ctx,
                state: MatchState::Switch(table.plan(ctx).into_iter()),
            },
        }
    }

    pub(crate) fn check(&self, expected_len: usize) -> Result<(), String> {
        if self.len() != expected_len {
            return Err(format!(
                "dispatch covers {} items but {} are declared",
                self.len(),
                expected_len
            ));
        }
        match self {
            OptimizedTargets::Linear { targets } => {
                for target in targets.iter().flatten() {
                    check_target(target)?;
                }
                Ok(())
            }
            OptimizedTargets::Switch(table) => table.check(),
        }
    }
}

pub(crate) fn check_target(target: &Target) -> Result<(), String> {
    target.any_of().all_of().iter().try_for_each(AllOf::check)
}

/// Build the dispatch structure for a container's children.
///
/// A switch table is used when enabled and at least `min_switch_cases`
/// children test one shared key with plain equalities. Children that do not
/// fit the switch are kept in a fallback list and matched normally.
pub fn optimize_targets(
    targets: Vec<Option<Target>>,
    switch_optimization: bool,
    min_switch_cases: usize,
) -> OptimizedTargets {
    if !switch_optimization {
        return OptimizedTargets::Linear { targets };
    }
    let Some(key) = dominant_key(&targets, min_switch_cases) else {
        return OptimizedTargets::Linear { targets };
    };

    let len = targets.len();
    let mut cases = Vec::new();
    let mut unconditional = Vec::new();
    let mut fallback = Vec::new();
    for (item, target) in targets.into_iter().enumerate() {
        match target {
            None => unconditional.push(item),
            Some(t) if t.is_empty() => unconditional.push(item),
            Some(t) => {
                let values: Option<Vec<AttributeValue>> = switch_values(&t)
                    .filter(|(k, _)| *k == &key)
                    .map(|(_, values)| values.into_iter().cloned().collect());
                match values {
                    Some(values) => cases.push(SwitchCase { item, values }),
                    None => fallback.push(FallbackItem { item, target: t }),
                }
            }
        }
    }
    debug!(
        key = %key,
        cases = cases.len(),
        unconditional = unconditional.len(),
        fallback = fallback.len(),
        "built switch table"
    );
    OptimizedTargets::Switch(SwitchTable::from(SwitchTableRepr {
        key,
        cases,
        unconditional,
        fallback,
        len,
    }))
}

/// Key and values of a target made only of single-pair groups on one key.
fn switch_values(target: &Target) -> Option<(&AttributeKey, Vec<&AttributeValue>)> {
    let mut key = None;
    let mut values = Vec::new();
    for all_of in target.any_of().all_of() {
        let (k, v) = all_of.single()?;
        match key {
            None => key = Some(k),
            Some(existing) if existing != k => return None,
            Some(_) => {}
        }
        if !values.contains(&v) {
            values.push(v);
        }
    }
    key.map(|k| (k, values))
}

/// Key shared by the most switchable targets; ties go to the first seen.
fn dominant_key(targets: &[Option<Target>], min_switch_cases: usize) -> Option<AttributeKey> {
    let mut counts: Vec<(&AttributeKey, usize)> = Vec::new();
    for target in targets.iter().flatten() {
        if let Some((key, _)) = switch_values(target) {
            match counts.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) => *count += 1,
                None => counts.push((key, 1)),
            }
        }
    }
    let mut best: Option<(&AttributeKey, usize)> = None;
    for (key, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.filter(|(_, count)| *count >= min_switch_cases.max(1))
        .map(|(key, _)| key.clone())
}

// ---------------------------------------------------------------------------
// Switch table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub item: usize,
    pub values: Vec<AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackItem {
    pub item: usize,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SwitchTableRepr {
    key: AttributeKey,
    cases: Vec<SwitchCase>,
    #[serde(default)]
    unconditional: Vec<usize>,
    #[serde(default)]
    fallback: Vec<FallbackItem>,
    len: usize,
}

/// Value-keyed dispatch on one attribute.
///
/// Serialized as an ordered case list; the value index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SwitchTableRepr", into = "SwitchTableRepr")]
pub struct SwitchTable {
    key: AttributeKey,
    cases: Vec<SwitchCase>,
    unconditional: Vec<usize>,
    fallback: Vec<FallbackItem>,
    len: usize,
    index: HashMap<AttributeValue, Vec<usize>>,
}

impl PartialEq for SwitchTable {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.cases == other.cases
            && self.unconditional == other.unconditional
            && self.fallback == other.fallback
            && self.len == other.len
    }
}

impl From<SwitchTableRepr> for SwitchTable {
    fn from(repr: SwitchTableRepr) -> Self {
        let mut index: HashMap<AttributeValue, Vec<usize>> = HashMap::new();
        for case in &repr.cases {
            for value in &case.values {
                let items = index.entry(value.clone()).or_default();
                if !items.contains(&case.item) {
                    items.push(case.item);
                }
            }
        }
        Self {
            key: repr.key,
            cases: repr.cases,
            unconditional: repr.unconditional,
            fallback: repr.fallback,
            len: repr.len,
            index,
        }
    }
}

impl From<SwitchTable> for SwitchTableRepr {
    fn from(table: SwitchTable) -> Self {
        Self {
            key: table.key,
            cases: table.cases,
            unconditional: table.unconditional,
            fallback: table.fallback,
            len: table.len,
        }
    }
}

impl SwitchTable {
    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    pub fn unconditional(&self) -> &[usize] {
        &self.unconditional
    }

    pub fn fallback(&self) -> &[FallbackItem] {
        &self.fallback
    }

    /// Candidates for this context, sorted by declaration index.
    fn plan<'a>(&'a self, ctx: &dyn Context) -> Vec<Candidate<'a>> {
        let mut plan: Vec<Candidate<'a>> = Vec::new();
        match lookup(ctx, &self.key) {
            Ok(Some(value)) => {
                if let Some(items) = self.index.get(&value) {
                    plan.extend(items.iter().map(|&i| Candidate::Resolved(i, TargetMatch::Match)));
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %self.key, error = %e, "switch key lookup failed");
                plan.extend(
                    self.cases
                        .iter()
                        .map(|case| Candidate::Resolved(case.item, TargetMatch::Indeterminate)),
                );
            }
        }
        plan.extend(
            self.unconditional
                .iter()
                .map(|&i| Candidate::Resolved(i, TargetMatch::NoTarget)),
        );
        plan.extend(
            self.fallback
                .iter()
                .map(|f| Candidate::Deferred(f.item, &f.target)),
        );
        plan.sort_by_key(Candidate::item);
        plan
    }

    fn check(&self) -> Result<(), String> {
        let mut seen = vec![false; self.len];
        let items = self
            .cases
            .iter()
            .map(|c| c.item)
            .chain(self.unconditional.iter().copied())
            .chain(self.fallback.iter().map(|f| f.item));
        for item in items {
            match seen.get_mut(item) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => return Err(format!("item {} is dispatched twice", item)),
                None => return Err(format!("item {} is out of range", item)),
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(format!("item {} is never dispatched", missing));
        }
        for case in &self.cases {
            if case.values.is_empty() {
                return Err(format!("switch case for item {} has no values", case.item));
            }
        }
        for f in &self.fallback {
            check_target(&f.target)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lazy candidate iterator
// ---------------------------------------------------------------------------

enum Candidate<'a> {
    Resolved(usize, TargetMatch),
    Deferred(usize, &'a Target),
}

impl Candidate<'_> {
    fn item(&self) -> usize {
        match self {
            Candidate::Resolved(i, _) | Candidate::Deferred(i, _) => *i,
        }
    }
}

enum MatchState<'a> {
    Linear {
        targets: &'a [Option<Target>],
        next: usize,
    },
    Switch(std::vec::IntoIter<Candidate<'a>>),
}

/// Iterator of `(TargetMatch, child index)` pairs.
pub struct TargetMatches<'a> {
    ctx: &'a dyn Context,
    state: MatchState<'a>,
}

impl Iterator for TargetMatches<'_> {
    type Item = (TargetMatch, usize);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            MatchState::Linear { targets, next } => {
                let index = *next;
                let target = targets.get(index)?;
                *next += 1;
                Some((match_target(self.ctx, target.as_ref()), index))
            }
            MatchState::Switch(plan) => match plan.next()? {
                Candidate::Resolved(index, m) => Some((m, index)),
                Candidate::Deferred(index, target) => {
                    Some((match_target(self.ctx, Some(target)), index))
                }
            },
        }
    }
}
