//! Decision scenarios run through the public API.
//!
//! Scenario A: deny-unless-permit over four rules
//! Scenario B: deny-overrides keeps only the winning outcome's actions
//! Scenario C: attribute lookup failures surface as indeterminate outcomes
//! Scenario D: switch dispatch reaches the matching rule without scanning siblings

use praetor::{
    builtin_registry, Advice, AttributeError, AttributeKey, AttributeValue, CombiningAlgorithm,
    Context, Encoder, Evaluation, MethodRef, MethodRegistry, Obligation, Outcome, Policy,
    PolicyDecisionPoint, PolicySet, Rule, Target, Trigger,
};
use praetor_policy::{EvaluationEventKind, InMemoryEvaluationSink};
use std::collections::BTreeMap;
use std::sync::Arc;

type Attributes = BTreeMap<AttributeKey, AttributeValue>;

fn method(qualified: &str) -> MethodRef {
    MethodRef::parse(qualified).unwrap()
}

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (AttributeKey::from(*k), AttributeValue::from(*v)))
        .collect()
}

fn registry() -> Arc<MethodRegistry> {
    let mut registry = builtin_registry().unwrap();
    registry
        .register_logical(method("test::is_owner"), |ctx| {
            Ok(ctx.has(&"owner".into())? && ctx.get(&"owner".into())? == AttributeValue::from("yes"))
        })
        .unwrap();
    for action in ["rule1", "rule2", "rule4"] {
        for kind in ["obligation", "advice"] {
            registry
                .register_action(method(&format!("{}::{}", action, kind)), |_| Ok(()))
                .unwrap();
        }
    }
    Arc::new(registry)
}

/// Context that fails every lookup of `broken` and delegates the rest.
struct FailingContext {
    broken: AttributeKey,
    inner: Attributes,
}

impl Context for FailingContext {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError> {
        if *key == self.broken {
            return Err(AttributeError::Unavailable(key.clone()));
        }
        Context::has(&self.inner, key)
    }

    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError> {
        if *key == self.broken {
            return Err(AttributeError::Unavailable(key.clone()));
        }
        Context::get(&self.inner, key)
    }
}

/// The four rules shared by scenarios A and B.
fn four_rules(with_catch_all: bool) -> Vec<Rule> {
    let mut rules = vec![
        Rule::named("rule1")
            .with_target(
                Target::all([("key11_1", "value11_1"), ("key11_2", "value11_2")]).unwrap(),
            )
            .with_condition(method("test::is_owner"))
            .with_obligation(Obligation::new(Trigger::Permit, method("rule1::obligation")))
            .with_advice(Advice::new(Trigger::Permit, method("rule1::advice"))),
        Rule::named("rule2")
            .with_target(
                Target::all([("key21_1", "value21_1"), ("key21_2", "value21_2")]).unwrap(),
            )
            .with_effect(method("builtin::deny"))
            .with_obligation(Obligation::new(Trigger::Deny, method("rule2::obligation")))
            .with_advice(Advice::new(Trigger::Deny, method("rule2::advice"))),
        Rule::named("rule3")
            .with_target(Target::single("key31", "value31").unwrap())
            .with_effect(method("builtin::permit")),
    ];
    if with_catch_all {
        rules.push(
            Rule::named("rule4")
                .with_obligation(Obligation::new(Trigger::Permit, method("rule4::obligation")))
                .with_advice(Advice::new(Trigger::Permit, method("rule4::advice"))),
        );
    }
    rules
}

fn single_policy_pdp(rules: Vec<Rule>, algorithm: CombiningAlgorithm) -> PolicyDecisionPoint {
    let policy = Policy::new("Rules", rules, algorithm).unwrap();
    let set = PolicySet::new("Root", vec![policy.into()], algorithm).unwrap();
    PolicyDecisionPoint::new(&set, registry()).unwrap()
}

// ============================================================================
// Scenario A
// ============================================================================

#[test]
fn test_scenario_a_first_rule_permits_with_its_actions() {
    let pdp = single_policy_pdp(four_rules(true), CombiningAlgorithm::DenyUnlessPermit);
    let ctx = attrs(&[
        ("key11_1", "value11_1"),
        ("key11_2", "value11_2"),
        ("owner", "yes"),
    ]);
    let result = pdp.evaluate(&ctx);
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(result.obligations, vec![method("rule1::obligation")]);
    assert_eq!(result.advice, vec![method("rule1::advice")]);
}

#[test]
fn test_scenario_a_false_condition_falls_through_to_catch_all() {
    let pdp = single_policy_pdp(four_rules(true), CombiningAlgorithm::DenyUnlessPermit);
    let ctx = attrs(&[("key11_1", "value11_1"), ("key11_2", "value11_2")]);
    let result = pdp.evaluate(&ctx);
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(result.obligations, vec![method("rule4::obligation")]);
}

#[test]
fn test_scenario_a_nothing_matches() {
    let pdp = single_policy_pdp(four_rules(true), CombiningAlgorithm::DenyUnlessPermit);
    let result = pdp.evaluate(&attrs(&[("unrelated", "value")]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(result.advice, vec![method("rule4::advice")]);

    let pdp = single_policy_pdp(four_rules(false), CombiningAlgorithm::DenyUnlessPermit);
    let result = pdp.evaluate(&attrs(&[("unrelated", "value")]));
    assert_eq!(result, Evaluation::new(Outcome::Deny));
}

// ============================================================================
// Scenario B
// ============================================================================

#[test]
fn test_scenario_b_deny_overrides_drops_permit_actions() {
    let pdp = single_policy_pdp(four_rules(true), CombiningAlgorithm::DenyOverrides);
    let result = pdp.evaluate(&attrs(&[("key21_1", "value21_1"), ("key21_2", "value21_2")]));
    assert_eq!(result.outcome, Outcome::Deny);
    assert_eq!(result.obligations, vec![method("rule2::obligation")]);
    assert_eq!(result.advice, vec![method("rule2::advice")]);
}

#[test]
fn test_scenario_b_permit_overrides_prefers_catch_all() {
    let pdp = single_policy_pdp(four_rules(true), CombiningAlgorithm::PermitOverrides);
    let result = pdp.evaluate(&attrs(&[("key21_1", "value21_1"), ("key21_2", "value21_2")]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(result.obligations, vec![method("rule4::obligation")]);
}

// ============================================================================
// Scenario C
// ============================================================================

fn rule_outcome(sink: &InMemoryEvaluationSink, name: &str) -> Option<Outcome> {
    sink.events()
        .into_iter()
        .find(|e| e.kind == EvaluationEventKind::ItemEvaluated && e.name.as_deref() == Some(name))
        .and_then(|e| e.outcome)
}

#[test]
fn test_scenario_c_lookup_failure_is_indeterminate_by_effect() {
    let ctx = FailingContext {
        broken: "balance".into(),
        inner: attrs(&[]),
    };
    for (effect, expected) in [
        ("builtin::permit", Outcome::IndeterminatePermit),
        ("builtin::deny", Outcome::IndeterminateDeny),
    ] {
        let rule = Rule::named("guarded")
            .with_target(Target::single("balance", "positive").unwrap())
            .with_effect(method(effect))
            .with_obligation(Obligation::new(Trigger::Permit, method("rule1::obligation")))
            .with_obligation(Obligation::new(Trigger::Deny, method("rule2::obligation")));

        let sink = Arc::new(InMemoryEvaluationSink::new());
        let pdp = single_policy_pdp(vec![rule.clone()], CombiningAlgorithm::DenyOverrides)
            .with_sink(sink.clone());
        let result = pdp.evaluate(&ctx);
        assert_eq!(rule_outcome(&sink, "guarded"), Some(expected));
        assert_eq!(result, Evaluation::new(expected));

        let pdp = single_policy_pdp(vec![rule], CombiningAlgorithm::DenyUnlessPermit);
        assert_eq!(pdp.evaluate(&ctx), Evaluation::new(Outcome::Deny));
    }
}

#[test]
fn test_scenario_c_failing_condition_is_indeterminate() {
    let rule = Rule::named("owner-only")
        .with_target(Target::single("key31", "value31").unwrap())
        .with_condition(method("test::is_owner"));
    let ctx = FailingContext {
        broken: "owner".into(),
        inner: attrs(&[("key31", "value31")]),
    };
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let pdp = single_policy_pdp(vec![rule], CombiningAlgorithm::PermitOverrides)
        .with_sink(sink.clone());
    assert_eq!(pdp.evaluate(&ctx).outcome, Outcome::IndeterminatePermit);
    assert_eq!(rule_outcome(&sink, "owner-only"), Some(Outcome::IndeterminatePermit));
}

#[test]
fn test_scenario_c_indeterminate_policy_target() {
    let policy = Policy::new(
        "Guarded",
        vec![Rule::named("allow")],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_target(Target::single("region", "eu").unwrap());
    let set = PolicySet::new("Root", vec![policy.into()], CombiningAlgorithm::DenyOverrides)
        .unwrap();
    let pdp = PolicyDecisionPoint::new(&set, registry()).unwrap();
    let ctx = FailingContext {
        broken: "region".into(),
        inner: attrs(&[]),
    };
    assert_eq!(pdp.evaluate(&ctx), Evaluation::new(Outcome::IndeterminatePermit));
}

// ============================================================================
// Scenario D
// ============================================================================

fn crud_rules(prefix: &str) -> Vec<Rule> {
    ["index", "read", "update", "delete"]
        .into_iter()
        .map(|action| {
            let name = if prefix.is_empty() {
                action.to_string()
            } else {
                format!("{}-{}", prefix, action)
            };
            let rule = Rule::named(name).with_target(Target::single("action", action).unwrap());
            if action == "delete" {
                rule.with_effect(method("builtin::deny"))
            } else {
                rule
            }
        })
        .collect()
}

fn blog() -> PolicySet {
    let comments = Policy::new(
        "Comments",
        crud_rules("comments"),
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_target(Target::single("resource", "comments").unwrap());
    let posts = Policy::new("Posts", crud_rules(""), CombiningAlgorithm::FirstApplicable)
        .unwrap()
        .with_target(Target::single("resource", "posts").unwrap());
    PolicySet::new(
        "Blog",
        vec![comments.into(), posts.into()],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
}

#[test]
fn test_scenario_d_switch_dispatch_skips_other_policy() {
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let pdp = PolicyDecisionPoint::new(&blog(), registry())
        .unwrap()
        .with_sink(sink.clone());

    let root = pdp.encoded().combining().unwrap();
    assert!(root.targets.is_switch());
    assert!(root.items.iter().all(|p| p.combining().unwrap().targets.is_switch()));

    let result = pdp.evaluate(&attrs(&[("resource", "posts"), ("action", "index")]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(
        sink.evaluated_names(),
        vec!["index".to_string(), "Posts".to_string(), "Blog".to_string()]
    );

    sink.clear();
    let result = pdp.evaluate(&attrs(&[("resource", "posts"), ("action", "delete")]));
    assert_eq!(result.outcome, Outcome::Deny);
    assert_eq!(
        sink.evaluated_names(),
        vec!["delete".to_string(), "Posts".to_string(), "Blog".to_string()]
    );
}

#[test]
fn test_scenario_d_linear_scan_visits_every_candidate() {
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let pdp = PolicyDecisionPoint::with_encoder(&blog(), &Encoder::linear(), registry())
        .unwrap()
        .with_sink(sink.clone());

    let result = pdp.evaluate(&attrs(&[("resource", "posts"), ("action", "index")]));
    assert_eq!(result.outcome, Outcome::Permit);
    let names = sink.evaluated_names();
    assert!(names.contains(&"Comments".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("Blog"));
}

#[test]
fn test_scenario_d_unknown_resource_is_not_applicable() {
    let pdp = PolicyDecisionPoint::new(&blog(), registry()).unwrap();
    let result = pdp.evaluate(&attrs(&[("resource", "tags"), ("action", "index")]));
    assert_eq!(result, Evaluation::new(Outcome::NotApplicable));
    let result = pdp.evaluate(&attrs(&[("action", "index")]));
    assert_eq!(result, Evaluation::new(Outcome::NotApplicable));
}

// ============================================================================
// Dispatch equivalence and repeatability
// ============================================================================

fn mixed_rules() -> Vec<Rule> {
    vec![
        Rule::named("read").with_target(Target::any_value("action", ["index", "read"]).unwrap()),
        Rule::named("admin-delete")
            .with_target(Target::all([("action", "delete"), ("role", "admin")]).unwrap())
            .with_obligation(Obligation::new(Trigger::Permit, method("rule1::obligation"))),
        Rule::named("delete")
            .with_target(Target::single("action", "delete").unwrap())
            .with_effect(method("builtin::deny"))
            .with_obligation(Obligation::new(Trigger::Deny, method("rule2::obligation"))),
        Rule::named("update")
            .with_target(Target::single("action", "update").unwrap())
            .with_condition(method("test::is_owner")),
        Rule::named("guest")
            .with_target(Target::single("role", "guest").unwrap())
            .with_effect(method("builtin::deny")),
        Rule::named("fallback")
            .with_effect(method("builtin::deny"))
            .with_advice(Advice::new(Trigger::Deny, method("rule4::advice"))),
    ]
}

fn context_grid() -> Vec<Attributes> {
    let mut grid = Vec::new();
    for action in [None, Some("index"), Some("read"), Some("update"), Some("delete"), Some("purge")] {
        for role in [None, Some("admin"), Some("guest")] {
            for owner in [None, Some("yes")] {
                let mut pairs = Vec::new();
                if let Some(a) = action {
                    pairs.push(("action", a));
                }
                if let Some(r) = role {
                    pairs.push(("role", r));
                }
                if let Some(o) = owner {
                    pairs.push(("owner", o));
                }
                grid.push(attrs(&pairs));
            }
        }
    }
    grid
}

#[test]
fn test_switch_and_linear_dispatch_agree() {
    for algorithm in CombiningAlgorithm::ALL {
        let policy = Policy::new("Mixed", mixed_rules(), algorithm).unwrap();
        let set = PolicySet::new("Root", vec![policy.into()], algorithm).unwrap();
        let switched = PolicyDecisionPoint::new(&set, registry()).unwrap();
        let linear =
            PolicyDecisionPoint::with_encoder(&set, &Encoder::linear(), registry()).unwrap();
        assert!(switched.encoded().combining().unwrap().items[0]
            .combining()
            .unwrap()
            .targets
            .is_switch());

        for ctx in context_grid() {
            assert_eq!(
                switched.evaluate(&ctx),
                linear.evaluate(&ctx),
                "{} disagrees for {:?}",
                algorithm,
                ctx
            );
        }

        let broken = FailingContext {
            broken: "action".into(),
            inner: attrs(&[("role", "guest")]),
        };
        assert_eq!(switched.evaluate(&broken), linear.evaluate(&broken), "{}", algorithm);
    }
}

#[test]
fn test_evaluation_is_repeatable_and_survives_caching() {
    let policy = Policy::new("Mixed", mixed_rules(), CombiningAlgorithm::DenyOverrides).unwrap();
    let set = PolicySet::new("Root", vec![policy.into()], CombiningAlgorithm::FirstApplicable)
        .unwrap();
    let pdp = PolicyDecisionPoint::new(&set, registry()).unwrap();
    let restored = PolicyDecisionPoint::load(&pdp.to_json().unwrap(), 1 << 20, registry()).unwrap();
    assert_eq!(restored.encoded(), pdp.encoded());

    for ctx in context_grid() {
        let first = pdp.evaluate(&ctx);
        assert_eq!(pdp.evaluate(&ctx), first);
        assert_eq!(restored.evaluate(&ctx), first);
    }
}

#[test]
fn test_obligations_follow_the_winning_rule() {
    let policy = Policy::new("Mixed", mixed_rules(), CombiningAlgorithm::FirstApplicable).unwrap();
    let set = PolicySet::new("Root", vec![policy.into()], CombiningAlgorithm::FirstApplicable)
        .unwrap();
    let pdp = PolicyDecisionPoint::new(&set, registry()).unwrap();

    let result = pdp.evaluate(&attrs(&[("action", "delete"), ("role", "admin")]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(result.obligations, vec![method("rule1::obligation")]);

    let result = pdp.evaluate(&attrs(&[("action", "delete")]));
    assert_eq!(result.outcome, Outcome::Deny);
    assert_eq!(result.obligations, vec![method("rule2::obligation")]);
    assert!(result.advice.is_empty());

    let result = pdp.evaluate(&attrs(&[("action", "purge")]));
    assert_eq!(result.outcome, Outcome::Deny);
    assert!(result.obligations.is_empty());
    assert_eq!(result.advice, vec![method("rule4::advice")]);
}

// ============================================================================
// Nested policy sets
// ============================================================================

fn nested_registry() -> Arc<MethodRegistry> {
    let mut registry = builtin_registry().unwrap();
    for name in [
        "posts::log",
        "posts::deny",
        "content::permit",
        "content::deny_advice",
        "admin::log",
        "platform::permit",
        "platform::deny",
    ] {
        registry.register_action(method(name), |_| Ok(())).unwrap();
    }
    Arc::new(registry)
}

fn platform() -> PolicySet {
    let posts = Policy::new(
        "Posts",
        vec![
            Rule::named("posts-index")
                .with_target(Target::single("action", "index").unwrap())
                .with_obligation(Obligation::new(Trigger::Permit, method("posts::log"))),
            Rule::named("posts-delete")
                .with_target(Target::single("action", "delete").unwrap())
                .with_effect(method("builtin::deny"))
                .with_obligation(Obligation::new(Trigger::Deny, method("posts::deny"))),
        ],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_target(Target::single("resource", "posts").unwrap());
    let comments = Policy::new(
        "Comments",
        vec![
            Rule::named("comments-index").with_target(Target::single("action", "index").unwrap()),
            Rule::named("comments-delete")
                .with_target(Target::single("action", "delete").unwrap())
                .with_effect(method("builtin::deny")),
        ],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_target(Target::single("resource", "comments").unwrap());
    let content = PolicySet::new(
        "Content",
        vec![posts.into(), comments.into()],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_obligation(Obligation::new(Trigger::Permit, method("content::permit")))
    .with_advice(Advice::new(Trigger::Deny, method("content::deny_advice")));

    let admin = Policy::new(
        "Admin",
        vec![Rule::named("admin-all")
            .with_obligation(Obligation::new(Trigger::Permit, method("admin::log")))],
        CombiningAlgorithm::FirstApplicable,
    )
    .unwrap()
    .with_target(Target::single("role", "admin").unwrap());

    PolicySet::new(
        "Platform",
        vec![content.into(), admin.into()],
        CombiningAlgorithm::DenyOverrides,
    )
    .unwrap()
    .with_obligation(Obligation::new(Trigger::Permit, method("platform::permit")))
    .with_obligation(Obligation::new(Trigger::Deny, method("platform::deny")))
}

#[test]
fn test_nested_set_merges_obligations_per_level() {
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let pdp = PolicyDecisionPoint::new(&platform(), nested_registry())
        .unwrap()
        .with_sink(sink.clone());

    let content = &pdp.encoded().combining().unwrap().items[0];
    assert!(content.combining().unwrap().targets.is_switch());

    let result = pdp.evaluate(&attrs(&[("resource", "posts"), ("action", "index")]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(
        result.obligations,
        vec![
            method("posts::log"),
            method("content::permit"),
            method("platform::permit"),
        ]
    );
    assert!(result.advice.is_empty());
    let names = sink.evaluated_names();
    assert!(names.contains(&"Content".to_string()));
    assert!(!names.contains(&"Comments".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("Platform"));
}

#[test]
fn test_nested_set_deny_drops_permit_obligations() {
    let pdp = PolicyDecisionPoint::new(&platform(), nested_registry()).unwrap();

    let result = pdp.evaluate(&attrs(&[
        ("resource", "posts"),
        ("action", "delete"),
        ("role", "admin"),
    ]));
    assert_eq!(result.outcome, Outcome::Deny);
    assert_eq!(
        result.obligations,
        vec![method("posts::deny"), method("platform::deny")]
    );
    assert_eq!(result.advice, vec![method("content::deny_advice")]);

    let result = pdp.evaluate(&attrs(&[
        ("resource", "comments"),
        ("action", "index"),
        ("role", "admin"),
    ]));
    assert_eq!(result.outcome, Outcome::Permit);
    assert_eq!(
        result.obligations,
        vec![
            method("content::permit"),
            method("admin::log"),
            method("platform::permit"),
        ]
    );
}

#[test]
fn test_nested_set_switch_and_linear_agree() {
    let switched = PolicyDecisionPoint::new(&platform(), nested_registry()).unwrap();
    let linear =
        PolicyDecisionPoint::with_encoder(&platform(), &Encoder::linear(), nested_registry())
            .unwrap();
    for resource in [None, Some("posts"), Some("comments"), Some("tags")] {
        for action in [None, Some("index"), Some("delete")] {
            for role in [None, Some("admin")] {
                let mut pairs = Vec::new();
                if let Some(r) = resource {
                    pairs.push(("resource", r));
                }
                if let Some(a) = action {
                    pairs.push(("action", a));
                }
                if let Some(r) = role {
                    pairs.push(("role", r));
                }
                let ctx = attrs(&pairs);
                assert_eq!(switched.evaluate(&ctx), linear.evaluate(&ctx), "{:?}", ctx);
            }
        }
    }
}
