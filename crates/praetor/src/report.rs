use praetor_policy::{EncodedItem, OptimizedTargets, Target, Triggered};
use std::fmt::Write;

/// Human-readable outline of a compiled tree, one item per line.
pub fn render_tree(root: &EncodedItem) -> String {
    let mut out = String::new();
    render_item(&mut out, root, 0);
    out
}

fn render_item(out: &mut String, item: &EncodedItem, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(
        out,
        "{}{} '{}'",
        indent,
        item.kind(),
        item.name().unwrap_or("<unnamed>")
    );
    if let Some(target) = item.target() {
        let _ = write!(out, " target({})", describe_target(target));
    }
    if let Some(condition) = item.condition() {
        let _ = write!(out, " condition={}", condition);
    }
    if let Some(effect) = item.effect() {
        let _ = write!(out, " effect={}", effect);
    }
    if let Some(combining) = item.combining() {
        let _ = write!(
            out,
            " [{}, {}]",
            combining.algorithm,
            describe_dispatch(&combining.targets)
        );
    }
    for obligation in item.obligations() {
        let _ = write!(out, " obligation({}→{})", obligation.trigger(), obligation.method());
    }
    for advice in item.advice() {
        let _ = write!(out, " advice({}→{})", advice.trigger(), advice.method());
    }
    out.push('\n');
    if let Some(combining) = item.combining() {
        for child in &combining.items {
            render_item(out, child, depth + 1);
        }
    }
}

fn describe_target(target: &Target) -> String {
    target
        .any_of()
        .all_of()
        .iter()
        .map(|all_of| {
            all_of
                .pairs()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" & ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn describe_dispatch(targets: &OptimizedTargets) -> String {
    match targets {
        OptimizedTargets::Linear { targets } => format!("linear over {}", targets.len()),
        OptimizedTargets::Switch(table) => format!(
            "switch on {} ({} cases, {} unconditional, {} fallback)",
            table.key(),
            table.cases().len(),
            table.unconditional().len(),
            table.fallback().len()
        ),
    }
}
