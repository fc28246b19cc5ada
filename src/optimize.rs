//! Canonicalization and deduplication of validated rules.
//!
//! The optimizer never changes observable semantics: it merges rules whose
//! condition trees are canonically equal, orders rules by priority, and drops
//! exact duplicate leaves that validation would already have rejected.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::types::{CompileError, Condition, Conditions, Rule, Value};

/// Optimize a list of validated rules.
///
/// Three passes, in order:
///
/// 1. Merge rules sharing a canonical condition signature; the first rule in
///    input order survives, later rules contribute their actions (appended)
///    and their fact sets (unioned).
/// 2. Stable-sort by priority descending; ties keep input order.
/// 3. Drop later duplicates of identical leaves within each list at each
///    nesting level (defensive; validation rejects exact duplicates).
///
/// # Errors
///
/// Only a canonical-signature serialization failure, which is unreachable
/// for validated rules.
pub fn optimize(rules: Vec<Rule>) -> Result<Vec<Rule>, CompileError> {
    let merged = merge_rules(rules)?;
    let prioritized = prioritize_rules(merged);
    Ok(simplify_rules(prioritized))
}

// ---------------------------------------------------------------------------
// Canonical condition signatures
// ---------------------------------------------------------------------------

/// Canonical serialization of a condition, used as the merge equivalence key.
/// Lists are sorted; nesting is preserved.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CanonicalCondition {
    Leaf {
        fact: String,
        op: &'static str,
        #[serde(rename = "type")]
        value_type: String,
        value: String,
    },
    Nested {
        all: Vec<CanonicalCondition>,
        any: Vec<CanonicalCondition>,
    },
}

fn canonicalize(conditions: &Conditions) -> CanonicalCondition {
    CanonicalCondition::Nested {
        all: canonicalize_list(&conditions.all),
        any: canonicalize_list(&conditions.any),
    }
}

fn canonicalize_list(list: &[Condition]) -> Vec<CanonicalCondition> {
    let mut out: Vec<CanonicalCondition> = list
        .iter()
        .map(|cond| match cond {
            Condition::Leaf { fact, op, value } => CanonicalCondition::Leaf {
                fact: fact.clone(),
                op: op.canonical_name(),
                value_type: value.value_type().to_string(),
                value: canonical_value(value),
            },
            Condition::Nested(inner) => canonicalize(inner),
        })
        .collect();
    out.sort_by(compare_canonical);
    out
}

/// Value rendering with a stable textual form per type.
fn canonical_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => format!("{v:?}"),
        Value::Bool(v) => v.to_string(),
        Value::String(v) => v.clone(),
    }
}

/// Total order over canonical conditions: leaves before nested blocks;
/// leaves by `(fact, operator, value type, value)` using the per-type total
/// order; nested blocks by their serialized form.
fn compare_canonical(a: &CanonicalCondition, b: &CanonicalCondition) -> Ordering {
    match (a, b) {
        (
            CanonicalCondition::Leaf {
                fact: fa,
                op: oa,
                value_type: ta,
                value: va,
            },
            CanonicalCondition::Leaf {
                fact: fb,
                op: ob,
                value_type: tb,
                value: vb,
            },
        ) => fa
            .cmp(fb)
            .then_with(|| oa.cmp(ob))
            .then_with(|| ta.cmp(tb))
            .then_with(|| va.cmp(vb)),
        (CanonicalCondition::Leaf { .. }, CanonicalCondition::Nested { .. }) => Ordering::Less,
        (CanonicalCondition::Nested { .. }, CanonicalCondition::Leaf { .. }) => Ordering::Greater,
        (CanonicalCondition::Nested { .. }, CanonicalCondition::Nested { .. }) => {
            let sa = serde_json::to_string(a).unwrap_or_default();
            let sb = serde_json::to_string(b).unwrap_or_default();
            sa.cmp(&sb)
        }
    }
}

/// Compute the canonical signature of a condition tree: a blake3 hash of the
/// sorted tree's JSON serialization.
pub(crate) fn condition_signature(conditions: &Conditions) -> Result<[u8; 32], CompileError> {
    let canonical = canonicalize(conditions);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

// ---------------------------------------------------------------------------
// Pass 1: merge
// ---------------------------------------------------------------------------

fn merge_rules(rules: Vec<Rule>) -> Result<Vec<Rule>, CompileError> {
    let mut merged: Vec<Rule> = Vec::with_capacity(rules.len());
    let mut by_signature: HashMap<[u8; 32], usize> = HashMap::new();

    for rule in rules {
        let signature = condition_signature(&rule.conditions)?;
        match by_signature.get(&signature) {
            Some(&slot) => {
                let survivor = &mut merged[slot];
                survivor.event.actions.extend(rule.event.actions);
                union_into(&mut survivor.produced_facts, rule.produced_facts);
                union_into(&mut survivor.consumed_facts, rule.consumed_facts);
            }
            None => {
                by_signature.insert(signature, merged.len());
                merged.push(rule);
            }
        }
    }

    Ok(merged)
}

fn union_into(target: &mut Vec<String>, source: Vec<String>) {
    for fact in source {
        if !target.contains(&fact) {
            target.push(fact);
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 2: prioritize
// ---------------------------------------------------------------------------

fn prioritize_rules(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by_key(|rule| std::cmp::Reverse(rule.priority));
    rules
}

// ---------------------------------------------------------------------------
// Pass 3: simplify
// ---------------------------------------------------------------------------

fn simplify_rules(rules: Vec<Rule>) -> Vec<Rule> {
    rules
        .into_iter()
        .map(|mut rule| {
            rule.conditions = simplify_conditions(rule.conditions);
            rule
        })
        .collect()
}

fn simplify_conditions(conditions: Conditions) -> Conditions {
    Conditions {
        all: dedup_list(conditions.all),
        any: dedup_list(conditions.any),
    }
}

fn dedup_list(list: Vec<Condition>) -> Vec<Condition> {
    let mut out: Vec<Condition> = Vec::with_capacity(list.len());
    for cond in list {
        let cond = match cond {
            Condition::Nested(inner) => Condition::Nested(simplify_conditions(inner)),
            leaf => leaf,
        };
        if !out.contains(&cond) {
            out.push(cond);
        }
    }
    out
}
