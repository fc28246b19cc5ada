//! JSON rule-document parsing and validation.
//!
//! The document structures here mirror the external JSON schema; validation
//! lowers them into the typed model in [`crate::types`]. Every check rejects
//! the whole document: a compilation unit with one bad rule produces no
//! bytecode.

use serde::Deserialize;

use crate::error::RexError;
use crate::types::{
    Action, ActionKind, CompareOp, CompileError, Condition, Conditions, Event, Rule, Value,
    ValueType,
};

// ---------------------------------------------------------------------------
// Document structures (wire format)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RuleDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    conditions: ConditionsDoc,
    #[serde(default)]
    event: EventDoc,
    #[serde(default, rename = "producedFacts")]
    produced_facts: Vec<String>,
    #[serde(default, rename = "consumedFacts")]
    consumed_facts: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ConditionsDoc {
    #[serde(default)]
    all: Vec<ConditionDoc>,
    #[serde(default)]
    any: Vec<ConditionDoc>,
}

#[derive(Debug, Deserialize)]
struct ConditionDoc {
    #[serde(default)]
    fact: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default, rename = "valueType")]
    value_type: Option<String>,
    #[serde(default)]
    all: Vec<ConditionDoc>,
    #[serde(default)]
    any: Vec<ConditionDoc>,
}

#[derive(Debug, Deserialize, Default)]
struct EventDoc {
    #[serde(default, rename = "eventType")]
    event_type: String,
    #[serde(default)]
    actions: Vec<ActionDoc>,
    #[serde(flatten)]
    custom: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ActionDoc {
    #[serde(rename = "type")]
    kind: String,
    target: String,
    value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse and validate a JSON array of rule objects.
///
/// # Errors
///
/// Returns [`RexError::Json`] for malformed JSON and [`RexError::Compile`]
/// for any validation failure.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, RexError> {
    let docs: Vec<RuleDoc> = serde_json::from_str(json)?;
    let mut rules = Vec::with_capacity(docs.len());
    for doc in docs {
        rules.push(validate_rule(doc)?);
    }
    Ok(rules)
}

// ---------------------------------------------------------------------------
// Rule validation
// ---------------------------------------------------------------------------

fn validate_rule(doc: RuleDoc) -> Result<Rule, CompileError> {
    if doc.name.is_empty() {
        return Err(CompileError::EmptyRule);
    }
    if doc.conditions.all.is_empty() && doc.conditions.any.is_empty() {
        return Err(CompileError::EmptyConditions { rule: doc.name });
    }

    let conditions = validate_conditions(&doc.name, doc.conditions)?;

    let mut actions = Vec::with_capacity(doc.event.actions.len());
    for action in doc.event.actions {
        actions.push(validate_action(&doc.name, action)?);
    }

    Ok(Rule {
        priority: doc.priority,
        conditions,
        event: Event {
            event_type: doc.event.event_type,
            actions,
            custom: doc.event.custom,
        },
        produced_facts: doc.produced_facts,
        consumed_facts: doc.consumed_facts,
        name: doc.name,
    })
}

fn validate_conditions(rule: &str, doc: ConditionsDoc) -> Result<Conditions, CompileError> {
    let all = validate_list(rule, doc.all)?;
    let any = validate_list(rule, doc.any)?;

    check_redundant(rule, &all, "all")?;
    check_redundant(rule, &any, "any")?;
    check_contradictory(rule, &all, "all")?;
    check_contradictory(rule, &any, "any")?;
    check_ambiguous(rule, &any)?;

    Ok(Conditions { all, any })
}

fn validate_list(rule: &str, docs: Vec<ConditionDoc>) -> Result<Vec<Condition>, CompileError> {
    docs.into_iter()
        .map(|doc| validate_condition(rule, doc))
        .collect()
}

fn validate_condition(rule: &str, doc: ConditionDoc) -> Result<Condition, CompileError> {
    if doc.fact.is_empty() {
        if doc.all.is_empty() && doc.any.is_empty() {
            return Err(CompileError::MissingFact {
                rule: rule.to_owned(),
            });
        }
        let nested = validate_conditions(
            rule,
            ConditionsDoc {
                all: doc.all,
                any: doc.any,
            },
        )?;
        return Ok(Condition::Nested(nested));
    }

    // A non-empty fact makes this a leaf; any nested lists are ignored.
    let op = CompareOp::parse(&doc.operator).ok_or_else(|| CompileError::UnknownOperator {
        rule: rule.to_owned(),
        operator: doc.operator.clone(),
    })?;

    let declared = parse_declared_type(rule, doc.value_type.as_deref())?;
    let value = typed_value(rule, &doc.value, declared)?;

    if !operator_valid_for_type(op, value.value_type()) {
        return Err(CompileError::OperatorTypeMismatch {
            rule: rule.to_owned(),
            operator: op.canonical_name().to_owned(),
            value_type: value.value_type(),
        });
    }

    Ok(Condition::Leaf {
        fact: doc.fact,
        op,
        value,
    })
}

// ---------------------------------------------------------------------------
// Value typing
// ---------------------------------------------------------------------------

fn parse_declared_type(
    rule: &str,
    name: Option<&str>,
) -> Result<Option<ValueType>, CompileError> {
    match name {
        None => Ok(None),
        Some(name) => {
            ValueType::parse(name)
                .map(Some)
                .ok_or_else(|| CompileError::UnknownValueType {
                    rule: rule.to_owned(),
                    found: name.to_owned(),
                })
        }
    }
}

/// Convert a JSON scalar into a typed [`Value`], applying the int-narrowing
/// rule: a number that is structurally a float but has no fractional part
/// becomes an `Int` when the declared type is `int` or absent.
fn typed_value(
    rule: &str,
    raw: &serde_json::Value,
    declared: Option<ValueType>,
) -> Result<Value, CompileError> {
    let value = match raw {
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match declared {
                    Some(ValueType::Float) => Value::Float(i as f64),
                    _ => Value::Int(i),
                }
            } else {
                let f = n.as_f64().ok_or_else(|| CompileError::UnknownValueType {
                    rule: rule.to_owned(),
                    found: "number".to_owned(),
                })?;
                let narrow = matches!(declared, None | Some(ValueType::Int));
                if narrow && is_exact_int(f) {
                    #[allow(clippy::cast_possible_truncation)] // checked by is_exact_int
                    Value::Int(f as i64)
                } else {
                    Value::Float(f)
                }
            }
        }
        other => {
            return Err(CompileError::UnknownValueType {
                rule: rule.to_owned(),
                found: json_type_name(other).to_owned(),
            });
        }
    };

    if let Some(declared) = declared
        && value.value_type() != declared
    {
        return Err(CompileError::ValueTypeMismatch {
            rule: rule.to_owned(),
            declared,
            actual: value.value_type(),
        });
    }
    Ok(value)
}

fn is_exact_int(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn operator_valid_for_type(op: CompareOp, value_type: ValueType) -> bool {
    use CompareOp::{Contains, Eq, Gt, Gte, Lt, Lte, Neq, NotContains};
    match value_type {
        ValueType::Int | ValueType::Float => matches!(op, Eq | Neq | Lt | Lte | Gt | Gte),
        ValueType::String => matches!(op, Eq | Neq | Contains | NotContains),
        ValueType::Bool => matches!(op, Eq | Neq),
    }
}

// ---------------------------------------------------------------------------
// Redundancy / contradiction / ambiguity
// ---------------------------------------------------------------------------

fn leaves(list: &[Condition]) -> impl Iterator<Item = (&str, CompareOp, &Value)> {
    list.iter().filter_map(|cond| match cond {
        Condition::Leaf { fact, op, value } => Some((fact.as_str(), *op, value)),
        Condition::Nested(_) => None,
    })
}

fn check_redundant(
    rule: &str,
    list: &[Condition],
    block: &'static str,
) -> Result<(), CompileError> {
    let items: Vec<_> = leaves(list).collect();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.0 == b.0 && a.1 == b.1 && a.2 == b.2 {
                return Err(CompileError::RedundantConditions {
                    rule: rule.to_owned(),
                    block,
                });
            }
        }
    }
    Ok(())
}

fn check_contradictory(
    rule: &str,
    list: &[Condition],
    block: &'static str,
) -> Result<(), CompileError> {
    let items: Vec<_> = leaves(list).collect();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.0 == b.0 && Some(b.1) == a.1.contradiction() && a.2 == b.2 {
                return Err(CompileError::ContradictoryConditions {
                    rule: rule.to_owned(),
                    block,
                });
            }
        }
    }
    Ok(())
}

fn check_ambiguous(rule: &str, any: &[Condition]) -> Result<(), CompileError> {
    let items: Vec<_> = leaves(any).collect();
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.0 == b.0
                && a.1 == b.1
                && a.2.value_type() == b.2.value_type()
                && a.2 != b.2
            {
                return Err(CompileError::AmbiguousConditions {
                    rule: rule.to_owned(),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Action validation
// ---------------------------------------------------------------------------

fn validate_action(rule: &str, doc: ActionDoc) -> Result<Action, CompileError> {
    let kind = match doc.kind.as_str() {
        "updateFact" => ActionKind::UpdateFact,
        "sendMessage" => ActionKind::SendMessage,
        other => {
            return Err(CompileError::UnknownAction {
                rule: rule.to_owned(),
                action: other.to_owned(),
            });
        }
    };

    let value = typed_value(rule, &doc.value, None)?;
    if kind == ActionKind::SendMessage && value.value_type() != ValueType::String {
        return Err(CompileError::ActionValueTypeMismatch {
            rule: rule.to_owned(),
            action: "sendMessage",
            actual: value.value_type(),
        });
    }

    Ok(Action {
        kind,
        target: doc.target,
        value,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
