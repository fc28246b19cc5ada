use super::condition::Conditions;
use super::Value;

/// A validated business rule: the unit of compilation.
///
/// Rules are produced by [`parse_rules`](crate::parse::parse_rules) and never
/// mutated afterwards. `produced_facts`/`consumed_facts` always contain at
/// least the fact names derived from the condition tree and the actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    /// Higher priority compiles (and therefore executes) earlier. Defaults to 0.
    pub priority: i32,
    pub conditions: Conditions,
    pub event: Event,
    pub produced_facts: Vec<String>,
    pub consumed_facts: Vec<String>,
}

/// The event fired when a rule's conditions hold: its actions plus opaque
/// metadata. The metadata is carried on the model only; the binary artifact
/// encodes actions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub event_type: String,
    pub actions: Vec<Action>,
    /// Custom event fields passed through untouched from the document.
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// The operation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Write `value` into the fact store at key `target`.
    UpdateFact,
    /// Deliver `value` (a string payload) to address `target`.
    SendMessage,
}

/// A side effect executed when a rule fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub target: String,
    pub value: Value,
}

impl Action {
    #[must_use]
    pub fn update_fact(target: &str, value: impl Into<Value>) -> Self {
        Self {
            kind: ActionKind::UpdateFact,
            target: target.to_owned(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn send_message(target: &str, payload: &str) -> Self {
        Self {
            kind: ActionKind::SendMessage,
            target: target.to_owned(),
            value: Value::String(payload.to_owned()),
        }
    }
}
