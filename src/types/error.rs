use thiserror::Error;

use super::value::ValueType;

/// Errors produced while validating, optimizing, or compiling rules.
///
/// A single failing rule rejects the whole compilation unit; no partial
/// bytecode is ever returned.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A rule was defined without a name.
    #[error("rule has no name")]
    EmptyRule,

    /// A rule's root conditions contained neither an `all` nor an `any` list.
    #[error("rule '{rule}' must have at least one condition")]
    EmptyConditions {
        /// The rule with no conditions.
        rule: String,
    },

    /// A condition used an operator outside the supported set.
    #[error("unknown operator '{operator}' in rule '{rule}'")]
    UnknownOperator { rule: String, operator: String },

    /// A condition's operator is not valid for its value type.
    #[error("operator '{operator}' is not supported for type '{value_type}' in rule '{rule}'")]
    OperatorTypeMismatch {
        rule: String,
        operator: String,
        value_type: ValueType,
    },

    /// A condition's declared `valueType` does not match its value.
    #[error("declared type '{declared}' does not match value of type '{actual}' in rule '{rule}'")]
    ValueTypeMismatch {
        rule: String,
        declared: ValueType,
        actual: ValueType,
    },

    /// A `valueType` named an unsupported type, or a value was not a scalar.
    #[error("unsupported value type '{found}' in rule '{rule}'")]
    UnknownValueType { rule: String, found: String },

    /// A leaf condition had an empty `fact` and no nested lists.
    #[error("missing 'fact' in condition of rule '{rule}'")]
    MissingFact {
        /// The rule containing the fact-less condition.
        rule: String,
    },

    /// An action used a type other than `updateFact` or `sendMessage`.
    #[error("unsupported action type '{action}' in rule '{rule}'")]
    UnknownAction { rule: String, action: String },

    /// A condition or action referenced a fact the compilation context has
    /// never seen.
    #[error("fact '{name}' not defined in the compilation context")]
    UnknownFact {
        /// The unresolved fact name.
        name: String,
    },

    /// Two identical leaves appeared in one list at one nesting level.
    #[error("redundant conditions found in '{block}' block of rule '{rule}'")]
    RedundantConditions { rule: String, block: &'static str },

    /// Two leaves on the same fact directly contradict each other.
    #[error("contradictory conditions found in '{block}' block of rule '{rule}'")]
    ContradictoryConditions { rule: String, block: &'static str },

    /// Two `any` leaves share fact, operator, and type but disagree on value.
    #[error("ambiguous conditions found in 'any' block of rule '{rule}'")]
    AmbiguousConditions { rule: String },

    /// An explicit `consumedFacts`/`producedFacts` list omitted a fact the
    /// rule derives.
    #[error("rule '{rule}' declares a fact list that omits '{fact}'")]
    IncompleteFactSet { rule: String, fact: String },

    /// A string constant exceeded the 255-byte encoding limit.
    #[error("string constant of {len} bytes exceeds the 255-byte limit")]
    StringTooLong { len: usize },

    /// An integer constant does not fit the 32-bit encoding.
    #[error("integer constant {value} does not fit a 32-bit operand")]
    ConstantOutOfRange { value: i64 },

    /// More distinct facts than `u16` indices.
    #[error("compilation unit references more than 65536 distinct facts")]
    TooManyFacts,

    /// More rules than the header's `u16` rule counter.
    #[error("compilation unit contains more than 65535 rules")]
    TooManyRules,

    /// A jump was emitted against a label that was never bound. Indicates a
    /// compiler bug, not bad input.
    #[error("internal: jump at position {position} references an unbound label")]
    UnresolvedLabel { position: usize },

    /// A resolved jump offset does not fit a signed 16-bit operand.
    #[error("jump of {offset} bytes at position {position} exceeds the 16-bit range")]
    JumpOutOfRange { position: usize, offset: i64 },

    /// A `sendMessage` action carried a non-string value.
    #[error("action value of type '{actual}' is not valid for '{action}' in rule '{rule}'")]
    ActionValueTypeMismatch {
        rule: String,
        action: &'static str,
        actual: ValueType,
    },

    /// The optimizer could not serialize a condition tree for signing.
    #[error("failed to compute canonical condition signature: {0}")]
    SignatureUnavailable(#[from] serde_json::Error),
}
