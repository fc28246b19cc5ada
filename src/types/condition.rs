use std::fmt;

use super::Value;

/// Comparison operators supported in rule conditions, in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    NotContains,
}

impl CompareOp {
    /// Parse a document operator, accepting both canonical names
    /// (`"equal"`, `"lessThan"`, ...) and symbol aliases (`"="`, `"<"`, ...).
    #[must_use]
    pub fn parse(operator: &str) -> Option<Self> {
        match operator {
            "equal" | "=" => Some(CompareOp::Eq),
            "notEqual" | "!=" => Some(CompareOp::Neq),
            "lessThan" | "<" => Some(CompareOp::Lt),
            "lessThanOrEqual" | "<=" => Some(CompareOp::Lte),
            "greaterThan" | ">" => Some(CompareOp::Gt),
            "greaterThanOrEqual" | ">=" => Some(CompareOp::Gte),
            "contains" => Some(CompareOp::Contains),
            "notContains" => Some(CompareOp::NotContains),
            _ => None,
        }
    }

    /// The canonical document name of this operator.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            CompareOp::Eq => "equal",
            CompareOp::Neq => "notEqual",
            CompareOp::Lt => "lessThan",
            CompareOp::Lte => "lessThanOrEqual",
            CompareOp::Gt => "greaterThan",
            CompareOp::Gte => "greaterThanOrEqual",
            CompareOp::Contains => "contains",
            CompareOp::NotContains => "notContains",
        }
    }

    /// The operator that directly contradicts this one when applied to the
    /// same fact and value, if any (`Lt` vs `Gte`, `Eq` vs `Neq`, ...).
    #[must_use]
    pub fn contradiction(self) -> Option<Self> {
        match self {
            CompareOp::Eq => Some(CompareOp::Neq),
            CompareOp::Neq => Some(CompareOp::Eq),
            CompareOp::Lt => Some(CompareOp::Gte),
            CompareOp::Gte => Some(CompareOp::Lt),
            CompareOp::Lte => Some(CompareOp::Gt),
            CompareOp::Gt => Some(CompareOp::Lte),
            CompareOp::Contains => Some(CompareOp::NotContains),
            CompareOp::NotContains => Some(CompareOp::Contains),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Contains => write!(f, "contains"),
            CompareOp::NotContains => write!(f, "notContains"),
        }
    }
}

/// A boolean condition tree node.
///
/// A leaf compares one fact against one constant; a nested node groups
/// sub-conditions under `all`/`any` semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf {
        fact: String,
        op: CompareOp,
        value: Value,
    },
    Nested(Conditions),
}

impl Condition {
    /// Build a leaf condition.
    #[must_use]
    pub fn leaf(fact: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Leaf {
            fact: fact.to_owned(),
            op,
            value: value.into(),
        }
    }

    /// Build a pure-nesting condition.
    #[must_use]
    pub fn nested(all: Vec<Condition>, any: Vec<Condition>) -> Self {
        Condition::Nested(Conditions { all, any })
    }
}

/// The root of a condition tree: conjunction (`all`) and disjunction (`any`)
/// lists, combined with AND when both are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conditions {
    pub all: Vec<Condition>,
    pub any: Vec<Condition>,
}

impl Conditions {
    /// Whether both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Collect every fact name referenced by the tree, in tree order
    /// (the `all` list before the `any` list at each level), with duplicates.
    #[must_use]
    pub fn referenced_facts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_facts(&mut out);
        out
    }

    fn collect_facts<'a>(&'a self, out: &mut Vec<&'a str>) {
        for cond in self.all.iter().chain(&self.any) {
            match cond {
                Condition::Leaf { fact, .. } => out.push(fact.as_str()),
                Condition::Nested(inner) => inner.collect_facts(out),
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Leaf { fact, op, value } => write!(f, "({fact} {op} {value})"),
            Condition::Nested(inner) => write!(f, "{inner}"),
        }
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.all.is_empty() {
            let items: Vec<String> = self.all.iter().map(ToString::to_string).collect();
            parts.push(format!("all[{}]", items.join(" ")));
        }
        if !self.any.is_empty() {
            let items: Vec<String> = self.any.iter().map(ToString::to_string).collect();
            parts.push(format!("any[{}]", items.join(" ")));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonical_operators() {
        assert_eq!(CompareOp::parse("equal"), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("notEqual"), Some(CompareOp::Neq));
        assert_eq!(CompareOp::parse("lessThan"), Some(CompareOp::Lt));
        assert_eq!(CompareOp::parse("lessThanOrEqual"), Some(CompareOp::Lte));
        assert_eq!(CompareOp::parse("greaterThan"), Some(CompareOp::Gt));
        assert_eq!(CompareOp::parse("greaterThanOrEqual"), Some(CompareOp::Gte));
        assert_eq!(CompareOp::parse("contains"), Some(CompareOp::Contains));
        assert_eq!(CompareOp::parse("notContains"), Some(CompareOp::NotContains));
    }

    #[test]
    fn parse_symbol_aliases() {
        assert_eq!(CompareOp::parse("="), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("!="), Some(CompareOp::Neq));
        assert_eq!(CompareOp::parse("<"), Some(CompareOp::Lt));
        assert_eq!(CompareOp::parse("<="), Some(CompareOp::Lte));
        assert_eq!(CompareOp::parse(">"), Some(CompareOp::Gt));
        assert_eq!(CompareOp::parse(">="), Some(CompareOp::Gte));
    }

    #[test]
    fn parse_unknown_operator() {
        assert_eq!(CompareOp::parse("matches"), None);
        assert_eq!(CompareOp::parse(""), None);
    }

    #[test]
    fn contradiction_pairs() {
        assert_eq!(CompareOp::Lt.contradiction(), Some(CompareOp::Gte));
        assert_eq!(CompareOp::Gte.contradiction(), Some(CompareOp::Lt));
        assert_eq!(CompareOp::Eq.contradiction(), Some(CompareOp::Neq));
    }

    #[test]
    fn referenced_facts_tree_order() {
        let conds = Conditions {
            all: vec![
                Condition::leaf("temperature", CompareOp::Gt, 25_i64),
                Condition::nested(
                    vec![],
                    vec![
                        Condition::leaf("humidity", CompareOp::Lt, 40_i64),
                        Condition::leaf("room_occupied", CompareOp::Eq, true),
                    ],
                ),
            ],
            any: vec![Condition::leaf("override", CompareOp::Eq, true)],
        };
        assert_eq!(
            conds.referenced_facts(),
            vec!["temperature", "humidity", "room_occupied", "override"]
        );
    }

    #[test]
    fn is_empty() {
        assert!(Conditions::default().is_empty());
        let conds = Conditions {
            all: vec![Condition::leaf("x", CompareOp::Eq, 1_i64)],
            any: vec![],
        };
        assert!(!conds.is_empty());
    }
}
