use std::collections::{HashMap, HashSet};

use super::error::CompileError;
use super::rule::{ActionKind, Rule};

/// Per-compilation-unit fact interning table.
///
/// Maps fact names to small `u16` indices, assigned first-come-first-served
/// and never reordered or reassigned. The context lives for one compilation
/// unit so every rule's `LOAD_FACT`/`UPDATE_FACT` operands agree on indices.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    fact_index: HashMap<String, u16>,
    names: Vec<String>,
    consumed: HashSet<String>,
    produced: HashSet<String>,
}

impl CompilationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a fact name, returning its index. Already-known names return
    /// their existing index.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::TooManyFacts`] once `u16::MAX + 1` distinct
    /// names have been interned.
    pub fn intern(&mut self, name: &str) -> Result<u16, CompileError> {
        if let Some(&idx) = self.fact_index.get(name) {
            return Ok(idx);
        }
        let idx = u16::try_from(self.names.len()).map_err(|_| CompileError::TooManyFacts)?;
        self.fact_index.insert(name.to_owned(), idx);
        self.names.push(name.to_owned());
        Ok(idx)
    }

    /// Look up the index for a fact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u16> {
        self.fact_index.get(name).copied()
    }

    /// Look up the name for a fact index.
    #[must_use]
    pub fn name(&self, index: u16) -> Option<&str> {
        self.names.get(usize::from(index)).map(String::as_str)
    }

    /// The number of interned facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no facts have been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All interned fact names in index order. Hand this table to a
    /// [`Vm`](crate::vm::Vm) so it can resolve operand indices back to names.
    #[must_use]
    pub fn fact_names(&self) -> Vec<String> {
        self.names.clone()
    }

    /// Whether any ingested rule consumes the named fact.
    #[must_use]
    pub fn is_consumed(&self, name: &str) -> bool {
        self.consumed.contains(name)
    }

    /// Whether any ingested rule produces the named fact.
    #[must_use]
    pub fn is_produced(&self, name: &str) -> bool {
        self.produced.contains(name)
    }

    /// Intern every fact a rule touches: consumed facts (condition tree
    /// order, then the rule's explicit list) followed by produced facts
    /// (action order, then the explicit list). Insertion order is fully
    /// determined by the rule, keeping emitted indices deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::IncompleteFactSet`] when an explicit
    /// `consumedFacts`/`producedFacts` list omits a derived fact, or
    /// [`CompileError::TooManyFacts`] on index exhaustion.
    pub fn ingest(&mut self, rule: &Rule) -> Result<(), CompileError> {
        let derived_consumed = rule.conditions.referenced_facts();
        check_superset(&rule.name, &rule.consumed_facts, &derived_consumed)?;
        for fact in derived_consumed
            .iter()
            .copied()
            .chain(rule.consumed_facts.iter().map(String::as_str))
        {
            self.intern(fact)?;
            self.consumed.insert(fact.to_owned());
        }

        let derived_produced: Vec<&str> = rule
            .event
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::UpdateFact)
            .map(|a| a.target.as_str())
            .collect();
        check_superset(&rule.name, &rule.produced_facts, &derived_produced)?;
        for fact in derived_produced
            .iter()
            .copied()
            .chain(rule.produced_facts.iter().map(String::as_str))
        {
            self.intern(fact)?;
            self.produced.insert(fact.to_owned());
        }

        Ok(())
    }
}

fn check_superset(rule: &str, explicit: &[String], derived: &[&str]) -> Result<(), CompileError> {
    if explicit.is_empty() {
        return Ok(());
    }
    for fact in derived {
        if !explicit.iter().any(|f| f == fact) {
            return Err(CompileError::IncompleteFactSet {
                rule: rule.to_owned(),
                fact: (*fact).to_owned(),
            });
        }
    }
    Ok(())
}
