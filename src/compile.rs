//! Translation of optimized rules into executable bytecode.
//!
//! Each rule compiles to a block that evaluates its conditions with
//! short-circuit jumps and falls through into its actions on success. Jump
//! targets are symbolic labels during emission; a final pass resolves them to
//! signed 16-bit offsets relative to the byte after the operand.

use std::collections::HashMap;

use tracing::debug;

use crate::bytecode::{Header, Opcode};
use crate::types::{
    ActionKind, CompareOp, CompilationContext, CompileError, Condition, Conditions, Rule, Value,
    ValueType,
};

/// The result of compiling a rule document: the binary artifact plus the
/// compilation context whose fact table a host hands to a VM.
#[derive(Debug)]
pub struct CompiledUnit {
    pub bytecode: Vec<u8>,
    pub context: CompilationContext,
}

/// Run the whole preprocessor pipeline over a JSON rule document:
/// parse and validate, intern facts, optimize, compile.
///
/// # Errors
///
/// Returns [`RexError`](crate::RexError) on malformed JSON or any
/// validation/compilation failure.
pub fn compile_document(json: &str) -> Result<CompiledUnit, crate::RexError> {
    let rules = crate::parse::parse_rules(json)?;

    let mut context = CompilationContext::new();
    for rule in &rules {
        context.ingest(rule)?;
    }

    let optimized = crate::optimize::optimize(rules)?;
    let bytecode = Compiler::new(&context).compile(&optimized)?;
    Ok(CompiledUnit { bytecode, context })
}

/// A symbolic byte position, resolved after all rules are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Label(u32);

#[derive(Debug)]
struct PendingJump {
    /// Byte position of the 2-byte offset operand within the body.
    operand_pos: usize,
    label: Label,
}

/// Compiles optimized rules into a binary artifact (header + instruction
/// stream). One compiler instance serves one compilation unit and borrows
/// the unit's [`CompilationContext`] for fact index lookups.
#[derive(Debug)]
pub struct Compiler<'a> {
    context: &'a CompilationContext,
    body: Vec<u8>,
    label_offsets: HashMap<Label, usize>,
    pending_jumps: Vec<PendingJump>,
    next_label: u32,
    emit_markers: bool,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(context: &'a CompilationContext) -> Self {
        Self {
            context,
            body: Vec::new(),
            label_offsets: HashMap::new(),
            pending_jumps: Vec::new(),
            next_label: 0,
            emit_markers: false,
        }
    }

    /// Enable framing markers (`RULE_START`/`COND_START`/...) in the output.
    /// Markers are a debugging aid; the VM skips them.
    #[must_use]
    pub fn with_markers(mut self, emit_markers: bool) -> Self {
        self.emit_markers = emit_markers;
        self
    }

    /// Compile the rules into a complete artifact.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] on any failure; no partial bytecode is
    /// returned.
    pub fn compile(mut self, rules: &[Rule]) -> Result<Vec<u8>, CompileError> {
        let num_rules = u16::try_from(rules.len()).map_err(|_| CompileError::TooManyRules)?;

        for rule in rules {
            self.compile_rule(rule)?;
        }
        self.resolve_jumps()?;

        debug!(
            rules = rules.len(),
            body_bytes = self.body.len(),
            "compilation unit emitted"
        );

        let header = Header::for_body(&self.body, num_rules);
        let mut out = Vec::with_capacity(crate::bytecode::HEADER_SIZE + self.body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    // -- per-rule emission ---------------------------------------------------

    fn compile_rule(&mut self, rule: &Rule) -> Result<(), CompileError> {
        if rule.conditions.is_empty() {
            return Err(CompileError::EmptyConditions {
                rule: rule.name.clone(),
            });
        }
        debug!(rule = %rule.name, position = self.body.len(), "compiling rule");

        let rule_start = self.fresh_label();
        let rule_end = self.fresh_label();
        self.bind(rule_start);

        self.marker(Opcode::RuleStart);
        self.marker(Opcode::CondStart);
        self.emit_conditions(&rule.name, &rule.conditions, rule_end)?;
        self.marker(Opcode::CondEnd);

        self.marker(Opcode::ActionStart);
        for action in &rule.event.actions {
            self.emit_action(&rule.name, action)?;
        }
        self.marker(Opcode::ActionEnd);

        self.bind(rule_end);
        self.marker(Opcode::RuleEnd);
        Ok(())
    }

    /// Emit a condition block in conjunctive position: fall through on
    /// success, jump to `fail` on failure.
    fn emit_conditions(
        &mut self,
        rule: &str,
        conditions: &Conditions,
        fail: Label,
    ) -> Result<(), CompileError> {
        for condition in &conditions.all {
            self.emit_in_all(rule, condition, fail)?;
        }
        if !conditions.any.is_empty() {
            let any_end = self.fresh_label();
            for condition in &conditions.any {
                self.emit_in_any(rule, condition, any_end)?;
            }
            // No alternative fired.
            self.emit_jump(Opcode::Jump, fail);
            self.bind(any_end);
        }
        Ok(())
    }

    /// One element of an `all` list: jump to `fail` when false.
    fn emit_in_all(
        &mut self,
        rule: &str,
        condition: &Condition,
        fail: Label,
    ) -> Result<(), CompileError> {
        match condition {
            Condition::Leaf { fact, op, value } => {
                self.emit_leaf(rule, fact, *op, value)?;
                self.emit_jump(Opcode::JumpIfFalse, fail);
                Ok(())
            }
            Condition::Nested(inner) => self.emit_conditions(rule, inner, fail),
        }
    }

    /// One element of an `any` list: jump to `success` when true, fall
    /// through when false so the next alternative runs.
    fn emit_in_any(
        &mut self,
        rule: &str,
        condition: &Condition,
        success: Label,
    ) -> Result<(), CompileError> {
        match condition {
            Condition::Leaf { fact, op, value } => {
                self.emit_leaf(rule, fact, *op, value)?;
                self.emit_jump(Opcode::JumpIfTrue, success);
                Ok(())
            }
            Condition::Nested(inner) => {
                let fail = self.fresh_label();
                self.emit_conditions(rule, inner, fail)?;
                self.emit_jump(Opcode::Jump, success);
                self.bind(fail);
                Ok(())
            }
        }
    }

    /// `LOAD_FACT; LOAD_CONST_*; CMP` for one leaf. The caller appends the
    /// conditional jump.
    fn emit_leaf(
        &mut self,
        rule: &str,
        fact: &str,
        op: CompareOp,
        value: &Value,
    ) -> Result<(), CompileError> {
        let index = self.fact_index(fact)?;
        self.emit(Opcode::LoadFact);
        self.body.extend_from_slice(&index.to_le_bytes());

        self.emit_constant(value)?;

        let cmp = comparison_opcode(op, value.value_type()).ok_or_else(|| {
            CompileError::OperatorTypeMismatch {
                rule: rule.to_owned(),
                operator: op.canonical_name().to_owned(),
                value_type: value.value_type(),
            }
        })?;
        self.emit(cmp);
        Ok(())
    }

    fn emit_action(&mut self, rule: &str, action: &crate::types::Action) -> Result<(), CompileError> {
        match action.kind {
            ActionKind::UpdateFact => {
                self.emit_constant(&action.value)?;
                let index = self.fact_index(&action.target)?;
                self.emit(Opcode::UpdateFact);
                self.body.extend_from_slice(&index.to_le_bytes());
            }
            ActionKind::SendMessage => {
                let Value::String(payload) = &action.value else {
                    return Err(CompileError::ActionValueTypeMismatch {
                        rule: rule.to_owned(),
                        action: "sendMessage",
                        actual: action.value.value_type(),
                    });
                };
                self.emit_constant(&Value::String(payload.clone()))?;
                self.emit(Opcode::SendMessage);
                self.emit_str_operand(&action.target)?;
            }
        }
        Ok(())
    }

    fn emit_constant(&mut self, value: &Value) -> Result<(), CompileError> {
        match value {
            Value::Int(v) => {
                let narrow =
                    i32::try_from(*v).map_err(|_| CompileError::ConstantOutOfRange { value: *v })?;
                self.emit(Opcode::LoadConstInt);
                self.body.extend_from_slice(&narrow.to_le_bytes());
            }
            Value::Float(v) => {
                self.emit(Opcode::LoadConstFloat);
                self.body.extend_from_slice(&v.to_le_bytes());
            }
            Value::String(v) => {
                self.emit(Opcode::LoadConstString);
                self.emit_str_operand(v)?;
            }
            Value::Bool(v) => {
                self.emit(Opcode::LoadConstBool);
                self.body.push(u8::from(*v));
            }
        }
        Ok(())
    }

    fn emit_str_operand(&mut self, text: &str) -> Result<(), CompileError> {
        let len =
            u8::try_from(text.len()).map_err(|_| CompileError::StringTooLong { len: text.len() })?;
        self.body.push(len);
        self.body.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn fact_index(&self, fact: &str) -> Result<u16, CompileError> {
        self.context
            .get(fact)
            .ok_or_else(|| CompileError::UnknownFact {
                name: fact.to_owned(),
            })
    }

    // -- low-level emission --------------------------------------------------

    fn emit(&mut self, opcode: Opcode) {
        self.body.push(opcode as u8);
    }

    fn marker(&mut self, opcode: Opcode) {
        if self.emit_markers {
            self.emit(opcode);
        }
    }

    fn fresh_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn bind(&mut self, label: Label) {
        self.label_offsets.insert(label, self.body.len());
    }

    fn emit_jump(&mut self, opcode: Opcode, label: Label) {
        self.emit(opcode);
        self.pending_jumps.push(PendingJump {
            operand_pos: self.body.len(),
            label,
        });
        self.body.extend_from_slice(&[0, 0]);
    }

    fn resolve_jumps(&mut self) -> Result<(), CompileError> {
        for jump in &self.pending_jumps {
            let target = *self.label_offsets.get(&jump.label).ok_or(
                CompileError::UnresolvedLabel {
                    position: jump.operand_pos,
                },
            )?;
            let relative = target as i64 - (jump.operand_pos as i64 + 2);
            let encoded =
                i16::try_from(relative).map_err(|_| CompileError::JumpOutOfRange {
                    position: jump.operand_pos,
                    offset: relative,
                })?;
            self.body[jump.operand_pos..jump.operand_pos + 2]
                .copy_from_slice(&encoded.to_le_bytes());
        }
        Ok(())
    }
}

/// Pick the comparison instruction for an operator applied to a value type.
/// Mirrors the validation table; `None` for combinations validation rejects.
fn comparison_opcode(op: CompareOp, value_type: ValueType) -> Option<Opcode> {
    match value_type {
        ValueType::Int => match op {
            CompareOp::Eq => Some(Opcode::EqInt),
            CompareOp::Neq => Some(Opcode::NeqInt),
            CompareOp::Lt => Some(Opcode::LtInt),
            CompareOp::Lte => Some(Opcode::LteInt),
            CompareOp::Gt => Some(Opcode::GtInt),
            CompareOp::Gte => Some(Opcode::GteInt),
            _ => None,
        },
        ValueType::Float => match op {
            CompareOp::Eq => Some(Opcode::EqFloat),
            CompareOp::Neq => Some(Opcode::NeqFloat),
            CompareOp::Lt => Some(Opcode::LtFloat),
            CompareOp::Lte => Some(Opcode::LteFloat),
            CompareOp::Gt => Some(Opcode::GtFloat),
            CompareOp::Gte => Some(Opcode::GteFloat),
            _ => None,
        },
        ValueType::String => match op {
            CompareOp::Eq => Some(Opcode::EqString),
            CompareOp::Neq => Some(Opcode::NeqString),
            CompareOp::Contains => Some(Opcode::ContainsString),
            CompareOp::NotContains => Some(Opcode::NotContainsString),
            _ => None,
        },
        ValueType::Bool => match op {
            CompareOp::Eq => Some(Opcode::EqBool),
            CompareOp::Neq => Some(Opcode::NeqBool),
            _ => None,
        },
    }
}
