//! The bytecode virtual machine.
//!
//! A [`Vm`] owns a value stack and a fact store and interprets one verified
//! bytecode artifact. Boolean semantics (`all`/`any` short-circuiting) exist
//! only in the compiler's jump layout; the VM executes jumps literally.
//!
//! Instances are independent: bytecode is shared read-only (`Arc`), so many
//! VMs can run the same artifact on different threads, each with its own
//! stack and facts. A VM must not be shared across threads without external
//! locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::bytecode::{FormatError, HEADER_SIZE, Header, Opcode};
use crate::types::{Value, ValueType};

/// External dispatcher for `SEND_MESSAGE`. Invoked synchronously from the
/// interpreter; implementations must not re-enter the running VM.
pub trait MessageSink {
    fn send(&mut self, target: &str, payload: &str);
}

/// A sink that drops every message.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl MessageSink for DiscardSink {
    fn send(&mut self, _target: &str, _payload: &str) {}
}

/// Errors that halt bytecode execution. Every variant carries the byte
/// position of the failing instruction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack underflow at ip {ip}")]
    StackUnderflow { ip: usize },

    #[error("type mismatch at ip {ip}: {opcode} expected {expected}, found {found}")]
    TypeMismatch {
        opcode: Opcode,
        expected: ValueType,
        found: ValueType,
        ip: usize,
    },

    #[error("undefined fact '{name}' at ip {ip}")]
    UnknownFact { name: String, ip: usize },

    #[error("unknown opcode {opcode:#04x} at ip {ip}")]
    UnknownOpcode { opcode: u8, ip: usize },

    #[error("operand truncated or jump target out of bounds at ip {ip}")]
    OperandTruncated { ip: usize },

    #[error("invalid bytecode header: {0}")]
    HeaderInvalid(#[from] FormatError),

    #[error("execution cancelled at ip {ip}")]
    Cancelled { ip: usize },

    #[error("ERROR instruction executed at ip {ip}")]
    Aborted { ip: usize },
}

/// The virtual machine.
#[derive(Debug)]
pub struct Vm {
    bytecode: Arc<[u8]>,
    ip: usize,
    stack: Vec<Value>,
    facts: HashMap<String, Value>,
    fact_names: Vec<String>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Vm {
    /// Create a VM over a verified artifact.
    ///
    /// `fact_names` is the compilation unit's fact table in index order
    /// (see [`CompilationContext::fact_names`](crate::types::CompilationContext::fact_names));
    /// it resolves `LOAD_FACT`/`UPDATE_FACT` operands back to names. A VM
    /// built without the table reports every fact access as unknown, which
    /// matches a runtime host that has preloaded nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::HeaderInvalid`] when the header is truncated,
    /// carries an unsupported version, or fails the checksum.
    pub fn new(bytecode: Arc<[u8]>, fact_names: Vec<String>) -> Result<Self, RuntimeError> {
        Header::parse(&bytecode)?;
        Ok(Self {
            bytecode,
            ip: HEADER_SIZE,
            stack: Vec::new(),
            facts: HashMap::new(),
            fact_names,
            cancel: None,
        })
    }

    /// Install a cooperative cancellation flag, checked at the top of the
    /// dispatch loop.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Preload or overwrite a fact.
    pub fn set_fact(&mut self, name: &str, value: impl Into<Value>) {
        self.facts.insert(name.to_owned(), value.into());
    }

    /// Read a fact from the store.
    #[must_use]
    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    /// The full fact store.
    #[must_use]
    pub fn facts(&self) -> &HashMap<String, Value> {
        &self.facts
    }

    /// Execute the artifact from the top. `HALT` or running off the end of
    /// the body terminates successfully; every error carries the failing
    /// instruction's position.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] and leaves the fact store in the state it
    /// reached before the failure.
    pub fn run(&mut self, sink: &mut dyn MessageSink) -> Result<(), RuntimeError> {
        self.ip = HEADER_SIZE;
        self.stack.clear();

        while self.ip < self.bytecode.len() {
            let at = self.ip;

            if let Some(flag) = &self.cancel
                && flag.load(Ordering::Relaxed)
            {
                return Err(RuntimeError::Cancelled { ip: at });
            }

            let byte = self.bytecode[self.ip];
            self.ip += 1;
            let opcode = match Opcode::from_byte(byte) {
                Some(Opcode::Label) | None => {
                    return Err(RuntimeError::UnknownOpcode { opcode: byte, ip: at });
                }
                Some(opcode) => opcode,
            };

            match opcode {
                Opcode::EqInt
                | Opcode::NeqInt
                | Opcode::LtInt
                | Opcode::LteInt
                | Opcode::GtInt
                | Opcode::GteInt => self.int_comparison(opcode, at)?,

                Opcode::EqFloat
                | Opcode::NeqFloat
                | Opcode::LtFloat
                | Opcode::LteFloat
                | Opcode::GtFloat
                | Opcode::GteFloat => self.float_comparison(opcode, at)?,

                Opcode::EqString
                | Opcode::NeqString
                | Opcode::ContainsString
                | Opcode::NotContainsString => self.string_comparison(opcode, at)?,

                Opcode::EqBool | Opcode::NeqBool => self.bool_comparison(opcode, at)?,

                Opcode::And => {
                    let b = self.pop_bool(opcode, at)?;
                    let a = self.pop_bool(opcode, at)?;
                    self.stack.push(Value::Bool(a && b));
                }
                Opcode::Or => {
                    let b = self.pop_bool(opcode, at)?;
                    let a = self.pop_bool(opcode, at)?;
                    self.stack.push(Value::Bool(a || b));
                }
                Opcode::Not => {
                    let a = self.pop_bool(opcode, at)?;
                    self.stack.push(Value::Bool(!a));
                }

                Opcode::LoadFact => {
                    let index = self.fetch_u16(at)?;
                    let name = self.fact_name(index, at)?;
                    let Some(value) = self.facts.get(&name).cloned() else {
                        return Err(RuntimeError::UnknownFact { name, ip: at });
                    };
                    self.stack.push(value);
                }
                Opcode::LoadConstInt => {
                    let value = self.fetch_i32(at)?;
                    self.stack.push(Value::Int(i64::from(value)));
                }
                Opcode::LoadConstFloat => {
                    let value = self.fetch_f64(at)?;
                    self.stack.push(Value::Float(value));
                }
                Opcode::LoadConstString => {
                    let value = self.fetch_str(at)?;
                    self.stack.push(Value::String(value));
                }
                Opcode::LoadConstBool => {
                    let value = self.fetch_u8(at)?;
                    self.stack.push(Value::Bool(value != 0));
                }

                Opcode::Jump => {
                    let offset = self.fetch_i16(at)?;
                    self.branch(offset, at)?;
                }
                Opcode::JumpIfTrue => {
                    let offset = self.fetch_i16(at)?;
                    if self.pop_bool(opcode, at)? {
                        self.branch(offset, at)?;
                    }
                }
                Opcode::JumpIfFalse => {
                    let offset = self.fetch_i16(at)?;
                    if !self.pop_bool(opcode, at)? {
                        self.branch(offset, at)?;
                    }
                }

                Opcode::UpdateFact => {
                    let index = self.fetch_u16(at)?;
                    let name = self.fact_name(index, at)?;
                    let value = self.pop(at)?;
                    debug!(fact = %name, %value, "updateFact");
                    self.facts.insert(name, value);
                }
                Opcode::SendMessage => {
                    let target = self.fetch_str(at)?;
                    let payload = self.pop_string(opcode, at)?;
                    debug!(to = %target, "sendMessage");
                    sink.send(&target, &payload);
                }

                Opcode::Nop => {}
                Opcode::Halt => return Ok(()),
                Opcode::Error => return Err(RuntimeError::Aborted { ip: at }),

                Opcode::RuleStart
                | Opcode::RuleEnd
                | Opcode::CondStart
                | Opcode::CondEnd
                | Opcode::ActionStart
                | Opcode::ActionEnd => {}

                // Rejected above; kept for exhaustiveness.
                Opcode::Label => unreachable!("LABEL rejected before dispatch"),
            }
        }

        Ok(())
    }

    // -- dispatch helpers ----------------------------------------------------

    fn int_comparison(&mut self, opcode: Opcode, at: usize) -> Result<(), RuntimeError> {
        let b = self.pop_int(opcode, at)?;
        let a = self.pop_int(opcode, at)?;
        let result = match opcode {
            Opcode::EqInt => a == b,
            Opcode::NeqInt => a != b,
            Opcode::LtInt => a < b,
            Opcode::LteInt => a <= b,
            Opcode::GtInt => a > b,
            _ => a >= b,
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }

    fn float_comparison(&mut self, opcode: Opcode, at: usize) -> Result<(), RuntimeError> {
        let b = self.pop_float(opcode, at)?;
        let a = self.pop_float(opcode, at)?;
        let result = match opcode {
            Opcode::EqFloat => a == b,
            Opcode::NeqFloat => a != b,
            Opcode::LtFloat => a < b,
            Opcode::LteFloat => a <= b,
            Opcode::GtFloat => a > b,
            _ => a >= b,
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }

    fn string_comparison(&mut self, opcode: Opcode, at: usize) -> Result<(), RuntimeError> {
        let b = self.pop_string(opcode, at)?;
        let a = self.pop_string(opcode, at)?;
        let result = match opcode {
            Opcode::EqString => a == b,
            Opcode::NeqString => a != b,
            Opcode::ContainsString => a.contains(&b),
            _ => !a.contains(&b),
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }

    fn bool_comparison(&mut self, opcode: Opcode, at: usize) -> Result<(), RuntimeError> {
        let b = self.pop_bool(opcode, at)?;
        let a = self.pop_bool(opcode, at)?;
        let result = match opcode {
            Opcode::EqBool => a == b,
            _ => a != b,
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }

    fn branch(&mut self, offset: i16, at: usize) -> Result<(), RuntimeError> {
        let target = self.ip as i64 + i64::from(offset);
        if target < HEADER_SIZE as i64 || target > self.bytecode.len() as i64 {
            return Err(RuntimeError::OperandTruncated { ip: at });
        }
        #[allow(clippy::cast_sign_loss)] // bounds checked above
        let target = target as usize;
        self.ip = target;
        Ok(())
    }

    fn fact_name(&self, index: u16, at: usize) -> Result<String, RuntimeError> {
        self.fact_names
            .get(usize::from(index))
            .cloned()
            .ok_or(RuntimeError::UnknownFact {
                name: format!("#{index}"),
                ip: at,
            })
    }

    // -- stack ---------------------------------------------------------------

    fn pop(&mut self, at: usize) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow { ip: at })
    }

    fn pop_int(&mut self, opcode: Opcode, at: usize) -> Result<i64, RuntimeError> {
        match self.pop(at)? {
            Value::Int(v) => Ok(v),
            other => Err(self.mismatch(opcode, ValueType::Int, &other, at)),
        }
    }

    fn pop_float(&mut self, opcode: Opcode, at: usize) -> Result<f64, RuntimeError> {
        match self.pop(at)? {
            Value::Float(v) => Ok(v),
            other => Err(self.mismatch(opcode, ValueType::Float, &other, at)),
        }
    }

    fn pop_string(&mut self, opcode: Opcode, at: usize) -> Result<String, RuntimeError> {
        match self.pop(at)? {
            Value::String(v) => Ok(v),
            other => Err(self.mismatch(opcode, ValueType::String, &other, at)),
        }
    }

    fn pop_bool(&mut self, opcode: Opcode, at: usize) -> Result<bool, RuntimeError> {
        match self.pop(at)? {
            Value::Bool(v) => Ok(v),
            other => Err(self.mismatch(opcode, ValueType::Bool, &other, at)),
        }
    }

    #[allow(clippy::unused_self)]
    fn mismatch(
        &self,
        opcode: Opcode,
        expected: ValueType,
        found: &Value,
        at: usize,
    ) -> RuntimeError {
        RuntimeError::TypeMismatch {
            opcode,
            expected,
            found: found.value_type(),
            ip: at,
        }
    }

    // -- operand fetching ----------------------------------------------------

    fn fetch_u8(&mut self, at: usize) -> Result<u8, RuntimeError> {
        let slice = self.fetch(1, at)?;
        Ok(slice[0])
    }

    fn fetch_u16(&mut self, at: usize) -> Result<u16, RuntimeError> {
        let slice = self.fetch(2, at)?;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }

    fn fetch_i16(&mut self, at: usize) -> Result<i16, RuntimeError> {
        let slice = self.fetch(2, at)?;
        Ok(i16::from_le_bytes([slice[0], slice[1]]))
    }

    fn fetch_i32(&mut self, at: usize) -> Result<i32, RuntimeError> {
        let slice = self.fetch(4, at)?;
        Ok(i32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn fetch_f64(&mut self, at: usize) -> Result<f64, RuntimeError> {
        let slice = self.fetch(8, at)?;
        let mut bits = [0u8; 8];
        bits.copy_from_slice(slice);
        Ok(f64::from_le_bytes(bits))
    }

    fn fetch_str(&mut self, at: usize) -> Result<String, RuntimeError> {
        let len = usize::from(self.fetch_u8(at)?);
        let slice = self.fetch(len, at)?;
        String::from_utf8(slice.to_vec()).map_err(|_| RuntimeError::OperandTruncated { ip: at })
    }

    fn fetch(&mut self, n: usize, at: usize) -> Result<&[u8], RuntimeError> {
        if self.ip + n > self.bytecode.len() {
            return Err(RuntimeError::OperandTruncated { ip: at });
        }
        let slice = &self.bytecode[self.ip..self.ip + n];
        self.ip += n;
        Ok(slice)
    }
}
