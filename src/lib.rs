mod error;
mod types;

pub mod bytecode;
pub mod compile;
pub mod optimize;
pub mod parse;
pub mod vm;

pub use compile::{CompiledUnit, Compiler, compile_document};
pub use error::RexError;
pub use optimize::optimize;
pub use parse::parse_rules;
pub use types::{
    Action, ActionKind, CompareOp, CompilationContext, CompileError, Condition, Conditions, Event,
    Rule, Value, ValueType,
};
pub use vm::{DiscardSink, MessageSink, RuntimeError, Vm};
