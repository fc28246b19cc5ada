use thiserror::Error;

use crate::bytecode::FormatError;
use crate::types::CompileError;
use crate::vm::RuntimeError;

/// Unified error type covering document parsing, compilation, bytecode
/// framing, execution, and I/O.
///
/// Returned by the high-level entry points; the CLI drivers surface it and
/// exit non-zero.
#[derive(Debug, Error)]
pub enum RexError {
    #[error("invalid rule document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
