//! Construction errors.
//!
//! Everything that can go wrong while assembling IR by hand or through the
//! builder. Verifier diagnostics are folded into [`IrError::Malformed`],
//! which carries the full newline-terminated diagnostic text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("basic block label must be non-empty")]
    EmptyBlockLabel,

    #[error("basic block body must be non-empty: {0}")]
    EmptyBlockBody(String),

    #[error("function name must be non-empty")]
    EmptyFunctionName,

    #[error("function body must be non-empty: {0}")]
    EmptyFunctionBody(String),

    #[error("cannot have duplicate basic block labels: {0}")]
    DuplicateLabel(String),

    #[error("cannot have duplicate function names: {0}")]
    DuplicateFunction(String),

    #[error("struct type name already exists: {0}")]
    DuplicateStruct(String),

    #[error("structs must have at least one field: {0}")]
    EmptyStruct(String),

    #[error("cannot add a parameter outside of a function: {0}")]
    ParameterOutsideFunction(String),

    #[error("can't start a basic block outside of a function: {0}")]
    BlockOutsideFunction(String),

    #[error("cannot add an instruction outside a basic block: {0}")]
    InstructionOutsideBlock(String),

    #[error("cannot finalize a nonexistent basic block")]
    NoCurrentBlock,

    #[error("malformed program:\n{0}")]
    Malformed(String),
}
