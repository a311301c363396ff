//! The intermediate representation.
//!
//! An in-memory IR for a small imperative language with integers, pointers,
//! structs, direct and indirect calls, and SSA-style phi nodes, together
//! with its canonical text format, a parser, a structural/type verifier,
//! and the visitor protocol every analysis traverses it with.
//!
//! The flow is: text -> tokenizer -> parser -> [`Program`] construction ->
//! verifier -> visitor-driven consumers. Serialization is the inverse of
//! parsing and shares the canonical form: for canonical text,
//! `text.parse::<Program>()?.to_string() == text`.

mod builder;
mod error;
mod instr;
mod parse;
mod print;
mod program;
mod types;
mod value;
mod verify;
mod visitor;

pub use builder::Builder;
pub use error::IrError;
pub use instr::{
    AddrOfInst, AllocInst, Aop, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst,
    ICallInst, InstKind, Instruction, JumpInst, LoadInst, PhiInst, RetInst, Rop, SelectInst,
    StoreInst,
};
pub use parse::{ParseError, ParseResult};
pub use print::Printer;
pub use program::{BasicBlock, BlockRef, FuncRef, Function, InstRef, Program};
pub use types::{BaseType, Type};
pub use value::{Operand, VarRef, Variable};
pub use visitor::{DebugVisitor, IrVisitor};
