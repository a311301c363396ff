//! An IR toolkit for a small imperative language.
//!
//! The language has integers, pointers, named struct types, direct and
//! indirect function calls, and SSA-style phi nodes. This crate provides:
//!
//! ```text
//! Canonical text
//!       |
//!       v
//! +-------------+
//! |  Tokenizer  |  -> token stream
//! +-------------+
//!       |
//!       v
//! +-------------+
//! |   Parser    |  -> Program (variables interned, parents wired)
//! +-------------+
//!       |
//!       v
//! +-------------+
//! |  Verifier   |  -> diagnostics, or a well-formed Program
//! +-------------+
//!       |
//!       v
//! +-------------+
//! |  Visitors   |  -> serializer, analyses
//! +-------------+
//! ```
//!
//! Parsing and printing are symmetric: for text in canonical form,
//! `text.parse::<ir::Program>()?.to_string() == text`.

pub mod analysis;
pub mod ir;
pub mod tokenizer;

pub use ir::{Program, Type};
pub use tokenizer::Tokenizer;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for IR source files.
pub const FILE_EXTENSION: &str = "ir";
