//! Analyses over the IR.
//!
//! Every analysis receives a parsed, verified [`Program`](crate::ir::Program)
//! and traverses it through the visitor interface.

mod inst_vars;

pub use inst_vars::{InstSite, InstVars, Solution, VarSet};
