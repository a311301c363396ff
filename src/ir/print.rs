//! The canonical text serializer.
//!
//! Serialization is a visitor: structs first (name order), then functions
//! (name order) with their blocks in label order, each top-level construct
//! followed by a blank line. Instructions are indented two spaces. The
//! output is the canonical form, so parsing it back and printing again is
//! the identity.

use std::fmt;

use super::instr::{
    AddrOfInst, AllocInst, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst,
    ICallInst, JumpInst, LoadInst, PhiInst, RetInst, SelectInst, StoreInst,
};
use super::program::{BasicBlock, Function, Program};
use super::visitor::IrVisitor;

/// Accumulates the canonical text of whatever it visits.
#[derive(Default)]
pub struct Printer {
    out: String,
    indent: &'static str,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated text.
    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, inst: impl fmt::Display) {
        self.out.push_str(self.indent);
        self.out.push_str(&inst.to_string());
        self.out.push('\n');
    }
}

impl<'ir> IrVisitor<'ir> for Printer {
    fn visit_program(&mut self, program: &'ir Program) {
        for (name, fields) in program.struct_types() {
            self.out.push_str(&format!("struct {name} {{\n"));
            for (field, ty) in fields {
                self.out.push_str(&format!("  {field}: {ty}\n"));
            }
            self.out.push_str("}\n\n");
        }
    }

    fn visit_function(&mut self, function: &'ir Function) {
        self.out.push_str(&format!("function {}(", function.name()));
        for (i, param) in function.parameters().iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.to_string());
        }
        self.out.push_str(&format!(") -> {} {{", function.return_type()));
    }

    fn visit_function_post(&mut self, _function: &'ir Function) {
        self.out.push_str("}\n\n");
    }

    fn visit_basic_block(&mut self, block: &'ir BasicBlock) {
        self.out.push_str(&format!("\n{}:\n", block.label()));
        self.indent = "  ";
    }

    fn visit_arith(&mut self, inst: &'ir ArithInst) {
        self.line(inst);
    }

    fn visit_cmp(&mut self, inst: &'ir CmpInst) {
        self.line(inst);
    }

    fn visit_phi(&mut self, inst: &'ir PhiInst) {
        self.line(inst);
    }

    fn visit_copy(&mut self, inst: &'ir CopyInst) {
        self.line(inst);
    }

    fn visit_alloc(&mut self, inst: &'ir AllocInst) {
        self.line(inst);
    }

    fn visit_addrof(&mut self, inst: &'ir AddrOfInst) {
        self.line(inst);
    }

    fn visit_load(&mut self, inst: &'ir LoadInst) {
        self.line(inst);
    }

    fn visit_store(&mut self, inst: &'ir StoreInst) {
        self.line(inst);
    }

    fn visit_gep(&mut self, inst: &'ir GepInst) {
        self.line(inst);
    }

    fn visit_select(&mut self, inst: &'ir SelectInst) {
        self.line(inst);
    }

    fn visit_call(&mut self, inst: &'ir CallInst) {
        self.line(inst);
    }

    fn visit_icall(&mut self, inst: &'ir ICallInst) {
        self.line(inst);
    }

    fn visit_ret(&mut self, inst: &'ir RetInst) {
        self.line(inst);
    }

    fn visit_jump(&mut self, inst: &'ir JumpInst) {
        self.line(inst);
    }

    fn visit_branch(&mut self, inst: &'ir BranchInst) {
        self.line(inst);
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        self.visit(&mut printer);
        f.write_str(&printer.finish())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        self.visit(&mut printer);
        f.write_str(&printer.finish())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        self.visit(&mut printer);
        f.write_str(&printer.finish())
    }
}
