//! The visitor protocol.
//!
//! A visitor walks a program from the most general component to the most
//! specific: Program -> struct types -> Function -> BasicBlock ->
//! Instruction -> specific instruction variant. The `*_post` hooks fire
//! after a component's children have all been visited. For instructions the
//! general [`IrVisitor::visit_inst`] hook runs first, then the
//! variant-specific hook, then [`IrVisitor::visit_inst_post`].
//!
//! The trait is parameterized over the lifetime of the visited IR so that a
//! visitor may retain references to what it sees (the verifier and most
//! analyses do).

use std::collections::BTreeMap;
use std::io;

use super::instr::{
    AddrOfInst, AllocInst, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst,
    ICallInst, Instruction, JumpInst, LoadInst, PhiInst, RetInst, SelectInst, StoreInst,
};
use super::program::{BasicBlock, Function, Program};
use super::types::Type;

/// Traversal callbacks over a program. Every hook defaults to a no-op, so a
/// visitor only implements what it cares about.
pub trait IrVisitor<'ir> {
    fn visit_program(&mut self, _program: &'ir Program) {}
    fn visit_program_post(&mut self, _program: &'ir Program) {}
    fn visit_struct_type(&mut self, _name: &'ir str, _fields: &'ir BTreeMap<String, Type>) {}
    fn visit_function(&mut self, _function: &'ir Function) {}
    fn visit_function_post(&mut self, _function: &'ir Function) {}
    fn visit_basic_block(&mut self, _block: &'ir BasicBlock) {}
    fn visit_basic_block_post(&mut self, _block: &'ir BasicBlock) {}
    fn visit_inst(&mut self, _inst: &'ir Instruction) {}
    fn visit_inst_post(&mut self, _inst: &'ir Instruction) {}
    fn visit_arith(&mut self, _inst: &'ir ArithInst) {}
    fn visit_cmp(&mut self, _inst: &'ir CmpInst) {}
    fn visit_phi(&mut self, _inst: &'ir PhiInst) {}
    fn visit_copy(&mut self, _inst: &'ir CopyInst) {}
    fn visit_alloc(&mut self, _inst: &'ir AllocInst) {}
    fn visit_addrof(&mut self, _inst: &'ir AddrOfInst) {}
    fn visit_load(&mut self, _inst: &'ir LoadInst) {}
    fn visit_store(&mut self, _inst: &'ir StoreInst) {}
    fn visit_gep(&mut self, _inst: &'ir GepInst) {}
    fn visit_select(&mut self, _inst: &'ir SelectInst) {}
    fn visit_call(&mut self, _inst: &'ir CallInst) {}
    fn visit_icall(&mut self, _inst: &'ir ICallInst) {}
    fn visit_ret(&mut self, _inst: &'ir RetInst) {}
    fn visit_jump(&mut self, _inst: &'ir JumpInst) {}
    fn visit_branch(&mut self, _inst: &'ir BranchInst) {}
}

/// A wrapper that traces every hook as `entering`/`exiting` lines on an
/// output sink, delegating to the wrapped visitor in between. Composes with
/// any visitor; write errors on the sink are ignored.
pub struct DebugVisitor<'v, 'ir, W: io::Write> {
    visitor: &'v mut dyn IrVisitor<'ir>,
    out: W,
}

impl<'v, 'ir, W: io::Write> DebugVisitor<'v, 'ir, W> {
    pub fn new(visitor: &'v mut dyn IrVisitor<'ir>, out: W) -> Self {
        Self { visitor, out }
    }

    fn trace(&mut self, phase: &str, hook: &str) {
        let _ = writeln!(self.out, "{phase} {hook}");
    }
}

macro_rules! traced {
    ($name:ident, $arg:ident: $ty:ty) => {
        fn $name(&mut self, $arg: $ty) {
            self.trace("entering", stringify!($name));
            self.visitor.$name($arg);
            self.trace("exiting", stringify!($name));
        }
    };
}

impl<'v, 'ir, W: io::Write> IrVisitor<'ir> for DebugVisitor<'v, 'ir, W> {
    traced!(visit_program, program: &'ir Program);
    traced!(visit_program_post, program: &'ir Program);
    traced!(visit_function, function: &'ir Function);
    traced!(visit_function_post, function: &'ir Function);
    traced!(visit_basic_block, block: &'ir BasicBlock);
    traced!(visit_basic_block_post, block: &'ir BasicBlock);
    traced!(visit_inst, inst: &'ir Instruction);
    traced!(visit_inst_post, inst: &'ir Instruction);
    traced!(visit_arith, inst: &'ir ArithInst);
    traced!(visit_cmp, inst: &'ir CmpInst);
    traced!(visit_phi, inst: &'ir PhiInst);
    traced!(visit_copy, inst: &'ir CopyInst);
    traced!(visit_alloc, inst: &'ir AllocInst);
    traced!(visit_addrof, inst: &'ir AddrOfInst);
    traced!(visit_load, inst: &'ir LoadInst);
    traced!(visit_store, inst: &'ir StoreInst);
    traced!(visit_gep, inst: &'ir GepInst);
    traced!(visit_select, inst: &'ir SelectInst);
    traced!(visit_call, inst: &'ir CallInst);
    traced!(visit_icall, inst: &'ir ICallInst);
    traced!(visit_ret, inst: &'ir RetInst);
    traced!(visit_jump, inst: &'ir JumpInst);
    traced!(visit_branch, inst: &'ir BranchInst);

    fn visit_struct_type(&mut self, name: &'ir str, fields: &'ir BTreeMap<String, Type>) {
        self.trace("entering", "visit_struct_type");
        self.visitor.visit_struct_type(name, fields);
        self.trace("exiting", "visit_struct_type");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use crate::ir::program::Program;

    /// Records which hooks fire, in order.
    #[derive(Default)]
    struct OrderVisitor {
        order: Vec<&'static str>,
    }

    impl<'ir> IrVisitor<'ir> for OrderVisitor {
        fn visit_program(&mut self, _program: &'ir Program) {
            self.order.push("program");
        }
        fn visit_program_post(&mut self, _program: &'ir Program) {
            self.order.push("program_post");
        }
        fn visit_struct_type(&mut self, _name: &'ir str, _fields: &'ir BTreeMap<String, Type>) {
            self.order.push("struct_type");
        }
        fn visit_function(&mut self, _function: &'ir Function) {
            self.order.push("function");
        }
        fn visit_function_post(&mut self, _function: &'ir Function) {
            self.order.push("function_post");
        }
        fn visit_basic_block(&mut self, _block: &'ir BasicBlock) {
            self.order.push("basic_block");
        }
        fn visit_basic_block_post(&mut self, _block: &'ir BasicBlock) {
            self.order.push("basic_block_post");
        }
        fn visit_inst(&mut self, _inst: &'ir Instruction) {
            self.order.push("inst");
        }
        fn visit_inst_post(&mut self, _inst: &'ir Instruction) {
            self.order.push("inst_post");
        }
        fn visit_ret(&mut self, _inst: &'ir RetInst) {
            self.order.push("ret");
        }
    }

    fn one_struct_one_ret() -> Program {
        Program::from_str(
            "struct foo {\n  field: int\n}\n\nfunction main() -> int {\nentry:\n  $ret 42\n}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_traversal_order() {
        let program = one_struct_one_ret();

        let mut visitor = OrderVisitor::default();
        program.visit(&mut visitor);

        assert_eq!(
            visitor.order,
            vec![
                "program",
                "struct_type",
                "function",
                "basic_block",
                "inst",
                "ret",
                "inst_post",
                "basic_block_post",
                "function_post",
                "program_post",
            ]
        );
    }

    #[test]
    fn test_debug_visitor_traces_and_delegates() {
        let program = one_struct_one_ret();

        let mut inner = OrderVisitor::default();
        let mut out = Vec::new();
        {
            let mut debug = DebugVisitor::new(&mut inner, &mut out);
            program.visit(&mut debug);
        }

        assert_eq!(inner.order.first(), Some(&"program"));
        assert_eq!(inner.order.last(), Some(&"program_post"));

        let trace = String::from_utf8(out).unwrap();
        assert!(trace.starts_with("entering visit_program\nexiting visit_program\n"));
        assert!(trace.contains("entering visit_ret\nexiting visit_ret\n"));
        assert!(trace.ends_with("entering visit_program_post\nexiting visit_program_post\n"));
    }
}
