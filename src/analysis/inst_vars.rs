//! A small example analysis: which variables does each instruction mention?
//!
//! Given a verified program and a function name, [`InstVars`] maps every
//! instruction site — (basic block label, index within the block) — to the
//! set of variables that instruction uses. Left-hand sides do not count as
//! uses; only operands do.

use std::collections::{HashMap, HashSet};

use crate::ir::{
    AddrOfInst, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst, ICallInst,
    Instruction, IrVisitor, LoadInst, Operand, PhiInst, Program, RetInst, SelectInst,
    StoreInst, VarRef,
};

/// An instruction's position: the label of its basic block and its index
/// within the block.
pub type InstSite = (String, usize);

/// The variables an instruction mentions.
pub type VarSet = HashSet<VarRef>;

/// Instruction site -> variables used there. Instructions that mention no
/// variables have no entry.
pub type Solution = HashMap<InstSite, VarSet>;

/// The variables-used analysis over one program.
pub struct InstVars<'p> {
    program: &'p Program,
}

impl<'p> InstVars<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    /// Analyze the named function.
    ///
    /// # Panics
    ///
    /// Panics if the program has no function with that name.
    pub fn analyze(&self, function_name: &str) -> Solution {
        let function = &self.program[function_name];

        let mut collector = Collector::default();
        function.visit(&mut collector);
        collector.solution
    }
}

/// Walks a function and records, per instruction site, every variable
/// operand it sees.
#[derive(Default)]
struct Collector {
    solution: Solution,
    site: Option<InstSite>,
}

impl Collector {
    fn add_var(&mut self, var: &VarRef) {
        if let Some(site) = &self.site {
            self.solution.entry(site.clone()).or_default().insert(var.clone());
        }
    }

    fn add_op(&mut self, op: &Operand) {
        if let Operand::Var(var) = op {
            self.add_var(var);
        }
    }
}

impl<'ir> IrVisitor<'ir> for Collector {
    fn visit_inst(&mut self, inst: &'ir Instruction) {
        // The parent links locate the instruction for us.
        self.site = inst
            .parent()
            .and_then(|block| inst.index().map(|i| (block.label().to_string(), i)));
    }

    fn visit_arith(&mut self, inst: &'ir ArithInst) {
        self.add_op(&inst.op1);
        self.add_op(&inst.op2);
    }

    fn visit_cmp(&mut self, inst: &'ir CmpInst) {
        self.add_op(&inst.op1);
        self.add_op(&inst.op2);
    }

    fn visit_phi(&mut self, inst: &'ir PhiInst) {
        for op in &inst.ops {
            self.add_op(op);
        }
    }

    fn visit_copy(&mut self, inst: &'ir CopyInst) {
        self.add_op(&inst.rhs);
    }

    // Alloc and jump have no operands.

    fn visit_addrof(&mut self, inst: &'ir AddrOfInst) {
        self.add_var(&inst.rhs);
    }

    fn visit_load(&mut self, inst: &'ir LoadInst) {
        self.add_var(&inst.src);
    }

    fn visit_store(&mut self, inst: &'ir StoreInst) {
        self.add_var(&inst.dst);
        self.add_op(&inst.value);
    }

    fn visit_gep(&mut self, inst: &'ir GepInst) {
        self.add_var(&inst.src_ptr);
        self.add_op(&inst.index);
    }

    fn visit_select(&mut self, inst: &'ir SelectInst) {
        self.add_op(&inst.condition);
        self.add_op(&inst.true_op);
        self.add_op(&inst.false_op);
    }

    fn visit_call(&mut self, inst: &'ir CallInst) {
        for arg in &inst.args {
            self.add_op(arg);
        }
    }

    fn visit_icall(&mut self, inst: &'ir ICallInst) {
        for arg in &inst.args {
            self.add_op(arg);
        }
    }

    fn visit_ret(&mut self, inst: &'ir RetInst) {
        self.add_op(&inst.retval);
    }

    fn visit_branch(&mut self, inst: &'ir BranchInst) {
        self.add_op(&inst.condition);
    }
}
