//! The structural and type verifier.
//!
//! Runs once, as a visitor, when a [`Program`](super::program::Program) is
//! constructed. Diagnostics are accumulated as one newline-terminated
//! string; an empty string means the program is well-formed. Along the way
//! the verifier collects every `@fname` global actually used in the code so
//! the program can expose the interned function pointer table.
//!
//! The verifier never mutates the IR.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use super::instr::{
    AddrOfInst, AllocInst, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst,
    ICallInst, Instruction, JumpInst, LoadInst, PhiInst, RetInst, SelectInst, StoreInst,
};
use super::program::{BasicBlock, Function, Program};
use super::types::{BaseType, Type};
use super::value::{Operand, VarRef};
use super::visitor::IrVisitor;

/// Verify `program`, returning the concatenated diagnostics (empty when
/// well-formed) and the interned `@fname` variables seen in the code.
pub(crate) fn verify(program: &Program) -> (String, BTreeMap<String, VarRef>) {
    let mut verifier = Verifier::new();
    program.visit(&mut verifier);
    (verifier.errors, verifier.func_ptrs)
}

struct Verifier<'ir> {
    errors: String,

    program: Option<&'ir Program>,
    curr_function: Option<&'ir Function>,
    curr_block: Option<&'ir BasicBlock>,
    block_id: String,

    /// Nonexistent struct types already reported, so each is reported once.
    nonexistent_structs: BTreeSet<String>,

    /// The `@fname` globals mentioned in the code, by function name.
    func_ptrs: BTreeMap<String, VarRef>,
}

impl<'ir> Verifier<'ir> {
    fn new() -> Self {
        Self {
            errors: String::new(),
            program: None,
            curr_function: None,
            curr_block: None,
            block_id: String::new(),
            nonexistent_structs: BTreeSet::new(),
            func_ptrs: BTreeMap::new(),
        }
    }

    fn report(&mut self, message: String) {
        self.errors.push_str(&message);
        self.errors.push('\n');
    }

    fn report_if_nonexistent_struct(&mut self, ty: &Type) {
        let BaseType::Struct(name) = ty.base() else { return };
        let declared = self
            .program
            .map(|p| p.struct_types().contains_key(name))
            .unwrap_or(false);
        if !declared && !self.nonexistent_structs.contains(name) {
            self.nonexistent_structs.insert(name.clone());
            self.report(format!("Type uses nonexistent struct: {ty}"));
        }
    }

    /// Top-level values (stored in a program variable rather than memory)
    /// can only be integers or pointers.
    fn report_if_not_toplevel(&mut self, ty: &Type) {
        if !ty.is_int() && !ty.is_ptr() {
            self.report(format!("Top-level types must be int or pointer: {ty}"));
        }
    }

    /// `@`-variables get their values from the language runtime and never
    /// change.
    fn report_if_unassignable(&mut self, var: &VarRef) {
        if var.is_global() {
            self.report(
                "Variables starting with '@' are special and cannot be assigned to or \
                 stored into"
                    .to_string(),
            );
        }
    }

    /// Make sure an `@`-variable is used properly and remember any global
    /// function pointer.
    fn check_if_global(&mut self, var: &VarRef) {
        if !var.is_global() || var.name() == "@nullptr" {
            return;
        }
        let fun_name = &var.name()[1..];

        let declared = self
            .program
            .map(|p| p.functions().contains_key(fun_name))
            .unwrap_or(false);
        if !declared {
            self.report(format!(
                "Global function pointer doesn't point to a real function: {var}"
            ));
        }

        match self.func_ptrs.get(fun_name).cloned() {
            Some(existing) => {
                if existing != *var {
                    self.report(format!(
                        "Global function pointers for same function but different VarPtr: \
                         {var} and {existing}"
                    ));
                }
            }
            None => {
                self.func_ptrs.insert(fun_name.to_string(), var.clone());
            }
        }
    }

    fn check_if_global_op(&mut self, op: &Operand) {
        if let Some(var) = op.as_var() {
            self.check_if_global(var);
        }
    }
}

impl<'ir> IrVisitor<'ir> for Verifier<'ir> {
    fn visit_program(&mut self, program: &'ir Program) {
        self.program = Some(program);

        if !program.functions().contains_key("main") {
            self.report("Program does not have a main function.".to_string());
        }
    }

    fn visit_struct_type(&mut self, name: &'ir str, fields: &'ir BTreeMap<String, Type>) {
        if name.contains('.') {
            self.report(format!("struct type name can't contain '.': {name}"));
        }
        if fields.is_empty() {
            self.report(format!("Struct type can't have empty fields: {name}"));
        }
        for (field, ty) in fields {
            if field.is_empty() {
                self.report(format!("Struct field names must be non-empty: {name}.{field}"));
            }
            if field.contains('.') {
                self.report(format!("struct field name can't contain '.': {name}.{field}"));
            }
            self.report_if_nonexistent_struct(ty);
        }
    }

    fn visit_function(&mut self, function: &'ir Function) {
        self.curr_function = Some(function);

        if !function.body().contains_key("entry") {
            self.report(format!(
                "Function must have a basic block named 'entry': {}",
                function.name()
            ));
        }

        let mut params = HashSet::new();
        for param in function.parameters() {
            if !params.insert(param.clone()) {
                self.report(format!(
                    "Duplicate parameter variables for function {}",
                    function.name()
                ));
            }

            if param.is_global() {
                self.report(format!(
                    "Cannot use global variable as parameter in function {}",
                    function.name()
                ));
            }

            self.report_if_nonexistent_struct(param.ty());
            self.report_if_not_toplevel(param.ty());
        }

        self.report_if_not_toplevel(function.return_type());
    }

    fn visit_basic_block(&mut self, block: &'ir BasicBlock) {
        self.curr_block = Some(block);
        self.block_id = format!(
            "{}::{}",
            self.curr_function.map(Function::name).unwrap_or(""),
            block.label()
        );

        let body = block.body();
        if !body[body.len() - 1].is_terminator() {
            self.report(format!(
                "Basic block does not end in a terminator instruction: {}",
                self.block_id
            ));
        }

        for inst in &body[..body.len() - 1] {
            if inst.is_terminator() {
                self.report(format!(
                    "Basic block contains a terminator instruction before its end: {}",
                    self.block_id
                ));
                break;
            }
        }

        match block.parent() {
            None => {
                self.report(format!("Basic block's parent pointer isn't set: {}", self.block_id));
            }
            Some(parent) => {
                let matches = self
                    .curr_function
                    .map(|f| std::ptr::eq(Rc::as_ptr(&parent), f))
                    .unwrap_or(false);
                if !matches {
                    self.report(format!(
                        "Basic block's parent doesn't match containing function: {}",
                        self.block_id
                    ));
                }
            }
        }
    }

    fn visit_inst(&mut self, inst: &'ir Instruction) {
        match inst.parent() {
            None => self.report("Instruction's parent pointer isn't set".to_string()),
            Some(parent) => {
                let matches = self
                    .curr_block
                    .map(|b| std::ptr::eq(Rc::as_ptr(&parent), b))
                    .unwrap_or(false);
                if !matches {
                    self.report(format!(
                        "Instruction's parent pointer doesn't match containing basic block: {}",
                        parent.label()
                    ));
                }
            }
        }
    }

    fn visit_arith(&mut self, inst: &'ir ArithInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(&inst.op1.ty());
        self.report_if_nonexistent_struct(&inst.op2.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global_op(&inst.op1);
        self.check_if_global_op(&inst.op2);

        if !inst.lhs.ty().is_int() {
            self.report(format!("Type error: result of arithmetic must be an int: {inst}"));
        }
        if !inst.op1.ty().is_int() {
            self.report(format!("Type error: operand of arithmetic must be an int: {inst}"));
        }
        if !inst.op2.ty().is_int() {
            self.report(format!("Type error: operand of arithmetic must be an int: {inst}"));
        }
    }

    fn visit_cmp(&mut self, inst: &'ir CmpInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(&inst.op1.ty());
        self.report_if_nonexistent_struct(&inst.op2.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global_op(&inst.op1);
        self.check_if_global_op(&inst.op2);

        if !inst.lhs.ty().is_int() {
            self.report(format!("Type error: result of comparison must be an int: {inst}"));
        }
        if !inst.op1.ty().is_int() && !inst.op1.ty().is_ptr() {
            self.report(format!(
                "Type error: operand of comparison must be an int or pointer: {inst}"
            ));
        }
        if !inst.op2.ty().is_int() && !inst.op2.ty().is_ptr() {
            self.report(format!(
                "Type error: operand of comparison must be an int or pointer: {inst}"
            ));
        }
    }

    fn visit_phi(&mut self, inst: &'ir PhiInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.check_if_global(&inst.lhs);

        for op in &inst.ops {
            self.report_if_nonexistent_struct(&op.ty());
            self.check_if_global_op(op);

            if op.ty() != *inst.lhs.ty() {
                self.report(format!(
                    "Type error: operand type doesn't match left-hand side: {inst}"
                ));
            }
        }

        self.report_if_not_toplevel(inst.lhs.ty());
        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_copy(&mut self, inst: &'ir CopyInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(&inst.rhs.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global_op(&inst.rhs);

        if inst.rhs.ty() != *inst.lhs.ty() {
            self.report(format!(
                "Type error: operand type doesn't match left-hand side: {inst}"
            ));
        }

        self.report_if_not_toplevel(inst.lhs.ty());
        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_alloc(&mut self, inst: &'ir AllocInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.check_if_global(&inst.lhs);

        if !inst.lhs.ty().is_ptr() {
            self.report(format!("Type error: result of alloc must be a pointer: {inst}"));
        }

        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_addrof(&mut self, inst: &'ir AddrOfInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(inst.rhs.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global(&inst.rhs);

        if inst.lhs.ty().deref().as_ref() != Some(inst.rhs.ty()) {
            self.report(format!(
                "Type error: result of addrof must be a pointer to operand type: {inst}"
            ));
        }

        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_load(&mut self, inst: &'ir LoadInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(inst.src.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global(&inst.src);

        if inst.lhs.ty().ptr_to() != *inst.src.ty() {
            self.report(format!(
                "Type error: source of load must be a pointer to type of result: {inst}"
            ));
        }

        self.report_if_not_toplevel(inst.lhs.ty());
        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_store(&mut self, inst: &'ir StoreInst) {
        self.report_if_nonexistent_struct(inst.dst.ty());
        self.report_if_nonexistent_struct(&inst.value.ty());

        self.check_if_global(&inst.dst);
        self.check_if_global_op(&inst.value);

        if inst.value.ty().ptr_to() != *inst.dst.ty() {
            self.report(format!(
                "Type error: destination of store must be a pointer to type of stored \
                 value: {inst}"
            ));
        }

        self.report_if_unassignable(&inst.dst);
    }

    fn visit_gep(&mut self, inst: &'ir GepInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(inst.src_ptr.ty());
        self.report_if_nonexistent_struct(&inst.index.ty());

        self.check_if_global(&inst.lhs);
        self.check_if_global(&inst.src_ptr);
        self.check_if_global_op(&inst.index);

        if !inst.index.ty().is_int() {
            self.report("Index must be an integer".to_string());
        }

        let Some(field) = &inst.field else {
            if !inst.src_ptr.ty().is_ptr() {
                self.report(format!("Type error: source must be a pointer: {inst}"));
            }
            if inst.lhs.ty() != inst.src_ptr.ty() {
                self.report(format!(
                    "Type error: type of source pointer must match left-hand side: {inst}"
                ));
            }
            return;
        };

        if !inst.src_ptr.ty().is_struct_ptr() {
            self.report(format!("Type error: source must be a pointer to a struct: {inst}"));
            return;
        }

        let Some(program) = self.program else { return };
        let struct_name = inst.src_ptr.ty().struct_name().unwrap_or("");
        let Some(fields) = program.struct_types().get(struct_name) else { return };

        match fields.get(field) {
            None => {
                self.report(format!(
                    "Type error: mismatch between struct type and field name: {inst}"
                ));
            }
            Some(field_ty) => {
                if inst.lhs.ty().deref().as_ref() != Some(field_ty) {
                    self.report(format!(
                        "Type error: Result type must be a pointer to type of field: {inst}"
                    ));
                }
            }
        }

        self.report_if_unassignable(&inst.lhs);
    }

    fn visit_select(&mut self, inst: &'ir SelectInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(&inst.condition.ty());
        self.report_if_nonexistent_struct(&inst.true_op.ty());
        self.report_if_nonexistent_struct(&inst.false_op.ty());
        self.report_if_unassignable(&inst.lhs);

        self.check_if_global(&inst.lhs);
        self.check_if_global_op(&inst.condition);
        self.check_if_global_op(&inst.true_op);
        self.check_if_global_op(&inst.false_op);

        if !inst.condition.ty().is_int() {
            self.report(format!("Type error: select condition must be an int: {inst}"));
        }
        if inst.true_op.ty() != *inst.lhs.ty() || inst.false_op.ty() != *inst.lhs.ty() {
            self.report(format!(
                "Type error: type of select operands and left-hand side must match: {inst}"
            ));
        }

        self.report_if_not_toplevel(inst.lhs.ty());
    }

    fn visit_call(&mut self, inst: &'ir CallInst) {
        // The callee is allowed to be externally defined (e.g. 'input',
        // 'output', 'malloc'), so its absence from the program is not an
        // error and nothing further can be checked.
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_unassignable(&inst.lhs);

        self.check_if_global(&inst.lhs);

        let Some(callee) = self.program.and_then(|p| p.functions().get(&inst.callee)) else {
            return;
        };

        if callee.parameters().len() != inst.args.len() {
            self.report(format!("Type error: incorrect number of call arguments: {inst}"));
        }

        for (i, arg) in inst.args.iter().enumerate() {
            self.check_if_global_op(arg);

            let Some(param) = callee.parameters().get(i) else { break };
            if arg.ty() != *param.ty() {
                self.report(format!(
                    "Type error: type of argument doesn't match type of parameter: {inst}"
                ));
            }
        }

        if inst.lhs.ty() != callee.return_type() {
            self.report(format!(
                "Type error: function return type doesn't match left-hand side: {inst}"
            ));
        }
    }

    fn visit_icall(&mut self, inst: &'ir ICallInst) {
        self.report_if_nonexistent_struct(inst.lhs.ty());
        self.report_if_nonexistent_struct(inst.func_ptr.ty());
        self.report_if_unassignable(&inst.lhs);

        self.check_if_global(&inst.lhs);
        self.check_if_global(&inst.func_ptr);

        if !inst.func_ptr.ty().is_function_ptr() {
            self.report(format!("Type error: calling a non-function pointer: {inst}"));
            return;
        }

        let types = inst.func_ptr.ty().func_types().unwrap_or(&[]).to_vec();

        if inst.args.len() != types.len() - 1 {
            self.report(format!("Type error: incorrect number of call arguments: {inst}"));
        }

        for (i, arg) in inst.args.iter().enumerate() {
            self.check_if_global_op(arg);

            let Some(param_ty) = types.get(i + 1) else { break };
            if arg.ty() != *param_ty {
                self.report(format!(
                    "Type error: type of argument doesn't match type of parameter: {inst}"
                ));
            }
        }

        if *inst.lhs.ty() != types[0] {
            self.report(format!(
                "Type error: function return type doesn't match left-hand side: {inst}"
            ));
        }

        self.report_if_not_toplevel(inst.lhs.ty());
    }

    fn visit_ret(&mut self, inst: &'ir RetInst) {
        self.report_if_nonexistent_struct(&inst.retval.ty());
        self.check_if_global_op(&inst.retval);

        let matches = self
            .curr_function
            .map(|f| inst.retval.ty() == *f.return_type())
            .unwrap_or(true);
        if !matches {
            self.report(format!(
                "Type error: operand type does not match function return type: {inst}"
            ));
        }
    }

    fn visit_jump(&mut self, inst: &'ir JumpInst) {
        let exists = self
            .curr_function
            .map(|f| f.body().contains_key(&inst.label))
            .unwrap_or(true);
        if !exists {
            self.report(format!(
                "Basic block '{}' jumps to nonexistent basic block '{}'",
                self.block_id, inst.label
            ));
        }
    }

    fn visit_branch(&mut self, inst: &'ir BranchInst) {
        self.report_if_nonexistent_struct(&inst.condition.ty());
        self.check_if_global_op(&inst.condition);

        for label in [&inst.label_true, &inst.label_false] {
            let exists = self
                .curr_function
                .map(|f| f.body().contains_key(label))
                .unwrap_or(true);
            if !exists {
                self.report(format!(
                    "Basic block '{}' branches to nonexistent basic block '{}'",
                    self.block_id, label
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;

    use crate::ir::error::IrError;
    use crate::ir::instr::{GepInst, JumpInst};
    use crate::ir::parse::ParseError;
    use crate::ir::program::{BasicBlock, Function, Program};
    use crate::ir::types::Type;
    use crate::ir::value::VarRef;

    /// The diagnostics a malformed program construction fails with.
    fn diagnostics(text: &str) -> String {
        match Program::from_str(text).unwrap_err() {
            ParseError::Ir(IrError::Malformed(errors)) => errors,
            err => panic!("expected verifier diagnostics, got {err:?}"),
        }
    }

    #[test]
    fn test_malformed_program_collects_all_diagnostics() {
        let mut struct_types = BTreeMap::new();
        struct_types.insert("blah".to_string(), BTreeMap::new());

        let block = BasicBlock::new(
            "bar",
            vec![
                JumpInst { label: "foo".to_string() }.into(),
                GepInst {
                    lhs: VarRef::new("foop", Type::int().ptr_to()),
                    src_ptr: VarRef::new("bar", Type::struct_type("foo").ptr_to()),
                    index: 0.into(),
                    field: Some("field".to_string()),
                }
                .into(),
            ],
        )
        .unwrap();
        let fun = Function::new("fun", Type::int(), vec![], vec![block]).unwrap();

        let err = Program::new(struct_types, vec![fun]).unwrap_err();
        assert_eq!(
            err,
            IrError::Malformed(
                "Program does not have a main function.\n\
                 Struct type can't have empty fields: blah\n\
                 Function must have a basic block named 'entry': fun\n\
                 Basic block does not end in a terminator instruction: fun::bar\n\
                 Basic block contains a terminator instruction before its end: fun::bar\n\
                 Basic block 'fun::bar' jumps to nonexistent basic block 'foo'\n\
                 Type uses nonexistent struct: foo*\n"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_nonexistent_struct_reported_once() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:nope* = $alloc\n  q:nope* = $copy p:nope*\n  \
             $ret 0\n}\n",
        );
        assert_eq!(errors.matches("Type uses nonexistent struct: nope*").count(), 1);
    }

    #[test]
    fn test_arith_requires_ints() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  x:int* = $arith add p:int* 1\n  $ret 0\n}\n",
        );
        assert!(errors.contains("result of arithmetic must be an int"));
        assert!(errors.contains("operand of arithmetic must be an int"));
    }

    #[test]
    fn test_cmp_allows_heterogeneous_pointers() {
        let program = "function main() -> int {\nentry:\n  \
                       p:int* = $alloc\n  x:int = $cmp eq p:int* 0\n  $ret x:int\n}\n"
            .parse::<Program>()
            .unwrap();
        assert!(program.func_ptrs().is_empty());

        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int* = $cmp eq 1 2\n  $ret 0\n}\n",
        );
        assert!(errors.contains("result of comparison must be an int"));
    }

    #[test]
    fn test_phi_operands_match_lhs() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int* = $alloc\n  \
             x:int = $phi(1, p:int*)\n  $ret 0\n}\n",
        );
        assert!(errors.contains("operand type doesn't match left-hand side"));
    }

    #[test]
    fn test_alloc_needs_pointer_result() {
        let errors =
            diagnostics("function main() -> int {\nentry:\n  x:int = $alloc\n  $ret 0\n}\n");
        assert!(errors.contains("result of alloc must be a pointer"));
    }

    #[test]
    fn test_addrof_and_load_and_store_typing() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int** = $addrof x:int\n  \
             y:int = $load q:int**\n  $store z:int 5\n  $ret 0\n}\n",
        );
        assert!(errors.contains("result of addrof must be a pointer to operand type"));
        assert!(errors.contains("source of load must be a pointer to type of result"));
        assert!(errors
            .contains("destination of store must be a pointer to type of stored value"));
    }

    #[test]
    fn test_gep_field_rules() {
        let errors = diagnostics(
            "struct s {\n  f: int\n}\n\nfunction main() -> int {\nentry:\n  \
             a:s* = $alloc\n  x:int* = $gep a:s* 0 nope\n  y:int** = $gep a:s* 0 f\n  \
             $ret 0\n}\n",
        );
        assert!(errors.contains("mismatch between struct type and field name"));
        assert!(errors.contains("Result type must be a pointer to type of field"));
    }

    #[test]
    fn test_select_rules() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int* = $alloc\n  \
             x:int = $select p:int* 1 p:int*\n  $ret 0\n}\n",
        );
        assert!(errors.contains("select condition must be an int"));
        assert!(errors.contains("type of select operands and left-hand side must match"));
    }

    #[test]
    fn test_call_checked_only_when_declared() {
        // External callees go unchecked.
        "function main() -> int {\nentry:\n  x:int = $call external(1, 2, 3)\n  $ret x:int\n}\n"
            .parse::<Program>()
            .unwrap();

        let errors = diagnostics(
            "function foo(a:int) -> int {\nentry:\n  $ret a:int\n}\n\n\
             function main() -> int {\nentry:\n  p:int* = $alloc\n  \
             x:int* = $call foo(p:int*, 2)\n  $ret 0\n}\n",
        );
        assert!(errors.contains("incorrect number of call arguments"));
        assert!(errors.contains("type of argument doesn't match type of parameter"));
        assert!(errors.contains("function return type doesn't match left-hand side"));
    }

    #[test]
    fn test_icall_signature_rules() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int* = $alloc\n  \
             x:int = $icall p:int*()\n  $ret 0\n}\n",
        );
        assert!(errors.contains("calling a non-function pointer"));

        let errors = diagnostics(
            "function foo(a:int*) -> int {\nentry:\n  $ret 0\n}\n\n\
             function main() -> int {\nentry:\n  f:int[int*]* = $copy @foo:int[int*]*\n  \
             x:int* = $icall f:int[int*]*(3, 4)\n  $ret 0\n}\n",
        );
        assert!(errors.contains("incorrect number of call arguments"));
        assert!(errors.contains("type of argument doesn't match type of parameter"));
        assert!(errors.contains("function return type doesn't match left-hand side"));
    }

    #[test]
    fn test_ret_matches_function_return_type() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  p:int* = $alloc\n  $ret p:int*\n}\n",
        );
        assert!(errors.contains("operand type does not match function return type"));
    }

    #[test]
    fn test_branch_labels_must_exist() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  $branch 1 nowhere elsewhere\n}\n",
        );
        assert!(errors
            .contains("Basic block 'main::entry' branches to nonexistent basic block 'nowhere'"));
        assert!(errors
            .contains("Basic block 'main::entry' branches to nonexistent basic block 'elsewhere'"));
    }

    #[test]
    fn test_globals_cannot_be_assigned() {
        let errors = diagnostics(
            "function foo() -> int {\nentry:\n  $ret 0\n}\n\n\
             function main() -> int {\nentry:\n  @foo:int[]* = $copy @foo:int[]*\n  $ret 0\n}\n",
        );
        assert!(errors.contains("cannot be assigned to or stored into"));
    }

    #[test]
    fn test_global_must_name_a_function() {
        let errors = diagnostics(
            "function main() -> int {\nentry:\n  f:int[]* = $copy @ghost:int[]*\n  $ret 0\n}\n",
        );
        assert!(errors
            .contains("Global function pointer doesn't point to a real function: @ghost:int[]*"));
    }

    #[test]
    fn test_func_ptrs_collected() {
        let program = "function foo() -> int {\nentry:\n  $ret 0\n}\n\n\
                       function main() -> int {\nentry:\n  f:int[]* = $copy @foo:int[]*\n  \
                       $ret 0\n}\n"
            .parse::<Program>()
            .unwrap();

        let fptr = program.func_ptrs().get("foo").expect("@foo should be collected");
        assert_eq!(fptr.name(), "@foo");

        // Functions whose address is never taken do not appear.
        assert!(!program.func_ptrs().contains_key("main"));
    }

    #[test]
    fn test_toplevel_type_rules() {
        let errors = diagnostics(
            "struct s {\n  f: int\n}\n\n\
             function main(a:s) -> int {\nentry:\n  x:s = $copy a:s\n  $ret 0\n}\n",
        );
        assert!(errors.contains("Top-level types must be int or pointer: s"));
    }

    #[test]
    fn test_parameters_must_be_distinct_and_local() {
        let param = VarRef::new("@x", Type::int());
        let block = BasicBlock::new(
            "entry",
            vec![crate::ir::instr::RetInst { retval: 0.into() }.into()],
        )
        .unwrap();
        let fun = Function::new(
            "main",
            Type::int(),
            vec![param.clone(), param],
            vec![block],
        )
        .unwrap();

        let err = Program::new(BTreeMap::new(), vec![fun]).unwrap_err();
        let IrError::Malformed(errors) = err else { panic!("expected Malformed") };
        assert!(errors.contains("Duplicate parameter variables for function main"));
        assert!(errors.contains("Cannot use global variable as parameter in function main"));
    }
}
