//! Basic blocks, functions, and programs.
//!
//! These are the owning containers of the IR. Ownership runs downward
//! (Program -> Function -> BasicBlock -> Instruction) through shared
//! handles, and each child keeps a weak back-link to its parent. Building a
//! container re-parents copies of its children with `Rc::new_cyclic`, so the
//! links are set exactly once and the structures are immutable afterwards.
//!
//! [`Program::new`] verifies the whole hierarchy and fails with the
//! collected diagnostics if anything is malformed; a `Program` that exists
//! is well-formed.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;
use std::rc::{Rc, Weak};

use super::error::IrError;
use super::instr::Instruction;
use super::types::Type;
use super::value::VarRef;
use super::verify::verify;
use super::visitor::IrVisitor;

/// A shared instruction within a basic block.
pub type InstRef = Rc<Instruction>;

/// A shared basic block; its address is stable across function copies.
pub type BlockRef = Rc<BasicBlock>;

/// A shared function; its address is stable across program construction.
pub type FuncRef = Rc<Function>;

/// An ordered sequence of instructions ending in a terminator, with a label
/// unique within the containing function.
#[derive(Debug)]
pub struct BasicBlock {
    label: String,
    body: Vec<InstRef>,
    parent: Weak<Function>,
}

impl BasicBlock {
    /// Build a block from detached instructions, re-parenting each under the
    /// new block. Terminator placement is checked later, at program
    /// verification.
    pub fn new(label: impl Into<String>, body: Vec<Instruction>) -> Result<BlockRef, IrError> {
        let label = label.into();
        if label.is_empty() {
            return Err(IrError::EmptyBlockLabel);
        }
        if body.is_empty() {
            return Err(IrError::EmptyBlockBody(label));
        }
        Ok(Self::build(label, body, Weak::new()))
    }

    /// A copy of `block` whose instructions are re-parented under the copy,
    /// which itself is parented under `parent`.
    pub(crate) fn rehomed(block: &BasicBlock, parent: Weak<Function>) -> BlockRef {
        let body = block.body.iter().map(|inst| (**inst).clone()).collect();
        Self::build(block.label.clone(), body, parent)
    }

    fn build(label: String, body: Vec<Instruction>, parent: Weak<Function>) -> BlockRef {
        Rc::new_cyclic(|weak: &Weak<BasicBlock>| BasicBlock {
            label,
            body: body
                .into_iter()
                .map(|inst| Rc::new(inst.with_parent(weak.clone())))
                .collect(),
            parent,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn body(&self) -> &[InstRef] {
        &self.body
    }

    /// The containing function, if this block has been installed in one.
    pub fn parent(&self) -> Option<FuncRef> {
        self.parent.upgrade()
    }

    pub fn get(&self, index: usize) -> Option<&InstRef> {
        self.body.get(index)
    }

    pub fn visit<'ir>(&'ir self, visitor: &mut dyn IrVisitor<'ir>) {
        visitor.visit_basic_block(self);
        for inst in &self.body {
            inst.visit(visitor);
        }
        visitor.visit_basic_block_post(self);
    }
}

impl Index<usize> for BasicBlock {
    type Output = Instruction;

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    fn index(&self, index: usize) -> &Instruction {
        &self.body[index]
    }
}

/// A function: a return type, parameters, and a label-keyed body of basic
/// blocks containing one named `entry`.
#[derive(Debug)]
pub struct Function {
    name: String,
    return_type: Type,
    parameters: Vec<VarRef>,
    body: BTreeMap<String, BlockRef>,
}

impl Function {
    /// Build a function, re-parenting a copy of every block under it.
    /// Duplicate labels are rejected; the presence of `entry` is checked at
    /// program verification.
    pub fn new(
        name: impl Into<String>,
        return_type: Type,
        parameters: Vec<VarRef>,
        body: Vec<BlockRef>,
    ) -> Result<FuncRef, IrError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IrError::EmptyFunctionName);
        }
        if body.is_empty() {
            return Err(IrError::EmptyFunctionBody(name));
        }

        let mut labels = BTreeSet::new();
        for block in &body {
            if !labels.insert(block.label().to_string()) {
                return Err(IrError::DuplicateLabel(block.label().to_string()));
            }
        }

        Ok(Rc::new_cyclic(|weak: &Weak<Function>| {
            let mut blocks = BTreeMap::new();
            for block in &body {
                blocks.insert(
                    block.label().to_string(),
                    BasicBlock::rehomed(block, weak.clone()),
                );
            }
            Function { name, return_type, parameters, body: blocks }
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn parameters(&self) -> &[VarRef] {
        &self.parameters
    }

    /// The blocks of this function, keyed (and therefore ordered) by label.
    pub fn body(&self) -> &BTreeMap<String, BlockRef> {
        &self.body
    }

    pub fn get(&self, label: &str) -> Option<&BlockRef> {
        self.body.get(label)
    }

    pub fn visit<'ir>(&'ir self, visitor: &mut dyn IrVisitor<'ir>) {
        visitor.visit_function(self);
        for block in self.body.values() {
            block.visit(visitor);
        }
        visitor.visit_function_post(self);
    }
}

impl Index<&str> for Function {
    type Output = BasicBlock;

    /// # Panics
    ///
    /// Panics if no block has the given label.
    fn index(&self, label: &str) -> &BasicBlock {
        match self.body.get(label) {
            Some(block) => block,
            None => panic!("unknown basic block label: {label}"),
        }
    }
}

/// A whole program: struct type declarations plus name-keyed functions, one
/// of which is `main`.
///
/// Construction runs the verifier; the `func_ptrs` table it collects maps
/// each function whose address is taken somewhere in the code to the single
/// interned `@fname` variable.
#[derive(Debug)]
pub struct Program {
    struct_types: BTreeMap<String, BTreeMap<String, Type>>,
    functions: BTreeMap<String, FuncRef>,
    func_ptrs: BTreeMap<String, VarRef>,
}

impl Program {
    /// Assemble and verify a program. Fails with
    /// [`IrError::Malformed`] carrying every collected diagnostic if the
    /// program breaks any well-formedness rule.
    pub fn new(
        struct_types: BTreeMap<String, BTreeMap<String, Type>>,
        functions: Vec<FuncRef>,
    ) -> Result<Program, IrError> {
        let mut map = BTreeMap::new();
        for function in functions {
            if map.contains_key(function.name()) {
                return Err(IrError::DuplicateFunction(function.name().to_string()));
            }
            map.insert(function.name().to_string(), function);
        }

        let mut program = Program { struct_types, functions: map, func_ptrs: BTreeMap::new() };

        let (errors, func_ptrs) = verify(&program);
        if !errors.is_empty() {
            return Err(IrError::Malformed(errors));
        }
        program.func_ptrs = func_ptrs;
        Ok(program)
    }

    /// Struct name -> (field name -> field type), ordered by name.
    pub fn struct_types(&self) -> &BTreeMap<String, BTreeMap<String, Type>> {
        &self.struct_types
    }

    /// Function name -> function, ordered by name.
    pub fn functions(&self) -> &BTreeMap<String, FuncRef> {
        &self.functions
    }

    /// Function name -> interned `@fname` variable, for those functions
    /// whose address is taken somewhere in the program.
    pub fn func_ptrs(&self) -> &BTreeMap<String, VarRef> {
        &self.func_ptrs
    }

    pub fn get(&self, name: &str) -> Option<&FuncRef> {
        self.functions.get(name)
    }

    pub fn visit<'ir>(&'ir self, visitor: &mut dyn IrVisitor<'ir>) {
        visitor.visit_program(self);

        for (name, fields) in &self.struct_types {
            visitor.visit_struct_type(name, fields);
        }

        for function in self.functions.values() {
            function.visit(visitor);
        }

        visitor.visit_program_post(self);
    }
}

impl Index<&str> for Program {
    type Output = Function;

    /// # Panics
    ///
    /// Panics if no function has the given name.
    fn index(&self, name: &str) -> &Function {
        match self.functions.get(name) {
            Some(function) => function,
            None => panic!("unknown function name: {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::{CopyInst, RetInst};
    use crate::ir::value::VarRef;

    fn ret_block(label: &str) -> BlockRef {
        BasicBlock::new(label, vec![RetInst { retval: 42.into() }.into()]).unwrap()
    }

    #[test]
    fn test_empty_label_rejected() {
        let result = BasicBlock::new("", vec![RetInst { retval: 0.into() }.into()]);
        assert_eq!(result.unwrap_err(), IrError::EmptyBlockLabel);
    }

    #[test]
    fn test_empty_body_rejected() {
        assert_eq!(
            BasicBlock::new("foo", vec![]).unwrap_err(),
            IrError::EmptyBlockBody("foo".to_string())
        );
    }

    #[test]
    fn test_empty_function_name_rejected() {
        assert_eq!(
            Function::new("", Type::int(), vec![], vec![ret_block("entry")]).unwrap_err(),
            IrError::EmptyFunctionName
        );
    }

    #[test]
    fn test_empty_function_body_rejected() {
        assert_eq!(
            Function::new("foo", Type::int(), vec![], vec![]).unwrap_err(),
            IrError::EmptyFunctionBody("foo".to_string())
        );
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        assert_eq!(
            Function::new(
                "foo",
                Type::int(),
                vec![],
                vec![ret_block("entry"), ret_block("entry")]
            )
            .unwrap_err(),
            IrError::DuplicateLabel("entry".to_string())
        );
    }

    #[test]
    fn test_duplicate_functions_rejected() {
        let f1 = Function::new("main", Type::int(), vec![], vec![ret_block("entry")]).unwrap();
        let f2 = Function::new("main", Type::int(), vec![], vec![ret_block("entry")]).unwrap();
        assert_eq!(
            Program::new(BTreeMap::new(), vec![f1, f2]).unwrap_err(),
            IrError::DuplicateFunction("main".to_string())
        );
    }

    #[test]
    fn test_instruction_parent_and_index() {
        let var = VarRef::new("x", Type::int());
        let block = BasicBlock::new(
            "entry",
            vec![
                CopyInst { lhs: var.clone(), rhs: 1.into() }.into(),
                CopyInst { lhs: var, rhs: 2.into() }.into(),
                RetInst { retval: 0.into() }.into(),
            ],
        )
        .unwrap();

        for (i, inst) in block.body().iter().enumerate() {
            assert_eq!(inst.index(), Some(i));
            let parent = inst.parent().unwrap();
            assert!(Rc::ptr_eq(&parent, &block));
        }
    }

    #[test]
    fn test_block_parent_rewired_by_function() {
        let block = ret_block("entry");
        assert!(block.parent().is_none());

        let function = Function::new("main", Type::int(), vec![], vec![block]).unwrap();
        let installed = &function["entry"];
        let parent = installed.parent().unwrap();
        assert!(Rc::ptr_eq(&parent, &function));

        // Instructions inside the rehomed block point at the rehomed block.
        for inst in installed.body() {
            assert!(Rc::ptr_eq(&inst.parent().unwrap(), function.get("entry").unwrap()));
        }
    }

    #[test]
    fn test_lookups() {
        let function = Function::new("main", Type::int(), vec![], vec![ret_block("entry")])
            .unwrap();
        let program = Program::new(BTreeMap::new(), vec![function]).unwrap();

        assert!(program.get("main").is_some());
        assert!(program.get("nope").is_none());
        assert_eq!(program["main"].name(), "main");
        assert_eq!(program["main"]["entry"].label(), "entry");
        assert!(program["main"]["entry"][0].is_terminator());
    }

    #[test]
    #[should_panic(expected = "unknown function name")]
    fn test_unknown_function_panics() {
        let function = Function::new("main", Type::int(), vec![], vec![ret_block("entry")])
            .unwrap();
        let program = Program::new(BTreeMap::new(), vec![function]).unwrap();
        let _ = &program["nope"];
    }
}
