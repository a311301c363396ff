//! Incremental program construction.
//!
//! The builder is a linear state machine: stream in struct types, then for
//! each function its parameters, basic blocks, and instructions, and
//! finalize at the end. Starting a new function implicitly ends the current
//! block and function; starting a new block implicitly ends the current
//! block. Finalizing assembles the [`Program`], which triggers
//! verification.
//!
//! Every operation returns `Result<&mut Self, _>` so calls chain with `?`.

use std::collections::BTreeMap;

use super::error::IrError;
use super::instr::Instruction;
use super::program::{BasicBlock, BlockRef, FuncRef, Function, Program};
use super::types::Type;
use super::value::VarRef;

#[derive(Debug)]
pub struct Builder {
    struct_types: BTreeMap<String, BTreeMap<String, Type>>,
    functions: Vec<FuncRef>,

    /// The function under construction; empty name means none.
    curr_name: String,
    curr_return_type: Type,
    curr_parameters: Vec<VarRef>,
    curr_blocks: Vec<BlockRef>,

    /// The basic block under construction; empty label means none.
    curr_label: String,
    curr_body: Vec<Instruction>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            struct_types: BTreeMap::new(),
            functions: Vec::new(),
            curr_name: String::new(),
            curr_return_type: Type::int(),
            curr_parameters: Vec::new(),
            curr_blocks: Vec::new(),
            curr_label: String::new(),
            curr_body: Vec::new(),
        }
    }

    /// Declare a struct type for the whole program.
    pub fn add_struct_type(
        &mut self,
        name: impl Into<String>,
        fields: BTreeMap<String, Type>,
    ) -> Result<&mut Self, IrError> {
        let name = name.into();
        if self.struct_types.contains_key(&name) {
            return Err(IrError::DuplicateStruct(name));
        }
        if fields.is_empty() {
            return Err(IrError::EmptyStruct(name));
        }
        self.struct_types.insert(name, fields);
        Ok(self)
    }

    /// Begin a new function, ending any function in progress.
    pub fn start_function(
        &mut self,
        name: impl Into<String>,
        return_type: Type,
    ) -> Result<&mut Self, IrError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IrError::EmptyFunctionName);
        }
        if !self.curr_label.is_empty() {
            self.finish_block()?;
            self.finish_function()?;
        }
        self.curr_name = name;
        self.curr_return_type = return_type;
        Ok(self)
    }

    /// Add a parameter to the function in progress.
    pub fn add_parameter(&mut self, param: VarRef) -> Result<&mut Self, IrError> {
        if self.curr_name.is_empty() {
            return Err(IrError::ParameterOutsideFunction(param.to_string()));
        }
        self.curr_parameters.push(param);
        Ok(self)
    }

    /// Begin a new basic block, ending any block in progress.
    pub fn start_basic_block(&mut self, label: impl Into<String>) -> Result<&mut Self, IrError> {
        let label = label.into();
        if label.is_empty() {
            return Err(IrError::EmptyBlockLabel);
        }
        if self.curr_name.is_empty() {
            return Err(IrError::BlockOutsideFunction(label));
        }
        if !self.curr_label.is_empty() {
            self.finish_block()?;
        }
        self.curr_label = label;
        Ok(self)
    }

    /// Append an instruction to the block in progress.
    pub fn add_instruction(
        &mut self,
        inst: impl Into<Instruction>,
    ) -> Result<&mut Self, IrError> {
        let inst = inst.into();
        if self.curr_label.is_empty() {
            return Err(IrError::InstructionOutsideBlock(inst.to_string()));
        }
        self.curr_body.push(inst);
        Ok(self)
    }

    /// Flush the pending block and function, assemble the program, and
    /// verify it. The builder is drained and starts over empty.
    pub fn finalize_program(&mut self) -> Result<Program, IrError> {
        self.finish_block()?;
        self.finish_function()?;
        Program::new(
            std::mem::take(&mut self.struct_types),
            std::mem::take(&mut self.functions),
        )
    }

    fn finish_block(&mut self) -> Result<(), IrError> {
        if self.curr_label.is_empty() {
            return Err(IrError::NoCurrentBlock);
        }
        let label = std::mem::take(&mut self.curr_label);
        let body = std::mem::take(&mut self.curr_body);
        self.curr_blocks.push(BasicBlock::new(label, body)?);
        Ok(())
    }

    fn finish_function(&mut self) -> Result<(), IrError> {
        let name = std::mem::take(&mut self.curr_name);
        let return_type = std::mem::replace(&mut self.curr_return_type, Type::int());
        let parameters = std::mem::take(&mut self.curr_parameters);
        let blocks = std::mem::take(&mut self.curr_blocks);
        self.functions.push(Function::new(name, return_type, parameters, blocks)?);
        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
