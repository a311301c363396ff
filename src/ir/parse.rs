//! Parsing IR from its canonical text form.
//!
//! A recursive descent reader over the [`Tokenizer`], configured with the
//! grammar's whitespace, delimiters, and reserved opcode words. The reader
//! maintains three intern tables so that every textual mention of "the same
//! variable" yields the same [`VarRef`]:
//!
//! - locals, keyed by name, cleared at the start of each function;
//! - global function pointers (`@fname`), keyed by name, program-wide;
//! - typed null pointers (`@nullptr`), keyed by type, program-wide.
//!
//! A later mention with a conflicting type is an error. Parsing an
//! instruction, block, or function in isolation allocates fresh variables on
//! every call, even for identical text.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use thiserror::Error;

use crate::tokenizer::{TokenError, Tokenizer};

use super::error::IrError;
use super::instr::{
    AddrOfInst, AllocInst, Aop, ArithInst, BranchInst, CallInst, CmpInst, CopyInst, GepInst,
    ICallInst, Instruction, JumpInst, LoadInst, PhiInst, RetInst, Rop, SelectInst, StoreInst,
};
use super::program::{BasicBlock, BlockRef, FuncRef, Function, Program};
use super::types::Type;
use super::value::{Operand, VarRef};

/// Parse errors. Construction errors (including verifier diagnostics) are
/// wrapped so that `text.parse::<Program>()` reports everything through one
/// type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("line {line}: unknown opcode: {token}")]
    UnknownOpcode { line: u32, token: String },

    #[error("line {line}: unknown arithmetic operation: {token}")]
    UnknownAop { line: u32, token: String },

    #[error("line {line}: unknown comparison operation: {token}")]
    UnknownRop { line: u32, token: String },

    #[error(
        "local variables with same name but different types: \
         {name} with types {first} and {second}"
    )]
    LocalTypeMismatch { name: String, first: Type, second: Type },

    #[error(
        "global function pointers with same name but different types: \
         {name} with types {first} and {second}"
    )]
    GlobalTypeMismatch { name: String, first: Type, second: Type },

    #[error("two structs with same name: {0}")]
    DuplicateStruct(String),

    #[error("two fields of same struct with same name: {0}.{1}")]
    DuplicateField(String, String),

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

const WHITESPACE: &[char] = &[' ', '\n'];

const DELIMITERS: &[&str] = &[":", ",", "=", "->", "*", "[", "]", "{", "}", "(", ")"];

const RESERVED: &[&str] = &[
    "$arith", "$cmp", "$phi", "$copy", "$alloc", "$addrof", "$load", "$store", "$gep",
    "$select", "$call", "$icall", "$ret", "$jump", "$branch",
];

/// Read a type: a base name, any number of `*`, and optionally a bracketed
/// parameter list (turning the prefix into a function type) with more `*`
/// after it.
pub(crate) fn read_type(tk: &mut Tokenizer) -> ParseResult<Type> {
    let name = tk.consume_token()?;
    let mut ty = if name == "int" { Type::int() } else { Type::struct_type(name) };
    while tk.try_consume("*") {
        ty = ty.ptr_to();
    }

    if tk.try_consume("[") {
        let mut types = vec![ty];
        while !tk.try_consume("]") {
            types.push(read_type(tk)?);
            if !tk.next_is("]") {
                tk.consume(",")?;
            }
        }
        ty = Type::function(types);
        while tk.try_consume("*") {
            ty = ty.ptr_to();
        }
    }

    Ok(ty)
}

struct Reader {
    tk: Tokenizer,

    /// Variables local to the current function, by name.
    locals: HashMap<String, VarRef>,

    /// Global function pointer variables, by name.
    func_vars: HashMap<String, VarRef>,

    /// Global null pointer variables, by type.
    null_vars: HashMap<Type, VarRef>,
}

impl Reader {
    fn new(input: &str) -> Self {
        Self {
            tk: Tokenizer::new(input, WHITESPACE, DELIMITERS, RESERVED),
            locals: HashMap::new(),
            func_vars: HashMap::new(),
            null_vars: HashMap::new(),
        }
    }

    /// Read `name:type` and intern the variable in the appropriate table.
    fn read_var(&mut self) -> ParseResult<VarRef> {
        let name = self.tk.consume_token()?;
        self.tk.consume(":")?;
        let ty = read_type(&mut self.tk)?;

        if name == "@nullptr" {
            let var = self
                .null_vars
                .entry(ty.clone())
                .or_insert_with(|| VarRef::new(name, ty.clone()));
            Ok(var.clone())
        } else if name.starts_with('@') {
            match self.func_vars.get(&name).cloned() {
                Some(var) if *var.ty() != ty => Err(ParseError::GlobalTypeMismatch {
                    name,
                    first: var.ty().clone(),
                    second: ty,
                }),
                Some(var) => Ok(var),
                None => {
                    let var = VarRef::new(name.clone(), ty);
                    self.func_vars.insert(name, var.clone());
                    Ok(var)
                }
            }
        } else {
            match self.locals.get(&name).cloned() {
                Some(var) if *var.ty() != ty => Err(ParseError::LocalTypeMismatch {
                    name,
                    first: var.ty().clone(),
                    second: ty,
                }),
                Some(var) => Ok(var),
                None => {
                    let var = VarRef::new(name.clone(), ty);
                    self.locals.insert(name, var.clone());
                    Ok(var)
                }
            }
        }
    }

    /// Read an operand: a signed decimal integer, or failing that a
    /// variable.
    fn read_op(&mut self) -> ParseResult<Operand> {
        let token = self.tk.consume_token()?;
        if let Ok(value) = token.parse::<i64>() {
            return Ok(Operand::Int(value));
        }
        self.tk.put(token);
        Ok(Operand::Var(self.read_var()?))
    }

    /// Read comma-delimited operands inside parentheses.
    fn read_args(&mut self) -> ParseResult<Vec<Operand>> {
        let mut args = Vec::new();
        self.tk.consume("(")?;
        while !self.tk.try_consume(")") {
            args.push(self.read_op()?);
            if !self.tk.next_is(")") {
                self.tk.consume(",")?;
            }
        }
        Ok(args)
    }

    fn read_instruction(&mut self) -> ParseResult<Instruction> {
        if self.tk.try_consume("$store") {
            return Ok(StoreInst { dst: self.read_var()?, value: self.read_op()? }.into());
        }
        if self.tk.try_consume("$jump") {
            return Ok(JumpInst { label: self.tk.consume_token()? }.into());
        }
        if self.tk.try_consume("$branch") {
            return Ok(BranchInst {
                condition: self.read_op()?,
                label_true: self.tk.consume_token()?,
                label_false: self.tk.consume_token()?,
            }
            .into());
        }
        if self.tk.try_consume("$ret") {
            return Ok(RetInst { retval: self.read_op()? }.into());
        }

        // Everything else assigns to a left-hand side.
        let lhs = self.read_var()?;
        self.tk.consume("=")?;

        if self.tk.try_consume("$arith") {
            let token = self.tk.consume_token()?;
            let op = Aop::from_token(&token).ok_or_else(|| ParseError::UnknownAop {
                line: self.tk.line(),
                token: token.clone(),
            })?;
            Ok(ArithInst { lhs, op1: self.read_op()?, op2: self.read_op()?, op }.into())
        } else if self.tk.try_consume("$cmp") {
            let token = self.tk.consume_token()?;
            let op = Rop::from_token(&token).ok_or_else(|| ParseError::UnknownRop {
                line: self.tk.line(),
                token: token.clone(),
            })?;
            Ok(CmpInst { lhs, op1: self.read_op()?, op2: self.read_op()?, op }.into())
        } else if self.tk.try_consume("$phi") {
            Ok(PhiInst { lhs, ops: self.read_args()? }.into())
        } else if self.tk.try_consume("$copy") {
            Ok(CopyInst { lhs, rhs: self.read_op()? }.into())
        } else if self.tk.try_consume("$alloc") {
            Ok(AllocInst { lhs }.into())
        } else if self.tk.try_consume("$addrof") {
            Ok(AddrOfInst { lhs, rhs: self.read_var()? }.into())
        } else if self.tk.try_consume("$load") {
            Ok(LoadInst { lhs, src: self.read_var()? }.into())
        } else if self.tk.try_consume("$gep") {
            let src_ptr = self.read_var()?;
            let index = self.read_op()?;
            // An optional trailing field name: present iff the next token is
            // neither reserved nor the start of the next `name:type`.
            let field = if !self.tk.end_of_input()
                && !self.tk.is_next_reserved()
                && self.tk.peek(1) != ":"
            {
                Some(self.tk.consume_token()?)
            } else {
                None
            };
            Ok(GepInst { lhs, src_ptr, index, field }.into())
        } else if self.tk.try_consume("$select") {
            Ok(SelectInst {
                lhs,
                condition: self.read_op()?,
                true_op: self.read_op()?,
                false_op: self.read_op()?,
            }
            .into())
        } else if self.tk.try_consume("$call") {
            Ok(CallInst { lhs, callee: self.tk.consume_token()?, args: self.read_args()? }
                .into())
        } else if self.tk.try_consume("$icall") {
            Ok(ICallInst { lhs, func_ptr: self.read_var()?, args: self.read_args()? }.into())
        } else {
            Err(ParseError::UnknownOpcode { line: self.tk.line(), token: self.tk.peek(0) })
        }
    }

    /// Read `label:` and instructions up to and including the first
    /// terminator.
    fn read_basic_block(&mut self) -> ParseResult<BlockRef> {
        let label = self.tk.consume_token()?;
        self.tk.consume(":")?;

        let mut body = Vec::new();
        loop {
            body.push(self.read_instruction()?);
            if body.last().map(|inst| inst.is_terminator()).unwrap_or(false) {
                break;
            }
        }

        Ok(BasicBlock::new(label, body)?)
    }

    fn read_function(&mut self) -> ParseResult<FuncRef> {
        // Forget the locals of any previously parsed function.
        self.locals.clear();

        self.tk.consume("function")?;
        let name = self.tk.consume_token()?;

        let mut parameters = Vec::new();
        self.tk.consume("(")?;
        while !self.tk.try_consume(")") {
            let param_name = self.tk.consume_token()?;
            self.tk.consume(":")?;
            let param = VarRef::new(param_name.clone(), read_type(&mut self.tk)?);
            parameters.push(param.clone());
            self.locals.insert(param_name, param);
            if !self.tk.next_is(")") {
                self.tk.consume(",")?;
            }
        }

        self.tk.consume("->")?;
        let return_type = read_type(&mut self.tk)?;

        let mut body = Vec::new();
        self.tk.consume("{")?;
        while !self.tk.try_consume("}") {
            body.push(self.read_basic_block()?);
        }

        Ok(Function::new(name, return_type, parameters, body)?)
    }

    fn read_program(&mut self) -> ParseResult<Program> {
        let mut struct_types: BTreeMap<String, BTreeMap<String, Type>> = BTreeMap::new();

        while self.tk.try_consume("struct") {
            let name = self.tk.consume_token()?;
            if struct_types.contains_key(&name) {
                return Err(ParseError::DuplicateStruct(name));
            }

            let mut fields = BTreeMap::new();
            self.tk.consume("{")?;
            while !self.tk.try_consume("}") {
                let field = self.tk.consume_token()?;
                if fields.contains_key(&field) {
                    return Err(ParseError::DuplicateField(name, field));
                }
                self.tk.consume(":")?;
                fields.insert(field, read_type(&mut self.tk)?);
            }
            struct_types.insert(name, fields);
        }

        let mut functions = Vec::new();
        while !self.tk.end_of_input() {
            functions.push(self.read_function()?);
        }

        Ok(Program::new(struct_types, functions)?)
    }
}

impl FromStr for Type {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Type> {
        let mut tk = Tokenizer::new(s, &[], &["[", "]", ",", "*"], &[]);
        read_type(&mut tk)
    }
}

impl FromStr for Instruction {
    type Err = ParseError;

    /// Each call allocates fresh variables, even for identical text; two
    /// parses of the same instruction never share a [`VarRef`].
    fn from_str(s: &str) -> ParseResult<Instruction> {
        Reader::new(s).read_instruction()
    }
}

impl FromStr for Program {
    type Err = ParseError;

    /// Parse, assemble, and verify a whole program.
    fn from_str(s: &str) -> ParseResult<Program> {
        Reader::new(s).read_program()
    }
}

impl BasicBlock {
    /// Parse a single basic block. Like instruction parsing, every call
    /// allocates fresh variables.
    pub fn from_text(text: &str) -> ParseResult<BlockRef> {
        Reader::new(text).read_basic_block()
    }
}

impl Function {
    /// Parse a single function. Global variables (`@fname`, `@nullptr`) are
    /// interned only within this call.
    pub fn from_text(text: &str) -> ParseResult<FuncRef> {
        Reader::new(text).read_function()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::visitor::IrVisitor;
    use std::collections::HashSet;

    #[test]
    fn test_type_round_trip() {
        for text in ["int", "int**", "foo*", "int[]*", "int[int*,int*]*",
                     "foo**[int,int*,bar*[int,int]*]*"] {
            assert_eq!(text.parse::<Type>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_instruction_round_trip() {
        for text in [
            "x:int = $arith add 1 -2",
            "x:int = $cmp lte y:int 0",
            "x:int = $phi(1, y:int, 3)",
            "x:int = $copy -42",
            "p:int* = $alloc",
            "p:int* = $addrof x:int",
            "x:int = $load p:int*",
            "$store p:int* 42",
            "x:int* = $gep y:int* z:int foo",
            "x:int* = $gep y:int* 42",
            "x:int = $select c:int 1 2",
            "x:int = $call foo(1, y:int)",
            "x:int = $icall fp:int[int]*(7)",
            "$ret 42",
            "$jump exit",
            "$branch c:int a b",
        ] {
            assert_eq!(text.parse::<Instruction>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_gep_field_detection() {
        let bb = BasicBlock::from_text(
            "\nbb:\n  x:int* = $gep y:int* z:int foo\n  a:int* = $gep b:int* 42\n  \
             p:int = $copy 42\n  $ret 0\n",
        )
        .unwrap();
        assert_eq!(bb[0].as_gep().unwrap().field.as_deref(), Some("foo"));
        assert_eq!(bb[1].as_gep().unwrap().field, None);
        assert_eq!(
            bb.to_string(),
            "\nbb:\n  x:int* = $gep y:int* z:int foo\n  a:int* = $gep b:int* 42\n  \
             p:int = $copy 42\n  $ret 0\n"
        );

        // A gep directly before the terminator still resolves the lookahead.
        let bb = BasicBlock::from_text(
            "\nbb:\n  x:int* = $gep y:int* z:int foo\n  a:int* = $gep b:int* 42\n  $ret 0\n",
        )
        .unwrap();
        assert_eq!(bb[1].as_gep().unwrap().field, None);
    }

    #[test]
    fn test_local_interning() {
        let bb = BasicBlock::from_text(
            "\nbb:\n  x:int = $copy 1\n  y:int = $copy x:int\n  $ret x:int\n",
        )
        .unwrap();

        let x1 = bb[0].as_copy().unwrap().lhs.clone();
        let x2 = bb[1].as_copy().unwrap().rhs.as_var().unwrap().clone();
        let x3 = bb[2].as_ret().unwrap().retval.as_var().unwrap().clone();
        assert_eq!(x1, x2);
        assert_eq!(x2, x3);
    }

    #[test]
    fn test_local_type_mismatch() {
        let err = BasicBlock::from_text("\nbb:\n  x:int = $copy 1\n  $ret x:int*\n").unwrap_err();
        assert!(matches!(err, ParseError::LocalTypeMismatch { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_global_type_mismatch() {
        let err = "function foo() -> int {\nentry:\n  $ret 42\n}\n\n\
                   function main() -> int {\nentry:\n  a:int[]* = $copy @foo:int[]*\n  \
                   b:int[int]* = $copy @foo:int[int]*\n  $ret 0\n}\n"
            .parse::<Program>()
            .unwrap_err();
        assert!(matches!(err, ParseError::GlobalTypeMismatch { ref name, .. } if name == "@foo"));
    }

    #[test]
    fn test_global_interning_across_functions() {
        let program = "function foo() -> int {\nentry:\n  \
                       foo_fptr:int[]* = $copy @foo:int[]*\n  \
                       foo_null:int* = $copy @nullptr:int*\n  $ret 42\n}\n\n\
                       function main() -> int {\nentry:\n  \
                       main_fptr:int[]* = $copy @foo:int[]*\n  \
                       main_null:int* = $copy @nullptr:int*\n  $ret 42\n}\n"
            .parse::<Program>()
            .unwrap();

        #[derive(Default)]
        struct VarFinder {
            vars: HashSet<VarRef>,
        }

        impl<'ir> IrVisitor<'ir> for VarFinder {
            fn visit_copy(&mut self, inst: &'ir CopyInst) {
                self.vars.insert(inst.lhs.clone());
                if let Some(var) = inst.rhs.as_var() {
                    self.vars.insert(var.clone());
                }
            }
        }

        // Four distinct locals plus one shared @foo and one shared @nullptr.
        let mut finder = VarFinder::default();
        program.visit(&mut finder);
        assert_eq!(finder.vars.len(), 6);

        // The interned @foo is the one recorded by verification.
        let fptr = program.func_ptrs().get("foo").unwrap();
        assert!(finder.vars.contains(fptr));
    }

    #[test]
    fn test_nullptr_interned_per_type() {
        let bb = BasicBlock::from_text(
            "\nbb:\n  a:int* = $copy @nullptr:int*\n  b:int* = $copy @nullptr:int*\n  \
             c:int** = $copy @nullptr:int**\n  $ret 0\n",
        )
        .unwrap();

        let a = bb[0].as_copy().unwrap().rhs.as_var().unwrap().clone();
        let b = bb[1].as_copy().unwrap().rhs.as_var().unwrap().clone();
        let c = bb[2].as_copy().unwrap().rhs.as_var().unwrap().clone();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_complex_function_pointer_type() {
        let text = "function foo(p1:int*, p2:int*) -> int {\nentry:\n  $ret 42\n}\n\n\
                    function main() -> int {\nentry:\n  \
                    src:int[int*,int*]* = $copy @foo:int[int*,int*]*\n  $ret 0\n}\n\n";
        let program = text.parse::<Program>().unwrap();
        assert_eq!(program.to_string(), text);
    }

    #[test]
    fn test_program_round_trip_is_idempotent() {
        let text = "
            function main() -> int {
              entry:
                x:int = $copy 6
                y:int = $arith div x:int 2
                $jump while_head

              while_head:
                comp:int = $cmp gt y:int 0
                $branch comp:int while_true exit

              while_true:
                comp2:int = $cmp lt y:int x:int
                $branch comp2:int if_true if_false

              if_true:
                x:int = $arith div x:int y:int
                y:int = $arith sub y:int 1
                $jump if_end

              if_false:
                $jump if_end

              if_end:
                x:int = $arith sub x:int 1
                $jump while_head

              exit:
                $ret x:int
            }
        ";

        let canonical = text.parse::<Program>().unwrap().to_string();
        assert_eq!(canonical.parse::<Program>().unwrap().to_string(), canonical);
    }

    #[test]
    fn test_duplicate_struct_rejected() {
        let err = "struct s { f: int }\nstruct s { g: int }\n\
                   function main() -> int {\nentry:\n  $ret 0\n}\n"
            .parse::<Program>()
            .unwrap_err();
        assert_eq!(err, ParseError::DuplicateStruct("s".to_string()));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = "struct s { f: int f: int }\n\
                   function main() -> int {\nentry:\n  $ret 0\n}\n"
            .parse::<Program>()
            .unwrap_err();
        assert_eq!(err, ParseError::DuplicateField("s".to_string(), "f".to_string()));
    }

    #[test]
    fn test_unknown_opcode_reports_line() {
        let err = "x:int = $bogus 1".parse::<Instruction>().unwrap_err();
        assert_eq!(err, ParseError::UnknownOpcode { line: 1, token: "$bogus".to_string() });

        let err =
            BasicBlock::from_text("\nbb:\n  x:int = $bogus 1\n  $ret 0\n").unwrap_err();
        assert_eq!(err, ParseError::UnknownOpcode { line: 3, token: "$bogus".to_string() });
    }

    #[test]
    fn test_verifier_failure_surfaces_as_parse_error() {
        let err = "function main() -> int {\nentry:\n  $ret p:int*\n}\n"
            .parse::<Program>()
            .unwrap_err();
        assert!(matches!(err, ParseError::Ir(IrError::Malformed(_))));
    }

    #[test]
    fn test_negative_integer_operands() {
        let inst = "x:int = $arith add -5 -10".parse::<Instruction>().unwrap();
        let arith = inst.as_arith().unwrap();
        assert_eq!(arith.op1, Operand::Int(-5));
        assert_eq!(arith.op2, Operand::Int(-10));
    }
}
