//! The instruction family.
//!
//! Fifteen instruction variants behind one sum type. Every variant except
//! the terminators (`ret`, `jump`, `branch`) and `store` assigns to a
//! left-hand-side variable. The enclosing [`Instruction`] adds a weak
//! back-link to the containing basic block, set when the block is built and
//! never touched afterwards.

use std::fmt;
use std::rc::{Rc, Weak};

use super::program::{BasicBlock, BlockRef};
use super::value::{Operand, VarRef};
use super::visitor::IrVisitor;

/// Arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aop {
    Add,
    Sub,
    Mul,
    Div,
}

impl Aop {
    /// The operation named by `token`, if any.
    pub fn from_token(token: &str) -> Option<Aop> {
        match token {
            "add" => Some(Aop::Add),
            "sub" => Some(Aop::Sub),
            "mul" => Some(Aop::Mul),
            "div" => Some(Aop::Div),
            _ => None,
        }
    }
}

impl fmt::Display for Aop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aop::Add => write!(f, "add"),
            Aop::Sub => write!(f, "sub"),
            Aop::Mul => write!(f, "mul"),
            Aop::Div => write!(f, "div"),
        }
    }
}

/// Relational operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rop {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl Rop {
    /// The operation named by `token`, if any.
    pub fn from_token(token: &str) -> Option<Rop> {
        match token {
            "eq" => Some(Rop::Eq),
            "neq" => Some(Rop::Neq),
            "lt" => Some(Rop::Lt),
            "gt" => Some(Rop::Gt),
            "lte" => Some(Rop::Lte),
            "gte" => Some(Rop::Gte),
            _ => None,
        }
    }
}

impl fmt::Display for Rop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rop::Eq => write!(f, "eq"),
            Rop::Neq => write!(f, "neq"),
            Rop::Lt => write!(f, "lt"),
            Rop::Gt => write!(f, "gt"),
            Rop::Lte => write!(f, "lte"),
            Rop::Gte => write!(f, "gte"),
        }
    }
}

/// Arithmetic: `lhs = op1 <op> op2`.
#[derive(Debug, Clone)]
pub struct ArithInst {
    pub lhs: VarRef,
    pub op1: Operand,
    pub op2: Operand,
    pub op: Aop,
}

/// Comparison: `lhs = (op1 <op> op2)`; `lhs` is 1 for true, 0 for false.
#[derive(Debug, Clone)]
pub struct CmpInst {
    pub lhs: VarRef,
    pub op1: Operand,
    pub op2: Operand,
    pub op: Rop,
}

/// Phi: `lhs` is a copy of one of the operands, depending on which
/// predecessor block execution came from.
#[derive(Debug, Clone)]
pub struct PhiInst {
    pub lhs: VarRef,
    pub ops: Vec<Operand>,
}

/// Copy: `lhs = rhs`.
#[derive(Debug, Clone)]
pub struct CopyInst {
    pub lhs: VarRef,
    pub rhs: Operand,
}

/// Memory allocation. The type of `lhs` determines what is allocated; how
/// many of them is left unspecified (it may be an array).
#[derive(Debug, Clone)]
pub struct AllocInst {
    pub lhs: VarRef,
}

/// Address of a local: `lhs = &rhs`.
#[derive(Debug, Clone)]
pub struct AddrOfInst {
    pub lhs: VarRef,
    pub rhs: VarRef,
}

/// Load: `lhs = *src`.
#[derive(Debug, Clone)]
pub struct LoadInst {
    pub lhs: VarRef,
    pub src: VarRef,
}

/// Store: `*dst = value`.
#[derive(Debug, Clone)]
pub struct StoreInst {
    pub dst: VarRef,
    pub value: Operand,
}

/// GetElementPtr: advance the value of `src_ptr` by `index` elements, then
/// (if a field is given and the pointee is a struct) to the named field
/// within a single struct.
#[derive(Debug, Clone)]
pub struct GepInst {
    pub lhs: VarRef,
    pub src_ptr: VarRef,
    pub index: Operand,
    pub field: Option<String>,
}

/// Ternary: `lhs = condition ? true_op : false_op`.
#[derive(Debug, Clone)]
pub struct SelectInst {
    pub lhs: VarRef,
    pub condition: Operand,
    pub true_op: Operand,
    pub false_op: Operand,
}

/// Direct call: `lhs = callee(args)`. The callee may be external to the
/// program.
#[derive(Debug, Clone)]
pub struct CallInst {
    pub lhs: VarRef,
    pub callee: String,
    pub args: Vec<Operand>,
}

/// Indirect call through a function pointer: `lhs = (*func_ptr)(args)`.
#[derive(Debug, Clone)]
pub struct ICallInst {
    pub lhs: VarRef,
    pub func_ptr: VarRef,
    pub args: Vec<Operand>,
}

/// Return from the containing function.
#[derive(Debug, Clone)]
pub struct RetInst {
    pub retval: Operand,
}

/// Unconditional jump to a basic block in the same function.
#[derive(Debug, Clone)]
pub struct JumpInst {
    pub label: String,
}

/// Two-way branch on an integer condition.
#[derive(Debug, Clone)]
pub struct BranchInst {
    pub condition: Operand,
    pub label_true: String,
    pub label_false: String,
}

/// The instruction sum type.
#[derive(Debug, Clone)]
pub enum InstKind {
    Arith(ArithInst),
    Cmp(CmpInst),
    Phi(PhiInst),
    Copy(CopyInst),
    Alloc(AllocInst),
    AddrOf(AddrOfInst),
    Load(LoadInst),
    Store(StoreInst),
    Gep(GepInst),
    Select(SelectInst),
    Call(CallInst),
    ICall(ICallInst),
    Ret(RetInst),
    Jump(JumpInst),
    Branch(BranchInst),
}

/// An instruction: one of the fifteen variants plus a back-link to the
/// containing basic block (dangling while detached).
#[derive(Debug, Clone)]
pub struct Instruction {
    kind: InstKind,
    parent: Weak<BasicBlock>,
}

impl Instruction {
    /// A detached instruction; it acquires a parent when a basic block is
    /// built from it.
    pub fn new(kind: InstKind) -> Self {
        Self { kind, parent: Weak::new() }
    }

    /// A copy of this instruction re-parented under `parent`.
    pub(crate) fn with_parent(&self, parent: Weak<BasicBlock>) -> Self {
        Self { kind: self.kind.clone(), parent }
    }

    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// The containing basic block, if the instruction is attached and the
    /// block is still alive.
    pub fn parent(&self) -> Option<BlockRef> {
        self.parent.upgrade()
    }

    /// The position of this instruction within its containing basic block,
    /// or `None` when detached. Identity, not structure, decides which entry
    /// is "this" instruction.
    pub fn index(&self) -> Option<usize> {
        let parent = self.parent.upgrade()?;
        let pos = parent
            .body()
            .iter()
            .position(|inst| std::ptr::eq(Rc::as_ptr(inst), self));
        pos
    }

    /// Whether this instruction ends a basic block (`ret`, `jump`,
    /// `branch`).
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Ret(_) | InstKind::Jump(_) | InstKind::Branch(_)
        )
    }

    pub fn as_arith(&self) -> Option<&ArithInst> {
        match &self.kind {
            InstKind::Arith(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_cmp(&self) -> Option<&CmpInst> {
        match &self.kind {
            InstKind::Cmp(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_phi(&self) -> Option<&PhiInst> {
        match &self.kind {
            InstKind::Phi(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_copy(&self) -> Option<&CopyInst> {
        match &self.kind {
            InstKind::Copy(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_alloc(&self) -> Option<&AllocInst> {
        match &self.kind {
            InstKind::Alloc(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_addrof(&self) -> Option<&AddrOfInst> {
        match &self.kind {
            InstKind::AddrOf(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_load(&self) -> Option<&LoadInst> {
        match &self.kind {
            InstKind::Load(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&StoreInst> {
        match &self.kind {
            InstKind::Store(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_gep(&self) -> Option<&GepInst> {
        match &self.kind {
            InstKind::Gep(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&SelectInst> {
        match &self.kind {
            InstKind::Select(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallInst> {
        match &self.kind {
            InstKind::Call(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_icall(&self) -> Option<&ICallInst> {
        match &self.kind {
            InstKind::ICall(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_ret(&self) -> Option<&RetInst> {
        match &self.kind {
            InstKind::Ret(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_jump(&self) -> Option<&JumpInst> {
        match &self.kind {
            InstKind::Jump(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_branch(&self) -> Option<&BranchInst> {
        match &self.kind {
            InstKind::Branch(inst) => Some(inst),
            _ => None,
        }
    }

    /// Visitor dispatch: the general hook, then the variant-specific hook,
    /// then the post hook.
    pub fn visit<'ir>(&'ir self, visitor: &mut dyn IrVisitor<'ir>) {
        visitor.visit_inst(self);

        match &self.kind {
            InstKind::Arith(inst) => visitor.visit_arith(inst),
            InstKind::Cmp(inst) => visitor.visit_cmp(inst),
            InstKind::Phi(inst) => visitor.visit_phi(inst),
            InstKind::Copy(inst) => visitor.visit_copy(inst),
            InstKind::Alloc(inst) => visitor.visit_alloc(inst),
            InstKind::AddrOf(inst) => visitor.visit_addrof(inst),
            InstKind::Load(inst) => visitor.visit_load(inst),
            InstKind::Store(inst) => visitor.visit_store(inst),
            InstKind::Gep(inst) => visitor.visit_gep(inst),
            InstKind::Select(inst) => visitor.visit_select(inst),
            InstKind::Call(inst) => visitor.visit_call(inst),
            InstKind::ICall(inst) => visitor.visit_icall(inst),
            InstKind::Ret(inst) => visitor.visit_ret(inst),
            InstKind::Jump(inst) => visitor.visit_jump(inst),
            InstKind::Branch(inst) => visitor.visit_branch(inst),
        }

        visitor.visit_inst_post(self);
    }
}

impl From<ArithInst> for Instruction {
    fn from(inst: ArithInst) -> Self {
        Instruction::new(InstKind::Arith(inst))
    }
}

impl From<CmpInst> for Instruction {
    fn from(inst: CmpInst) -> Self {
        Instruction::new(InstKind::Cmp(inst))
    }
}

impl From<PhiInst> for Instruction {
    fn from(inst: PhiInst) -> Self {
        Instruction::new(InstKind::Phi(inst))
    }
}

impl From<CopyInst> for Instruction {
    fn from(inst: CopyInst) -> Self {
        Instruction::new(InstKind::Copy(inst))
    }
}

impl From<AllocInst> for Instruction {
    fn from(inst: AllocInst) -> Self {
        Instruction::new(InstKind::Alloc(inst))
    }
}

impl From<AddrOfInst> for Instruction {
    fn from(inst: AddrOfInst) -> Self {
        Instruction::new(InstKind::AddrOf(inst))
    }
}

impl From<LoadInst> for Instruction {
    fn from(inst: LoadInst) -> Self {
        Instruction::new(InstKind::Load(inst))
    }
}

impl From<StoreInst> for Instruction {
    fn from(inst: StoreInst) -> Self {
        Instruction::new(InstKind::Store(inst))
    }
}

impl From<GepInst> for Instruction {
    fn from(inst: GepInst) -> Self {
        Instruction::new(InstKind::Gep(inst))
    }
}

impl From<SelectInst> for Instruction {
    fn from(inst: SelectInst) -> Self {
        Instruction::new(InstKind::Select(inst))
    }
}

impl From<CallInst> for Instruction {
    fn from(inst: CallInst) -> Self {
        Instruction::new(InstKind::Call(inst))
    }
}

impl From<ICallInst> for Instruction {
    fn from(inst: ICallInst) -> Self {
        Instruction::new(InstKind::ICall(inst))
    }
}

impl From<RetInst> for Instruction {
    fn from(inst: RetInst) -> Self {
        Instruction::new(InstKind::Ret(inst))
    }
}

impl From<JumpInst> for Instruction {
    fn from(inst: JumpInst) -> Self {
        Instruction::new(InstKind::Jump(inst))
    }
}

impl From<BranchInst> for Instruction {
    fn from(inst: BranchInst) -> Self {
        Instruction::new(InstKind::Branch(inst))
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Operand]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for ArithInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $arith {} {} {}", self.lhs, self.op, self.op1, self.op2)
    }
}

impl fmt::Display for CmpInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $cmp {} {} {}", self.lhs, self.op, self.op1, self.op2)
    }
}

impl fmt::Display for PhiInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $phi(", self.lhs)?;
        write_args(f, &self.ops)?;
        write!(f, ")")
    }
}

impl fmt::Display for CopyInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $copy {}", self.lhs, self.rhs)
    }
}

impl fmt::Display for AllocInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $alloc", self.lhs)
    }
}

impl fmt::Display for AddrOfInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $addrof {}", self.lhs, self.rhs)
    }
}

impl fmt::Display for LoadInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $load {}", self.lhs, self.src)
    }
}

impl fmt::Display for StoreInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$store {} {}", self.dst, self.value)
    }
}

impl fmt::Display for GepInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $gep {} {}", self.lhs, self.src_ptr, self.index)?;
        if let Some(field) = &self.field {
            write!(f, " {field}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = $select {} {} {}",
            self.lhs, self.condition, self.true_op, self.false_op
        )
    }
}

impl fmt::Display for CallInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $call {}(", self.lhs, self.callee)?;
        write_args(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for ICallInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = $icall {}(", self.lhs, self.func_ptr)?;
        write_args(f, &self.args)?;
        write!(f, ")")
    }
}

impl fmt::Display for RetInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$ret {}", self.retval)
    }
}

impl fmt::Display for JumpInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$jump {}", self.label)
    }
}

impl fmt::Display for BranchInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "$branch {} {} {}",
            self.condition, self.label_true, self.label_false
        )
    }
}

/// A standalone instruction renders as a single unindented line with no
/// trailing newline; the canonical serializer supplies both.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstKind::Arith(inst) => inst.fmt(f),
            InstKind::Cmp(inst) => inst.fmt(f),
            InstKind::Phi(inst) => inst.fmt(f),
            InstKind::Copy(inst) => inst.fmt(f),
            InstKind::Alloc(inst) => inst.fmt(f),
            InstKind::AddrOf(inst) => inst.fmt(f),
            InstKind::Load(inst) => inst.fmt(f),
            InstKind::Store(inst) => inst.fmt(f),
            InstKind::Gep(inst) => inst.fmt(f),
            InstKind::Select(inst) => inst.fmt(f),
            InstKind::Call(inst) => inst.fmt(f),
            InstKind::ICall(inst) => inst.fmt(f),
            InstKind::Ret(inst) => inst.fmt(f),
            InstKind::Jump(inst) => inst.fmt(f),
            InstKind::Branch(inst) => inst.fmt(f),
        }
    }
}
