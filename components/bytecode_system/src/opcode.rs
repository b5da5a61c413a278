//! Opcodes for the register VM
//!
//! Every instruction carries four `i64` arguments; the meaning of each
//! argument is listed on the variant. `dst?` marks a destination that may be
//! [`ARG_INVALID`](crate::ARG_INVALID), in which case the result is discarded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Loads
    /// `dst lit`: load literal
    Load,
    /// `dst imm`: load integer immediate
    LoadInteger,
    /// `dst bits`: load float immediate (raw `f64` bits)
    LoadFloat,
    /// `dst b`: load bool immediate
    LoadBool,
    /// `d1 l1 d2 l2`: two literal loads
    DLoad,
    /// `start count`: null out a run of registers
    LoadNulls,
    /// `dst`: load the root table
    LoadRoot,
    /// `dst src`: register copy
    Move,
    /// `d1 s1 d2 s2`: two register copies
    DMove,

    // Outers
    /// `dst idx`: read captured variable
    GetOuter,
    /// `dst? idx src`: write captured variable
    SetOuter,

    // Members
    /// `dst key obj`: member read
    Get,
    /// `dst lit obj`: member read with literal key
    GetK,
    /// `dst? obj key val`: member write of an existing slot
    Set,
    /// `dst? obj key val`: create slot
    NewSlot,
    /// `flags cls key val`: create class member with flags
    NewSlotA,
    /// `dst obj key`: remove slot
    Delete,

    // Arithmetic
    /// `dst lhs rhs`
    Add,
    /// `dst lhs rhs`
    Sub,
    /// `dst lhs rhs`
    Mul,
    /// `dst lhs rhs`
    Div,
    /// `dst lhs rhs`
    Mod,
    /// `dst lhs rhs`: exponentiation
    Exp,
    /// `dst lhs rhs op`: bitwise operation, see [`BitwiseOp`]
    Bitwise,
    /// `dst src`: numeric negation
    Neg,
    /// `dst src`: logical not
    Not,
    /// `dst src`: bitwise not
    BitNot,

    // Comparison
    /// `dst lhs rhs`
    Eq,
    /// `dst lhs rhs`
    Neq,
    /// `dst lit rhs`
    EqK,
    /// `dst lit rhs`
    NeqK,
    /// `dst lhs rhs op`: ordering comparison, see [`CmpOp`]
    Cmp,
    /// `op offset lhs rhs`: jump by `offset` when the comparison is false
    JCmp,

    // Control flow
    /// `_ offset`
    Jmp,
    /// `cond offset`: jump when `cond` is falsy
    Jz,
    /// `dst offset src`: short-circuit and
    And,
    /// `dst offset src`: short-circuit or
    Or,

    // Calls
    /// `dst key obj this`: resolve a method and its receiver
    PrepCall,
    /// `dst lit obj this`: resolve a method by literal key
    PrepCallK,
    /// `dst? callee base nargs`
    Call,
    /// `dst? callee base nargs`: call that reuses the current frame
    TailCall,
    /// `src?`: return from the current function
    Return,
    /// `_ pos`: close outers at or above `pos`
    Close,
    /// `dst func`: instantiate a nested prototype
    Closure,

    // Objects
    /// `dst a1 a2 kind`: create dict, array or class, see [`NewObjectKind`]
    NewObject,
    /// `arr val kind`: push onto an array, see [`AppendKind`]
    AppendToArray,
    /// `dst src`
    TypeOf,
    /// `dst cls obj`
    InstanceOf,
    /// `dst obj key`
    Exists,
    /// `dst`: base class of the current method's class
    GetBase,
    /// `dst src`: deep copy
    Clone,
    /// `container offset base`: iterate; `base..base+3` hold key, value and iterator state
    Foreach,
}

impl Opcode {
    /// Mnemonic used by the disassembler
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Load => "LOAD",
            Opcode::LoadInteger => "LOADINTEGER",
            Opcode::LoadFloat => "LOADFLOAT",
            Opcode::LoadBool => "LOADBOOL",
            Opcode::DLoad => "DLOAD",
            Opcode::LoadNulls => "LOADNULLS",
            Opcode::LoadRoot => "LOADROOT",
            Opcode::Move => "MOVE",
            Opcode::DMove => "DMOVE",
            Opcode::GetOuter => "GETOUTER",
            Opcode::SetOuter => "SETOUTER",
            Opcode::Get => "GET",
            Opcode::GetK => "GETK",
            Opcode::Set => "SET",
            Opcode::NewSlot => "NEWSLOT",
            Opcode::NewSlotA => "NEWSLOTA",
            Opcode::Delete => "DELETE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Exp => "EXP",
            Opcode::Bitwise => "BITWISE",
            Opcode::Neg => "NEG",
            Opcode::Not => "NOT",
            Opcode::BitNot => "BITNOT",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::EqK => "EQK",
            Opcode::NeqK => "NEQK",
            Opcode::Cmp => "CMP",
            Opcode::JCmp => "JCMP",
            Opcode::Jmp => "JMP",
            Opcode::Jz => "JZ",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::PrepCall => "PREPCALL",
            Opcode::PrepCallK => "PREPCALLK",
            Opcode::Call => "CALL",
            Opcode::TailCall => "TAILCALL",
            Opcode::Return => "RETURN",
            Opcode::Close => "CLOSE",
            Opcode::Closure => "CLOSURE",
            Opcode::NewObject => "NEWOBJECT",
            Opcode::AppendToArray => "APPENDTOARRAY",
            Opcode::TypeOf => "TYPEOF",
            Opcode::InstanceOf => "INSTANCEOF",
            Opcode::Exists => "EXISTS",
            Opcode::GetBase => "GETBASE",
            Opcode::Clone => "CLONE",
            Opcode::Foreach => "FOREACH",
        }
    }

    /// Check if this opcode writes its result to `arg0`, which the MOVE fusion
    /// may retarget
    pub fn is_retargetable(self) -> bool {
        matches!(
            self,
            Opcode::Get
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Exp
                | Opcode::Bitwise
                | Opcode::LoadInteger
                | Opcode::LoadFloat
                | Opcode::LoadBool
                | Opcode::Load
        )
    }

    /// Check if this opcode is a binary arithmetic operation
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod | Opcode::Exp
        )
    }

    /// Check if this opcode carries a relative jump in `arg1`
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::Jz | Opcode::JCmp | Opcode::And | Opcode::Or | Opcode::Foreach
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordering comparison carried by `CMP` and `JCMP`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `<=>`, yields -1, 0 or 1
    ThreeWay,
}

impl CmpOp {
    /// Encode as an instruction argument
    pub fn as_arg(self) -> i64 {
        match self {
            CmpOp::Gt => 0,
            CmpOp::Ge => 1,
            CmpOp::Lt => 2,
            CmpOp::Le => 3,
            CmpOp::ThreeWay => 4,
        }
    }

    /// Decode from an instruction argument
    pub fn from_arg(arg: i64) -> Option<Self> {
        match arg {
            0 => Some(CmpOp::Gt),
            1 => Some(CmpOp::Ge),
            2 => Some(CmpOp::Lt),
            3 => Some(CmpOp::Le),
            4 => Some(CmpOp::ThreeWay),
            _ => None,
        }
    }

    /// Source-level symbol
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::ThreeWay => "<=>",
        }
    }
}

/// Operation carried by `BITWISE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitwiseOp {
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

impl BitwiseOp {
    /// Encode as an instruction argument
    pub fn as_arg(self) -> i64 {
        match self {
            BitwiseOp::And => 0,
            BitwiseOp::Or => 1,
            BitwiseOp::Xor => 2,
            BitwiseOp::Shl => 3,
            BitwiseOp::Shr => 4,
        }
    }

    /// Decode from an instruction argument
    pub fn from_arg(arg: i64) -> Option<Self> {
        match arg {
            0 => Some(BitwiseOp::And),
            1 => Some(BitwiseOp::Or),
            2 => Some(BitwiseOp::Xor),
            3 => Some(BitwiseOp::Shl),
            4 => Some(BitwiseOp::Shr),
            _ => None,
        }
    }
}

/// Object kind created by `NEWOBJECT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewObjectKind {
    /// Empty dict
    Dict,
    /// Array with reserved capacity `a1`
    Array,
    /// Class with optional base register `a1` and attributes register `a2`
    Class,
}

impl NewObjectKind {
    /// Encode as an instruction argument
    pub fn as_arg(self) -> i64 {
        match self {
            NewObjectKind::Dict => 0,
            NewObjectKind::Array => 1,
            NewObjectKind::Class => 2,
        }
    }

    /// Decode from an instruction argument
    pub fn from_arg(arg: i64) -> Option<Self> {
        match arg {
            0 => Some(NewObjectKind::Dict),
            1 => Some(NewObjectKind::Array),
            2 => Some(NewObjectKind::Class),
            _ => None,
        }
    }
}

/// Source of the appended value in `APPENDTOARRAY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppendKind {
    /// `val` is a register
    Stack,
    /// `val` is a literal index
    Literal,
    /// `val` is an integer immediate
    Integer,
    /// `val` holds raw `f64` bits
    Float,
    /// `val` is a bool immediate
    Bool,
}

impl AppendKind {
    /// Encode as an instruction argument
    pub fn as_arg(self) -> i64 {
        match self {
            AppendKind::Stack => 0,
            AppendKind::Literal => 1,
            AppendKind::Integer => 2,
            AppendKind::Float => 3,
            AppendKind::Bool => 4,
        }
    }

    /// Decode from an instruction argument
    pub fn from_arg(arg: i64) -> Option<Self> {
        match arg {
            0 => Some(AppendKind::Stack),
            1 => Some(AppendKind::Literal),
            2 => Some(AppendKind::Integer),
            3 => Some(AppendKind::Float),
            4 => Some(AppendKind::Bool),
            _ => None,
        }
    }

    /// Kind produced by fusing a preceding load opcode, if that load can be fused
    pub fn from_load(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Load => Some(AppendKind::Literal),
            Opcode::LoadInteger => Some(AppendKind::Integer),
            Opcode::LoadFloat => Some(AppendKind::Float),
            Opcode::LoadBool => Some(AppendKind::Bool),
            _ => None,
        }
    }
}
