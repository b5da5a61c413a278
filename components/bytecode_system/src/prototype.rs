//! Function prototypes
//!
//! A [`Prototype`] is the immutable output of compiling one function. It is
//! shared by every closure instantiated from it.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::error::CompileResult;
use crate::instruction::Instruction;
use crate::literal::Literal;

/// How a captured variable is reached from the enclosing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OuterKind {
    /// A stack slot of the immediately enclosing function
    Local,
    /// An outer already captured by the enclosing function
    Outer,
}

/// Descriptor of a captured variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterInfo {
    /// Variable name
    pub name: String,
    /// Where the variable is found in the parent
    pub kind: OuterKind,
    /// Parent stack slot for [`OuterKind::Local`], parent outer index otherwise
    pub index: usize,
}

/// Debug info for a named local
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInfo {
    /// Variable name
    pub name: String,
    /// Stack slot
    pub pos: usize,
    /// First instruction where the local is live
    pub start_op: usize,
    /// Instruction where the local went out of scope
    pub end_op: usize,
}

/// Maps an instruction index to a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    /// Source line
    pub line: u32,
    /// First instruction emitted for the line
    pub op: usize,
}

/// Immutable compiled function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    /// Function name (`"main"` for the top level)
    pub name: String,
    /// Name of the source the function came from
    pub source_name: String,
    /// Instruction stream
    pub instructions: Vec<Instruction>,
    /// Deduplicated literal table
    pub literals: Vec<Literal>,
    /// Parameter names; index 0 is always `this`
    pub parameters: Vec<String>,
    /// Nested function prototypes
    pub functions: Vec<Rc<Prototype>>,
    /// Captured-variable descriptors
    pub outers: Vec<OuterInfo>,
    /// Parent-frame registers holding default values for the trailing parameters
    pub default_params: Vec<i64>,
    /// Local variable debug info
    pub locals: Vec<LocalInfo>,
    /// Line table, ordered by instruction index
    pub line_info: Vec<LineInfo>,
    /// Number of stack slots a frame needs
    pub stack_size: usize,
    /// Extra arguments are packed into an array in the last parameter slot
    pub varargs: bool,
}

impl Prototype {
    /// Create an empty prototype
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_name: String::new(),
            instructions: Vec::new(),
            literals: Vec::new(),
            parameters: vec!["this".to_string()],
            functions: Vec::new(),
            outers: Vec::new(),
            default_params: Vec::new(),
            locals: Vec::new(),
            line_info: Vec::new(),
            stack_size: 1,
            varargs: false,
        }
    }

    /// Number of instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Number of literals
    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    /// Number of parameters, including `this`
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Number of nested functions
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Number of captured variables
    pub fn outer_count(&self) -> usize {
        self.outers.len()
    }

    /// Number of line table entries
    pub fn line_info_count(&self) -> usize {
        self.line_info.len()
    }

    /// Number of local debug entries
    pub fn local_info_count(&self) -> usize {
        self.locals.len()
    }

    /// Number of parameters with default values
    pub fn default_param_count(&self) -> usize {
        self.default_params.len()
    }

    /// Source line for an instruction index
    ///
    /// Returns the line of the last line-table entry at or before `ip`,
    /// or 0 when the table is empty.
    pub fn line_for(&self, ip: usize) -> u32 {
        match self.line_info.binary_search_by(|li| li.op.cmp(&ip)) {
            Ok(i) => self.line_info[i].line,
            Err(0) => self.line_info.first().map_or(0, |li| li.line),
            Err(i) => self.line_info[i - 1].line,
        }
    }

    /// Name of the local living in `pos` at instruction `ip`, if any
    pub fn local_name(&self, pos: usize, ip: usize) -> Option<&str> {
        self.locals
            .iter()
            .find(|l| l.pos == pos && l.start_op <= ip && ip <= l.end_op)
            .map(|l| l.name.as_str())
    }

    /// Serialize to JSON
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::Prototype;
    ///
    /// let proto = Prototype::new("main");
    /// let json = proto.to_json().unwrap();
    /// assert_eq!(Prototype::from_json(&json).unwrap(), proto);
    /// ```
    pub fn to_json(&self) -> CompileResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> CompileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
