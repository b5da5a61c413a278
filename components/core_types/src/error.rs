//! Runtime error types
//!
//! [`VmError`] is what script execution fails with. [`SlotError`] is the
//! narrower error of a container rejecting a key or value; the VM wraps it
//! into a [`VmError`] with the failing instruction's trace.

use std::fmt;

use bytecode_system::CompileError;
use thiserror::Error;

/// The kind of runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operand has the wrong type
    Type,
    /// Wrong argument count or argument type for a call
    Argument,
    /// Member lookup or assignment failed
    Member,
    /// Division by zero, overflow and similar
    Arithmetic,
    /// Modification of a locked class
    Locked,
    /// Callee is not callable
    Call,
    /// Call depth limit exceeded
    StackOverflow,
    /// Execution stopped by the interrupt flag
    Interrupted,
    /// Malformed bytecode or prototype
    Compile,
}

impl ErrorKind {
    /// Short name used in messages
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Type => "type error",
            ErrorKind::Argument => "argument error",
            ErrorKind::Member => "member error",
            ErrorKind::Arithmetic => "arithmetic error",
            ErrorKind::Locked => "locked class",
            ErrorKind::Call => "call error",
            ErrorKind::StackOverflow => "stack overflow",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::Compile => "compile error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame of an error trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Function name
    pub function: String,
    /// Source file name
    pub source: String,
    /// Source line, 0 when unknown
    pub line: u32,
    /// Instruction index in the function
    pub instruction: usize,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {} ({}:{}) [{}]",
            self.function, self.source, self.line, self.instruction
        )
    }
}

/// Error raised while executing a script
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, VmError};
///
/// let err = VmError::new(ErrorKind::Type, "cannot add 'null' and 'integer'");
/// assert_eq!(err.to_string(), "type error: cannot add 'null' and 'integer'");
/// assert!(err.trace.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct VmError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Frames between the failing instruction and the root call, innermost first
    pub trace: Vec<TraceEntry>,
}

impl VmError {
    /// Create an error with an empty trace
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, message)
    }

    /// Member error
    pub fn member(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Member, message)
    }

    /// Arithmetic error
    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arithmetic, message)
    }

    /// Append a trace frame
    pub fn push_trace(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }

    /// Message followed by the trace, one frame per line
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for entry in &self.trace {
            out.push_str("\n    ");
            out.push_str(&entry.to_string());
        }
        out
    }
}

impl From<CompileError> for VmError {
    fn from(err: CompileError) -> Self {
        VmError::new(ErrorKind::Compile, err.to_string())
    }
}

/// A container rejected a slot operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Keys cannot be null
    #[error("null is not a valid key")]
    NullKey,
    /// Key has a type the container does not accept
    #[error("invalid key type '{0}'")]
    InvalidKey(&'static str),
    /// The class has instances and no longer accepts fields
    #[error("class is locked, cannot add field '{0}'")]
    Locked(String),
    /// The class member table is full
    #[error("too many class members")]
    TooManyMembers,
    /// The key does not exist
    #[error("member '{0}' does not exist")]
    Missing(String),
    /// Array index out of range
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// Requested index
        index: i64,
        /// Container length
        len: usize,
    },
}

impl From<SlotError> for VmError {
    fn from(err: SlotError) -> Self {
        let kind = match err {
            SlotError::Locked(_) => ErrorKind::Locked,
            SlotError::NullKey | SlotError::InvalidKey(_) => ErrorKind::Type,
            _ => ErrorKind::Member,
        };
        VmError::new(kind, err.to_string())
    }
}

/// Result alias for runtime operations
pub type VmResult<T> = Result<T, VmError>;
