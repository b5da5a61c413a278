//! Compile-time errors
//!
//! These are fatal to the compilation unit that raised them.

use thiserror::Error;

/// Maximum number of stack slots a single function may use
pub const MAX_STACK_SIZE: usize = 255;

/// Maximum number of entries in a literal table
pub const MAX_LITERALS: usize = 65535;

/// Errors raised while building prototypes or registering natives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Function needs more than [`MAX_STACK_SIZE`] slots
    #[error("too many locals (limit 255)")]
    TooManyLocals,
    /// Literal table would exceed [`MAX_LITERALS`]
    #[error("too many literals (limit 65535)")]
    TooManyLiterals,
    /// Unknown character in a native type mask
    #[error("invalid type mask '{mask}': unexpected '{found}'")]
    InvalidTypeMask {
        /// The full mask string
        mask: String,
        /// The offending character
        found: char,
    },
    /// A name was registered twice
    #[error("'{0}' is already registered")]
    DuplicateRegistration(String),
    /// Target stack popped while empty or popped past a named local
    #[error("unbalanced target stack")]
    UnbalancedTargets,
    /// `break` or `continue` outside a loop
    #[error("'{0}' has to be in a loop block")]
    NotInLoop(&'static str),
    /// Child state popped from a function without a parent
    #[error("function state has no parent")]
    NoParentState,
    /// Prototype (de)serialization failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CompileError {
    fn from(err: serde_json::Error) -> Self {
        CompileError::Serialization(err.to_string())
    }
}

/// Result alias for compile-time operations
pub type CompileResult<T> = Result<T, CompileError>;
