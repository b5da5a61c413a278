//! Error types for the CLI

use bytecode_system::CompileError;
use core_types::VmError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Prototype file could not be read
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Prototype JSON was malformed
    #[error("invalid prototype: {0}")]
    Prototype(#[from] CompileError),

    /// Script raised an error
    #[error("{}", .0.report())]
    Script(#[from] VmError),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
