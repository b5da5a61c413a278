//! Tern command-line host
//!
//! Loads a compiled prototype from its JSON interchange form and either
//! runs it on a fresh [`Vm`](interpreter::Vm) or prints its disassembly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::{Cli, Command};
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use runtime::Runtime;
