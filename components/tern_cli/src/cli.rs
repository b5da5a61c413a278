//! Command-line arguments

use clap::{Parser, Subcommand};
use interpreter::VmConfig;
use memory_manager::GcConfig;
use std::path::PathBuf;

/// Run or inspect compiled Tern prototypes
#[derive(Debug, Parser)]
#[command(name = "tern", version, about = "Run compiled Tern prototypes", long_about = None)]
pub struct Cli {
    /// What to do with the prototype
    #[command(subcommand)]
    pub command: Command,

    /// Maximum nested call depth
    #[arg(long, global = true, default_value_t = 1024)]
    pub max_depth: usize,

    /// Disable automatic cycle collection
    #[arg(long, global = true)]
    pub no_gc: bool,

    /// Registrations between automatic collections
    #[arg(long, global = true, default_value_t = 10_000)]
    pub gc_threshold: usize,
}

/// Subcommands
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Execute a prototype and print its result
    Run {
        /// Prototype JSON file
        file: PathBuf,

        /// Print the disassembly before running
        #[arg(short = 'b', long)]
        print_bytecode: bool,
    },
    /// Print the disassembly of a prototype
    Disassemble {
        /// Prototype JSON file
        file: PathBuf,
    },
}

impl Cli {
    /// VM configuration selected by the flags
    pub fn vm_config(&self) -> VmConfig {
        let gc = if self.no_gc {
            GcConfig::manual()
        } else {
            GcConfig::default()
        };
        VmConfig::default()
            .max_call_depth(self.max_depth)
            .gc(gc.with_threshold(self.gc_threshold))
    }
}
