//! Prototype loading and execution
//!
//! The runtime owns one VM for its lifetime, so globals set by one file
//! stay visible to the next.

use crate::error::{CliError, CliResult};
use bytecode_system::{disassemble, Prototype};
use core_types::{NativeContext, NativeFunction, Value, VmResult};
use interpreter::{Vm, VmConfig};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

fn print(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    let line: Vec<String> = args.iter().skip(1).map(ToString::to_string).collect();
    println!("{}", line.join(" "));
    Ok(Value::Null)
}

/// Host runtime wrapping a configured VM
pub struct Runtime {
    vm: Vm,
    print_bytecode: bool,
}

impl Runtime {
    /// Create a runtime with `print` installed as a global
    ///
    /// # Example
    /// ```
    /// use interpreter::VmConfig;
    /// use tern_cli::Runtime;
    ///
    /// let runtime = Runtime::new(VmConfig::default());
    /// assert!(runtime.vm().get_global("print").is_some());
    /// ```
    pub fn new(config: VmConfig) -> Self {
        let mut vm = Vm::with_config(config);
        if let Err(e) = vm.register_global(
            NativeFunction::new("print", print)
                .params(-1)
                .docs("Write the arguments to stdout"),
        ) {
            debug!(error = %e, "print already registered");
        }
        Self {
            vm,
            print_bytecode: false,
        }
    }

    /// Enable bytecode printing before execution
    pub fn with_print_bytecode(mut self, enabled: bool) -> Self {
        self.print_bytecode = enabled;
        self
    }

    /// The underlying VM
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Mutable access to the underlying VM
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Read a prototype from a JSON file
    ///
    /// # Errors
    /// `CliError::Io` if the file cannot be read, `CliError::Prototype` if
    /// it is not a valid prototype
    pub fn load_prototype(path: &Path) -> CliResult<Rc<Prototype>> {
        let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let proto = Prototype::from_json(&json)?;
        debug!(name = %proto.name, path = %path.display(), "prototype loaded");
        Ok(Rc::new(proto))
    }

    /// Run a prototype file
    ///
    /// # Returns
    /// The value returned by the top-level function
    pub fn execute_file(&mut self, path: &Path) -> CliResult<Value> {
        let proto = Self::load_prototype(path)?;
        self.execute_prototype(proto)
    }

    /// Run a prototype given as JSON text
    pub fn execute_json(&mut self, json: &str) -> CliResult<Value> {
        let proto = Rc::new(Prototype::from_json(json)?);
        self.execute_prototype(proto)
    }

    /// Run an already loaded prototype
    pub fn execute_prototype(&mut self, proto: Rc<Prototype>) -> CliResult<Value> {
        if self.print_bytecode {
            print!("{}", disassemble(&proto));
        }
        let result = self.vm.run(proto)?;
        info!(
            live = self.vm.heap().live_objects(),
            "script finished"
        );
        Ok(result)
    }

    /// Disassembly of a prototype file
    pub fn disassemble_file(path: &Path) -> CliResult<String> {
        let proto = Self::load_prototype(path)?;
        Ok(disassemble(&proto))
    }
}
