//! Call frame for function call stack management

use bytecode_system::Prototype;
use core_types::{Closure, TraceEntry};
use std::rc::Rc;

/// Call frame representing one closure invocation
///
/// Registers are addressed relative to `base` in the VM's single value stack.
#[derive(Clone)]
pub struct CallFrame {
    /// Closure being executed
    pub closure: Rc<Closure>,
    /// Index of the next instruction
    pub ip: usize,
    /// Absolute stack index of register 0 (`this`)
    pub base: usize,
    /// Stack length to restore when the frame is popped
    pub prev_top: usize,
    /// Absolute caller slot receiving the return value
    pub target: Option<usize>,
    /// Returning from this frame hands the value back to a native caller
    pub root: bool,
}

impl CallFrame {
    /// Create a new call frame positioned at the first instruction
    pub fn new(
        closure: Rc<Closure>,
        base: usize,
        prev_top: usize,
        target: Option<usize>,
        root: bool,
    ) -> Self {
        Self {
            closure,
            ip: 0,
            base,
            prev_top,
            target,
            root,
        }
    }

    /// Prototype of the running closure
    pub fn proto(&self) -> &Rc<Prototype> {
        self.closure.proto()
    }

    /// Index of the instruction currently executing
    pub fn current_instruction(&self) -> usize {
        self.ip.saturating_sub(1)
    }

    /// Source position of the current instruction for error traces
    pub fn trace_entry(&self) -> TraceEntry {
        let proto = self.proto();
        let instruction = self.current_instruction();
        TraceEntry {
            function: proto.name.clone(),
            source: proto.source_name.clone(),
            line: proto.line_for(instruction),
            instruction,
        }
    }
}
