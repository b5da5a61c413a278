//! Native call context
//!
//! Natives receive the VM as a [`NativeContext`]. Re-entrant calls nest on
//! the same value stack and return before the native resumes.

use std::rc::Rc;

use core_types::{Dict, NativeContext, Value, VmResult};
use memory_manager::Heap;

use crate::vm::Vm;

impl NativeContext for Vm {
    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn root(&self) -> Rc<Dict> {
        self.root.clone()
    }

    fn call(&mut self, callee: &Value, args: &[Value]) -> VmResult<Value> {
        Vm::call(self, callee, args)
    }
}
