//! Open outer tracking
//!
//! A captured local stays on the value stack while its frame is alive; every
//! closure capturing the same slot shares one [`Outer`] cell. When the slot's
//! scope ends the cell is closed over the slot's current value.

use core_types::{Outer, OuterState, Value};
use memory_manager::Heap;
use std::rc::Rc;

/// Open outer cells sorted by stack index
#[derive(Default)]
pub struct OpenOuters {
    cells: Vec<Rc<Outer>>,
}

impl OpenOuters {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cell is open
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell for `stack_index`, opening one if no closure captured it yet
    pub fn capture(&mut self, heap: &Heap, stack_index: usize) -> Rc<Outer> {
        match self
            .cells
            .binary_search_by_key(&stack_index, |c| c.stack_index().unwrap_or(usize::MAX))
        {
            Ok(i) => self.cells[i].clone(),
            Err(i) => {
                let cell = Outer::open(heap, stack_index);
                self.cells.insert(i, cell.clone());
                cell
            }
        }
    }

    /// Close every cell at or above `from`
    ///
    /// # Returns
    ///
    /// Number of cells closed
    pub fn close_from(&mut self, from: usize, stack: &[Value]) -> usize {
        let mut closed = 0;
        while let Some(cell) = self.cells.last() {
            let Some(index) = cell.stack_index() else {
                self.cells.pop();
                continue;
            };
            if index < from {
                break;
            }
            cell.close(stack.get(index).cloned().unwrap_or_default());
            self.cells.pop();
            closed += 1;
        }
        closed
    }
}

/// Read through an outer cell
pub fn read(cell: &Outer, stack: &[Value]) -> Value {
    match cell.state() {
        OuterState::Open(index) => stack.get(index).cloned().unwrap_or_default(),
        OuterState::Closed(value) => value,
    }
}

/// Write through an outer cell
pub fn write(cell: &Outer, stack: &mut [Value], value: Value) {
    match cell.stack_index() {
        Some(index) => {
            if let Some(slot) = stack.get_mut(index) {
                *slot = value;
            }
        }
        None => {
            cell.set_closed(value);
        }
    }
}
