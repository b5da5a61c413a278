//! Collector integration
//!
//! Every value the VM can still reach lives in the value stack, a call
//! frame, an open outer, the root dict or a delegate table, all of which
//! hold strong references. The trial-deletion pass counts those as external
//! references, so a collection is safe at any call boundary.

use tracing::info;

use crate::vm::Vm;

impl Vm {
    /// Run a collection pass now
    ///
    /// # Returns
    ///
    /// Number of unreachable objects cleared
    pub fn collect_garbage(&mut self) -> usize {
        let freed = self.heap.collect_garbage();
        info!(
            freed,
            live = self.heap.live_objects(),
            depth = self.frames.len(),
            "vm collection pass"
        );
        freed
    }

    /// Collect if the heap's allocation threshold was reached
    pub(crate) fn maybe_collect(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }
}
