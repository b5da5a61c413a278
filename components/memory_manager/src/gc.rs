//! Cycle collector
//!
//! Reference counting frees everything except cycles. The collector finds
//! those by trial deletion over the chain:
//!
//! 1. Snapshot every live registered object.
//! 2. Start each object's count at its strong count (minus the snapshot's
//!    own reference) and subtract one for every reference reported by
//!    another registered object. What remains is the number of references
//!    from outside the chain, i.e. from roots.
//! 3. Objects with external references are reachable, and so is everything
//!    they reference.
//! 4. The rest are garbage: each is cleared, which drops the references
//!    that kept the cycle alive, and the snapshot is released.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::heap::Heap;
use crate::object::{ChainLink, Collectable};

struct Candidate {
    object: Rc<dyn Collectable>,
    external: usize,
    reachable: bool,
}

fn children(object: &dyn Collectable, slots: &HashMap<usize, usize>) -> Vec<usize> {
    let mut out = Vec::new();
    object.trace(&mut |link: &ChainLink| {
        if let Some(slot) = link.index().and_then(|i| slots.get(&i)) {
            out.push(*slot);
        }
    });
    out
}

impl Heap {
    /// Run one collection pass
    ///
    /// # Returns
    ///
    /// Number of unreachable objects that were cleared
    pub fn collect_garbage(&self) -> usize {
        let snapshot = self.chain().borrow_mut().snapshot();
        let slots: HashMap<usize, usize> = snapshot
            .iter()
            .enumerate()
            .map(|(slot, (index, _))| (*index, slot))
            .collect();

        let mut candidates: Vec<Candidate> = snapshot
            .into_iter()
            .map(|(_, object)| Candidate {
                external: Rc::strong_count(&object).saturating_sub(1),
                object,
                reachable: false,
            })
            .collect();

        // Subtract internal references.
        let edges: Vec<Vec<usize>> = candidates
            .iter()
            .map(|c| children(c.object.as_ref(), &slots))
            .collect();
        for targets in &edges {
            for &t in targets {
                candidates[t].external = candidates[t].external.saturating_sub(1);
            }
        }

        // Mark from externally referenced objects.
        let mut stack: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.external > 0)
            .map(|(i, _)| i)
            .collect();
        while let Some(i) = stack.pop() {
            if candidates[i].reachable {
                continue;
            }
            candidates[i].reachable = true;
            stack.extend(edges[i].iter().copied().filter(|&t| !candidates[t].reachable));
        }

        let garbage: Vec<Rc<dyn Collectable>> = candidates
            .into_iter()
            .filter(|c| !c.reachable)
            .map(|c| c.object)
            .collect();
        let freed = garbage.len();
        for object in &garbage {
            debug!(kind = object.kind(), "clearing unreachable object");
            object.clear();
        }
        drop(garbage);

        self.chain().borrow_mut().record_collection(freed);
        info!(freed, live = self.live_objects(), "collection finished");
        freed
    }
}
