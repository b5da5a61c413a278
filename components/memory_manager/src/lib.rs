//! Memory Manager - collectable chain and cycle collector
//!
//! Objects are owned through `Rc` reference counts, which free acyclic
//! garbage immediately. This component adds what counting alone cannot do:
//! - A per-heap chain registering every cycle-capable object
//! - A trial-deletion collector that finds and breaks unreachable cycles
//! - Allocation statistics and an automatic-collection threshold
//!
//! Object kinds opt in by embedding a [`ChainLink`] and implementing
//! [`Collectable`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gc;
pub mod heap;
pub mod object;

// Re-export main types
pub use heap::{GcConfig, GcStats, Heap};
pub use object::{ChainLink, Collectable};
