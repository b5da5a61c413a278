//! Heap object kinds
//!
//! Every kind that can take part in a reference cycle embeds an
//! [`ObjectHeader`] and registers itself in a [`Heap`](memory_manager::Heap)
//! when created.

mod array;
mod class;
mod closure;
mod dict;
mod header;
mod native;
mod space;
mod weakref;

pub use array::Array;
pub use class::{Class, ClassMember, Instance, Member, MetaMethod, MAX_MEMBERS};
pub use closure::{Closure, Outer, OuterState};
pub use dict::Dict;
pub use header::{ObjectHeader, WeakSlot};
pub use native::{
    parse_type_mask, NativeAttribute, NativeClosure, NativeContext, NativeFn, NativeFunction,
    MASK_ANY,
};
pub use space::Space;
pub use weakref::WeakRef;
