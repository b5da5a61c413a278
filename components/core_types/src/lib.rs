//! Core value types and runtime errors for the Tern runtime
//!
//! This crate provides the tagged [`Value`], every heap object kind a value
//! can reference, the primitive operators and the runtime error types.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of script values
//! - [`TypeTag`] - Base type bit plus derived flags
//! - [`Array`], [`Dict`], [`Closure`], [`Outer`], [`NativeClosure`],
//!   [`Class`], [`Instance`] - Collectable heap objects
//! - [`WeakRef`], [`Space`] - Reference-counted objects outside the chain
//! - [`VmError`] - Runtime errors with a call trace
//!
//! # Examples
//!
//! ```
//! use core_types::{Array, Value};
//! use memory_manager::Heap;
//!
//! let heap = Heap::new();
//! let arr = Value::Array(Array::new(&heap, vec![Value::Integer(1)]));
//! let weak = arr.weak_ref();
//! drop(arr);
//!
//! let Value::WeakRef(w) = weak else { unreachable!() };
//! assert!(w.get().is_null());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod complex;
mod error;
pub mod object;
mod ops;
mod type_tag;
mod value;

pub use complex::Complex;
pub use error::{ErrorKind, SlotError, TraceEntry, VmError, VmResult};
pub use object::{
    parse_type_mask, Array, Class, ClassMember, Closure, Dict, Instance, Member, MetaMethod,
    NativeAttribute, NativeClosure, NativeContext, NativeFn, NativeFunction, Outer, OuterState,
    Space, WeakRef, MASK_ANY, MAX_MEMBERS,
};
pub use ops::{arith, bit_not, bitwise, compare, negate, ArithOp};
pub use type_tag::TypeTag;
pub use value::Value;
