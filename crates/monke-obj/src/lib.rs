//! Runtime object model: the `Object` tagged union, the GC header/handle
//! types compound objects are built on, and the custom hash table used
//! for Monke's table values (spec.md §3, §4.3).

pub mod gc;
pub mod object;
pub mod table;

pub use gc::{Gc, GcBox, GcHeader, GcKind};
pub use object::{BuiltinFunction, ClosureObj, Object};
pub use table::Table;
