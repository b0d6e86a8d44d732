//! Call frames (spec.md §4.7): one per active closure invocation,
//! tracking its own instruction pointer into its closure's function.

use monke_code::Instructions;
use monke_obj::{ClosureObj, Gc};

pub struct Frame {
    pub closure: Gc<ClosureObj>,
    /// Pre-incremented before the first fetch, so a fresh frame starts
    /// at -1 and the run loop's `ip += 1` lands on instruction 0.
    pub ip: isize,
    /// Stack index the frame's locals begin at; `Call`'s operand count
    /// already accounts for arguments occupying the first slots.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Gc<ClosureObj>, base_pointer: usize) -> Self {
        Self { closure, ip: -1, base_pointer }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }
}
