//! Call frames for the virtual machine.

use std::rc::Rc;

use crate::object::Closure;

/// One function invocation: the closure being executed, its instruction
/// pointer, and where its locals start on the operand stack.
#[derive(Debug)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    /// Index into the operand stack where this frame's local slots begin;
    /// the callee itself sits one slot below.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.closure.function.instructions
    }
}
