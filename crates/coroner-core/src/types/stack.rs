//! Stack frame types.

use smallvec::SmallVec;

use super::Address;

/// One local variable slot of a frame record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSlot
{
    /// Address of the slot inside the frame record.
    pub address: Address,
    /// Raw pointer-sized value stored in the slot.
    pub value: u64,
}

/// Logical stack frame reconstructed from a thread's frame chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame
{
    /// Ordered index within the stack (0 = innermost).
    pub index: usize,
    /// Program counter for this frame.
    pub pc: Address,
    /// Address of the frame record.
    pub frame_pointer: Address,
    /// Local variable slots recorded in the frame.
    pub locals: SmallVec<[LocalSlot; 4]>,
}

impl StackFrame
{
    /// Number of recorded local slots.
    pub fn local_count(&self) -> usize
    {
        self.locals.len()
    }
}
