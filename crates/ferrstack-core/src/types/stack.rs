//! Captured stack frame type.

use super::Address;

/// One frame as reported by the unwinder.
///
/// A frame is immutable once captured. `is_activation` is true for the
/// innermost frame of a thread and for frames interrupted by a signal: their
/// `pc` is the exact instruction being executed rather than a return address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame
{
    /// Program counter of the frame
    pub pc: Address,
    /// Whether `pc` is exact (not a return address)
    pub is_activation: bool,
}

impl Frame
{
    /// Build a frame from its program counter and activation flag.
    #[must_use]
    pub const fn new(pc: Address, is_activation: bool) -> Self
    {
        Self { pc, is_activation }
    }

    /// Program counter to use for lookups; see [`Address::adjusted`].
    #[must_use]
    pub const fn lookup_pc(&self) -> Address
    {
        self.pc.adjusted(self.is_activation)
    }
}
