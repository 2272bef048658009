//! Memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed memory address in the target's address space
///
/// This wrapper around `u64` keeps program counters, stack pointers and file
/// offsets from being mixed up with counts or sizes.
///
/// ## Example
///
/// ```rust
/// use ferrstack_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// The address to use for symbol, module and line lookups.
    ///
    /// A frame that is not an activation holds a return address, which points
    /// just past the call instruction and may already belong to the next
    /// function or line. Stepping back one byte lands inside the call.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use ferrstack_core::types::Address;
    ///
    /// let pc = Address::new(0x4010);
    /// assert_eq!(pc.adjusted(false), Address::new(0x400f));
    /// assert_eq!(pc.adjusted(true), pc);
    /// ```
    #[must_use]
    pub const fn adjusted(self, is_activation: bool) -> Self
    {
        if is_activation {
            self
        } else {
            Address(self.0.wrapping_sub(1))
        }
    }

    /// Apply a signed displacement, as used by CFA and register rules.
    #[must_use]
    pub fn offset_by(self, displacement: i64) -> Self
    {
        Address(self.0.wrapping_add_signed(displacement))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

impl Sub<Address> for Address
{
    type Output = u64;

    fn sub(self, rhs: Address) -> Self::Output
    {
        self.0.wrapping_sub(rhs.0)
    }
}
