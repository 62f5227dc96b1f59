//! Image address and pointer width types.

use std::fmt;
use std::ops::{Add, Sub};

/// Pointer width of the captured image
///
/// The width decides how pointer-sized fields are laid out in runtime
/// structures and how addresses are formatted for display. It comes from the
/// image container (for example the ELF class of a core file) or is supplied
/// by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerWidth
{
    /// 32-bit addressing (4-byte pointers)
    Bits32,
    /// 64-bit addressing (8-byte pointers)
    #[default]
    Bits64,
}

impl PointerWidth
{
    /// Size of a pointer in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize
    {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }

    /// Number of hex digits used when formatting an address.
    #[must_use]
    pub const fn hex_digits(self) -> usize
    {
        self.bytes() * 2
    }

    /// Width from the 64-bit flag reported by an image container.
    #[must_use]
    pub const fn from_is_64(is_64: bool) -> Self
    {
        if is_64 {
            PointerWidth::Bits64
        } else {
            PointerWidth::Bits32
        }
    }
}

impl fmt::Display for PointerWidth
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            PointerWidth::Bits32 => write!(f, "32-bit"),
            PointerWidth::Bits64 => write!(f, "64-bit"),
        }
    }
}

/// Strongly typed image address
///
/// This wrapper around `u64` provides type safety when working with addresses
/// read out of a captured image. It prevents accidentally mixing addresses
/// with sizes, counts, or other numeric values.
///
/// 32-bit images store their addresses zero-extended.
///
/// ## Example
///
/// ```rust
/// use coroner_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    ///
    /// A null pointer in a runtime record means "no such data", which the
    /// model reports as unavailable rather than corrupt.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_core::types::Address;
    ///
    /// const SEGMENT_BASE: Address = Address::new(0x1000);
    /// assert_eq!(SEGMENT_BASE.value(), 0x1000);
    /// ```
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// `true` for the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None); // Overflow
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at the maximum value
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.saturating_add(u64::MAX), Address::new(u64::MAX)); // Saturates
    /// ```
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }

    /// Distance from `base` to this address, if this address is not below it.
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }

    /// Format for display at the given pointer width
    ///
    /// ## Example
    ///
    /// ```rust
    /// use coroner_core::types::{Address, PointerWidth};
    ///
    /// assert_eq!(Address::new(0x1050).format(PointerWidth::Bits32), "0x00001050");
    /// assert_eq!(Address::new(0x1050).format(PointerWidth::Bits64), "0x0000000000001050");
    /// ```
    #[must_use]
    pub fn format(self, width: PointerWidth) -> String
    {
        format!("0x{:0digits$x}", self.0, digits = width.hex_digits())
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
        write!(f, "0x{:016x}", self.0)
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
