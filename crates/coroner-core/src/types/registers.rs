//! Recorded register values.

use std::fmt;

/// A register as recorded for a thread in the image
///
/// Registers are all-or-nothing: either the name and value both decoded, or
/// the register is not reported at all. There is no partially known register.
///
/// ## Example
///
/// ```rust
/// use coroner_core::types::Register;
///
/// let pc = Register::new("pc", 0x4000_1000);
/// assert_eq!(pc.name(), "pc");
/// assert_eq!(pc.value(), 0x4000_1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register
{
    name: String,
    value: u64,
}

impl Register
{
    /// Create a register from its recorded name and value.
    pub fn new(name: impl Into<String>, value: u64) -> Self
    {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Register name as recorded (e.g. `"rip"`, `"x29"`).
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Raw value, zero-extended for 32-bit images.
    pub fn value(&self) -> u64
    {
        self.value
    }
}

impl fmt::Display for Register
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}=0x{:x}", self.name, self.value)
    }
}
