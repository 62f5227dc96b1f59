//! # Types
//!
//! Plain value types shared by the image layer, the resolver, and the model.
//!
//! These types carry no reference to the bytes they were decoded from, so
//! they can be cloned freely and handed to the command layer.

pub mod address;
pub mod registers;
pub mod segment;
pub mod space;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::{Address, PointerWidth};
pub use registers::Register;
pub use segment::{MemorySegment, SegmentKind};
pub use space::{ByteOrder, DumpKind, SpaceId};
pub use stack::{LocalSlot, StackFrame};
pub use symbols::{SymbolLanguage, SymbolName};
