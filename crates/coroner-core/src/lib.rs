//! # coroner-core
//!
//! Read-only postmortem model of captured process images.
//!
//! Given the raw bytes of a crashed process (a core file, or any other
//! capture exposed through [`image::ImageMemory`]), this crate reconstructs
//! threads, stacks, registers, memory segments and loaded modules, and finds
//! the on-disk copies of those modules for symbol lookup.
//!
//! Captured images are frequently damaged. Every accessor classifies its
//! result independently:
//!
//! - **present**: decoded cleanly
//! - **unavailable**: this image legitimately does not record it
//! - **corrupt**: the bytes that should encode it did not decode
//!
//! A corrupt record never aborts an inspection; the rest of the graph stays
//! usable. See [`outcome`] for the vocabulary.
//!
//! ## Components
//!
//! - [`resolver`]: maps module names recorded in the image to artifact bytes
//! - [`model`]: the [`AddressSpace`](model::AddressSpace) object graph
//! - [`segments`]: segment-list walking and address-to-segment lookup
//! - [`image`]: byte access, record layouts, and ELF core loading

pub mod error;
pub mod image;
pub mod model;
pub mod outcome;
pub mod prelude;
pub mod resolver;
pub mod segments;
pub mod types;

// Re-export commonly used types
pub use error::{CoronerError, Result};
pub use model::AddressSpace;
pub use outcome::{CorruptData, Entry, Outcome};
