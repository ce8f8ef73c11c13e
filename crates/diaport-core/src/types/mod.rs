//! # Types
//!
//! Engine-agnostic value types used throughout the access layer.
//!
//! These types describe what a debug store talks about (addresses, symbol
//! tags, machine types, identities) without committing to any particular
//! engine implementation, so the rest of the crate can work with concepts like
//! "relative virtual address" or "symbol tag" regardless of which installed
//! engine answered the query.

pub mod address;
pub mod guid;
pub mod machine;
pub mod search;
pub mod stack;
pub mod symbols;
pub mod tag;

// Re-export all public types
pub use address::{Address, Rva, SectionOffset, Va};
pub use guid::{Guid, ParseGuidError};
pub use machine::MachineType;
pub use search::{NameMatcher, NameSearchOptions};
pub use stack::{FrameRegister, FrameStatus, FrameType, StackFrame};
pub use symbols::{DataKind, FrameLayout, SymbolData, SymbolId, UdtKind};
pub use tag::SymTag;
