//! Common module for library exports

pub use crate::engine::{Engine, Store};
pub use crate::enumerator::{Enumerator, Named};
pub use crate::error::{DiaError, ErrorClass, HResult, Result};
pub use crate::locator::{locate, EngineHandle, HostRegistry, Locator};
pub use crate::session::{Equivalence, LineNumber, Session, SourceFile, Symbol, SymbolMatch, SymbolsByAddr};
pub use crate::source::{DataSource, LoadCallback};
pub use crate::types::{
    Address, Guid, MachineType, NameSearchOptions, Rva, SectionOffset, StackFrame, SymTag, SymbolData, SymbolId, Va,
};
pub use crate::walker::{StackWalkHelper, StackWalker};
