//! # diaport-core
//!
//! Version-resilient access to native debug-symbol stores.
//!
//! This crate provides:
//! - Engine location: find the newest installed symbol engine, falling back
//!   to the default registration
//! - Data sources that open and validate a store from a file, a stream, or an
//!   executable's debug directory
//! - Sessions that answer symbol, line, inline-frame and address queries
//! - A generic cursor-based enumerator for every plural result
//! - A stack walker driven by a caller-supplied target helper
//!
//! ## Engines
//!
//! An engine is anything implementing [`engine::Engine`]. The crate ships a
//! built-in engine ([`engine::memory::MemoryEngine`]) that reads JSON symbol
//! manifests and is registered under the default name, so a process with no
//! other engines still locates one.
//!
//! ## Example
//!
//! ```rust
//! use diaport_core::engine::memory::StoreBuilder;
//! use diaport_core::prelude::*;
//! use std::sync::Arc;
//!
//! let mut builder = StoreBuilder::new("app", MachineType::Amd64);
//! builder.section(".text", Rva::new(0x1000), 0x1000, 0x6000_0020);
//! let compiland = builder.compiland("main.obj");
//! builder.function(compiland, "main", Rva::new(0x1000), 0x20);
//! let store = builder.build().unwrap();
//!
//! let handle = diaport_core::locate().unwrap();
//! let mut source = handle.data_source();
//! source.load_opened(Arc::new(store)).unwrap();
//! let session = source.open_session().unwrap();
//!
//! let main = session.find_symbol_by_rva(Rva::new(0x1004), SymTag::Function).unwrap().unwrap();
//! assert_eq!(main.name(), Some("main"));
//! ```

pub mod demangle;
pub mod engine;
pub mod enumerator;
pub mod error;
pub mod exe;
pub mod locator;
pub mod prelude;
pub mod session;
pub mod source;
pub mod types;
pub mod walker;

pub use enumerator::Enumerator;
// Re-export commonly used types
pub use error::{DiaError, HResult, Result};
pub use locator::{locate, EngineHandle, Locator};
pub use session::{Session, Symbol};
pub use source::DataSource;
