//! # Engine Boundary
//!
//! The traits every symbol-store engine implements.
//!
//! An [`Engine`] opens stores; a [`Store`] answers queries over one opened
//! store. The access layer (data source, session, enumerators) only ever talks
//! to these traits, so it does not know which engine version answered.
//!
//! Stores are keyed by RVA. Translating to and from section offsets and
//! virtual addresses happens above this boundary, from [`Store::sections`]
//! and the session's load address.
//!
//! ## Surface versions
//!
//! Older engines predate some query surfaces (inline frames, inlinee lines,
//! IL offsets, input assemblies, metadata token maps, function fragments).
//! Those methods have default implementations returning
//! [`DiaError::NotImplemented`], which sessions forward unchanged.

use std::fmt::Debug;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::demangle;
use crate::error::{DiaError, Result};
use crate::types::{Guid, MachineType, NameMatcher, NameSearchOptions, Rva, SymTag, SymbolData, SymbolId};

pub mod memory;

/// A symbol-store engine implementation.
pub trait Engine: Send + Sync + Debug
{
    /// The identity this engine is registered under.
    fn identity(&self) -> Guid;

    /// Open a store from a file.
    fn open_file(&self, path: &Path) -> Result<Arc<dyn Store>>;

    /// Open a store from an arbitrary byte stream.
    fn open_stream(&self, reader: &mut dyn Read) -> Result<Arc<dyn Store>>;
}

/// Values a store is validated against when loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSignature
{
    pub guid: Guid,
    /// Legacy 32-bit signature.
    pub signature: u32,
    pub age: u32,
}

/// One node of the store's symbol tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord
{
    pub id: SymbolId,
    pub name: Option<String>,
    pub undecorated_name: Option<String>,
    pub lexical_parent: Option<SymbolId>,
    pub rva: Option<Rva>,
    pub length: u64,
    /// Metadata token, for managed symbols.
    pub token: Option<u32>,
    pub data: SymbolData,
}

impl SymbolRecord
{
    pub fn tag(&self) -> SymTag
    {
        self.data.tag()
    }

    /// Whether this symbol's code or data range covers `rva`.
    pub fn contains(&self, rva: Rva) -> bool
    {
        self.rva.is_some_and(|start| rva.is_within(start, self.length))
    }

    /// Name under which name queries consider this symbol.
    ///
    /// Undecorated queries fall back to demangling locally when the store
    /// recorded no undecorated name.
    pub fn name_for(&self, matcher: &NameMatcher) -> Option<String>
    {
        let name = self.name.as_deref()?;
        let undecorated = match &self.undecorated_name {
            Some(undecorated) => Some(undecorated.clone()),
            None if matcher.options().contains(NameSearchOptions::UNDECORATED_NAME) => demangle::undecorate(name),
            None => None,
        };
        Some(matcher.select(name, undecorated.as_deref()).to_string())
    }
}

/// Result of an address lookup.
#[derive(Debug, Clone)]
pub struct SymbolHit
{
    pub record: Arc<SymbolRecord>,
    /// Signed distance from the symbol's start to the queried address.
    pub displacement: i32,
    /// The symbol does not contain the address; it is the nearest preceding
    /// public symbol.
    pub approximate: bool,
}

/// Filter for child queries.
#[derive(Debug, Clone)]
pub struct ChildQuery
{
    pub tag: SymTag,
    pub matcher: NameMatcher,
    /// Only children whose range contains this address.
    pub rva: Option<Rva>,
}

/// One line-number record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord
{
    pub compiland: SymbolId,
    pub file_id: u32,
    /// One-based first line.
    pub line: u32,
    pub line_end: u32,
    /// One-based first column; 0 when the store has no column data.
    pub column: u32,
    pub column_end: u32,
    pub rva: Rva,
    pub length: u32,
    pub statement: bool,
}

/// Selects line records.
#[derive(Debug, Clone)]
pub enum LineQuery
{
    /// Every record.
    All,
    /// Records of a compiland and/or a file.
    ForFile
    {
        compiland: Option<SymbolId>,
        file: Option<u32>,
    },
    /// Records whose code overlaps `[rva, rva + length)`.
    Range
    {
        rva: Rva,
        length: u32,
    },
    /// Records for a source line. `column` 0 matches every column.
    LineNumber
    {
        compiland: Option<SymbolId>,
        file: u32,
        line: u32,
        column: u32,
    },
}

/// Selects inlinee line records.
#[derive(Debug, Clone)]
pub enum InlineeQuery
{
    /// Every inlinee line under `parent` (a function or inline site).
    ForSymbol(SymbolId),
    Range
    {
        parent: SymbolId,
        rva: Rva,
        length: u32,
    },
    LineNumber
    {
        compiland: Option<SymbolId>,
        file: u32,
        line: u32,
        column: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRecord
{
    pub id: u32,
    pub file_name: String,
    pub checksum_type: u32,
    pub checksum: Vec<u8>,
    pub compilands: Vec<SymbolId>,
}

/// Compression applied to injected source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceCompression
{
    #[default]
    None,
    RunLength,
    Huffman,
    LempelZiv,
    Other(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedSourceRecord
{
    pub file_name: String,
    pub object_file_name: Option<String>,
    pub virtual_file_name: Option<String>,
    pub crc: u32,
    pub compression: SourceCompression,
    pub source: Vec<u8>,
}

/// A named stream of fixed-size records (`FPO`, `OMAPTO`, ...).
#[derive(Debug, Clone)]
pub struct DebugStreamRecord
{
    pub name: String,
    pub records: Vec<Arc<[u8]>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAssemblyRecord
{
    pub id: u32,
    pub index: u32,
    pub timestamp: u32,
    pub store_available: bool,
    pub file_name: String,
    pub version: Vec<u8>,
}

/// One section of the image the store describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader
{
    /// One-based section number.
    pub number: u32,
    pub name: String,
    pub rva: Rva,
    pub virtual_size: u32,
    pub characteristics: u32,
}

impl SectionHeader
{
    pub fn contains(&self, rva: Rva) -> bool
    {
        rva.value() >= self.rva.value() && u64::from(rva.value()) < u64::from(self.rva.value()) + u64::from(self.virtual_size)
    }
}

/// A contiguous piece of a function split across the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionFragment
{
    pub rva: Rva,
    pub length: u32,
}

/// An opened debug store.
pub trait Store: Send + Sync + Debug
{
    fn signature(&self) -> StoreSignature;

    fn machine(&self) -> MachineType;

    /// The executable symbol at the root of the tree.
    fn global_scope(&self) -> Arc<SymbolRecord>;

    fn symbol(&self, id: SymbolId) -> Result<Option<Arc<SymbolRecord>>>;

    /// Every symbol in the store, in id order.
    fn symbols(&self) -> Result<Vec<Arc<SymbolRecord>>>;

    fn find_children(&self, parent: SymbolId, query: &ChildQuery) -> Result<Vec<Arc<SymbolRecord>>>;

    /// Symbols with an address, ordered by RVA.
    fn symbols_by_address(&self) -> Result<Vec<Arc<SymbolRecord>>>;

    fn find_symbol_by_rva(&self, rva: Rva, tag: SymTag) -> Result<Option<SymbolHit>>;

    fn find_symbol_by_token(&self, token: u32, tag: SymTag) -> Result<Option<Arc<SymbolRecord>>>;

    fn symbols_equivalent(&self, a: SymbolId, b: SymbolId) -> Result<bool>;

    fn sections(&self) -> Result<Vec<SectionHeader>>;

    fn find_files(&self, compiland: Option<SymbolId>, matcher: &NameMatcher) -> Result<Vec<Arc<SourceFileRecord>>>;

    fn file_by_id(&self, id: u32) -> Result<Option<Arc<SourceFileRecord>>>;

    fn find_lines(&self, query: &LineQuery) -> Result<Vec<LineRecord>>;

    /// Injected sources, all of them when `name` is `None`.
    fn injected_sources(&self, name: Option<&str>) -> Result<Vec<Arc<InjectedSourceRecord>>>;

    fn debug_streams(&self) -> Result<Vec<Arc<DebugStreamRecord>>>;

    fn exports(&self) -> Result<Vec<Arc<SymbolRecord>>>;

    fn heap_allocation_sites(&self) -> Result<Vec<Arc<SymbolRecord>>>;

    /// Inline sites under `parent` that cover `rva`, innermost first.
    fn find_inline_frames(&self, _parent: SymbolId, _rva: Rva) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Err(DiaError::NotImplemented("find_inline_frames"))
    }

    fn find_inlinee_lines(&self, _query: &InlineeQuery) -> Result<Vec<LineRecord>>
    {
        Err(DiaError::NotImplemented("find_inlinee_lines"))
    }

    /// Functions inlined anywhere, selected by name.
    fn find_inlinees_by_name(&self, _matcher: &NameMatcher) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Err(DiaError::NotImplemented("find_inlinees_by_name"))
    }

    /// IL offset records overlapping `[rva, rva + length)`.
    fn find_il_offsets(&self, _rva: Rva, _length: u32) -> Result<Vec<LineRecord>>
    {
        Err(DiaError::NotImplemented("find_il_offsets"))
    }

    fn input_assembly_files(&self) -> Result<Vec<Arc<InputAssemblyRecord>>>
    {
        Err(DiaError::NotImplemented("input_assembly_files"))
    }

    fn input_assembly_for_symbol(&self, _symbol: SymbolId) -> Result<Option<Arc<InputAssemblyRecord>>>
    {
        Err(DiaError::NotImplemented("input_assembly_for_symbol"))
    }

    fn func_token_map(&self) -> Result<Vec<u8>>
    {
        Err(DiaError::NotImplemented("func_md_token_map"))
    }

    fn type_token_map(&self) -> Result<Vec<u8>>
    {
        Err(DiaError::NotImplemented("type_md_token_map"))
    }

    /// Fragments of the function whose code contains `rva`.
    fn function_fragments(&self, _rva: Rva) -> Result<Vec<FunctionFragment>>
    {
        Err(DiaError::NotImplemented("function_fragments"))
    }
}
