//! # Session
//!
//! A [`Session`] is the query surface over one loaded store. Every query
//! follows the same shape: a selector (parent, address, name, line) and
//! optionally a tag in, an [`Enumerator`] or an `Option` out. Absence is an
//! empty enumerator or `Ok(None)`, never an error.
//!
//! ## Addresses
//!
//! Lookups come in three flavours, one per coordinate system:
//! `_by_addr` (section + offset), `_by_rva` and `_by_va`. Stores answer in
//! RVAs; the session converts using the store's section map and its own load
//! address. An address that does not map onto the image yields no result. The
//! explicit conversion methods ([`Session::rva_for_va`] and friends) report
//! [`DiaError::InvalidArgument`] instead.
//!
//! ## Lifetime
//!
//! Sessions are cheap to clone and share the store with the data source that
//! opened them. Once that data source is dropped every query fails with
//! [`DiaError::SourceReleased`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::engine::{
    ChildQuery, FunctionFragment, InlineeQuery, LineQuery, LineRecord, SectionHeader, Store, StoreSignature,
    SymbolRecord,
};
use crate::enumerator::Enumerator;
use crate::error::{DiaError, Result};
use crate::source::SourceLease;
use crate::types::{Address, MachineType, NameMatcher, NameSearchOptions, Rva, SectionOffset, SymTag, SymbolId, Va};

mod by_addr;
mod items;
mod symbol;

pub use by_addr::SymbolsByAddr;
pub use items::{DebugStream, InjectedSource, InputAssemblyFile, LineNumber, SourceFile, Table, TableKind, TableRows};
pub use symbol::{Equivalence, Symbol, SymbolMatch};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by a session, its clones and everything it hands out.
pub(crate) struct SessionShared
{
    pub(crate) id: u64,
    pub(crate) store: Arc<dyn Store>,
    lease: Arc<SourceLease>,
    load_address: AtomicU64,
}

impl SessionShared
{
    pub(crate) fn load_address(&self) -> u64
    {
        self.load_address.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()>
    {
        self.lease.check()
    }
}

impl fmt::Debug for SessionShared
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("SessionShared")
            .field("id", &self.id)
            .field("load_address", &format_args!("0x{:x}", self.load_address()))
            .finish_non_exhaustive()
    }
}

/// Query surface over one loaded store.
#[derive(Debug, Clone)]
pub struct Session
{
    pub(crate) shared: Arc<SessionShared>,
}

impl Session
{
    pub(crate) fn new(store: Arc<dyn Store>, lease: Arc<SourceLease>) -> Self
    {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        trace!(session = id, "Opened session");
        Self {
            shared: Arc::new(SessionShared {
                id,
                store,
                lease,
                load_address: AtomicU64::new(0),
            }),
        }
    }

    /// Process-unique id of this session. Clones share it.
    pub fn id(&self) -> u64
    {
        self.shared.id
    }

    pub(crate) fn check(&self) -> Result<()>
    {
        self.shared.check()
    }

    fn store(&self) -> Result<&dyn Store>
    {
        self.shared.check()?;
        Ok(self.shared.store.as_ref())
    }

    /// Base address used for VA conversions. Defaults to 0.
    pub fn load_address(&self) -> u64
    {
        self.shared.load_address()
    }

    /// Changes the load address for this session and every clone of it.
    pub fn set_load_address(&self, load_address: u64)
    {
        trace!(session = self.shared.id, load_address, "set_load_address");
        self.shared.load_address.store(load_address, Ordering::Release);
    }

    pub fn global_scope(&self) -> Result<Symbol>
    {
        let store = self.store()?;
        Ok(self.wrap(store.global_scope()))
    }

    pub fn machine(&self) -> Result<MachineType>
    {
        Ok(self.store()?.machine())
    }

    pub fn signature(&self) -> Result<StoreSignature>
    {
        Ok(self.store()?.signature())
    }

    pub fn symbol_by_id(&self, id: SymbolId) -> Result<Option<Symbol>>
    {
        trace!(session = self.shared.id, %id, "symbol_by_id");
        Ok(self.store()?.symbol(id)?.map(|record| self.wrap(record)))
    }

    fn wrap(&self, record: Arc<SymbolRecord>) -> Symbol
    {
        Symbol::new(record, Arc::clone(&self.shared))
    }

    fn wrap_all(&self, records: Vec<Arc<SymbolRecord>>) -> Enumerator<Symbol>
    {
        records.into_iter().map(|record| self.wrap(record)).collect::<Vec<_>>().into()
    }

    fn wrap_lines(&self, records: Vec<LineRecord>) -> Enumerator<LineNumber>
    {
        records
            .into_iter()
            .map(|record| LineNumber {
                record,
                session: Arc::clone(&self.shared),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn owns(&self, symbol: &Symbol) -> Result<()>
    {
        if symbol.session.id == self.shared.id {
            Ok(())
        } else {
            Err(DiaError::CrossSession)
        }
    }

    /// Resolve any coordinate to an RVA, `None` when it is outside the image.
    fn resolve(&self, address: Address) -> Result<Option<Rva>>
    {
        match address {
            Address::Rva(rva) => Ok(Some(rva)),
            Address::Va(va) => Ok(va.to_rva(self.load_address())),
            Address::Section(so) => {
                let sections = self.store()?.sections()?;
                Ok(section_to_rva(&sections, so))
            }
        }
    }

    // ==================================================================
    // Children
    // ==================================================================

    /// Children of `parent` with the given tag and name.
    ///
    /// With no parent, only [`SymTag::Exe`] and [`SymTag::Null`] are
    /// accepted, and the result holds just the global scope.
    pub fn find_children(
        &self,
        parent: Option<&Symbol>,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
    ) -> Result<Enumerator<Symbol>>
    {
        self.children(parent, tag, name, options, None)
    }

    /// Same contract as [`Session::find_children`].
    pub fn find_children_ex(
        &self,
        parent: Option<&Symbol>,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
    ) -> Result<Enumerator<Symbol>>
    {
        self.children(parent, tag, name, options, None)
    }

    /// Children of `parent` whose range contains `address`.
    pub fn find_children_ex_by_addr(
        &self,
        parent: &Symbol,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
        address: SectionOffset,
    ) -> Result<Enumerator<Symbol>>
    {
        self.children_at(parent, tag, name, options, Address::Section(address))
    }

    pub fn find_children_ex_by_rva(
        &self,
        parent: &Symbol,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
        rva: Rva,
    ) -> Result<Enumerator<Symbol>>
    {
        self.children_at(parent, tag, name, options, Address::Rva(rva))
    }

    pub fn find_children_ex_by_va(
        &self,
        parent: &Symbol,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
        va: Va,
    ) -> Result<Enumerator<Symbol>>
    {
        self.children_at(parent, tag, name, options, Address::Va(va))
    }

    fn children_at(
        &self,
        parent: &Symbol,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
        address: Address,
    ) -> Result<Enumerator<Symbol>>
    {
        match self.resolve(address)? {
            Some(rva) => self.children(Some(parent), tag, name, options, Some(rva)),
            None => Ok(Enumerator::empty()),
        }
    }

    fn children(
        &self,
        parent: Option<&Symbol>,
        tag: SymTag,
        name: Option<&str>,
        options: NameSearchOptions,
        rva: Option<Rva>,
    ) -> Result<Enumerator<Symbol>>
    {
        let store = self.store()?;
        let Some(parent) = parent else {
            if matches!(tag, SymTag::Exe | SymTag::Null) {
                return Ok(Enumerator::from_vec(vec![self.wrap(store.global_scope())]));
            }
            return Err(DiaError::InvalidArgument(format!(
                "a parent symbol is required to find {tag} children"
            )));
        };
        self.owns(parent)?;
        trace!(session = self.shared.id, parent = %parent.id(), %tag, name, "find_children");

        let query = ChildQuery {
            tag,
            matcher: NameMatcher::new(name, options),
            rva,
        };
        Ok(self.wrap_all(store.find_children(parent.id(), &query)?))
    }

    // ==================================================================
    // Symbols by address and token
    // ==================================================================

    /// The symbol of kind `tag` whose range contains `address`.
    pub fn find_symbol_by_addr(&self, address: SectionOffset, tag: SymTag) -> Result<Option<Symbol>>
    {
        self.symbol_containing(Address::Section(address), tag)
    }

    pub fn find_symbol_by_rva(&self, rva: Rva, tag: SymTag) -> Result<Option<Symbol>>
    {
        self.symbol_containing(Address::Rva(rva), tag)
    }

    pub fn find_symbol_by_va(&self, va: Va, tag: SymTag) -> Result<Option<Symbol>>
    {
        self.symbol_containing(Address::Va(va), tag)
    }

    /// Like [`Session::find_symbol_by_addr`], also reporting the displacement
    /// and falling back to the nearest preceding public symbol.
    pub fn find_symbol_by_addr_ex(&self, address: SectionOffset, tag: SymTag) -> Result<Option<SymbolMatch>>
    {
        self.symbol_near(Address::Section(address), tag)
    }

    pub fn find_symbol_by_rva_ex(&self, rva: Rva, tag: SymTag) -> Result<Option<SymbolMatch>>
    {
        self.symbol_near(Address::Rva(rva), tag)
    }

    pub fn find_symbol_by_va_ex(&self, va: Va, tag: SymTag) -> Result<Option<SymbolMatch>>
    {
        self.symbol_near(Address::Va(va), tag)
    }

    fn symbol_containing(&self, address: Address, tag: SymTag) -> Result<Option<Symbol>>
    {
        Ok(self
            .symbol_near(address, tag)?
            .filter(|found| !found.approximate)
            .map(|found| found.symbol))
    }

    fn symbol_near(&self, address: Address, tag: SymTag) -> Result<Option<SymbolMatch>>
    {
        trace!(session = self.shared.id, %address, %tag, "find_symbol");
        let Some(rva) = self.resolve(address)? else {
            return Ok(None);
        };
        let hit = self.store()?.find_symbol_by_rva(rva, tag)?;
        Ok(hit.map(|hit| SymbolMatch {
            symbol: self.wrap(hit.record),
            displacement: hit.displacement,
            approximate: hit.approximate,
        }))
    }

    /// The managed symbol with metadata token `token`.
    pub fn find_symbol_by_token(&self, token: u32, tag: SymTag) -> Result<Option<Symbol>>
    {
        trace!(session = self.shared.id, token, %tag, "find_symbol_by_token");
        Ok(self.store()?.find_symbol_by_token(token, tag)?.map(|record| self.wrap(record)))
    }

    /// Whether two symbols of this session denote the same entity.
    pub fn syms_are_equiv(&self, a: &Symbol, b: &Symbol) -> Result<Equivalence>
    {
        self.owns(a)?;
        self.owns(b)?;
        let equivalent = self.store()?.symbols_equivalent(a.id(), b.id())?;
        Ok(if equivalent {
            Equivalence::Equivalent
        } else {
            Equivalence::NotEquivalent
        })
    }

    /// Every addressed symbol in address order.
    pub fn symbols_by_addr(&self) -> Result<SymbolsByAddr>
    {
        let records = self.store()?.symbols_by_address()?;
        Ok(SymbolsByAddr::new(self.wrap_all(records), self.clone()))
    }

    pub fn exports(&self) -> Result<Enumerator<Symbol>>
    {
        Ok(self.wrap_all(self.store()?.exports()?))
    }

    pub fn heap_allocation_sites(&self) -> Result<Enumerator<Symbol>>
    {
        Ok(self.wrap_all(self.store()?.heap_allocation_sites()?))
    }

    // ==================================================================
    // Source files and lines
    // ==================================================================

    /// Source files, optionally restricted to one compiland, selected by name.
    pub fn find_file(
        &self,
        compiland: Option<&Symbol>,
        name: Option<&str>,
        options: NameSearchOptions,
    ) -> Result<Enumerator<SourceFile>>
    {
        if let Some(compiland) = compiland {
            self.owns(compiland)?;
        }
        trace!(session = self.shared.id, name, "find_file");
        let matcher = NameMatcher::new(name, options);
        let files = self.store()?.find_files(compiland.map(Symbol::id), &matcher)?;
        Ok(files
            .into_iter()
            .map(|record| SourceFile {
                record,
                session: Arc::clone(&self.shared),
            })
            .collect::<Vec<_>>()
            .into())
    }

    pub fn find_file_by_id(&self, id: u32) -> Result<Option<SourceFile>>
    {
        Ok(self.store()?.file_by_id(id)?.map(|record| SourceFile {
            record,
            session: Arc::clone(&self.shared),
        }))
    }

    /// Line records contributed by `compiland` for `file`.
    pub fn find_lines(&self, compiland: &Symbol, file: &SourceFile) -> Result<Enumerator<LineNumber>>
    {
        self.owns(compiland)?;
        let query = LineQuery::ForFile {
            compiland: Some(compiland.id()),
            file: Some(file.id()),
        };
        self.lines(&query)
    }

    /// Line records whose code overlaps `[address, address + length)`.
    pub fn find_lines_by_addr(&self, address: SectionOffset, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.lines_at(Address::Section(address), length)
    }

    pub fn find_lines_by_rva(&self, rva: Rva, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.lines_at(Address::Rva(rva), length)
    }

    pub fn find_lines_by_va(&self, va: Va, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.lines_at(Address::Va(va), length)
    }

    fn lines_at(&self, address: Address, length: u32) -> Result<Enumerator<LineNumber>>
    {
        match self.resolve(address)? {
            Some(rva) => self.lines(&LineQuery::Range { rva, length }),
            None => Ok(Enumerator::empty()),
        }
    }

    /// Line records for a one-based source line. A `column` of 0 matches
    /// every column. When no record is on `line` exactly, the records of the
    /// nearest following line with code are returned.
    pub fn find_lines_by_linenum(
        &self,
        compiland: Option<&Symbol>,
        file: &SourceFile,
        line: u32,
        column: u32,
    ) -> Result<Enumerator<LineNumber>>
    {
        let compiland = self.linenum_compiland(compiland, line)?;
        self.lines(&LineQuery::LineNumber {
            compiland,
            file: file.id(),
            line,
            column,
        })
    }

    fn linenum_compiland(&self, compiland: Option<&Symbol>, line: u32) -> Result<Option<SymbolId>>
    {
        if line == 0 {
            return Err(DiaError::InvalidArgument("line numbers are one-based".to_string()));
        }
        if let Some(compiland) = compiland {
            self.owns(compiland)?;
        }
        Ok(compiland.map(Symbol::id))
    }

    fn lines(&self, query: &LineQuery) -> Result<Enumerator<LineNumber>>
    {
        trace!(session = self.shared.id, ?query, "find_lines");
        Ok(self.wrap_lines(self.store()?.find_lines(query)?))
    }

    // ==================================================================
    // Inline frames and inlinee lines
    // ==================================================================

    /// Inline sites under `parent` covering `address`, innermost first.
    pub fn find_inline_frames_by_addr(&self, parent: &Symbol, address: SectionOffset) -> Result<Enumerator<Symbol>>
    {
        self.inline_frames(parent, Address::Section(address))
    }

    pub fn find_inline_frames_by_rva(&self, parent: &Symbol, rva: Rva) -> Result<Enumerator<Symbol>>
    {
        self.inline_frames(parent, Address::Rva(rva))
    }

    pub fn find_inline_frames_by_va(&self, parent: &Symbol, va: Va) -> Result<Enumerator<Symbol>>
    {
        self.inline_frames(parent, Address::Va(va))
    }

    fn inline_frames(&self, parent: &Symbol, address: Address) -> Result<Enumerator<Symbol>>
    {
        self.owns(parent)?;
        trace!(session = self.shared.id, parent = %parent.id(), %address, "find_inline_frames");
        let Some(rva) = self.resolve(address)? else {
            return Ok(Enumerator::empty());
        };
        Ok(self.wrap_all(self.store()?.find_inline_frames(parent.id(), rva)?))
    }

    /// Inlinee line records under a function or inline site.
    pub fn find_inlinee_lines(&self, parent: &Symbol) -> Result<Enumerator<LineNumber>>
    {
        self.owns(parent)?;
        self.inlinee_lines(&InlineeQuery::ForSymbol(parent.id()))
    }

    pub fn find_inlinee_lines_by_addr(
        &self,
        parent: &Symbol,
        address: SectionOffset,
        length: u32,
    ) -> Result<Enumerator<LineNumber>>
    {
        self.inlinee_lines_at(parent, Address::Section(address), length)
    }

    pub fn find_inlinee_lines_by_rva(&self, parent: &Symbol, rva: Rva, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.inlinee_lines_at(parent, Address::Rva(rva), length)
    }

    pub fn find_inlinee_lines_by_va(&self, parent: &Symbol, va: Va, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.inlinee_lines_at(parent, Address::Va(va), length)
    }

    fn inlinee_lines_at(&self, parent: &Symbol, address: Address, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.owns(parent)?;
        match self.resolve(address)? {
            Some(rva) => self.inlinee_lines(&InlineeQuery::Range {
                parent: parent.id(),
                rva,
                length,
            }),
            None => Ok(Enumerator::empty()),
        }
    }

    pub fn find_inlinee_lines_by_linenum(
        &self,
        compiland: Option<&Symbol>,
        file: &SourceFile,
        line: u32,
        column: u32,
    ) -> Result<Enumerator<LineNumber>>
    {
        let compiland = self.linenum_compiland(compiland, line)?;
        self.inlinee_lines(&InlineeQuery::LineNumber {
            compiland,
            file: file.id(),
            line,
            column,
        })
    }

    fn inlinee_lines(&self, query: &InlineeQuery) -> Result<Enumerator<LineNumber>>
    {
        trace!(session = self.shared.id, ?query, "find_inlinee_lines");
        Ok(self.wrap_lines(self.store()?.find_inlinee_lines(query)?))
    }

    /// Functions that were inlined somewhere, selected by name.
    pub fn find_inlinees_by_name(&self, name: Option<&str>, options: NameSearchOptions) -> Result<Enumerator<Symbol>>
    {
        trace!(session = self.shared.id, name, "find_inlinees_by_name");
        let matcher = NameMatcher::new(name, options);
        Ok(self.wrap_all(self.store()?.find_inlinees_by_name(&matcher)?))
    }

    // ==================================================================
    // IL offsets
    // ==================================================================

    pub fn find_il_offsets_by_addr(&self, address: SectionOffset, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.il_offsets(Address::Section(address), length)
    }

    pub fn find_il_offsets_by_rva(&self, rva: Rva, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.il_offsets(Address::Rva(rva), length)
    }

    pub fn find_il_offsets_by_va(&self, va: Va, length: u32) -> Result<Enumerator<LineNumber>>
    {
        self.il_offsets(Address::Va(va), length)
    }

    fn il_offsets(&self, address: Address, length: u32) -> Result<Enumerator<LineNumber>>
    {
        trace!(session = self.shared.id, %address, length, "find_il_offsets");
        let Some(rva) = self.resolve(address)? else {
            return Ok(Enumerator::empty());
        };
        Ok(self.wrap_lines(self.store()?.find_il_offsets(rva, length)?))
    }

    // ==================================================================
    // Injected sources, streams, assemblies, token maps
    // ==================================================================

    /// Injected sources named `name`, or all of them.
    pub fn find_injected_source(&self, name: Option<&str>) -> Result<Enumerator<InjectedSource>>
    {
        trace!(session = self.shared.id, name, "find_injected_source");
        let sources = self.store()?.injected_sources(name)?;
        Ok(sources
            .into_iter()
            .map(|record| InjectedSource { record })
            .collect::<Vec<_>>()
            .into())
    }

    pub fn enum_debug_streams(&self) -> Result<Enumerator<DebugStream>>
    {
        let streams = self.store()?.debug_streams()?;
        Ok(streams
            .iter()
            .map(|stream| DebugStream {
                name: stream.name.clone(),
                records: Enumerator::from_vec(stream.records.clone()),
            })
            .collect::<Vec<_>>()
            .into())
    }

    pub fn find_input_assembly_files(&self) -> Result<Enumerator<InputAssemblyFile>>
    {
        Ok(self
            .store()?
            .input_assembly_files()?
            .into_iter()
            .map(|record| InputAssemblyFile { record })
            .collect::<Vec<_>>()
            .into())
    }

    /// The input assembly at position `index`.
    pub fn find_input_assembly(&self, index: u32) -> Result<Option<InputAssemblyFile>>
    {
        let assemblies = self.store()?.input_assembly_files()?;
        Ok(assemblies
            .into_iter()
            .find(|record| record.index == index)
            .map(|record| InputAssemblyFile { record }))
    }

    pub fn find_input_assembly_by_id(&self, id: u32) -> Result<Option<InputAssemblyFile>>
    {
        let assemblies = self.store()?.input_assembly_files()?;
        Ok(assemblies
            .into_iter()
            .find(|record| record.id == id)
            .map(|record| InputAssemblyFile { record }))
    }

    /// The input assembly that defined `symbol`.
    pub fn find_input_assembly_file(&self, symbol: &Symbol) -> Result<Option<InputAssemblyFile>>
    {
        self.owns(symbol)?;
        let found = self.store()?.input_assembly_for_symbol(symbol.id())?;
        Ok(found.map(|record| InputAssemblyFile { record }))
    }

    /// Raw bytes of the function metadata token map.
    pub fn func_md_token_map(&self) -> Result<Vec<u8>>
    {
        self.store()?.func_token_map()
    }

    /// Raw bytes of the type metadata token map.
    pub fn type_md_token_map(&self) -> Result<Vec<u8>>
    {
        self.store()?.type_token_map()
    }

    /// Pieces of the function whose code contains `rva`.
    pub fn function_fragments_by_rva(&self, rva: Rva) -> Result<Vec<FunctionFragment>>
    {
        trace!(session = self.shared.id, %rva, "function_fragments");
        self.store()?.function_fragments(rva)
    }

    pub fn function_fragments_by_va(&self, va: Va) -> Result<Vec<FunctionFragment>>
    {
        match va.to_rva(self.load_address()) {
            Some(rva) => self.function_fragments_by_rva(rva),
            None => Ok(Vec::new()),
        }
    }

    // ==================================================================
    // Tables
    // ==================================================================

    /// The store's tables. Tables an engine does not support are left out.
    pub fn enum_tables(&self) -> Result<Enumerator<Table>>
    {
        let store = self.store()?;
        let mut tables = vec![
            Table {
                rows: TableRows::Symbols(self.wrap_all(store.symbols()?)),
            },
            Table {
                rows: TableRows::SourceFiles(self.find_file(None, None, NameSearchOptions::empty())?),
            },
            Table {
                rows: TableRows::LineNumbers(self.lines(&LineQuery::All)?),
            },
            Table {
                rows: TableRows::Segments(Enumerator::from_vec(store.sections()?)),
            },
            Table {
                rows: TableRows::InjectedSource(self.find_injected_source(None)?),
            },
        ];
        match self.find_input_assembly_files() {
            Ok(assemblies) => tables.push(Table {
                rows: TableRows::InputAssemblyFiles(assemblies),
            }),
            Err(DiaError::NotImplemented(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(Enumerator::from_vec(tables))
    }

    // ==================================================================
    // Address conversions
    // ==================================================================

    pub fn address_for_rva(&self, rva: Rva) -> Result<SectionOffset>
    {
        let sections = self.store()?.sections()?;
        sections
            .iter()
            .find(|section| section.contains(rva))
            .and_then(|section| {
                rva.offset_from(section.rva)
                    .map(|offset| SectionOffset::new(section.number, offset))
            })
            .ok_or_else(|| DiaError::InvalidArgument(format!("rva {rva} is not inside any section")))
    }

    pub fn address_for_va(&self, va: Va) -> Result<SectionOffset>
    {
        let rva = self.rva_for_va(va)?;
        self.address_for_rva(rva)
    }

    pub fn rva_for_address(&self, address: SectionOffset) -> Result<Rva>
    {
        let sections = self.store()?.sections()?;
        section_to_rva(&sections, address)
            .ok_or_else(|| DiaError::InvalidArgument(format!("{address} is not inside any section")))
    }

    pub fn rva_for_va(&self, va: Va) -> Result<Rva>
    {
        va.to_rva(self.load_address())
            .ok_or_else(|| DiaError::InvalidArgument(format!("{va} is outside the image")))
    }

    pub fn va_for_rva(&self, rva: Rva) -> Va
    {
        rva.to_va(self.load_address())
    }

    pub fn va_for_address(&self, address: SectionOffset) -> Result<Va>
    {
        Ok(self.va_for_rva(self.rva_for_address(address)?))
    }
}

fn section_to_rva(sections: &[SectionHeader], address: SectionOffset) -> Option<Rva>
{
    let section = sections.iter().find(|section| section.number == address.section)?;
    let rva = section.rva.checked_add(address.offset)?;
    section.contains(rva).then_some(rva)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sections() -> Vec<SectionHeader>
    {
        vec![
            SectionHeader {
                number: 1,
                name: ".text".to_string(),
                rva: Rva::new(0x1000),
                virtual_size: 0x800,
                characteristics: 0,
            },
            SectionHeader {
                number: 2,
                name: ".data".to_string(),
                rva: Rva::new(0x2000),
                virtual_size: 0x100,
                characteristics: 0,
            },
            SectionHeader {
                number: 3,
                name: ".bss".to_string(),
                rva: Rva::new(0x3000),
                virtual_size: 0,
                characteristics: 0,
            },
        ]
    }

    #[test]
    fn test_section_to_rva()
    {
        let sections = sections();
        assert_eq!(section_to_rva(&sections, SectionOffset::new(1, 0x10)), Some(Rva::new(0x1010)));
        assert_eq!(section_to_rva(&sections, SectionOffset::new(2, 0xff)), Some(Rva::new(0x20ff)));
        assert_eq!(section_to_rva(&sections, SectionOffset::new(2, 0x100)), None);
        assert_eq!(section_to_rva(&sections, SectionOffset::new(4, 0)), None);
    }

    #[test]
    fn test_empty_section_maps_no_address()
    {
        let sections = sections();
        let empty = &sections[2];
        assert!(!empty.contains(Rva::new(0x3000)));
        assert_eq!(section_to_rva(&sections, SectionOffset::new(3, 0)), None);

        // Both directions agree on every section boundary
        for section in &sections {
            for offset in [0, section.virtual_size.saturating_sub(1), section.virtual_size] {
                let rva = Rva::new(section.rva.value() + offset);
                let mapped = section_to_rva(&sections, SectionOffset::new(section.number, offset));
                assert_eq!(mapped.is_some(), section.contains(rva), "section {} offset {offset:#x}", section.number);
            }
        }
    }
}
