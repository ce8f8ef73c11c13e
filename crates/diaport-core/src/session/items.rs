//! Non-symbol query results: source files, line numbers, injected sources,
//! debug streams, input assemblies and tables.

use std::fmt;
use std::sync::Arc;

use super::{Session, SessionShared, Symbol};
use crate::engine::{
    InjectedSourceRecord, InputAssemblyRecord, LineRecord, SectionHeader, SourceCompression, SourceFileRecord,
};
use crate::enumerator::{Enumerator, Named};
use crate::error::{DiaError, Result};
use crate::types::{Rva, SectionOffset, SymbolId, Va};

/// A source file referenced by one or more compilands.
#[derive(Clone)]
pub struct SourceFile
{
    pub(crate) record: Arc<SourceFileRecord>,
    pub(crate) session: Arc<SessionShared>,
}

impl SourceFile
{
    pub fn id(&self) -> u32
    {
        self.record.id
    }

    pub fn file_name(&self) -> &str
    {
        &self.record.file_name
    }

    pub fn checksum_type(&self) -> u32
    {
        self.record.checksum_type
    }

    pub fn checksum(&self) -> &[u8]
    {
        &self.record.checksum
    }

    /// Compilands that reference this file.
    pub fn compilands(&self) -> Result<Enumerator<Symbol>>
    {
        self.session.check()?;
        let mut symbols = Vec::with_capacity(self.record.compilands.len());
        for id in &self.record.compilands {
            if let Some(record) = self.session.store.symbol(*id)? {
                symbols.push(Symbol::new(record, Arc::clone(&self.session)));
            }
        }
        Ok(Enumerator::from_vec(symbols))
    }
}

impl fmt::Debug for SourceFile
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("SourceFile")
            .field("id", &self.record.id)
            .field("file_name", &self.record.file_name)
            .finish_non_exhaustive()
    }
}

impl Named for SourceFile
{
    fn item_name(&self) -> Option<&str>
    {
        Some(self.file_name())
    }
}

/// A line-number record mapping a code range to a source position.
#[derive(Clone)]
pub struct LineNumber
{
    pub(crate) record: LineRecord,
    pub(crate) session: Arc<SessionShared>,
}

impl LineNumber
{
    pub fn line_number(&self) -> u32
    {
        self.record.line
    }

    pub fn line_number_end(&self) -> u32
    {
        self.record.line_end
    }

    pub fn column_number(&self) -> u32
    {
        self.record.column
    }

    pub fn column_number_end(&self) -> u32
    {
        self.record.column_end
    }

    pub fn rva(&self) -> Rva
    {
        self.record.rva
    }

    pub fn va(&self) -> Va
    {
        self.record.rva.to_va(self.session.load_address())
    }

    pub fn section_offset(&self) -> Result<SectionOffset>
    {
        Session {
            shared: Arc::clone(&self.session),
        }
        .address_for_rva(self.record.rva)
    }

    /// Length of the code range in bytes.
    pub fn length(&self) -> u32
    {
        self.record.length
    }

    pub fn is_statement(&self) -> bool
    {
        self.record.statement
    }

    pub fn source_file_id(&self) -> u32
    {
        self.record.file_id
    }

    pub fn compiland_id(&self) -> SymbolId
    {
        self.record.compiland
    }

    pub fn compiland(&self) -> Result<Symbol>
    {
        self.session.check()?;
        let record = self
            .session
            .store
            .symbol(self.record.compiland)?
            .ok_or_else(|| DiaError::Corrupt(format!("line record names missing compiland {}", self.record.compiland)))?;
        Ok(Symbol::new(record, Arc::clone(&self.session)))
    }

    pub fn source_file(&self) -> Result<SourceFile>
    {
        self.session.check()?;
        let record = self
            .session
            .store
            .file_by_id(self.record.file_id)?
            .ok_or_else(|| DiaError::Corrupt(format!("line record names missing file {}", self.record.file_id)))?;
        Ok(SourceFile {
            record,
            session: Arc::clone(&self.session),
        })
    }
}

impl fmt::Debug for LineNumber
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("LineNumber")
            .field("line", &self.record.line)
            .field("column", &self.record.column)
            .field("rva", &self.record.rva)
            .field("length", &self.record.length)
            .finish_non_exhaustive()
    }
}

/// Source text injected into the store at build time.
#[derive(Debug, Clone)]
pub struct InjectedSource
{
    pub(crate) record: Arc<InjectedSourceRecord>,
}

impl InjectedSource
{
    pub fn file_name(&self) -> &str
    {
        &self.record.file_name
    }

    pub fn object_file_name(&self) -> Option<&str>
    {
        self.record.object_file_name.as_deref()
    }

    pub fn virtual_file_name(&self) -> Option<&str>
    {
        self.record.virtual_file_name.as_deref()
    }

    pub fn crc(&self) -> u32
    {
        self.record.crc
    }

    pub fn compression(&self) -> SourceCompression
    {
        self.record.compression
    }

    /// Source bytes as stored (still compressed if [`Self::compression`] says so).
    pub fn source(&self) -> &[u8]
    {
        &self.record.source
    }

    pub fn length(&self) -> usize
    {
        self.record.source.len()
    }
}

impl Named for InjectedSource
{
    fn item_name(&self) -> Option<&str>
    {
        Some(self.file_name())
    }
}

/// A named stream of fixed-size records.
#[derive(Debug, Clone)]
pub struct DebugStream
{
    pub(crate) name: String,
    pub(crate) records: Enumerator<Arc<[u8]>>,
}

impl DebugStream
{
    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn count(&self) -> usize
    {
        self.records.count()
    }

    /// A fresh enumerator over the stream's records.
    pub fn records(&self) -> Enumerator<Arc<[u8]>>
    {
        self.records.clone()
    }
}

impl Named for DebugStream
{
    fn item_name(&self) -> Option<&str>
    {
        Some(&self.name)
    }
}

/// A managed input assembly that contributed to the image.
#[derive(Debug, Clone)]
pub struct InputAssemblyFile
{
    pub(crate) record: Arc<InputAssemblyRecord>,
}

impl InputAssemblyFile
{
    pub fn unique_id(&self) -> u32
    {
        self.record.id
    }

    pub fn index(&self) -> u32
    {
        self.record.index
    }

    pub fn timestamp(&self) -> u32
    {
        self.record.timestamp
    }

    /// Whether a debug store is available for this assembly.
    pub fn store_available(&self) -> bool
    {
        self.record.store_available
    }

    pub fn file_name(&self) -> &str
    {
        &self.record.file_name
    }

    pub fn version(&self) -> &[u8]
    {
        &self.record.version
    }
}

impl Named for InputAssemblyFile
{
    fn item_name(&self) -> Option<&str>
    {
        Some(self.file_name())
    }
}

/// Which collection a [`Table`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind
{
    Symbols,
    SourceFiles,
    LineNumbers,
    Segments,
    InjectedSource,
    InputAssemblyFiles,
}

impl TableKind
{
    pub fn name(self) -> &'static str
    {
        match self {
            TableKind::Symbols => "Symbols",
            TableKind::SourceFiles => "SourceFiles",
            TableKind::LineNumbers => "LineNumbers",
            TableKind::Segments => "Segments",
            TableKind::InjectedSource => "InjectedSource",
            TableKind::InputAssemblyFiles => "InputAssemblyFiles",
        }
    }
}

/// Rows of a [`Table`], typed by kind.
#[derive(Debug, Clone)]
pub enum TableRows
{
    Symbols(Enumerator<Symbol>),
    SourceFiles(Enumerator<SourceFile>),
    LineNumbers(Enumerator<LineNumber>),
    Segments(Enumerator<SectionHeader>),
    InjectedSource(Enumerator<InjectedSource>),
    InputAssemblyFiles(Enumerator<InputAssemblyFile>),
}

/// A named, typed collection of store rows.
#[derive(Debug, Clone)]
pub struct Table
{
    pub(crate) rows: TableRows,
}

impl Table
{
    pub fn kind(&self) -> TableKind
    {
        match &self.rows {
            TableRows::Symbols(_) => TableKind::Symbols,
            TableRows::SourceFiles(_) => TableKind::SourceFiles,
            TableRows::LineNumbers(_) => TableKind::LineNumbers,
            TableRows::Segments(_) => TableKind::Segments,
            TableRows::InjectedSource(_) => TableKind::InjectedSource,
            TableRows::InputAssemblyFiles(_) => TableKind::InputAssemblyFiles,
        }
    }

    pub fn name(&self) -> &'static str
    {
        self.kind().name()
    }

    pub fn count(&self) -> usize
    {
        match &self.rows {
            TableRows::Symbols(rows) => rows.count(),
            TableRows::SourceFiles(rows) => rows.count(),
            TableRows::LineNumbers(rows) => rows.count(),
            TableRows::Segments(rows) => rows.count(),
            TableRows::InjectedSource(rows) => rows.count(),
            TableRows::InputAssemblyFiles(rows) => rows.count(),
        }
    }

    /// A fresh copy of the rows, cursor at the start.
    pub fn rows(&self) -> TableRows
    {
        self.rows.clone()
    }
}

impl Named for Table
{
    fn item_name(&self) -> Option<&str>
    {
        Some(self.name())
    }
}
