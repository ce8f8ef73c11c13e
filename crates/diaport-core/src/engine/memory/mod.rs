//! # Built-in Engine
//!
//! An engine backed by an in-memory store model.
//!
//! Stores are built with [`StoreBuilder`] or read from a JSON symbol manifest
//! (see [`manifest`]). The engine is registered under the default
//! registration name, so it is what the locator falls back to when no
//! versioned engine is registered on the host.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use super::{
    ChildQuery, DebugStreamRecord, Engine, FunctionFragment, InjectedSourceRecord, InlineeQuery, InputAssemblyRecord,
    LineQuery, LineRecord, SectionHeader, SourceFileRecord, Store, StoreSignature, SymbolHit, SymbolRecord,
};
use crate::error::{DiaError, Result};
use crate::types::{Guid, MachineType, NameMatcher, Rva, SymTag, SymbolData, SymbolId};

mod builder;
pub mod manifest;

pub use builder::{NewSymbol, StoreBuilder};

/// Identity of the built-in engine.
pub const MEMORY_ENGINE_ID: Guid = Guid::from_u128(0x5B7C_1E2A_9D4F_4E60_8B1A_3C2D_7E9F_0A11);

/// Engine that opens JSON symbol manifests.
#[derive(Debug, Clone)]
pub struct MemoryEngine
{
    identity: Guid,
}

impl MemoryEngine
{
    pub fn new() -> Self
    {
        Self {
            identity: MEMORY_ENGINE_ID,
        }
    }

    /// An instance that answers to another identity, for standing in as a
    /// versioned engine.
    pub fn with_identity(identity: Guid) -> Self
    {
        Self { identity }
    }
}

impl Default for MemoryEngine
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Engine for MemoryEngine
{
    fn identity(&self) -> Guid
    {
        self.identity
    }

    fn open_file(&self, path: &Path) -> Result<Arc<dyn Store>>
    {
        if !path.is_file() {
            return Err(DiaError::NotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "Opening symbol manifest");
        let bytes = std::fs::read(path)?;
        let store = manifest::parse(&bytes)?;
        Ok(Arc::new(store))
    }

    fn open_stream(&self, reader: &mut dyn Read) -> Result<Arc<dyn Store>>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let store = manifest::parse(&bytes)?;
        Ok(Arc::new(store))
    }
}

/// An opened in-memory store.
#[derive(Debug)]
pub struct MemoryStore
{
    signature: StoreSignature,
    machine: MachineType,
    legacy: bool,
    /// Indexed by `id - 1`.
    symbols: Vec<Arc<SymbolRecord>>,
    children: HashMap<SymbolId, Vec<SymbolId>>,
    /// Addressed symbols sorted by (rva, id).
    by_address: Vec<SymbolId>,
    sections: Vec<SectionHeader>,
    files: Vec<Arc<SourceFileRecord>>,
    lines: Vec<LineRecord>,
    inlinee_lines: HashMap<SymbolId, Vec<LineRecord>>,
    il_offsets: Vec<LineRecord>,
    injected: Vec<Arc<InjectedSourceRecord>>,
    streams: Vec<Arc<DebugStreamRecord>>,
    assemblies: Vec<Arc<InputAssemblyRecord>>,
    symbol_assemblies: HashMap<SymbolId, u32>,
    func_token_map: Vec<u8>,
    type_token_map: Vec<u8>,
    fragments: HashMap<SymbolId, Vec<FunctionFragment>>,
}

impl MemoryStore
{
    fn get(&self, id: SymbolId) -> Option<&Arc<SymbolRecord>>
    {
        (id.0 as usize).checked_sub(1).and_then(|index| self.symbols.get(index))
    }

    fn newer_surface(&self, query: &'static str) -> Result<()>
    {
        if self.legacy {
            Err(DiaError::NotImplemented(query))
        } else {
            Ok(())
        }
    }

    fn direct_children(&self, parent: SymbolId) -> impl Iterator<Item = &Arc<SymbolRecord>>
    {
        self.children
            .get(&parent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(*id))
    }

    /// Top level means the lexical parent is the global scope or a compiland.
    fn is_top_level(&self, record: &SymbolRecord) -> bool
    {
        match record.lexical_parent {
            Some(StoreBuilder::GLOBAL_SCOPE) => true,
            Some(parent) => self.get(parent).is_some_and(|p| p.tag() == SymTag::Compiland),
            None => false,
        }
    }

    fn name_matches(record: &SymbolRecord, matcher: &NameMatcher) -> bool
    {
        if matcher.is_unconstrained() {
            return true;
        }
        record.name_for(matcher).is_some_and(|name| matcher.matches(&name))
    }

    fn filtered(records: Vec<Arc<SymbolRecord>>, tag: SymTag) -> Vec<Arc<SymbolRecord>>
    {
        records.into_iter().filter(|r| tag.admits(r.tag())).collect()
    }

    fn nearest_public(&self, rva: Rva) -> Option<&Arc<SymbolRecord>>
    {
        let end = self
            .by_address
            .partition_point(|id| self.get(*id).and_then(|r| r.rva).is_some_and(|start| start <= rva));
        self.by_address[..end]
            .iter()
            .rev()
            .filter_map(|id| self.get(*id))
            .find(|record| record.tag() == SymTag::PublicSymbol)
    }

    /// Inline sites below `symbol`, depth first.
    fn inline_sites_under(&self, symbol: SymbolId, out: &mut Vec<SymbolId>)
    {
        for child in self.direct_children(symbol) {
            if child.tag() == SymTag::InlineSite {
                out.push(child.id);
            }
            self.inline_sites_under(child.id, out);
        }
    }
}

/// Public symbols and zero-length records only mark a start address; any
/// sized symbol covering the same address ranks ahead of them.
fn is_placeholder(record: &SymbolRecord) -> bool
{
    record.length == 0 || record.tag() == SymTag::PublicSymbol
}

fn displacement(rva: Rva, start: Rva) -> i32
{
    let delta = i64::from(rva.value()) - i64::from(start.value());
    i32::try_from(delta).unwrap_or(if delta < 0 { i32::MIN } else { i32::MAX })
}

fn overlaps(line: &LineRecord, rva: Rva, length: u32) -> bool
{
    let start = u64::from(rva.value());
    let end = start + u64::from(length.max(1));
    let line_start = u64::from(line.rva.value());
    let line_end = line_start + u64::from(line.length.max(1));
    line_start < end && start < line_end
}

fn column_matches(line: &LineRecord, column: u32) -> bool
{
    if column == 0 || line.column == 0 || line.column == column {
        return true;
    }
    line.column_end != 0 && line.column <= column && column < line.column_end
}

/// Exact matches for `line`/`column`, else every record of the nearest
/// following line.
fn select_by_line<'a>(candidates: impl Iterator<Item = &'a LineRecord> + Clone, line: u32, column: u32)
    -> Vec<LineRecord>
{
    let mut exact: Vec<LineRecord> = candidates
        .clone()
        .filter(|record| record.line == line && column_matches(record, column))
        .cloned()
        .collect();
    if exact.is_empty() {
        let next = candidates.clone().map(|record| record.line).filter(|l| *l > line).min();
        if let Some(next) = next {
            exact = candidates.filter(|record| record.line == next).cloned().collect();
        }
    }
    exact.sort_by_key(|record| record.rva);
    exact
}

impl Store for MemoryStore
{
    fn signature(&self) -> StoreSignature
    {
        self.signature
    }

    fn machine(&self) -> MachineType
    {
        self.machine
    }

    fn global_scope(&self) -> Arc<SymbolRecord>
    {
        Arc::clone(&self.symbols[0])
    }

    fn symbol(&self, id: SymbolId) -> Result<Option<Arc<SymbolRecord>>>
    {
        Ok(self.get(id).cloned())
    }

    fn symbols(&self) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Ok(self.symbols.clone())
    }

    fn find_children(&self, parent: SymbolId, query: &ChildQuery) -> Result<Vec<Arc<SymbolRecord>>>
    {
        if self.get(parent).is_none() {
            return Err(DiaError::InvalidArgument(format!("unknown symbol {parent}")));
        }
        let candidates: Vec<&Arc<SymbolRecord>> = if parent == StoreBuilder::GLOBAL_SCOPE && query.tag != SymTag::Null {
            self.symbols.iter().filter(|record| self.is_top_level(record)).collect()
        } else {
            self.direct_children(parent).collect()
        };

        Ok(candidates
            .into_iter()
            .filter(|record| query.tag.admits(record.tag()))
            .filter(|record| Self::name_matches(record, &query.matcher))
            .filter(|record| query.rva.is_none_or(|rva| record.contains(rva)))
            .cloned()
            .collect())
    }

    fn symbols_by_address(&self) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Ok(self.by_address.iter().filter_map(|id| self.get(*id)).cloned().collect())
    }

    fn find_symbol_by_rva(&self, rva: Rva, tag: SymTag) -> Result<Option<SymbolHit>>
    {
        let innermost = self
            .by_address
            .iter()
            .filter_map(|id| self.get(*id))
            .filter(|record| tag.admits(record.tag()) && record.contains(rva))
            .min_by_key(|record| (is_placeholder(record), record.length, std::cmp::Reverse(record.id)));

        if let Some(record) = innermost {
            let start = record.rva.unwrap_or(rva);
            return Ok(Some(SymbolHit {
                record: Arc::clone(record),
                displacement: displacement(rva, start),
                approximate: false,
            }));
        }

        if !tag.admits(SymTag::PublicSymbol) {
            return Ok(None);
        }
        Ok(self.nearest_public(rva).map(|record| {
            let start = record.rva.unwrap_or(rva);
            SymbolHit {
                record: Arc::clone(record),
                displacement: displacement(rva, start),
                approximate: true,
            }
        }))
    }

    fn find_symbol_by_token(&self, token: u32, tag: SymTag) -> Result<Option<Arc<SymbolRecord>>>
    {
        Ok(self
            .symbols
            .iter()
            .find(|record| record.token == Some(token) && tag.admits(record.tag()))
            .cloned())
    }

    fn symbols_equivalent(&self, a: SymbolId, b: SymbolId) -> Result<bool>
    {
        if a == b {
            return Ok(true);
        }
        let (Some(left), Some(right)) = (self.get(a), self.get(b)) else {
            return Err(DiaError::InvalidArgument(format!("unknown symbol {a} or {b}")));
        };
        Ok(left.tag() == right.tag()
            && left.name == right.name
            && left.rva == right.rva
            && left.length == right.length)
    }

    fn sections(&self) -> Result<Vec<SectionHeader>>
    {
        Ok(self.sections.clone())
    }

    fn find_files(&self, compiland: Option<SymbolId>, matcher: &NameMatcher) -> Result<Vec<Arc<SourceFileRecord>>>
    {
        Ok(self
            .files
            .iter()
            .filter(|file| compiland.is_none_or(|unit| file.compilands.contains(&unit)))
            .filter(|file| matcher.matches(&file.file_name))
            .cloned()
            .collect())
    }

    fn file_by_id(&self, id: u32) -> Result<Option<Arc<SourceFileRecord>>>
    {
        Ok(self.files.iter().find(|file| file.id == id).cloned())
    }

    fn find_lines(&self, query: &LineQuery) -> Result<Vec<LineRecord>>
    {
        let lines = match query {
            LineQuery::All => self.lines.clone(),
            LineQuery::ForFile { compiland, file } => self
                .lines
                .iter()
                .filter(|line| compiland.is_none_or(|unit| line.compiland == unit))
                .filter(|line| file.is_none_or(|id| line.file_id == id))
                .cloned()
                .collect(),
            LineQuery::Range { rva, length } => {
                self.lines.iter().filter(|line| overlaps(line, *rva, *length)).cloned().collect()
            }
            LineQuery::LineNumber {
                compiland,
                file,
                line,
                column,
            } => {
                let candidates = self
                    .lines
                    .iter()
                    .filter(|record| record.file_id == *file)
                    .filter(|record| compiland.is_none_or(|unit| record.compiland == unit));
                select_by_line(candidates, *line, *column)
            }
        };
        Ok(lines)
    }

    fn injected_sources(&self, name: Option<&str>) -> Result<Vec<Arc<InjectedSourceRecord>>>
    {
        Ok(self
            .injected
            .iter()
            .filter(|source| name.is_none_or(|name| source.file_name == name))
            .cloned()
            .collect())
    }

    fn debug_streams(&self) -> Result<Vec<Arc<DebugStreamRecord>>>
    {
        Ok(self.streams.clone())
    }

    fn exports(&self) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Ok(Self::filtered(self.symbols.clone(), SymTag::Export))
    }

    fn heap_allocation_sites(&self) -> Result<Vec<Arc<SymbolRecord>>>
    {
        Ok(Self::filtered(self.symbols.clone(), SymTag::HeapAllocationSite))
    }

    fn find_inline_frames(&self, parent: SymbolId, rva: Rva) -> Result<Vec<Arc<SymbolRecord>>>
    {
        self.newer_surface("find_inline_frames")?;
        let mut chain: SmallVec<[Arc<SymbolRecord>; 4]> = SmallVec::new();
        let mut current = parent;
        while let Some(site) = self
            .direct_children(current)
            .find(|child| child.tag() == SymTag::InlineSite && child.contains(rva))
        {
            current = site.id;
            chain.push(Arc::clone(site));
        }
        chain.reverse();
        Ok(chain.into_vec())
    }

    fn find_inlinee_lines(&self, query: &InlineeQuery) -> Result<Vec<LineRecord>>
    {
        self.newer_surface("find_inlinee_lines")?;
        let lines_under = |symbol: SymbolId| {
            let mut sites = Vec::new();
            if self.get(symbol).is_some_and(|r| r.tag() == SymTag::InlineSite) {
                sites.push(symbol);
            }
            self.inline_sites_under(symbol, &mut sites);
            sites
                .into_iter()
                .filter_map(|site| self.inlinee_lines.get(&site))
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
        };

        let lines = match query {
            InlineeQuery::ForSymbol(parent) => lines_under(*parent),
            InlineeQuery::Range { parent, rva, length } => lines_under(*parent)
                .into_iter()
                .filter(|line| overlaps(line, *rva, *length))
                .collect(),
            InlineeQuery::LineNumber {
                compiland,
                file,
                line,
                column,
            } => {
                let candidates = self
                    .inlinee_lines
                    .values()
                    .flatten()
                    .filter(|record| record.file_id == *file)
                    .filter(|record| compiland.is_none_or(|unit| record.compiland == unit));
                select_by_line(candidates, *line, *column)
            }
        };
        Ok(lines)
    }

    fn find_inlinees_by_name(&self, matcher: &NameMatcher) -> Result<Vec<Arc<SymbolRecord>>>
    {
        self.newer_surface("find_inlinees_by_name")?;
        let mut seen = Vec::new();
        for record in &self.symbols {
            if let SymbolData::InlineSite { inlinee: Some(inlinee) } = record.data {
                if !seen.contains(&inlinee) {
                    seen.push(inlinee);
                }
            }
        }
        Ok(seen
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|record| Self::name_matches(record, matcher))
            .cloned()
            .collect())
    }

    fn find_il_offsets(&self, rva: Rva, length: u32) -> Result<Vec<LineRecord>>
    {
        self.newer_surface("find_il_offsets")?;
        Ok(self
            .il_offsets
            .iter()
            .filter(|record| overlaps(record, rva, length))
            .cloned()
            .collect())
    }

    fn input_assembly_files(&self) -> Result<Vec<Arc<InputAssemblyRecord>>>
    {
        self.newer_surface("input_assembly_files")?;
        Ok(self.assemblies.clone())
    }

    fn input_assembly_for_symbol(&self, symbol: SymbolId) -> Result<Option<Arc<InputAssemblyRecord>>>
    {
        self.newer_surface("input_assembly_for_symbol")?;
        let Some(id) = self.symbol_assemblies.get(&symbol) else {
            return Ok(None);
        };
        Ok(self.assemblies.iter().find(|assembly| assembly.id == *id).cloned())
    }

    fn func_token_map(&self) -> Result<Vec<u8>>
    {
        self.newer_surface("func_md_token_map")?;
        Ok(self.func_token_map.clone())
    }

    fn type_token_map(&self) -> Result<Vec<u8>>
    {
        self.newer_surface("type_md_token_map")?;
        Ok(self.type_token_map.clone())
    }

    fn function_fragments(&self, rva: Rva) -> Result<Vec<FunctionFragment>>
    {
        self.newer_surface("function_fragments")?;
        let function = self
            .symbols
            .iter()
            .filter(|record| record.tag() == SymTag::Function)
            .find(|record| {
                record.contains(rva)
                    || self
                        .fragments
                        .get(&record.id)
                        .is_some_and(|parts| parts.iter().any(|part| rva.is_within(part.rva, u64::from(part.length))))
            });
        let Some(function) = function else {
            return Ok(Vec::new());
        };
        match self.fragments.get(&function.id) {
            Some(parts) => Ok(parts.clone()),
            None => Ok(function
                .rva
                .map(|start| FunctionFragment {
                    rva: start,
                    length: u32::try_from(function.length).unwrap_or(u32::MAX),
                })
                .into_iter()
                .collect()),
        }
    }
}
