//! Programmatic construction of [`MemoryStore`]s.

use std::collections::HashMap;
use std::sync::Arc;

use super::MemoryStore;
use crate::engine::{
    DebugStreamRecord, FunctionFragment, InjectedSourceRecord, InputAssemblyRecord, LineRecord, SectionHeader,
    SourceFileRecord, StoreSignature, SymbolRecord,
};
use crate::error::{DiaError, Result};
use crate::types::{DataKind, FrameLayout, Guid, MachineType, Rva, SymTag, SymbolData, SymbolId};

/// A symbol waiting to be added to a [`StoreBuilder`].
#[derive(Debug, Clone)]
pub struct NewSymbol
{
    name: Option<String>,
    undecorated_name: Option<String>,
    rva: Option<Rva>,
    length: u64,
    token: Option<u32>,
    data: SymbolData,
}

impl NewSymbol
{
    pub fn new(data: SymbolData) -> Self
    {
        Self {
            name: None,
            undecorated_name: None,
            rva: None,
            length: 0,
            token: None,
            data,
        }
    }

    pub fn tagged(tag: SymTag) -> Self
    {
        Self::new(SymbolData::for_tag(tag))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self
    {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn undecorated(mut self, name: impl Into<String>) -> Self
    {
        self.undecorated_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn at(mut self, rva: Rva, length: u64) -> Self
    {
        self.rva = Some(rva);
        self.length = length;
        self
    }

    #[must_use]
    pub fn token(mut self, token: u32) -> Self
    {
        self.token = Some(token);
        self
    }
}

/// Builds an in-memory store.
///
/// Symbol ids are handed out sequentially; the global scope is always id 1.
///
/// ## Example
///
/// ```rust
/// use diaport_core::engine::memory::StoreBuilder;
/// use diaport_core::types::{MachineType, Rva};
///
/// let mut builder = StoreBuilder::new("app.pdb", MachineType::Amd64);
/// builder.section(".text", Rva::new(0x1000), 0x1000, 0x6000_0020);
/// let unit = builder.compiland("main.obj");
/// builder.function(unit, "main", Rva::new(0x1000), 0x40);
/// let store = builder.build().unwrap();
/// # let _ = store;
/// ```
#[derive(Debug)]
pub struct StoreBuilder
{
    signature: StoreSignature,
    machine: MachineType,
    legacy: bool,
    symbols: Vec<SymbolRecord>,
    sections: Vec<SectionHeader>,
    files: Vec<SourceFileRecord>,
    lines: Vec<LineRecord>,
    inlinee_lines: HashMap<SymbolId, Vec<LineRecord>>,
    il_offsets: Vec<LineRecord>,
    injected: Vec<InjectedSourceRecord>,
    streams: Vec<DebugStreamRecord>,
    assemblies: Vec<InputAssemblyRecord>,
    symbol_assemblies: HashMap<SymbolId, u32>,
    func_token_map: Vec<u8>,
    type_token_map: Vec<u8>,
    fragments: HashMap<SymbolId, Vec<FunctionFragment>>,
}

impl StoreBuilder
{
    pub const GLOBAL_SCOPE: SymbolId = SymbolId(1);

    pub fn new(name: impl Into<String>, machine: MachineType) -> Self
    {
        let global = SymbolRecord {
            id: Self::GLOBAL_SCOPE,
            name: Some(name.into()),
            undecorated_name: None,
            lexical_parent: None,
            rva: None,
            length: 0,
            token: None,
            data: SymbolData::Exe { machine },
        };
        Self {
            signature: StoreSignature {
                guid: Guid::NIL,
                signature: 0,
                age: 1,
            },
            machine,
            legacy: false,
            symbols: vec![global],
            sections: Vec::new(),
            files: Vec::new(),
            lines: Vec::new(),
            inlinee_lines: HashMap::new(),
            il_offsets: Vec::new(),
            injected: Vec::new(),
            streams: Vec::new(),
            assemblies: Vec::new(),
            symbol_assemblies: HashMap::new(),
            func_token_map: Vec::new(),
            type_token_map: Vec::new(),
            fragments: HashMap::new(),
        }
    }

    pub fn guid(&mut self, guid: Guid) -> &mut Self
    {
        self.signature.guid = guid;
        self
    }

    pub fn signature(&mut self, signature: u32) -> &mut Self
    {
        self.signature.signature = signature;
        self
    }

    pub fn age(&mut self, age: u32) -> &mut Self
    {
        self.signature.age = age;
        self
    }

    /// Behave like an engine that predates the inline, IL, input-assembly,
    /// token-map and fragment queries.
    pub fn legacy(&mut self) -> &mut Self
    {
        self.legacy = true;
        self
    }

    /// Append a section; returns its one-based number.
    pub fn section(&mut self, name: &str, rva: Rva, virtual_size: u32, characteristics: u32) -> u32
    {
        let number = u32::try_from(self.sections.len() + 1).unwrap_or(u32::MAX);
        self.sections.push(SectionHeader {
            number,
            name: name.to_string(),
            rva,
            virtual_size,
            characteristics,
        });
        number
    }

    /// Add a symbol under `parent`.
    pub fn add(&mut self, parent: SymbolId, symbol: NewSymbol) -> SymbolId
    {
        let id = SymbolId(u32::try_from(self.symbols.len() + 1).unwrap_or(u32::MAX));
        self.symbols.push(SymbolRecord {
            id,
            name: symbol.name,
            undecorated_name: symbol.undecorated_name,
            lexical_parent: Some(parent),
            rva: symbol.rva,
            length: symbol.length,
            token: symbol.token,
            data: symbol.data,
        });
        id
    }

    pub fn compiland(&mut self, name: &str) -> SymbolId
    {
        self.add(Self::GLOBAL_SCOPE, NewSymbol::tagged(SymTag::Compiland).named(name))
    }

    pub fn function(&mut self, parent: SymbolId, name: &str, rva: Rva, length: u64) -> SymbolId
    {
        self.add(parent, NewSymbol::tagged(SymTag::Function).named(name).at(rva, length))
    }

    /// A function with a recorded frame layout.
    pub fn function_with_frame(&mut self, parent: SymbolId, name: &str, rva: Rva, length: u64, frame: FrameLayout)
        -> SymbolId
    {
        let data = SymbolData::Function {
            is_static: false,
            no_return: false,
            frame: Some(frame),
        };
        self.add(parent, NewSymbol::new(data).named(name).at(rva, length))
    }

    /// A public symbol at the global scope.
    pub fn public(&mut self, name: &str, rva: Rva, length: u64) -> SymbolId
    {
        let data = SymbolData::PublicSymbol {
            is_code: true,
            is_function: true,
        };
        self.add(Self::GLOBAL_SCOPE, NewSymbol::new(data).named(name).at(rva, length))
    }

    pub fn data(&mut self, parent: SymbolId, name: &str, kind: DataKind, rva: Option<Rva>, length: u64) -> SymbolId
    {
        let mut symbol = NewSymbol::new(SymbolData::Data { kind }).named(name);
        if let Some(rva) = rva {
            symbol = symbol.at(rva, length);
        }
        self.add(parent, symbol)
    }

    /// An inline site under `parent` for an inlined copy of `inlinee`.
    pub fn inline_site(&mut self, parent: SymbolId, inlinee: SymbolId, rva: Rva, length: u64) -> SymbolId
    {
        let data = SymbolData::InlineSite { inlinee: Some(inlinee) };
        let name = self.record(inlinee).ok().and_then(|record| record.name.clone());
        let mut symbol = NewSymbol::new(data).at(rva, length);
        symbol.name = name;
        self.add(parent, symbol)
    }

    /// Point an inline site at the function it inlines.
    pub fn link_inlinee(&mut self, site: SymbolId, inlinee: SymbolId) -> Result<()>
    {
        let name = self.record(inlinee)?.name.clone();
        let record = self.record_mut(site)?;
        if record.tag() != SymTag::InlineSite {
            return Err(DiaError::InvalidArgument(format!("symbol {site} is not an inline site")));
        }
        record.data = SymbolData::InlineSite { inlinee: Some(inlinee) };
        if record.name.is_none() {
            record.name = name;
        }
        Ok(())
    }

    /// Register a source file referenced by `compilands`; returns its id.
    pub fn source_file(&mut self, file_name: &str, compilands: &[SymbolId]) -> u32
    {
        let id = u32::try_from(self.files.len() + 1).unwrap_or(u32::MAX);
        self.add_source_file(SourceFileRecord {
            id,
            file_name: file_name.to_string(),
            checksum_type: 0,
            checksum: Vec::new(),
            compilands: compilands.to_vec(),
        });
        id
    }

    pub fn add_source_file(&mut self, file: SourceFileRecord) -> &mut Self
    {
        self.files.push(file);
        self
    }

    pub fn line(&mut self, line: LineRecord) -> &mut Self
    {
        self.lines.push(line);
        self
    }

    /// Line record describing code inlined at `site`.
    pub fn inlinee_line(&mut self, site: SymbolId, line: LineRecord) -> &mut Self
    {
        self.inlinee_lines.entry(site).or_default().push(line);
        self
    }

    /// IL offset record; `line` carries the IL offset.
    pub fn il_offset(&mut self, offset: LineRecord) -> &mut Self
    {
        self.il_offsets.push(offset);
        self
    }

    pub fn injected_source(&mut self, source: InjectedSourceRecord) -> &mut Self
    {
        self.injected.push(source);
        self
    }

    pub fn debug_stream(&mut self, name: &str, records: Vec<Vec<u8>>) -> &mut Self
    {
        self.streams.push(DebugStreamRecord {
            name: name.to_string(),
            records: records.into_iter().map(Arc::from).collect(),
        });
        self
    }

    pub fn input_assembly(&mut self, assembly: InputAssemblyRecord) -> &mut Self
    {
        self.assemblies.push(assembly);
        self
    }

    /// Record that `symbol` came from input assembly `assembly_id`.
    pub fn symbol_assembly(&mut self, symbol: SymbolId, assembly_id: u32) -> &mut Self
    {
        self.symbol_assemblies.insert(symbol, assembly_id);
        self
    }

    pub fn token_maps(&mut self, func: Vec<u8>, types: Vec<u8>) -> &mut Self
    {
        self.func_token_map = func;
        self.type_token_map = types;
        self
    }

    pub fn fragment(&mut self, function: SymbolId, fragment: FunctionFragment) -> &mut Self
    {
        self.fragments.entry(function).or_default().push(fragment);
        self
    }

    fn record(&self, id: SymbolId) -> Result<&SymbolRecord>
    {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.symbols.get(index))
            .ok_or_else(|| DiaError::InvalidArgument(format!("unknown symbol {id}")))
    }

    fn record_mut(&mut self, id: SymbolId) -> Result<&mut SymbolRecord>
    {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.symbols.get_mut(index))
            .ok_or_else(|| DiaError::InvalidArgument(format!("unknown symbol {id}")))
    }

    /// Check cross references and index the store.
    pub fn build(self) -> Result<MemoryStore>
    {
        let count = self.symbols.len();
        let known = |id: SymbolId| (1..=count).contains(&(id.0 as usize));
        let tag_of = |id: SymbolId| self.symbols[id.0 as usize - 1].tag();

        let mut children: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for record in &self.symbols {
            if let Some(parent) = record.lexical_parent {
                if !known(parent) {
                    return Err(DiaError::Corrupt(format!("symbol {} has unknown parent {parent}", record.id)));
                }
                children.entry(parent).or_default().push(record.id);
            }
            if let SymbolData::InlineSite { inlinee: Some(inlinee) } = record.data {
                if !known(inlinee) {
                    return Err(DiaError::Corrupt(format!("inline site {} names unknown inlinee {inlinee}", record.id)));
                }
            }
        }

        let file_ids: Vec<u32> = self.files.iter().map(|file| file.id).collect();
        for file in &self.files {
            if let Some(bad) = file.compilands.iter().find(|id| !known(**id) || tag_of(**id) != SymTag::Compiland) {
                return Err(DiaError::Corrupt(format!("file {} references unknown compiland {bad}", file.file_name)));
            }
        }
        let all_lines = self
            .lines
            .iter()
            .chain(self.inlinee_lines.values().flatten())
            .chain(self.il_offsets.iter());
        for line in all_lines {
            if !known(line.compiland) || tag_of(line.compiland) != SymTag::Compiland {
                return Err(DiaError::Corrupt(format!("line record references unknown compiland {}", line.compiland)));
            }
            if !file_ids.contains(&line.file_id) {
                return Err(DiaError::Corrupt(format!("line record references unknown file {}", line.file_id)));
            }
        }
        for site in self.inlinee_lines.keys() {
            if !known(*site) || tag_of(*site) != SymTag::InlineSite {
                return Err(DiaError::Corrupt(format!("inlinee lines attached to non inline site {site}")));
            }
        }
        for (symbol, assembly) in &self.symbol_assemblies {
            if !known(*symbol) || !self.assemblies.iter().any(|candidate| candidate.id == *assembly) {
                return Err(DiaError::Corrupt(format!("symbol {symbol} maps to unknown input assembly {assembly}")));
            }
        }

        let mut by_address: Vec<SymbolId> = self.symbols.iter().filter(|r| r.rva.is_some()).map(|r| r.id).collect();
        by_address.sort_by_key(|id| (self.symbols[id.0 as usize - 1].rva, *id));

        let mut lines = self.lines;
        lines.sort_by_key(|line| (line.rva, line.line));

        Ok(MemoryStore {
            signature: self.signature,
            machine: self.machine,
            legacy: self.legacy,
            symbols: self.symbols.into_iter().map(Arc::new).collect(),
            children,
            by_address,
            sections: self.sections,
            files: self.files.into_iter().map(Arc::new).collect(),
            lines,
            inlinee_lines: self.inlinee_lines,
            il_offsets: self.il_offsets,
            injected: self.injected.into_iter().map(Arc::new).collect(),
            streams: self.streams.into_iter().map(Arc::new).collect(),
            assemblies: self.assemblies.into_iter().map(Arc::new).collect(),
            symbol_assemblies: self.symbol_assemblies,
            func_token_map: self.func_token_map,
            type_token_map: self.type_token_map,
            fragments: self.fragments,
        })
    }
}
