//! JSON symbol manifests.
//!
//! A manifest describes one store: its validation signature, machine,
//! sections, a nested symbol tree and the line, file and stream tables that
//! hang off it. Symbols refer to each other by `key` (defaulting to the
//! symbol's name): line records name their compiland, inline sites name the
//! function they inline.
//!
//! ```json
//! {
//!   "name": "app.pdb",
//!   "guid": "11111111-2222-3333-4444-555555555555",
//!   "age": 2,
//!   "machine": "amd64",
//!   "sections": [{ "name": ".text", "rva": 4096, "size": 8192 }],
//!   "symbols": [
//!     { "tag": "Compiland", "name": "main.obj", "children": [
//!       { "tag": "Function", "name": "main", "rva": 4096, "length": 64 }
//!     ]}
//!   ],
//!   "files": [{ "id": 1, "name": "C:\\src\\main.c", "compilands": ["main.obj"] }],
//!   "lines": [{ "compiland": "main.obj", "file": 1, "line": 3, "rva": 4096, "length": 8 }]
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use super::{MemoryStore, NewSymbol, StoreBuilder};
use crate::engine::{
    FunctionFragment, InjectedSourceRecord, InputAssemblyRecord, LineRecord, SourceCompression, SourceFileRecord,
};
use crate::error::{DiaError, Result};
use crate::types::{DataKind, FrameLayout, Guid, MachineType, Rva, SymTag, SymbolData, SymbolId, UdtKind};

fn default_age() -> u32
{
    1
}

fn default_true() -> bool
{
    true
}

#[derive(Debug, Deserialize)]
pub struct Manifest
{
    pub name: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub signature: u32,
    #[serde(default = "default_age")]
    pub age: u32,
    #[serde(default)]
    pub machine: Option<String>,
    /// Store behaves like an engine without the newer query surfaces.
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub lines: Vec<LineEntry>,
    #[serde(default)]
    pub il_offsets: Vec<LineEntry>,
    #[serde(default)]
    pub injected_sources: Vec<InjectedSourceEntry>,
    #[serde(default)]
    pub debug_streams: Vec<StreamEntry>,
    #[serde(default)]
    pub input_assemblies: Vec<AssemblyEntry>,
    #[serde(default)]
    pub func_token_map: Vec<u8>,
    #[serde(default)]
    pub type_token_map: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct SectionEntry
{
    pub name: String,
    pub rva: u32,
    pub size: u32,
    #[serde(default)]
    pub characteristics: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FrameEntry
{
    pub locals: u32,
    pub saved_registers: u32,
    pub params: u32,
    pub prolog: u32,
    pub uses_frame_pointer: bool,
}

#[derive(Debug, Deserialize)]
pub struct FragmentEntry
{
    pub rva: u32,
    pub length: u32,
}

#[derive(Debug, Deserialize)]
pub struct SymbolEntry
{
    pub tag: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub undecorated: Option<String>,
    #[serde(default)]
    pub rva: Option<u32>,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub token: Option<u32>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub no_return: bool,
    #[serde(default)]
    pub frame: Option<FrameEntry>,
    #[serde(default)]
    pub data_kind: Option<String>,
    #[serde(default)]
    pub udt_kind: Option<String>,
    #[serde(default = "default_true")]
    pub is_code: bool,
    #[serde(default = "default_true")]
    pub is_function: bool,
    /// Key of the function an inline site inlines.
    #[serde(default)]
    pub inlinee: Option<String>,
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub is_forwarder: bool,
    /// Input assembly id this symbol came from.
    #[serde(default)]
    pub assembly: Option<u32>,
    /// Inlinee lines of an inline site.
    #[serde(default)]
    pub lines: Vec<LineEntry>,
    #[serde(default)]
    pub fragments: Vec<FragmentEntry>,
    #[serde(default)]
    pub children: Vec<SymbolEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FileEntry
{
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub checksum_type: u32,
    #[serde(default)]
    pub checksum: Vec<u8>,
    #[serde(default)]
    pub compilands: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LineEntry
{
    pub compiland: String,
    pub file: u32,
    pub line: u32,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub column_end: u32,
    pub rva: u32,
    pub length: u32,
    #[serde(default = "default_true")]
    pub statement: bool,
}

#[derive(Debug, Deserialize)]
pub struct InjectedSourceEntry
{
    pub file_name: String,
    #[serde(default)]
    pub object_file_name: Option<String>,
    #[serde(default)]
    pub virtual_file_name: Option<String>,
    #[serde(default)]
    pub crc: u32,
    #[serde(default)]
    pub compression: u32,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamEntry
{
    pub name: String,
    #[serde(default)]
    pub records: Vec<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
pub struct AssemblyEntry
{
    pub id: u32,
    pub index: u32,
    #[serde(default)]
    pub timestamp: u32,
    #[serde(default)]
    pub store_available: bool,
    pub file_name: String,
    #[serde(default)]
    pub version: Vec<u8>,
}

/// Parse manifest bytes into a store.
pub fn parse(bytes: &[u8]) -> Result<MemoryStore>
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DiaError::InvalidFormat("empty symbol manifest".into()));
    }
    let manifest: Manifest =
        serde_json::from_slice(bytes).map_err(|err| DiaError::InvalidFormat(format!("symbol manifest: {err}")))?;
    manifest.into_store()
}

fn invalid(message: String) -> DiaError
{
    DiaError::InvalidFormat(message)
}

fn compression(raw: u32) -> SourceCompression
{
    match raw {
        0 => SourceCompression::None,
        1 => SourceCompression::RunLength,
        2 => SourceCompression::Huffman,
        3 => SourceCompression::LempelZiv,
        other => SourceCompression::Other(other),
    }
}

fn udt_kind(raw: &str) -> Result<UdtKind>
{
    match raw.to_lowercase().as_str() {
        "struct" => Ok(UdtKind::Struct),
        "class" => Ok(UdtKind::Class),
        "union" => Ok(UdtKind::Union),
        "interface" => Ok(UdtKind::Interface),
        _ => Err(invalid(format!("unknown udt kind {raw}"))),
    }
}

impl SymbolEntry
{
    fn data(&self) -> Result<SymbolData>
    {
        let tag: SymTag = self.tag.parse().map_err(invalid)?;
        let data = match tag {
            SymTag::Compiland => SymbolData::Compiland {
                library_name: self.library.clone(),
            },
            SymTag::Function => SymbolData::Function {
                is_static: self.is_static,
                no_return: self.no_return,
                frame: self.frame.as_ref().map(|frame| FrameLayout {
                    locals: frame.locals,
                    saved_registers: frame.saved_registers,
                    params: frame.params,
                    prolog: frame.prolog,
                    uses_frame_pointer: frame.uses_frame_pointer,
                }),
            },
            SymTag::Data => SymbolData::Data {
                kind: match &self.data_kind {
                    Some(kind) => kind.parse::<DataKind>().map_err(invalid)?,
                    None => DataKind::Unknown,
                },
            },
            SymTag::PublicSymbol => SymbolData::PublicSymbol {
                is_code: self.is_code,
                is_function: self.is_function,
            },
            SymTag::Udt => SymbolData::Udt {
                kind: match &self.udt_kind {
                    Some(kind) => udt_kind(kind)?,
                    None => UdtKind::Struct,
                },
            },
            SymTag::Export => SymbolData::Export {
                ordinal: self.ordinal,
                is_forwarder: self.is_forwarder,
            },
            SymTag::Exe => return Err(invalid("only the manifest root may be an executable symbol".into())),
            other => SymbolData::for_tag(other),
        };
        Ok(data)
    }
}

fn line_record(entry: &LineEntry, compilands: &HashMap<String, SymbolId>) -> Result<LineRecord>
{
    let compiland = compilands
        .get(&entry.compiland)
        .copied()
        .ok_or_else(|| DiaError::Corrupt(format!("line record names unknown compiland {}", entry.compiland)))?;
    Ok(LineRecord {
        compiland,
        file_id: entry.file,
        line: entry.line,
        line_end: entry.line_end.unwrap_or(entry.line),
        column: entry.column,
        column_end: entry.column_end,
        rva: Rva::new(entry.rva),
        length: entry.length,
        statement: entry.statement,
    })
}

struct Pending<'m>
{
    keys: HashMap<String, SymbolId>,
    compilands: HashMap<String, SymbolId>,
    inline_sites: Vec<(SymbolId, &'m str)>,
    inlinee_lines: Vec<(SymbolId, &'m LineEntry)>,
}

impl Manifest
{
    /// Build the store this manifest describes.
    pub fn into_store(self) -> Result<MemoryStore>
    {
        let machine = match &self.machine {
            Some(raw) => raw.parse::<MachineType>().map_err(invalid)?,
            None => MachineType::Unknown,
        };
        let mut builder = StoreBuilder::new(self.name.clone(), machine);
        if let Some(raw) = &self.guid {
            let guid: Guid = raw.parse().map_err(|err| invalid(format!("{err}")))?;
            builder.guid(guid);
        }
        builder.signature(self.signature).age(self.age);
        if self.legacy {
            builder.legacy();
        }
        for section in &self.sections {
            builder.section(&section.name, Rva::new(section.rva), section.size, section.characteristics);
        }

        let mut pending = Pending {
            keys: HashMap::new(),
            compilands: HashMap::new(),
            inline_sites: Vec::new(),
            inlinee_lines: Vec::new(),
        };
        for entry in &self.symbols {
            add_symbol(&mut builder, StoreBuilder::GLOBAL_SCOPE, entry, &mut pending)?;
        }

        for (site, key) in &pending.inline_sites {
            let inlinee = pending
                .keys
                .get(*key)
                .copied()
                .ok_or_else(|| DiaError::Corrupt(format!("inline site names unknown function {key}")))?;
            builder.link_inlinee(*site, inlinee)?;
        }
        for (site, entry) in &pending.inlinee_lines {
            let record = line_record(entry, &pending.compilands)?;
            builder.inlinee_line(*site, record);
        }

        for file in self.files {
            let compilands = file
                .compilands
                .iter()
                .map(|name| {
                    pending
                        .compilands
                        .get(name)
                        .copied()
                        .ok_or_else(|| DiaError::Corrupt(format!("file {} names unknown compiland {name}", file.name)))
                })
                .collect::<Result<Vec<_>>>()?;
            builder.add_source_file(SourceFileRecord {
                id: file.id,
                file_name: file.name,
                checksum_type: file.checksum_type,
                checksum: file.checksum,
                compilands,
            });
        }
        for entry in &self.lines {
            builder.line(line_record(entry, &pending.compilands)?);
        }
        for entry in &self.il_offsets {
            builder.il_offset(line_record(entry, &pending.compilands)?);
        }
        for source in self.injected_sources {
            builder.injected_source(InjectedSourceRecord {
                file_name: source.file_name,
                object_file_name: source.object_file_name,
                virtual_file_name: source.virtual_file_name,
                crc: source.crc,
                compression: compression(source.compression),
                source: source.source.into_bytes(),
            });
        }
        for stream in self.debug_streams {
            builder.debug_stream(&stream.name, stream.records);
        }
        for assembly in self.input_assemblies {
            builder.input_assembly(InputAssemblyRecord {
                id: assembly.id,
                index: assembly.index,
                timestamp: assembly.timestamp,
                store_available: assembly.store_available,
                file_name: assembly.file_name,
                version: assembly.version,
            });
        }
        builder.token_maps(self.func_token_map, self.type_token_map);
        builder.build()
    }
}

fn add_symbol<'m>(builder: &mut StoreBuilder, parent: SymbolId, entry: &'m SymbolEntry, pending: &mut Pending<'m>)
    -> Result<()>
{
    let data = entry.data()?;
    let tag = data.tag();
    let mut symbol = NewSymbol::new(data);
    if let Some(name) = &entry.name {
        symbol = symbol.named(name.clone());
    }
    if let Some(undecorated) = &entry.undecorated {
        symbol = symbol.undecorated(undecorated.clone());
    }
    if let Some(rva) = entry.rva {
        symbol = symbol.at(Rva::new(rva), entry.length);
    }
    if let Some(token) = entry.token {
        symbol = symbol.token(token);
    }
    let id = builder.add(parent, symbol);

    if let Some(key) = entry.key.as_ref().or(entry.name.as_ref()) {
        pending.keys.entry(key.clone()).or_insert(id);
        if tag == SymTag::Compiland {
            pending.compilands.insert(key.clone(), id);
        }
    }
    if tag == SymTag::InlineSite {
        if let Some(inlinee) = &entry.inlinee {
            pending.inline_sites.push((id, inlinee.as_str()));
        }
        pending.inlinee_lines.extend(entry.lines.iter().map(|line| (id, line)));
    } else if !entry.lines.is_empty() {
        return Err(DiaError::Corrupt(format!("only inline sites carry inlinee lines ({})", entry.tag)));
    }
    for fragment in &entry.fragments {
        builder.fragment(id, FunctionFragment {
            rva: Rva::new(fragment.rva),
            length: fragment.length,
        });
    }
    if let Some(assembly) = entry.assembly {
        builder.symbol_assembly(id, assembly);
    }

    for child in &entry.children {
        add_symbol(builder, id, child, pending)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::engine::Store;

    #[test]
    fn test_inline_site_links_to_inlinee_by_key()
    {
        let json = br#"{
            "name": "inl.pdb",
            "symbols": [
                { "tag": "Compiland", "name": "a.obj", "children": [
                    { "tag": "Function", "name": "square", "rva": 8192, "length": 16 },
                    { "tag": "Function", "name": "main", "rva": 4096, "length": 64, "children": [
                        { "tag": "InlineSite", "inlinee": "square", "rva": 4112, "length": 8 }
                    ]}
                ]}
            ]
        }"#;
        let store = parse(json).unwrap();
        let sites = store.find_inline_frames(SymbolId(4), Rva::new(4116)).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name.as_deref(), Some("square"));
        assert_eq!(sites[0].data, SymbolData::InlineSite { inlinee: Some(SymbolId(3)) });
    }

    #[test]
    fn test_rejects_garbage_and_dangling_references()
    {
        assert!(matches!(parse(b"   "), Err(DiaError::InvalidFormat(_))));
        assert!(matches!(parse(b"{ not json"), Err(DiaError::InvalidFormat(_))));

        let dangling = br#"{ "name": "x.pdb",
            "lines": [{ "compiland": "ghost.obj", "file": 1, "line": 1, "rva": 0, "length": 1 }] }"#;
        assert!(matches!(parse(dangling), Err(DiaError::Corrupt(_))));
    }
}
