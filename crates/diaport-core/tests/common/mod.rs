//! Shared fixture for the integration tests.
//!
//! Symbol ids follow manifest order, depth first, with the global scope as 1:
//!
//! | id | symbol |
//! |---|---|
//! | 2 | `main.obj` |
//! | 3 | `main` |
//! | 4 | `count` (local) |
//! | 5 | inline site of `square` |
//! | 6 | inline site of `clamp`, nested in 5 |
//! | 7 | `square` |
//! | 8 | `clamp` |
//! | 9 | `g_counter` |
//! | 10 | `util.obj` |
//! | 11 | `util::helper` |
//! | 12 | `_tail_stub` (public) |
//! | 13 | `main` (export) |

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use diaport_core::engine::memory::MemoryEngine;
use diaport_core::types::Guid;
use diaport_core::{DataSource, Session};
use tempfile::TempDir;

pub const FIXTURE_GUID: &str = "11111111-2222-3333-4444-555555555555";
pub const FIXTURE_AGE: u32 = 2;
pub const FIXTURE_SIGNATURE: u32 = 0x5F3E_2A10;

pub const FIXTURE: &str = r#"{
    "name": "app.pdb",
    "guid": "11111111-2222-3333-4444-555555555555",
    "signature": 1597909520,
    "age": 2,
    "machine": "amd64",
    "sections": [
        { "name": ".text", "rva": 4096, "size": 8192, "characteristics": 1610612768 },
        { "name": ".data", "rva": 16384, "size": 4096, "characteristics": 3221225536 }
    ],
    "symbols": [
        { "tag": "Compiland", "name": "main.obj", "children": [
            { "tag": "Function", "name": "main", "rva": 4096, "length": 96, "token": 100663297,
              "frame": { "locals": 32, "saved_registers": 8, "params": 0, "prolog": 4 },
              "children": [
                { "tag": "Data", "name": "count", "data_kind": "local" },
                { "tag": "InlineSite", "inlinee": "square", "rva": 4128, "length": 16,
                  "lines": [
                    { "compiland": "main.obj", "file": 1, "line": 20, "rva": 4128, "length": 8 },
                    { "compiland": "main.obj", "file": 1, "line": 21, "rva": 4136, "length": 8 }
                  ],
                  "children": [
                    { "tag": "InlineSite", "inlinee": "clamp", "rva": 4132, "length": 4 }
                  ]
                }
              ]
            },
            { "tag": "Function", "name": "square", "rva": 4352, "length": 32 },
            { "tag": "Function", "name": "clamp", "rva": 4416, "length": 16 },
            { "tag": "Data", "name": "g_counter", "rva": 16384, "length": 4, "data_kind": "global" }
        ]},
        { "tag": "Compiland", "name": "util.obj", "children": [
            { "tag": "Function", "name": "_ZN4util6helper17h0123456789abcdefE", "rva": 4608, "length": 48 }
        ]},
        { "tag": "PublicSymbol", "name": "_tail_stub", "rva": 4864 },
        { "tag": "Export", "name": "main", "ordinal": 1 }
    ],
    "files": [
        { "id": 1, "name": "C:\\src\\main.c", "checksum_type": 1, "checksum": [222, 173, 190, 239],
          "compilands": ["main.obj"] },
        { "id": 2, "name": "C:\\src\\util.rs", "compilands": ["util.obj"] }
    ],
    "lines": [
        { "compiland": "main.obj", "file": 1, "line": 10, "column": 5, "rva": 4096, "length": 16 },
        { "compiland": "main.obj", "file": 1, "line": 12, "column": 5, "column_end": 8, "rva": 4112, "length": 16 },
        { "compiland": "main.obj", "file": 1, "line": 12, "column": 9, "column_end": 15, "rva": 4144, "length": 8 },
        { "compiland": "main.obj", "file": 1, "line": 15, "rva": 4152, "length": 40 },
        { "compiland": "util.obj", "file": 2, "line": 3, "rva": 4608, "length": 48 }
    ],
    "il_offsets": [
        { "compiland": "main.obj", "file": 1, "line": 10, "rva": 4096, "length": 4 }
    ],
    "injected_sources": [
        { "file_name": "gen.h", "object_file_name": "main.obj", "crc": 48879, "source": "int x;" }
    ],
    "debug_streams": [
        { "name": "FPO", "records": [[1, 2, 3, 4], [5, 6, 7, 8]] },
        { "name": "OMAPTO" }
    ],
    "input_assemblies": [
        { "id": 7, "index": 0, "timestamp": 1700000000, "store_available": true, "file_name": "lib.dll",
          "version": [1, 0, 0, 0] }
    ],
    "func_token_map": [1, 2, 3],
    "type_token_map": [9]
}"#;

/// The fixture with its newer query surfaces switched off.
pub fn legacy_fixture() -> String
{
    FIXTURE.replacen(r#""machine": "amd64","#, r#""machine": "amd64", "legacy": true,"#, 1)
}

/// The fixture plus a public symbol `main_public` at `main`'s first byte.
pub fn public_alias_fixture() -> String
{
    FIXTURE.replacen(
        r#"{ "tag": "PublicSymbol", "name": "_tail_stub", "rva": 4864 },"#,
        r#"{ "tag": "PublicSymbol", "name": "main_public", "rva": 4096 },
        { "tag": "PublicSymbol", "name": "_tail_stub", "rva": 4864 },"#,
        1,
    )
}

pub fn fixture_guid() -> Guid
{
    FIXTURE_GUID.parse().unwrap()
}

/// A store file inside a temporary directory that lives as long as this value.
pub struct StoreFile
{
    pub dir: TempDir,
    pub path: PathBuf,
}

pub fn write_store(name: &str, contents: &str) -> StoreFile
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    StoreFile { dir, path }
}

pub fn data_source() -> DataSource
{
    DataSource::new(std::sync::Arc::new(MemoryEngine::new()))
}

/// A validated load of [`FIXTURE`] and a session over it.
///
/// The data source is returned so tests control when it is released.
pub fn open_fixture() -> (StoreFile, DataSource, Session)
{
    open_manifest(FIXTURE)
}

pub fn open_manifest(contents: &str) -> (StoreFile, DataSource, Session)
{
    let file = write_store("app.pdb", contents);
    let mut source = diaport_core::locate().unwrap().data_source();
    source
        .load_and_validate(&file.path, fixture_guid(), FIXTURE_SIGNATURE, FIXTURE_AGE)
        .unwrap();
    let session = source.open_session().unwrap();
    (file, source, session)
}
