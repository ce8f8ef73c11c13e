//! Data source load lifecycle and store search

mod common;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use diaport_core::error::{DiaError, ErrorClass};
use diaport_core::exe::DebugDirectory;
use diaport_core::source::LoadCallback;
use diaport_core::types::{Guid, MachineType, NameSearchOptions, Rva, SymTag};

#[test]
fn test_missing_store_leaves_source_loadable()
{
    let file = common::write_store("app.pdb", common::FIXTURE);
    let mut source = common::data_source();

    let err = source.load_from_store(file.dir.path().join("missing.pdb")).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Absence);
    assert!(source.last_error().is_some());
    assert!(matches!(source.open_session(), Err(DiaError::NotLoaded)));

    source.load_from_store(&file.path).unwrap();
    assert!(source.is_loaded());
    assert!(source.last_error().is_none());
    assert!(matches!(source.load_from_store(&file.path), Err(DiaError::AlreadyLoaded)));
}

#[test]
fn test_validation_failures_poison_the_source()
{
    let file = common::write_store("app.pdb", common::FIXTURE);

    let mut wrong_guid = common::data_source();
    let err = wrong_guid
        .load_and_validate(&file.path, Guid::NIL, 0, common::FIXTURE_AGE)
        .unwrap_err();
    assert!(matches!(err, DiaError::InvalidSignature { .. }));
    assert!(matches!(wrong_guid.load_from_store(&file.path), Err(DiaError::Poisoned(_))));
    assert!(matches!(wrong_guid.open_session(), Err(DiaError::Poisoned(_))));

    let mut wrong_age = common::data_source();
    let err = wrong_age
        .load_and_validate(
            &file.path,
            common::fixture_guid(),
            common::FIXTURE_SIGNATURE,
            common::FIXTURE_AGE + 1,
        )
        .unwrap_err();
    assert!(matches!(err, DiaError::InvalidAge { expected: 3, found: 2 }));

    let mut wrong_signature = common::data_source();
    let err = wrong_signature
        .load_and_validate(&file.path, common::fixture_guid(), 0xDEAD, common::FIXTURE_AGE)
        .unwrap_err();
    assert!(matches!(err, DiaError::InvalidSignature { .. }));
}

#[test]
fn test_zero_signature_must_match_like_any_other()
{
    let file = common::write_store("app.pdb", common::FIXTURE);
    let mut source = common::data_source();
    let err = source
        .load_and_validate(&file.path, common::fixture_guid(), 0, common::FIXTURE_AGE)
        .unwrap_err();
    assert!(matches!(err, DiaError::InvalidSignature { .. }));
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert!(matches!(source.open_session(), Err(DiaError::Poisoned(_))));
}

#[test]
fn test_matching_identity_loads()
{
    let file = common::write_store("app.pdb", common::FIXTURE);
    let mut source = common::data_source();
    source
        .load_and_validate(&file.path, common::fixture_guid(), common::FIXTURE_SIGNATURE, common::FIXTURE_AGE)
        .unwrap();
    let signature = source.open_session().unwrap().signature().unwrap();
    assert_eq!(signature.signature, common::FIXTURE_SIGNATURE);
    assert_eq!(signature.age, common::FIXTURE_AGE);
}

#[test]
fn test_malformed_store_poisons_the_source()
{
    let file = common::write_store("broken.pdb", "{ \"name\": ");
    let mut source = common::data_source();
    let err = source.load_from_store(&file.path).unwrap_err();
    assert!(matches!(err, DiaError::InvalidFormat(_)));
    assert!(matches!(source.load_from_store(&file.path), Err(DiaError::Poisoned(_))));
}

#[test]
fn test_load_from_stream()
{
    let mut source = common::data_source();
    source.load_from_stream(&mut Cursor::new(common::FIXTURE.as_bytes())).unwrap();
    let session = source.open_session().unwrap();
    assert_eq!(session.machine().unwrap(), MachineType::Amd64);
}

#[test]
fn test_released_source_revokes_sessions()
{
    let (_file, source, session) = common::open_fixture();
    let global = session.global_scope().unwrap();
    let functions = global
        .find_children(SymTag::Function, None, NameSearchOptions::empty())
        .unwrap();

    drop(source);

    assert!(matches!(session.global_scope(), Err(DiaError::SourceReleased)));
    assert!(matches!(
        session.find_symbol_by_rva(Rva::new(0x1000), SymTag::Function),
        Err(DiaError::SourceReleased)
    ));
    assert!(matches!(
        global.find_children(SymTag::Null, None, NameSearchOptions::empty()),
        Err(DiaError::SourceReleased)
    ));

    // Results already handed out stay readable
    let names: Vec<_> = functions.into_iter().map(|symbol| symbol.name().unwrap_or_default().to_string()).collect();
    assert_eq!(names.len(), 4);
    assert_eq!(global.name(), Some("app.pdb"));
}

// ==================================================================
// Store search for an executable
// ==================================================================

#[derive(Default)]
struct Recorder
{
    directories: usize,
    attempts: Vec<(PathBuf, Option<ErrorClass>)>,
    skip_original: bool,
}

impl LoadCallback for Recorder
{
    fn notify_debug_directory(&mut self, _directory: &DebugDirectory)
    {
        self.directories += 1;
    }

    fn notify_open_store(&mut self, path: &Path, outcome: Result<(), &DiaError>)
    {
        self.attempts.push((path.to_path_buf(), outcome.err().map(DiaError::class)));
    }

    fn restrict_original_path_access(&mut self) -> bool
    {
        self.skip_original
    }
}

fn directory(recorded: &Path) -> DebugDirectory
{
    DebugDirectory {
        pdb_path: recorded.to_path_buf(),
        guid: common::fixture_guid(),
        age: common::FIXTURE_AGE,
        machine: MachineType::Amd64,
    }
}

#[test]
fn test_search_order_and_mismatch_skipping()
{
    let image = common::write_store("app.pdb", &common::FIXTURE.replace("\"age\": 2", "\"age\": 1"));
    let symbols = common::write_store("app.pdb", common::FIXTURE);
    let recorded = image.dir.path().join("build").join("app.pdb");
    let search_path = format!("srv*https://symbols.example;{}", symbols.dir.path().display());

    let mut recorder = Recorder::default();
    let mut source = common::data_source();
    source
        .load_for_debug_directory(
            &directory(&recorded),
            Some(image.dir.path()),
            Some(&search_path),
            Some(&mut recorder),
        )
        .unwrap();

    assert_eq!(recorder.directories, 1);
    assert_eq!(
        recorder.attempts,
        vec![
            (recorded, Some(ErrorClass::Absence)),
            (image.path.clone(), Some(ErrorClass::Integrity)),
            (symbols.path.clone(), None),
        ]
    );
    assert!(source.open_session().is_ok());
}

#[test]
fn test_search_reports_last_mismatch()
{
    let image = common::write_store("app.pdb", &common::FIXTURE.replace("\"age\": 2", "\"age\": 1"));
    let recorded = image.dir.path().join("missing").join("app.pdb");

    let mut recorder = Recorder {
        skip_original: true,
        ..Recorder::default()
    };
    let mut source = common::data_source();
    let err = source
        .load_for_debug_directory(&directory(&recorded), Some(image.dir.path()), None, Some(&mut recorder))
        .unwrap_err();
    assert!(matches!(err, DiaError::InvalidAge { expected: 2, found: 1 }));
    assert_eq!(recorder.attempts.len(), 1);
    assert!(matches!(source.open_session(), Err(DiaError::Poisoned(_))));
}

#[test]
fn test_search_without_candidates_is_not_found()
{
    let empty = tempfile::tempdir().unwrap();
    let recorded = empty.path().join("app.pdb");
    let mut source = common::data_source();
    let err = source
        .load_for_debug_directory(&directory(&recorded), Some(empty.path()), None, None)
        .unwrap_err();
    assert!(matches!(err, DiaError::NotFound(path) if path == recorded));
    assert!(!source.is_loaded());
}

#[test]
fn test_executable_that_is_not_an_image()
{
    let file = common::write_store("app.exe", "MZ but not really");
    let mut source = common::data_source();
    let err = source.load_for_executable(&file.path, None, None).unwrap_err();
    assert!(matches!(err, DiaError::InvalidExecutable { .. }));
}
