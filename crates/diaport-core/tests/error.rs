//! Tests for error handling

use std::path::PathBuf;

use diaport_core::error::{ActivationError, DiaError, ErrorClass, HResult, Result};
use diaport_core::types::{Guid, MachineType};

#[test]
fn test_error_display()
{
    let error = DiaError::NotFound(PathBuf::from("/symbols/app.pdb"));
    let message = format!("{error}");
    assert!(message.contains("not found"));
    assert!(message.contains("app.pdb"));

    let error = DiaError::InvalidAge { expected: 2, found: 1 };
    assert_eq!(format!("{error}"), "debug store age mismatch: expected 2, found 1");

    let error = DiaError::UnsupportedMachine(MachineType::Unknown);
    assert!(format!("{error}").contains("unsupported machine"));
}

#[test]
fn test_status_codes()
{
    assert_eq!(DiaError::NotFound(PathBuf::new()).status(), HResult::E_PDB_NOT_FOUND);
    assert_eq!(
        DiaError::InvalidSignature {
            expected: "a".into(),
            found: "b".into(),
        }
        .status(),
        HResult::E_PDB_INVALID_SIG
    );
    assert_eq!(DiaError::InvalidArgument("x".into()).status(), HResult::E_INVALIDARG);
    assert_eq!(DiaError::CrossSession.status(), HResult::E_INVALIDARG);
    assert_eq!(DiaError::NotImplemented("find_il_offsets").status(), HResult::E_NOTIMPL);
    assert_eq!(DiaError::NotLoaded.status(), HResult::E_PDB_USAGE);
    assert!(DiaError::SourceReleased.status().is_failure());
    assert_eq!(format!("{}", HResult::E_PDB_INVALID_AGE), "0x806D0007");
}

#[test]
fn test_no_engine_reports_fallback_activation_error()
{
    let error = DiaError::NoEngineAvailable {
        probed: vec![Guid::NIL; 4],
        source: ActivationError::AccessDenied("diaport.DataSource".into()),
    };
    assert_eq!(error.status(), HResult::E_ACCESSDENIED);
    assert_eq!(error.class(), ErrorClass::Host);
    assert!(format!("{error}").contains("probed 4 identities"));
}

#[test]
fn test_classes_and_poisoning()
{
    let integrity = DiaError::Corrupt("bad".into());
    assert_eq!(integrity.class(), ErrorClass::Integrity);
    assert!(integrity.poisons_source());

    let absence = DiaError::NotFound(PathBuf::from("missing.pdb"));
    assert_eq!(absence.class(), ErrorClass::Absence);
    assert!(!absence.poisons_source());

    let usage = DiaError::AlreadyLoaded;
    assert_eq!(usage.class(), ErrorClass::Usage);
    assert!(!usage.poisons_source());
}

#[test]
fn test_error_from_io()
{
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: DiaError = io_error.into();
    assert!(matches!(error, DiaError::Io(_)));
    assert_eq!(error.status(), HResult::E_PDB_ACCESS_DENIED);
}

#[test]
fn test_result_type()
{
    fn returns_result() -> Result<u32>
    {
        Ok(42)
    }

    fn returns_error() -> Result<u32>
    {
        Err(DiaError::NotLoaded)
    }

    assert_eq!(returns_result().unwrap(), 42);
    assert!(returns_error().is_err());
}
