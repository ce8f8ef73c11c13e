//! Tests for engine location

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use diaport_core::engine::memory::{MemoryEngine, MEMORY_ENGINE_ID};
use diaport_core::engine::Engine;
use diaport_core::error::{ActivationError, DiaError};
use diaport_core::locator::{HostRegistry, Locator, DEFAULT_ENGINE_NAME, ENGINE_100, ENGINE_120, ENGINE_140, KNOWN_ENGINES};
use diaport_core::types::Guid;

fn answering_as(identity: Guid) -> impl Fn() -> Result<Arc<dyn Engine>, ActivationError> + Send + Sync
{
    move || Ok(Arc::new(MemoryEngine::with_identity(identity)) as Arc<dyn Engine>)
}

fn refusing(reason: &'static str) -> impl Fn() -> Result<Arc<dyn Engine>, ActivationError> + Send + Sync
{
    move || Err(ActivationError::AccessDenied(reason.to_string()))
}

#[test]
fn test_newest_registered_identity_wins()
{
    let mut registry = HostRegistry::with_builtin();
    registry.register(ENGINE_100, answering_as(ENGINE_100));
    registry.register(ENGINE_120, answering_as(ENGINE_120));

    let handle = Locator::new(&registry).locate().unwrap();
    assert_eq!(handle.identity(), ENGINE_120);
    assert!(!handle.is_fallback());
}

#[test]
fn test_falls_back_to_default_registration()
{
    let registry = HostRegistry::with_builtin();
    let handle = Locator::new(&registry).locate().unwrap();
    assert!(handle.is_fallback());
    assert_eq!(handle.identity(), MEMORY_ENGINE_ID);
    assert_eq!(handle.data_source().engine_identity(), MEMORY_ENGINE_ID);
}

#[test]
fn test_failed_probes_are_skipped()
{
    let mut registry = HostRegistry::with_builtin();
    // Registered as 14.0 but answers as 11.0
    registry.register(ENGINE_140, answering_as(ENGINE_100));
    registry.register(ENGINE_120, refusing("policy"));
    registry.register(ENGINE_100, answering_as(ENGINE_100));

    let locator = Locator::new(&registry);
    let handle = locator.locate().unwrap();
    assert_eq!(handle.identity(), ENGINE_100);

    let reports = locator.probe_all();
    assert_eq!(reports.len(), KNOWN_ENGINES.len());
    assert!(matches!(
        reports[0].outcome,
        Err(ActivationError::VersionMismatch { expected, found }) if expected == ENGINE_140 && found == ENGINE_100
    ));
    assert!(matches!(reports[1].outcome, Err(ActivationError::AccessDenied(_))));
    assert!(matches!(reports[2].outcome, Err(ActivationError::NotRegistered(_))));
    assert!(reports[3].outcome.is_ok());
}

#[test]
fn test_no_engine_surfaces_fallback_error()
{
    let registry = HostRegistry::new();
    let err = Locator::new(&registry).locate().unwrap_err();
    match err {
        DiaError::NoEngineAvailable { probed, source } => {
            assert_eq!(probed, KNOWN_ENGINES.to_vec());
            assert_eq!(source, ActivationError::NotRegistered(DEFAULT_ENGINE_NAME.to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut registry = HostRegistry::new();
    registry.register_name(DEFAULT_ENGINE_NAME, refusing("locked down"));
    let err = Locator::new(&registry).locate().unwrap_err();
    assert!(matches!(
        err,
        DiaError::NoEngineAvailable {
            source: ActivationError::AccessDenied(_),
            ..
        }
    ));
}

#[test]
fn test_custom_probe_order_and_fallback_name()
{
    let mut registry = HostRegistry::new();
    registry.register(ENGINE_140, answering_as(ENGINE_140));
    registry.register(ENGINE_100, answering_as(ENGINE_100));
    registry.register_name("custom.Source", answering_as(MEMORY_ENGINE_ID));

    let locator = Locator::new(&registry).with_identities(&[ENGINE_100, ENGINE_140]);
    assert_eq!(locator.probe_order(), &[ENGINE_100, ENGINE_140]);
    assert_eq!(locator.locate().unwrap().identity(), ENGINE_100);

    let fallback = Locator::new(&registry)
        .with_identities(&[])
        .with_fallback_name("custom.Source")
        .locate()
        .unwrap();
    assert!(fallback.is_fallback());
}

#[test]
fn test_every_locate_probes_again()
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = HostRegistry::with_builtin();
    registry.register(ENGINE_140, move || -> Result<Arc<dyn Engine>, ActivationError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryEngine::with_identity(ENGINE_140)))
    });

    Locator::new(&registry).locate().unwrap();
    Locator::new(&registry).locate().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(registry.unregister(ENGINE_140));
    assert!(Locator::new(&registry).locate().unwrap().is_fallback());
}
