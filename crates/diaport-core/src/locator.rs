//! # Engine Locator
//!
//! Picks one installed symbol-store engine and hands back a uniform handle.
//!
//! Several engine versions may be registered on a host. The locator probes a
//! fixed list of known identities, newest first, and returns the first one
//! that instantiates. When none does, it falls back to whatever is registered
//! under [`DEFAULT_ENGINE_NAME`]. Probe failures are expected and only logged;
//! if the fallback fails too, its own activation error is reported.
//!
//! Nothing is cached: every call to [`Locator::locate`] probes again.
//!
//! ## Example
//!
//! ```rust
//! use diaport_core::locator::{self, KNOWN_ENGINES};
//!
//! // The process-wide registry always has the built-in engine as fallback.
//! let handle = locator::locate().unwrap();
//! assert!(handle.is_fallback() || KNOWN_ENGINES.contains(&handle.identity()));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::engine::memory::MemoryEngine;
use crate::engine::Engine;
use crate::error::{ActivationError, DiaError, Result};
use crate::source::DataSource;
use crate::types::Guid;

/// Engine 14.0.
pub const ENGINE_140: Guid = Guid::from_u128(0xE675_6135_1E65_4D17_8576_6107_6139_8C3C);
/// Engine 12.0.
pub const ENGINE_120: Guid = Guid::from_u128(0x3BFC_EA48_620F_4B6B_81F7_B9AF_7545_4C7D);
/// Engine 11.0.
pub const ENGINE_110: Guid = Guid::from_u128(0x761D_3BCD_1304_41D5_94E8_EAC5_4E4A_C172);
/// Engine 10.0.
pub const ENGINE_100: Guid = Guid::from_u128(0xB86A_E24D_BF2F_4AC9_B5A2_34B1_4E4C_E11D);

/// Known engine identities in probe order, newest first.
pub const KNOWN_ENGINES: [Guid; 4] = [ENGINE_140, ENGINE_120, ENGINE_110, ENGINE_100];

/// Registration name of the default engine.
pub const DEFAULT_ENGINE_NAME: &str = "diaport.DataSource";

/// Creates engine instances for a registration.
pub trait EngineFactory: Send + Sync
{
    fn instantiate(&self) -> std::result::Result<Arc<dyn Engine>, ActivationError>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> std::result::Result<Arc<dyn Engine>, ActivationError> + Send + Sync,
{
    fn instantiate(&self) -> std::result::Result<Arc<dyn Engine>, ActivationError>
    {
        self()
    }
}

/// The host's engine registrations.
///
/// Engines are registered by identity (versioned engines) or by name (the
/// default engine). [`HostRegistry::instantiate`] checks that the instance
/// answers to the identity it was registered under.
#[derive(Clone, Default)]
pub struct HostRegistry
{
    by_identity: HashMap<Guid, Arc<dyn EngineFactory>>,
    by_name: HashMap<String, Arc<dyn EngineFactory>>,
}

impl HostRegistry
{
    /// A registry with nothing registered.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A registry with the built-in engine under [`DEFAULT_ENGINE_NAME`].
    pub fn with_builtin() -> Self
    {
        let mut registry = Self::new();
        registry.register_name(DEFAULT_ENGINE_NAME, || -> std::result::Result<Arc<dyn Engine>, ActivationError> {
            Ok(Arc::new(MemoryEngine::new()))
        });
        registry
    }

    pub fn register(&mut self, identity: Guid, factory: impl EngineFactory + 'static) -> &mut Self
    {
        self.by_identity.insert(identity, Arc::new(factory));
        self
    }

    pub fn register_name(&mut self, name: &str, factory: impl EngineFactory + 'static) -> &mut Self
    {
        self.by_name.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn unregister(&mut self, identity: Guid) -> bool
    {
        self.by_identity.remove(&identity).is_some()
    }

    pub fn unregister_name(&mut self, name: &str) -> bool
    {
        self.by_name.remove(name).is_some()
    }

    pub fn is_registered(&self, identity: Guid) -> bool
    {
        self.by_identity.contains_key(&identity)
    }

    /// Instantiate the engine registered under `identity`.
    pub fn instantiate(&self, identity: Guid) -> std::result::Result<Arc<dyn Engine>, ActivationError>
    {
        let factory = self
            .by_identity
            .get(&identity)
            .ok_or_else(|| ActivationError::NotRegistered(identity.to_string()))?;
        let engine = factory.instantiate()?;
        if engine.identity() != identity {
            return Err(ActivationError::VersionMismatch {
                expected: identity,
                found: engine.identity(),
            });
        }
        Ok(engine)
    }

    /// Instantiate the engine registered under `name`.
    pub fn instantiate_named(&self, name: &str) -> std::result::Result<Arc<dyn Engine>, ActivationError>
    {
        let factory = self
            .by_name
            .get(name)
            .ok_or_else(|| ActivationError::NotRegistered(name.to_string()))?;
        factory.instantiate()
    }
}

impl fmt::Debug for HostRegistry
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut identities: Vec<String> = self.by_identity.keys().map(ToString::to_string).collect();
        identities.sort();
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("HostRegistry")
            .field("identities", &identities)
            .field("names", &names)
            .finish()
    }
}

static GLOBAL_REGISTRY: Lazy<RwLock<HostRegistry>> = Lazy::new(|| RwLock::new(HostRegistry::with_builtin()));

/// The process-wide registry used by [`locate`].
pub fn global_registry() -> &'static RwLock<HostRegistry>
{
    &GLOBAL_REGISTRY
}

/// Register a versioned engine in the process-wide registry.
pub fn register_engine(identity: Guid, factory: impl EngineFactory + 'static)
{
    global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(identity, factory);
}

/// Locate an engine through the process-wide registry.
pub fn locate() -> Result<EngineHandle>
{
    let registry = global_registry().read().unwrap_or_else(PoisonError::into_inner);
    Locator::new(&registry).locate()
}

/// Outcome of probing one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport
{
    pub identity: Guid,
    pub outcome: std::result::Result<(), ActivationError>,
}

/// Sequential version-probing over a registry.
#[derive(Debug)]
pub struct Locator<'r>
{
    registry: &'r HostRegistry,
    identities: Vec<Guid>,
    fallback_name: String,
}

impl<'r> Locator<'r>
{
    pub fn new(registry: &'r HostRegistry) -> Self
    {
        Self {
            registry,
            identities: KNOWN_ENGINES.to_vec(),
            fallback_name: DEFAULT_ENGINE_NAME.to_string(),
        }
    }

    /// Probe `identities` instead of [`KNOWN_ENGINES`], in the given order.
    #[must_use]
    pub fn with_identities(mut self, identities: &[Guid]) -> Self
    {
        self.identities = identities.to_vec();
        self
    }

    #[must_use]
    pub fn with_fallback_name(mut self, name: &str) -> Self
    {
        self.fallback_name = name.to_string();
        self
    }

    /// Identities in the order they are probed.
    pub fn probe_order(&self) -> &[Guid]
    {
        &self.identities
    }

    /// Try every identity without stopping at the first success.
    pub fn probe_all(&self) -> Vec<ProbeReport>
    {
        self.identities
            .iter()
            .map(|identity| ProbeReport {
                identity: *identity,
                outcome: self.registry.instantiate(*identity).map(|_| ()),
            })
            .collect()
    }

    /// Return the newest registered engine, or the fallback.
    pub fn locate(&self) -> Result<EngineHandle>
    {
        for identity in &self.identities {
            match self.registry.instantiate(*identity) {
                Ok(engine) => {
                    info!(%identity, "Located symbol engine");
                    return Ok(EngineHandle {
                        engine,
                        identity: *identity,
                        is_fallback: false,
                    });
                }
                Err(err) => debug!(%identity, error = %err, "Engine probe failed"),
            }
        }

        match self.registry.instantiate_named(&self.fallback_name) {
            Ok(engine) => {
                let identity = engine.identity();
                info!(%identity, name = %self.fallback_name, "Using default symbol engine");
                Ok(EngineHandle {
                    engine,
                    identity,
                    is_fallback: true,
                })
            }
            Err(source) => Err(DiaError::NoEngineAvailable {
                probed: self.identities.clone(),
                source,
            }),
        }
    }
}

/// A located engine.
#[derive(Debug, Clone)]
pub struct EngineHandle
{
    engine: Arc<dyn Engine>,
    identity: Guid,
    is_fallback: bool,
}

impl EngineHandle
{
    /// Wrap an engine obtained some other way.
    pub fn from_engine(engine: Arc<dyn Engine>) -> Self
    {
        let identity = engine.identity();
        Self {
            engine,
            identity,
            is_fallback: false,
        }
    }

    pub fn identity(&self) -> Guid
    {
        self.identity
    }

    /// Whether the default engine answered because no known identity did.
    pub fn is_fallback(&self) -> bool
    {
        self.is_fallback
    }

    pub fn engine(&self) -> &Arc<dyn Engine>
    {
        &self.engine
    }

    /// A new, empty data source on this engine.
    pub fn data_source(&self) -> DataSource
    {
        DataSource::new(Arc::clone(&self.engine))
    }
}
