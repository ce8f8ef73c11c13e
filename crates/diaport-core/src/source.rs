//! # Data Source
//!
//! A [`DataSource`] owns at most one opened store and produces
//! [`Session`]s over it.
//!
//! ## Loading
//!
//! | method | opens |
//! |---|---|
//! | [`DataSource::load_from_store`] | a store file |
//! | [`DataSource::load_and_validate`] | a store file, checked against GUID, signature and age |
//! | [`DataSource::load_for_executable`] | the store an executable's debug directory points at |
//! | [`DataSource::load_from_stream`] | a store from any reader |
//!
//! A source can be loaded once. A load that fails because the store is
//! missing leaves the source loadable; a load that fails because the store
//! does not match or cannot be read poisons it, and every later load or
//! [`DataSource::open_session`] reports [`DiaError::Poisoned`].
//!
//! ## Lifetime
//!
//! Sessions share ownership of the store, but the data source holds a lease
//! that it revokes when dropped. Queries on a session whose lease was revoked
//! fail with [`DiaError::SourceReleased`]; enumerators that were already
//! returned stay readable.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{Engine, Store};
use crate::error::{DiaError, ErrorClass, Result};
use crate::exe::{self, DebugDirectory};
use crate::session::Session;
use crate::types::Guid;

/// Revocable permission to query a store, shared by a data source and its
/// sessions.
#[derive(Debug)]
pub struct SourceLease
{
    alive: AtomicBool,
}

impl SourceLease
{
    fn new() -> Self
    {
        Self {
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool
    {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()>
    {
        if self.is_alive() {
            Ok(())
        } else {
            Err(DiaError::SourceReleased)
        }
    }

    fn revoke(&self)
    {
        self.alive.store(false, Ordering::Release);
    }
}

/// Notifications and policy hooks for [`DataSource::load_for_executable`].
///
/// Every method has a default, so implementors only override what they need.
pub trait LoadCallback
{
    /// The executable's debug directory was read.
    fn notify_debug_directory(&mut self, _directory: &DebugDirectory) {}

    /// A candidate store path was tried. `outcome` is `Ok` for the store that
    /// was finally accepted.
    fn notify_open_store(&mut self, _path: &Path, _outcome: std::result::Result<(), &DiaError>) {}

    /// Return `true` to skip the path recorded in the executable.
    fn restrict_original_path_access(&mut self) -> bool
    {
        false
    }

    /// Return `true` to skip the executable's own directory.
    fn restrict_reference_path_access(&mut self) -> bool
    {
        false
    }
}

#[derive(Debug)]
enum SourceState
{
    Empty,
    Loaded(Arc<dyn Store>),
    Failed,
}

/// A handle that opens one debug store.
#[derive(Debug)]
pub struct DataSource
{
    engine: Arc<dyn Engine>,
    state: SourceState,
    last_error: Option<String>,
    lease: Arc<SourceLease>,
}

impl DataSource
{
    pub fn new(engine: Arc<dyn Engine>) -> Self
    {
        Self {
            engine,
            state: SourceState::Empty,
            last_error: None,
            lease: Arc::new(SourceLease::new()),
        }
    }

    /// Identity of the engine this source opens stores with.
    pub fn engine_identity(&self) -> Guid
    {
        self.engine.identity()
    }

    pub fn is_loaded(&self) -> bool
    {
        matches!(self.state, SourceState::Loaded(_))
    }

    /// Message of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str>
    {
        self.last_error.as_deref()
    }

    pub fn load_from_store(&mut self, path: impl AsRef<Path>) -> Result<()>
    {
        let path = path.as_ref();
        self.ready_to_load()?;
        debug!(path = %path.display(), "Loading debug store");
        let opened = self.engine.open_file(path);
        self.finish_load(opened)
    }

    /// Load a store and check that its GUID, signature and age all equal the
    /// expected values.
    pub fn load_and_validate(&mut self, path: impl AsRef<Path>, guid: Guid, signature: u32, age: u32) -> Result<()>
    {
        let path = path.as_ref();
        self.ready_to_load()?;
        debug!(path = %path.display(), %guid, signature, age, "Loading and validating debug store");
        let opened = self
            .engine
            .open_file(path)
            .and_then(|store| validate(store.as_ref(), guid, signature, age).map(|()| store));
        self.finish_load(opened)
    }

    pub fn load_from_stream(&mut self, reader: &mut dyn Read) -> Result<()>
    {
        self.ready_to_load()?;
        debug!("Loading debug store from stream");
        let opened = self.engine.open_stream(reader);
        self.finish_load(opened)
    }

    /// Adopt a store that was opened elsewhere, such as one assembled with
    /// [`crate::engine::memory::StoreBuilder`].
    pub fn load_opened(&mut self, store: Arc<dyn Store>) -> Result<()>
    {
        self.ready_to_load()?;
        self.finish_load(Ok(store))
    }

    /// Load the store that belongs to the executable at `executable`.
    ///
    /// `search_path` is a `;`-separated list of directories searched after
    /// the recorded path and the executable's directory.
    pub fn load_for_executable(
        &mut self,
        executable: impl AsRef<Path>,
        search_path: Option<&str>,
        callback: Option<&mut dyn LoadCallback>,
    ) -> Result<()>
    {
        let executable = executable.as_ref();
        self.ready_to_load()?;
        let directory = match exe::read_debug_directory(executable) {
            Ok(directory) => directory,
            Err(err) => return self.finish_load(Err(err)),
        };
        self.load_for_debug_directory(&directory, executable.parent(), search_path, callback)
    }

    /// Search for the store described by an already-read debug directory.
    ///
    /// `image_dir` is the directory of the executable, if there is one.
    pub fn load_for_debug_directory(
        &mut self,
        directory: &DebugDirectory,
        image_dir: Option<&Path>,
        search_path: Option<&str>,
        mut callback: Option<&mut dyn LoadCallback>,
    ) -> Result<()>
    {
        self.ready_to_load()?;
        if let Some(cb) = callback.as_deref_mut() {
            cb.notify_debug_directory(directory);
        }

        let restrict_original = callback.as_deref_mut().is_some_and(|cb| cb.restrict_original_path_access());
        let restrict_reference = callback.as_deref_mut().is_some_and(|cb| cb.restrict_reference_path_access());
        let image_dir = image_dir.filter(|_| !restrict_reference);
        let candidates = candidate_paths(directory, !restrict_original, image_dir, search_path);
        let mut last_mismatch: Option<DiaError> = None;

        for candidate in candidates {
            let opened = self
                .engine
                .open_file(&candidate)
                .and_then(|store| validate_identity(store.as_ref(), directory.guid, directory.age).map(|()| store));
            match opened {
                Ok(store) => {
                    if let Some(cb) = callback.as_deref_mut() {
                        cb.notify_open_store(&candidate, Ok(()));
                    }
                    debug!(path = %candidate.display(), "Accepted debug store");
                    return self.finish_load(Ok(store));
                }
                Err(err) => {
                    debug!(path = %candidate.display(), error = %err, "Rejected debug store candidate");
                    if let Some(cb) = callback.as_deref_mut() {
                        cb.notify_open_store(&candidate, Err(&err));
                    }
                    if err.class() != ErrorClass::Absence {
                        last_mismatch = Some(err);
                    }
                }
            }
        }

        let failure = last_mismatch.unwrap_or_else(|| DiaError::NotFound(directory.pdb_path.clone()));
        self.finish_load(Err(failure))
    }

    /// Open a session over the loaded store.
    pub fn open_session(&self) -> Result<Session>
    {
        match &self.state {
            SourceState::Loaded(store) => Ok(Session::new(Arc::clone(store), Arc::clone(&self.lease))),
            SourceState::Empty => Err(DiaError::NotLoaded),
            SourceState::Failed => Err(self.poisoned()),
        }
    }

    fn poisoned(&self) -> DiaError
    {
        DiaError::Poisoned(self.last_error.clone().unwrap_or_default())
    }

    fn ready_to_load(&self) -> Result<()>
    {
        match self.state {
            SourceState::Empty => Ok(()),
            SourceState::Loaded(_) => Err(DiaError::AlreadyLoaded),
            SourceState::Failed => Err(self.poisoned()),
        }
    }

    fn finish_load(&mut self, opened: Result<Arc<dyn Store>>) -> Result<()>
    {
        match opened {
            Ok(store) => {
                self.state = SourceState::Loaded(store);
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                if err.poisons_source() {
                    warn!(error = %err, "Data source poisoned by failed load");
                    self.state = SourceState::Failed;
                }
                Err(err)
            }
        }
    }
}

impl Drop for DataSource
{
    fn drop(&mut self)
    {
        self.lease.revoke();
    }
}

fn validate(store: &dyn Store, guid: Guid, signature: u32, age: u32) -> Result<()>
{
    let actual = store.signature();
    if actual.guid != guid {
        return Err(DiaError::InvalidSignature {
            expected: guid.to_string(),
            found: actual.guid.to_string(),
        });
    }
    if actual.signature != signature {
        return Err(DiaError::InvalidSignature {
            expected: format!("0x{signature:08X}"),
            found: format!("0x{:08X}", actual.signature),
        });
    }
    check_age(actual.age, age)
}

/// Executables record only a GUID and age for their store.
fn validate_identity(store: &dyn Store, guid: Guid, age: u32) -> Result<()>
{
    let actual = store.signature();
    if actual.guid != guid {
        return Err(DiaError::InvalidSignature {
            expected: guid.to_string(),
            found: actual.guid.to_string(),
        });
    }
    check_age(actual.age, age)
}

fn check_age(found: u32, expected: u32) -> Result<()>
{
    if found == expected {
        Ok(())
    } else {
        Err(DiaError::InvalidAge { expected, found })
    }
}

fn is_symbol_server(entry: &str) -> bool
{
    let lower = entry.to_ascii_lowercase();
    lower.starts_with("srv*") || lower.starts_with("cache*") || lower.starts_with("symsrv*")
}

/// Candidate store paths in probe order.
fn candidate_paths(
    directory: &DebugDirectory,
    use_original: bool,
    image_dir: Option<&Path>,
    search_path: Option<&str>,
) -> Vec<PathBuf>
{
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    };

    if use_original && !directory.pdb_path.as_os_str().is_empty() {
        push(directory.pdb_path.clone());
    }

    let Some(file_name) = directory.pdb_file_name() else {
        return candidates;
    };

    if let Some(dir) = image_dir {
        push(dir.join(file_name));
    }

    for entry in search_path.unwrap_or_default().split(';').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        if is_symbol_server(entry) {
            debug!(entry, "Skipping symbol server search path entry");
            continue;
        }
        push(Path::new(entry).join(file_name));
    }
    candidates
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::MachineType;

    fn directory() -> DebugDirectory
    {
        DebugDirectory {
            pdb_path: PathBuf::from("/build/out/app.pdb"),
            guid: Guid::NIL,
            age: 1,
            machine: MachineType::Amd64,
        }
    }

    #[test]
    fn test_candidate_order_and_symbol_server_skip()
    {
        let paths = candidate_paths(
            &directory(),
            true,
            Some(Path::new("/opt/app")),
            Some("srv*/cache*https://symbols.example;/symbols; ;/more"),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/build/out/app.pdb"),
                PathBuf::from("/opt/app/app.pdb"),
                PathBuf::from("/symbols/app.pdb"),
                PathBuf::from("/more/app.pdb"),
            ]
        );
    }

    #[test]
    fn test_recorded_path_can_be_left_out()
    {
        let paths = candidate_paths(&directory(), false, None, Some("/symbols"));
        assert_eq!(paths, vec![PathBuf::from("/symbols/app.pdb")]);
    }
}
