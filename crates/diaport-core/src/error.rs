//! # Error Types
//!
//! Error handling for the access layer.
//!
//! Every failure is a [`DiaError`] variant. Each variant maps onto one
//! [`HResult`] status code (the numeric vocabulary engines and their callers
//! share) and one [`ErrorClass`], which callers use to decide whether a retry
//! with different inputs can succeed.
//!
//! Engine activation failures are kept apart in [`ActivationError`]: the
//! locator swallows them while probing and only surfaces the fallback's own
//! activation error.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Guid;

/// Status code shared with engines.
///
/// Zero is success, positive values are qualified success (for example
/// [`HResult::S_FALSE`] for "not equivalent" or an approximate match), negative
/// values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

#[allow(clippy::cast_possible_wrap)]
const fn code(raw: u32) -> HResult
{
    HResult(raw as i32)
}

/// Failure severity in the engine's own facility; `E_PDB_*` values are `base + n`.
const PDB_FACILITY_BASE: u32 = 0x806D_0000;

const fn pdb(n: u32) -> HResult
{
    code(PDB_FACILITY_BASE + n)
}

impl HResult
{
    pub const S_OK: Self = HResult(0);
    pub const S_FALSE: Self = HResult(1);

    pub const E_FAIL: Self = code(0x8000_4005);
    pub const E_INVALIDARG: Self = code(0x8007_0057);
    pub const E_NOTIMPL: Self = code(0x8000_4001);
    pub const E_UNEXPECTED: Self = code(0x8000_FFFF);
    pub const E_ACCESSDENIED: Self = code(0x8007_0005);
    pub const REGDB_E_CLASSNOTREG: Self = code(0x8004_0154);
    pub const CLASS_E_CLASSNOTAVAILABLE: Self = code(0x8004_0111);
    pub const RPC_E_DISCONNECTED: Self = code(0x8001_0108);

    pub const E_PDB_OK: Self = pdb(1);
    pub const E_PDB_USAGE: Self = pdb(2);
    pub const E_PDB_OUT_OF_MEMORY: Self = pdb(3);
    pub const E_PDB_FILE_SYSTEM: Self = pdb(4);
    pub const E_PDB_NOT_FOUND: Self = pdb(5);
    pub const E_PDB_INVALID_SIG: Self = pdb(6);
    pub const E_PDB_INVALID_AGE: Self = pdb(7);
    pub const E_PDB_FORMAT: Self = pdb(12);
    pub const E_PDB_CORRUPT: Self = pdb(14);
    pub const E_PDB_ACCESS_DENIED: Self = pdb(16);
    pub const E_PDB_INVALID_EXECUTABLE: Self = pdb(18);
    pub const E_PDB_DBG_NOT_FOUND: Self = pdb(19);
    pub const E_PDB_NO_DEBUG_INFO: Self = pdb(20);

    /// Success or qualified success.
    pub const fn is_success(self) -> bool
    {
        self.0 >= 0
    }

    pub const fn is_failure(self) -> bool
    {
        self.0 < 0
    }

    /// Success that carries a caveat (`S_FALSE` and friends).
    pub const fn is_qualified(self) -> bool
    {
        self.0 > 0
    }

    #[allow(clippy::cast_sign_loss)]
    pub const fn as_u32(self) -> u32
    {
        self.0 as u32
    }
}

impl fmt::Display for HResult
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08X}", self.as_u32())
    }
}

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass
{
    /// The thing asked for does not exist. Retrying with other inputs may work.
    Absence,
    /// The store exists but does not match or cannot be trusted.
    Integrity,
    /// The host or engine failed underneath us.
    Host,
    /// The caller used the API incorrectly.
    Usage,
}

/// Why an engine could not be instantiated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError
{
    /// Nothing is registered under the identity or name.
    #[error("engine {0} is not registered")]
    NotRegistered(String),

    /// The registration exists but instantiation was refused.
    #[error("activation of engine {0} was denied")]
    AccessDenied(String),

    /// The registered engine answers with a different identity than requested.
    #[error("engine version mismatch: expected {expected}, found {found}")]
    VersionMismatch
    {
        expected: Guid,
        found: Guid,
    },

    /// The engine's factory failed.
    #[error("engine factory failed: {0}")]
    Failed(String),
}

impl ActivationError
{
    pub fn status(&self) -> HResult
    {
        match self {
            ActivationError::NotRegistered(_) => HResult::REGDB_E_CLASSNOTREG,
            ActivationError::AccessDenied(_) => HResult::E_ACCESSDENIED,
            ActivationError::VersionMismatch { .. } => HResult::CLASS_E_CLASSNOTAVAILABLE,
            ActivationError::Failed(_) => HResult::E_FAIL,
        }
    }
}

/// Main error type for access-layer operations
///
/// ## Error Categories
///
/// 1. **Absence**: NotFound, NoDebugInfo
/// 2. **Integrity**: InvalidSignature, InvalidAge, InvalidFormat, Corrupt, InvalidExecutable
/// 3. **Usage**: AlreadyLoaded, NotLoaded, Poisoned, InvalidArgument, CrossSession, SourceReleased
/// 4. **Host**: NoEngineAvailable, NotImplemented, UnsupportedMachine, HelperFailed, Io
#[derive(Error, Debug)]
pub enum DiaError
{
    /// No engine identity could be instantiated, including the default fallback.
    ///
    /// `source` is the fallback's own activation error; probe failures for the
    /// versioned identities are only logged.
    #[error("no symbol engine available (probed {} identities): {source}", .probed.len())]
    NoEngineAvailable
    {
        probed: Vec<Guid>,
        #[source]
        source: ActivationError,
    },

    /// The store (or the file it should be read from) does not exist.
    #[error("debug store not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The store's signature or GUID does not match the expected value.
    #[error("debug store signature mismatch: expected {expected}, found {found}")]
    InvalidSignature
    {
        expected: String,
        found: String,
    },

    /// The store is older or newer than the expected age.
    #[error("debug store age mismatch: expected {expected}, found {found}")]
    InvalidAge
    {
        expected: u32,
        found: u32,
    },

    /// The bytes are not a store this engine understands.
    #[error("invalid debug store format: {0}")]
    InvalidFormat(String),

    /// The store is structurally damaged.
    #[error("debug store is corrupt: {0}")]
    Corrupt(String),

    /// The executable could not be read as an image.
    #[error("invalid executable {}: {reason}", .path.display())]
    InvalidExecutable
    {
        path: PathBuf,
        reason: String,
    },

    /// The executable carries no debug directory pointing at a store.
    #[error("executable has no debug information: {}", .0.display())]
    NoDebugInfo(PathBuf),

    #[error("data source already holds a loaded store")]
    AlreadyLoaded,

    #[error("data source has no loaded store")]
    NotLoaded,

    /// A previous integrity failure made the data source unusable.
    #[error("data source is unusable after an earlier failure: {0}")]
    Poisoned(String),

    /// The data source that owned the store was released.
    #[error("the data source backing this session was released")]
    SourceReleased,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Two handles that must come from the same session do not.
    #[error("symbols belong to different sessions")]
    CrossSession,

    /// The engine predates this query surface.
    #[error("not implemented by this engine: {0}")]
    NotImplemented(&'static str),

    #[error("unsupported machine type: {0}")]
    UnsupportedMachine(crate::types::MachineType),

    /// A stack-walk helper callback failed.
    #[error("stack walk helper failed: {0}")]
    HelperFailed(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiaError
{
    /// Status code reported for this error.
    pub fn status(&self) -> HResult
    {
        match self {
            DiaError::NoEngineAvailable { source, .. } => source.status(),
            DiaError::NotFound(_) => HResult::E_PDB_NOT_FOUND,
            DiaError::InvalidSignature { .. } => HResult::E_PDB_INVALID_SIG,
            DiaError::InvalidAge { .. } => HResult::E_PDB_INVALID_AGE,
            DiaError::InvalidFormat(_) => HResult::E_PDB_FORMAT,
            DiaError::Corrupt(_) => HResult::E_PDB_CORRUPT,
            DiaError::InvalidExecutable { .. } => HResult::E_PDB_INVALID_EXECUTABLE,
            DiaError::NoDebugInfo(_) => HResult::E_PDB_NO_DEBUG_INFO,
            DiaError::AlreadyLoaded | DiaError::Poisoned(_) => HResult::E_UNEXPECTED,
            DiaError::NotLoaded => HResult::E_PDB_USAGE,
            DiaError::SourceReleased => HResult::RPC_E_DISCONNECTED,
            DiaError::InvalidArgument(_) | DiaError::CrossSession => HResult::E_INVALIDARG,
            DiaError::NotImplemented(_) | DiaError::UnsupportedMachine(_) => HResult::E_NOTIMPL,
            DiaError::HelperFailed(_) => HResult::E_FAIL,
            DiaError::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => HResult::E_PDB_NOT_FOUND,
                std::io::ErrorKind::PermissionDenied => HResult::E_PDB_ACCESS_DENIED,
                _ => HResult::E_PDB_FILE_SYSTEM,
            },
        }
    }

    pub fn class(&self) -> ErrorClass
    {
        match self {
            DiaError::NotFound(_) | DiaError::NoDebugInfo(_) => ErrorClass::Absence,
            DiaError::InvalidSignature { .. }
            | DiaError::InvalidAge { .. }
            | DiaError::InvalidFormat(_)
            | DiaError::Corrupt(_)
            | DiaError::InvalidExecutable { .. } => ErrorClass::Integrity,
            DiaError::AlreadyLoaded
            | DiaError::NotLoaded
            | DiaError::Poisoned(_)
            | DiaError::SourceReleased
            | DiaError::InvalidArgument(_)
            | DiaError::CrossSession => ErrorClass::Usage,
            DiaError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => ErrorClass::Absence,
            DiaError::NoEngineAvailable { .. }
            | DiaError::NotImplemented(_)
            | DiaError::UnsupportedMachine(_)
            | DiaError::HelperFailed(_)
            | DiaError::Io(_) => ErrorClass::Host,
        }
    }

    /// Whether this failure leaves a data source unusable.
    pub fn poisons_source(&self) -> bool
    {
        match self {
            DiaError::InvalidSignature { .. } | DiaError::InvalidAge { .. } | DiaError::InvalidFormat(_) | DiaError::Corrupt(_) => {
                true
            }
            DiaError::Io(err) => err.kind() != std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convenience type alias for `Result<T, DiaError>`
///
/// ```rust
/// use diaport_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DiaError>;

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_pdb_codes_follow_facility_layout()
    {
        assert_eq!(HResult::E_PDB_OK.as_u32(), 0x806D_0001);
        assert_eq!(HResult::E_PDB_NOT_FOUND.as_u32(), 0x806D_0005);
        assert_eq!(HResult::E_PDB_NO_DEBUG_INFO.as_u32(), 0x806D_0014);
        assert!(HResult::E_PDB_CORRUPT.is_failure());
        assert!(HResult::S_FALSE.is_qualified());
        assert!(HResult::S_OK.is_success() && !HResult::S_OK.is_qualified());
    }

    #[test]
    fn test_io_errors_map_by_kind()
    {
        let missing = DiaError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(missing.status(), HResult::E_PDB_NOT_FOUND);
        assert_eq!(missing.class(), ErrorClass::Absence);
        assert!(!missing.poisons_source());

        let broken = DiaError::from(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short"));
        assert_eq!(broken.status(), HResult::E_PDB_FILE_SYSTEM);
        assert!(broken.poisons_source());
    }
}
