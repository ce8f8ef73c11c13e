//! Executable debug directory.
//!
//! A PE image that has a debug store records where the store was written and
//! which GUID and age it must carry, in a CodeView entry of its debug
//! directory. [`read_debug_directory`] extracts that entry.

use std::fs;
use std::path::{Path, PathBuf};

use object::{Architecture, Object};
use tracing::debug;

use crate::error::{DiaError, Result};
use crate::types::{Guid, MachineType};

/// CodeView entry of an executable's debug directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugDirectory
{
    /// Store path as recorded by the linker.
    pub pdb_path: PathBuf,
    pub guid: Guid,
    pub age: u32,
    pub machine: MachineType,
}

impl DebugDirectory
{
    /// File name component of the recorded store path.
    ///
    /// Paths recorded on another host may use `\` separators, so both are
    /// treated as separators here.
    pub fn pdb_file_name(&self) -> Option<&str>
    {
        let raw = self.pdb_path.to_str()?;
        raw.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
    }
}

fn machine_of(architecture: Architecture) -> MachineType
{
    match architecture {
        Architecture::X86_64 => MachineType::Amd64,
        Architecture::I386 => MachineType::I386,
        Architecture::Aarch64 => MachineType::Arm64,
        Architecture::Arm => MachineType::ArmNt,
        _ => MachineType::Unknown,
    }
}

/// Read the CodeView debug directory entry of the executable at `path`.
pub fn read_debug_directory(path: &Path) -> Result<DebugDirectory>
{
    if !path.is_file() {
        return Err(DiaError::NotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    let file = object::File::parse(&*data).map_err(|err| DiaError::InvalidExecutable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let info = file
        .pdb_info()
        .map_err(|err| DiaError::InvalidExecutable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?
        .ok_or_else(|| DiaError::NoDebugInfo(path.to_path_buf()))?;

    let directory = DebugDirectory {
        pdb_path: PathBuf::from(String::from_utf8_lossy(info.path()).into_owned()),
        guid: Guid::from_bytes_le(info.guid()),
        age: info.age(),
        machine: machine_of(file.architecture()),
    };
    debug!(
        exe = %path.display(),
        pdb = %directory.pdb_path.display(),
        guid = %directory.guid,
        age = directory.age,
        "Read executable debug directory"
    );
    Ok(directory)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_file_name_handles_foreign_separators()
    {
        let directory = DebugDirectory {
            pdb_path: PathBuf::from("C:\\build\\out\\app.pdb"),
            guid: Guid::NIL,
            age: 1,
            machine: MachineType::Amd64,
        };
        assert_eq!(directory.pdb_file_name(), Some("app.pdb"));
    }

    #[test]
    fn test_non_image_is_invalid_executable()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-an-exe.bin");
        std::fs::write(&path, b"plain text, not an image").unwrap();
        assert!(matches!(
            read_debug_directory(&path),
            Err(DiaError::InvalidExecutable { .. })
        ));
        assert!(matches!(
            read_debug_directory(&dir.path().join("missing.exe")),
            Err(DiaError::NotFound(_))
        ));
    }
}
