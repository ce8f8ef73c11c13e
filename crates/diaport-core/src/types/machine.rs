//! Target machine types.
//!
//! Values are the PE/COFF `IMAGE_FILE_MACHINE_*` constants, which is also
//! what a store's executable symbol reports as its machine.

use std::fmt;
use std::str::FromStr;

/// Image machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum MachineType
{
    #[default]
    Unknown = 0,
    /// The machine this process runs on, resolved with [`MachineType::resolve_host`].
    Host = 0x0001,
    /// Intel 386.
    I386 = 0x014c,
    /// MIPS little-endian
    R3000 = 0x0162,
    R4000 = 0x0166,
    R10000 = 0x0168,
    /// MIPS little-endian WCE v2
    WceMipsV2 = 0x0169,
    Alpha = 0x0184,
    Sh3 = 0x01a2,
    Sh3Dsp = 0x01a3,
    Sh3e = 0x01a4,
    Sh4 = 0x01a6,
    Sh5 = 0x01a8,
    /// ARM little-endian
    Arm = 0x01c0,
    /// ARM Thumb/Thumb-2 little-endian
    Thumb = 0x01c2,
    /// ARM Thumb-2 little-endian
    ArmNt = 0x01c4,
    Am33 = 0x01d3,
    PowerPc = 0x01f0,
    PowerPcFp = 0x01f1,
    /// Intel Itanium
    Ia64 = 0x0200,
    Mips16 = 0x0266,
    Alpha64 = 0x0284,
    MipsFpu = 0x0366,
    MipsFpu16 = 0x0466,
    /// Infineon
    TriCore = 0x0520,
    Cef = 0x0cef,
    /// EFI byte code
    Ebc = 0x0ebc,
    /// AMD64 (K8)
    Amd64 = 0x8664,
    /// M32R little-endian
    M32R = 0x9041,
    /// ARM64 little-endian
    Arm64 = 0xaa64,
    Cee = 0xc0ee,
}

const ALL: [MachineType; 31] = [
    MachineType::Unknown,
    MachineType::Host,
    MachineType::I386,
    MachineType::R3000,
    MachineType::R4000,
    MachineType::R10000,
    MachineType::WceMipsV2,
    MachineType::Alpha,
    MachineType::Sh3,
    MachineType::Sh3Dsp,
    MachineType::Sh3e,
    MachineType::Sh4,
    MachineType::Sh5,
    MachineType::Arm,
    MachineType::Thumb,
    MachineType::ArmNt,
    MachineType::Am33,
    MachineType::PowerPc,
    MachineType::PowerPcFp,
    MachineType::Ia64,
    MachineType::Mips16,
    MachineType::Alpha64,
    MachineType::MipsFpu,
    MachineType::MipsFpu16,
    MachineType::TriCore,
    MachineType::Cef,
    MachineType::Ebc,
    MachineType::Amd64,
    MachineType::M32R,
    MachineType::Arm64,
    MachineType::Cee,
];

impl MachineType
{
    /// Alias kept for the `AXP64` spelling of [`MachineType::Alpha64`].
    pub const AXP64: Self = MachineType::Alpha64;

    /// Decode a raw `IMAGE_FILE_MACHINE_*` value.
    pub fn from_raw(value: u16) -> Option<Self>
    {
        ALL.iter().copied().find(|machine| *machine as u16 == value)
    }

    /// Raw `IMAGE_FILE_MACHINE_*` value.
    pub const fn raw(self) -> u16
    {
        self as u16
    }

    /// Replace [`MachineType::Host`] with the machine this binary was built for.
    pub fn resolve_host(self) -> Self
    {
        if self != MachineType::Host {
            return self;
        }
        if cfg!(target_arch = "x86_64") {
            MachineType::Amd64
        } else if cfg!(target_arch = "aarch64") {
            MachineType::Arm64
        } else if cfg!(target_arch = "x86") {
            MachineType::I386
        } else if cfg!(target_arch = "arm") {
            MachineType::ArmNt
        } else {
            MachineType::Unknown
        }
    }

    /// Pointer width in bytes, or `None` for machines the stack walker does
    /// not understand.
    pub fn pointer_size(self) -> Option<u8>
    {
        match self.resolve_host() {
            MachineType::Amd64 | MachineType::Arm64 | MachineType::Ia64 => Some(8),
            MachineType::I386 | MachineType::Arm | MachineType::Thumb | MachineType::ArmNt => Some(4),
            _ => None,
        }
    }

    /// Whether return addresses live in a link register on this machine.
    pub fn has_link_register(self) -> bool
    {
        matches!(
            self.resolve_host(),
            MachineType::Arm | MachineType::Thumb | MachineType::ArmNt | MachineType::Arm64
        )
    }
}

impl fmt::Display for MachineType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            MachineType::Unknown => "unknown",
            MachineType::Host => "host",
            MachineType::I386 => "i386",
            MachineType::Amd64 => "amd64",
            MachineType::Arm => "arm",
            MachineType::Thumb => "thumb",
            MachineType::ArmNt => "armnt",
            MachineType::Arm64 => "arm64",
            MachineType::Ia64 => "ia64",
            other => return write!(f, "machine(0x{:04x})", other.raw()),
        };
        write!(f, "{label}")
    }
}

impl FromStr for MachineType
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(MachineType::Unknown),
            "host" => Ok(MachineType::Host),
            "i386" | "x86" => Ok(MachineType::I386),
            "amd64" | "x64" | "x86_64" => Ok(MachineType::Amd64),
            "arm" => Ok(MachineType::Arm),
            "thumb" => Ok(MachineType::Thumb),
            "armnt" => Ok(MachineType::ArmNt),
            "arm64" | "aarch64" => Ok(MachineType::Arm64),
            "ia64" => Ok(MachineType::Ia64),
            other => {
                let raw = other
                    .strip_prefix("0x")
                    .and_then(|hex| u16::from_str_radix(hex, 16).ok())
                    .and_then(MachineType::from_raw);
                raw.ok_or_else(|| format!("Unknown machine type: {s}"))
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_from_raw_roundtrip()
    {
        assert_eq!(MachineType::from_raw(0x8664), Some(MachineType::Amd64));
        assert_eq!(MachineType::from_raw(0xaa64), Some(MachineType::Arm64));
        assert_eq!(MachineType::from_raw(0x1234), None);
        assert_eq!(MachineType::AXP64.raw(), 0x0284);
    }

    #[test]
    fn test_parse_names_and_hex()
    {
        assert_eq!("x64".parse::<MachineType>().unwrap(), MachineType::Amd64);
        assert_eq!("0x014c".parse::<MachineType>().unwrap(), MachineType::I386);
        assert!("vax".parse::<MachineType>().is_err());
    }

    #[test]
    fn test_host_resolves_to_concrete_machine()
    {
        assert_ne!(MachineType::Host.resolve_host(), MachineType::Host);
        assert_eq!(MachineType::Amd64.pointer_size(), Some(8));
        assert_eq!(MachineType::I386.pointer_size(), Some(4));
        assert_eq!(MachineType::PowerPc.pointer_size(), None);
    }
}
