//! 128-bit identifiers.
//!
//! Engine identities and store signatures are both GUIDs. The registry text
//! form (`E6756135-1E65-4D17-8576-610761398C3C`) is the canonical way to write
//! them down; the CodeView debug directory stores them in the mixed-endian
//! byte layout handled by [`Guid::from_bytes_le`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A 128-bit globally unique identifier.
///
/// ## Example
///
/// ```rust
/// use diaport_core::types::Guid;
///
/// let guid: Guid = "{e6756135-1e65-4d17-8576-610761398c3c}".parse().unwrap();
/// assert_eq!(guid.to_string(), "E6756135-1E65-4D17-8576-610761398C3C");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Guid(u128);

impl Guid
{
    /// The all-zero GUID.
    pub const NIL: Self = Guid(0);

    /// Build a GUID from its big-endian 128-bit value.
    ///
    /// `0xE6756135_1E65_4D17_8576_610761398C3C` is the GUID written as
    /// `E6756135-1E65-4D17-8576-610761398C3C`.
    pub const fn from_u128(value: u128) -> Self
    {
        Guid(value)
    }

    /// The big-endian 128-bit value.
    pub const fn as_u128(self) -> u128
    {
        self.0
    }

    /// Build a GUID from the classic `Data1..Data4` fields.
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self
    {
        let tail = u64::from_be_bytes(data4);
        Guid(((data1 as u128) << 96) | ((data2 as u128) << 80) | ((data3 as u128) << 64) | tail as u128)
    }

    /// Decode the mixed-endian layout used on disk by CodeView records:
    /// `Data1`, `Data2` and `Data3` little-endian, `Data4` as raw bytes.
    pub fn from_bytes_le(bytes: [u8; 16]) -> Self
    {
        let data1 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let data2 = u16::from_le_bytes([bytes[4], bytes[5]]);
        let data3 = u16::from_le_bytes([bytes[6], bytes[7]]);
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self::from_fields(data1, data2, data3, data4)
    }

    /// Encode into the mixed-endian on-disk layout.
    pub fn to_bytes_le(self) -> [u8; 16]
    {
        let be = self.0.to_be_bytes();
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&[be[3], be[2], be[1], be[0]]);
        out[4..6].copy_from_slice(&[be[5], be[4]]);
        out[6..8].copy_from_slice(&[be[7], be[6]]);
        out[8..].copy_from_slice(&be[8..]);
        out
    }

    /// Returns `true` for [`Guid::NIL`].
    pub const fn is_nil(self) -> bool
    {
        self.0 == 0
    }
}

impl fmt::Display for Guid
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let v = self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

/// Error returned when a string is not a registry-form GUID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed GUID: {0:?}")]
pub struct ParseGuidError(pub String);

impl FromStr for Guid
{
    type Err = ParseGuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);

        let groups: Vec<&str> = body.split('-').collect();
        let widths = [8, 4, 4, 4, 12];
        if groups.len() != widths.len() || groups.iter().zip(widths).any(|(group, width)| group.len() != width) {
            return Err(ParseGuidError(s.to_string()));
        }

        let digits: String = groups.concat();
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseGuidError(s.to_string()));
        }
        u128::from_str_radix(&digits, 16)
            .map(Guid)
            .map_err(|_| ParseGuidError(s.to_string()))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip()
    {
        let guid: Guid = "b86ae24d-bf2f-4ac9-b5a2-34b14e4ce11d".parse().unwrap();
        assert_eq!(guid, Guid::from_u128(0xB86A_E24D_BF2F_4AC9_B5A2_34B1_4E4C_E11D));
        assert_eq!(guid.to_string(), "B86AE24D-BF2F-4AC9-B5A2-34B14E4CE11D");
    }

    #[test]
    fn test_parse_rejects_bad_shapes()
    {
        assert!("".parse::<Guid>().is_err());
        assert!("B86AE24D-BF2F-4AC9-B5A234B14E4CE11D".parse::<Guid>().is_err());
        assert!("G86AE24D-BF2F-4AC9-B5A2-34B14E4CE11D".parse::<Guid>().is_err());
        assert!("{B86AE24D-BF2F-4AC9-B5A2-34B14E4CE11D".parse::<Guid>().is_err());
    }

    #[test]
    fn test_codeview_byte_layout()
    {
        let guid = Guid::from_fields(0x0403_0201, 0x0605, 0x0807, [9, 10, 11, 12, 13, 14, 15, 16]);
        let bytes = guid.to_bytes_le();
        assert_eq!(bytes, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(Guid::from_bytes_le(bytes), guid);
    }
}
