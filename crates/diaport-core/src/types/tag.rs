//! Symbol tags.
//!
//! Every node in a store's symbol tree carries exactly one tag. The numeric
//! values follow the engine's own numbering so tags can be passed through to
//! engines and compared with values recorded in stores unchanged.

use std::fmt;
use std::str::FromStr;

/// Closed set of symbol tags.
///
/// [`SymTag::Null`] doubles as the "any tag" filter in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u32)]
pub enum SymTag
{
    #[default]
    Null = 0,
    Exe = 1,
    Compiland = 2,
    CompilandDetails = 3,
    CompilandEnv = 4,
    Function = 5,
    Block = 6,
    Data = 7,
    Annotation = 8,
    Label = 9,
    PublicSymbol = 10,
    Udt = 11,
    Enum = 12,
    FunctionType = 13,
    PointerType = 14,
    ArrayType = 15,
    BaseType = 16,
    Typedef = 17,
    BaseClass = 18,
    Friend = 19,
    FunctionArgType = 20,
    FuncDebugStart = 21,
    FuncDebugEnd = 22,
    UsingNamespace = 23,
    VTableShape = 24,
    VTable = 25,
    Custom = 26,
    Thunk = 27,
    CustomType = 28,
    ManagedType = 29,
    Dimension = 30,
    CallSite = 31,
    InlineSite = 32,
    BaseInterface = 33,
    VectorType = 34,
    MatrixType = 35,
    HlslType = 36,
    Caller = 37,
    Callee = 38,
    Export = 39,
    HeapAllocationSite = 40,
    CoffGroup = 41,
    Inlinee = 42,
}

const NAMES: [(SymTag, &str); 43] = [
    (SymTag::Null, "Null"),
    (SymTag::Exe, "Exe"),
    (SymTag::Compiland, "Compiland"),
    (SymTag::CompilandDetails, "CompilandDetails"),
    (SymTag::CompilandEnv, "CompilandEnv"),
    (SymTag::Function, "Function"),
    (SymTag::Block, "Block"),
    (SymTag::Data, "Data"),
    (SymTag::Annotation, "Annotation"),
    (SymTag::Label, "Label"),
    (SymTag::PublicSymbol, "PublicSymbol"),
    (SymTag::Udt, "UDT"),
    (SymTag::Enum, "Enum"),
    (SymTag::FunctionType, "FunctionType"),
    (SymTag::PointerType, "PointerType"),
    (SymTag::ArrayType, "ArrayType"),
    (SymTag::BaseType, "BaseType"),
    (SymTag::Typedef, "Typedef"),
    (SymTag::BaseClass, "BaseClass"),
    (SymTag::Friend, "Friend"),
    (SymTag::FunctionArgType, "FunctionArgType"),
    (SymTag::FuncDebugStart, "FuncDebugStart"),
    (SymTag::FuncDebugEnd, "FuncDebugEnd"),
    (SymTag::UsingNamespace, "UsingNamespace"),
    (SymTag::VTableShape, "VTableShape"),
    (SymTag::VTable, "VTable"),
    (SymTag::Custom, "Custom"),
    (SymTag::Thunk, "Thunk"),
    (SymTag::CustomType, "CustomType"),
    (SymTag::ManagedType, "ManagedType"),
    (SymTag::Dimension, "Dimension"),
    (SymTag::CallSite, "CallSite"),
    (SymTag::InlineSite, "InlineSite"),
    (SymTag::BaseInterface, "BaseInterface"),
    (SymTag::VectorType, "VectorType"),
    (SymTag::MatrixType, "MatrixType"),
    (SymTag::HlslType, "HLSLType"),
    (SymTag::Caller, "Caller"),
    (SymTag::Callee, "Callee"),
    (SymTag::Export, "Export"),
    (SymTag::HeapAllocationSite, "HeapAllocationSite"),
    (SymTag::CoffGroup, "CoffGroup"),
    (SymTag::Inlinee, "Inlinee"),
];

impl SymTag
{
    /// Decode a raw tag value.
    pub fn from_raw(value: u32) -> Option<Self>
    {
        NAMES.get(value as usize).map(|(tag, _)| *tag)
    }

    /// Raw tag value.
    pub const fn raw(self) -> u32
    {
        self as u32
    }

    /// Whether `self`, used as a query filter, admits a symbol tagged `tag`.
    ///
    /// ```rust
    /// use diaport_core::types::SymTag;
    ///
    /// assert!(SymTag::Null.admits(SymTag::Function));
    /// assert!(SymTag::Function.admits(SymTag::Function));
    /// assert!(!SymTag::Data.admits(SymTag::Function));
    /// ```
    pub fn admits(self, tag: SymTag) -> bool
    {
        self == SymTag::Null || self == tag
    }

    /// Canonical name without the `SymTag` prefix.
    pub fn name(self) -> &'static str
    {
        NAMES[self as usize].1
    }
}

impl fmt::Display for SymTag
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SymTag
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix("SymTag")
            .or_else(|| trimmed.strip_prefix("symtag"))
            .unwrap_or(trimmed);
        if let Ok(raw) = bare.parse::<u32>() {
            return SymTag::from_raw(raw).ok_or_else(|| format!("Unknown symbol tag: {s}"));
        }
        NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(bare))
            .map(|(tag, _)| *tag)
            .ok_or_else(|| format!("Unknown symbol tag: {s}"))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_table_is_indexed_by_value()
    {
        for (index, (tag, _)) in NAMES.iter().enumerate() {
            assert_eq!(tag.raw() as usize, index);
        }
    }

    #[test]
    fn test_parse_tag_names()
    {
        assert_eq!("function".parse::<SymTag>().unwrap(), SymTag::Function);
        assert_eq!("SymTagPublicSymbol".parse::<SymTag>().unwrap(), SymTag::PublicSymbol);
        assert_eq!("udt".parse::<SymTag>().unwrap(), SymTag::Udt);
        assert_eq!("32".parse::<SymTag>().unwrap(), SymTag::InlineSite);
        assert!("widget".parse::<SymTag>().is_err());
    }
}
