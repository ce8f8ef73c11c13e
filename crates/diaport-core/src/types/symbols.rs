//! Per-tag symbol data.
//!
//! Which attributes a symbol has depends on its tag. Instead of one node type
//! with attribute getters that are only legal for some tags, each tag that
//! carries attributes gets its own variant; everything else is
//! [`SymbolData::Other`].

use std::fmt;

use super::machine::MachineType;
use super::tag::SymTag;

/// Numeric symbol identifier, unique within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl SymbolId
{
    pub const fn value(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for SymbolId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// Storage class of a data symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataKind
{
    #[default]
    Unknown,
    Local,
    StaticLocal,
    Param,
    ObjectPtr,
    FileStatic,
    Global,
    Member,
    StaticMember,
    Constant,
}

impl std::str::FromStr for DataKind
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(DataKind::Unknown),
            "local" => Ok(DataKind::Local),
            "staticlocal" | "static_local" => Ok(DataKind::StaticLocal),
            "param" | "parameter" => Ok(DataKind::Param),
            "objectptr" | "this" => Ok(DataKind::ObjectPtr),
            "filestatic" | "file_static" => Ok(DataKind::FileStatic),
            "global" => Ok(DataKind::Global),
            "member" => Ok(DataKind::Member),
            "staticmember" | "static_member" => Ok(DataKind::StaticMember),
            "constant" => Ok(DataKind::Constant),
            _ => Err(format!("Unknown data kind: {s}")),
        }
    }
}

/// Flavour of a user-defined type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UdtKind
{
    #[default]
    Struct,
    Class,
    Union,
    Interface,
}

/// Stack frame layout of a function, as recorded in the store's frame data.
///
/// All lengths are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameLayout
{
    /// Local variable area.
    pub locals: u32,
    /// Callee-saved register area.
    pub saved_registers: u32,
    /// Parameters pushed by the caller.
    pub params: u32,
    /// Prolog length.
    pub prolog: u32,
    /// Whether the function establishes a frame pointer.
    pub uses_frame_pointer: bool,
}

/// Tag-specific attributes of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolData
{
    /// The executable itself; the global scope.
    Exe
    {
        machine: MachineType,
    },
    Compiland
    {
        library_name: Option<String>,
    },
    Function
    {
        is_static: bool,
        no_return: bool,
        frame: Option<FrameLayout>,
    },
    Block,
    Data
    {
        kind: DataKind,
    },
    Label,
    PublicSymbol
    {
        is_code: bool,
        is_function: bool,
    },
    Udt
    {
        kind: UdtKind,
    },
    Enum,
    Typedef,
    BaseType,
    PointerType,
    FunctionType,
    /// An inlined call site. `inlinee` is the function that was inlined.
    InlineSite
    {
        inlinee: Option<SymbolId>,
    },
    Thunk,
    Export
    {
        ordinal: u32,
        is_forwarder: bool,
    },
    HeapAllocationSite,
    /// Any tag without dedicated attributes.
    Other(SymTag),
}

impl SymbolData
{
    /// The tag this data belongs to.
    pub fn tag(&self) -> SymTag
    {
        match self {
            SymbolData::Exe { .. } => SymTag::Exe,
            SymbolData::Compiland { .. } => SymTag::Compiland,
            SymbolData::Function { .. } => SymTag::Function,
            SymbolData::Block => SymTag::Block,
            SymbolData::Data { .. } => SymTag::Data,
            SymbolData::Label => SymTag::Label,
            SymbolData::PublicSymbol { .. } => SymTag::PublicSymbol,
            SymbolData::Udt { .. } => SymTag::Udt,
            SymbolData::Enum => SymTag::Enum,
            SymbolData::Typedef => SymTag::Typedef,
            SymbolData::BaseType => SymTag::BaseType,
            SymbolData::PointerType => SymTag::PointerType,
            SymbolData::FunctionType => SymTag::FunctionType,
            SymbolData::InlineSite { .. } => SymTag::InlineSite,
            SymbolData::Thunk => SymTag::Thunk,
            SymbolData::Export { .. } => SymTag::Export,
            SymbolData::HeapAllocationSite => SymTag::HeapAllocationSite,
            SymbolData::Other(tag) => *tag,
        }
    }

    /// Default attributes for a tag.
    pub fn for_tag(tag: SymTag) -> Self
    {
        match tag {
            SymTag::Exe => SymbolData::Exe {
                machine: MachineType::Unknown,
            },
            SymTag::Compiland => SymbolData::Compiland { library_name: None },
            SymTag::Function => SymbolData::Function {
                is_static: false,
                no_return: false,
                frame: None,
            },
            SymTag::Block => SymbolData::Block,
            SymTag::Data => SymbolData::Data { kind: DataKind::Unknown },
            SymTag::Label => SymbolData::Label,
            SymTag::PublicSymbol => SymbolData::PublicSymbol {
                is_code: false,
                is_function: false,
            },
            SymTag::Udt => SymbolData::Udt { kind: UdtKind::Struct },
            SymTag::Enum => SymbolData::Enum,
            SymTag::Typedef => SymbolData::Typedef,
            SymTag::BaseType => SymbolData::BaseType,
            SymTag::PointerType => SymbolData::PointerType,
            SymTag::FunctionType => SymbolData::FunctionType,
            SymTag::InlineSite => SymbolData::InlineSite { inlinee: None },
            SymTag::Thunk => SymbolData::Thunk,
            SymTag::Export => SymbolData::Export {
                ordinal: 0,
                is_forwarder: false,
            },
            SymTag::HeapAllocationSite => SymbolData::HeapAllocationSite,
            other => SymbolData::Other(other),
        }
    }

    /// Frame layout for function symbols that carry one.
    pub fn frame_layout(&self) -> Option<FrameLayout>
    {
        match self {
            SymbolData::Function { frame, .. } => *frame,
            _ => None,
        }
    }
}
