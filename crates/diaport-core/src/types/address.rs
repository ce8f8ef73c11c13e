//! Address coordinate types.
//!
//! A debug store speaks about code and data locations in three coordinate
//! systems:
//!
//! - **Section + offset**: an image section index (one-based) and a byte
//!   offset inside that section. This is how the store records addresses.
//! - **RVA**: a relative virtual address, the offset from the image base.
//! - **VA**: an absolute virtual address, the RVA plus the session's load
//!   address.
//!
//! Every lookup takes exactly one of them. Conversions between VA and RVA are
//! pure functions of the load address; conversions to and from section+offset
//! need the store's section map and live on the session.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed virtual address
///
/// This wrapper around `u64` keeps absolute, base-adjusted addresses from
/// being confused with RVAs, sizes or counts.
///
/// ## Example
///
/// ```rust
/// use diaport_core::types::Va;
///
/// let addr = Va::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Va(u64);

impl Va
{
    /// The null address (0x0)
    pub const ZERO: Self = Va(0);

    /// Create a new address from a `u64` value
    ///
    /// Equivalent to `Va::from(value)` but usable in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Va(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use diaport_core::types::Va;
    ///
    /// let addr = Va::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Va::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None); // Overflow
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Va)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Va)
    }

    /// Convert to an RVA against `load_address`.
    ///
    /// Returns `None` when the address lies below the load address or further
    /// than 4 GiB above it, since neither can be expressed as an RVA.
    ///
    /// ```rust
    /// use diaport_core::types::{Rva, Va};
    ///
    /// assert_eq!(Va::new(0x1_4000_1000).to_rva(0x1_4000_0000), Some(Rva::new(0x1000)));
    /// assert_eq!(Va::new(0x1000).to_rva(0x1_4000_0000), None);
    /// ```
    pub fn to_rva(self, load_address: u64) -> Option<Rva>
    {
        self.0
            .checked_sub(load_address)
            .and_then(|delta| u32::try_from(delta).ok())
            .map(Rva)
    }
}

impl From<u64> for Va
{
    fn from(value: u64) -> Self
    {
        Va(value)
    }
}

impl From<Va> for u64
{
    fn from(address: Va) -> Self
    {
        address.0
    }
}

impl fmt::Display for Va
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Va
{
    type Output = Va;

    fn add(self, rhs: u64) -> Self::Output
    {
        Va(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Va
{
    type Output = Va;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Va(self.0.wrapping_sub(rhs))
    }
}

/// Relative virtual address: an offset from the image base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rva(u32);

impl Rva
{
    /// Create a new RVA.
    pub const fn new(value: u32) -> Self
    {
        Rva(value)
    }

    /// Raw `u32` value.
    pub const fn value(self) -> u32
    {
        self.0
    }

    /// Add a byte offset, checking for overflow.
    pub fn checked_add(self, offset: u32) -> Option<Self>
    {
        self.0.checked_add(offset).map(Rva)
    }

    /// Distance from `start` to `self`, or `None` when `self` precedes `start`.
    pub fn offset_from(self, start: Rva) -> Option<u32>
    {
        self.0.checked_sub(start.0)
    }

    /// Absolute address once the image is loaded at `load_address`.
    pub fn to_va(self, load_address: u64) -> Va
    {
        Va(load_address.wrapping_add(u64::from(self.0)))
    }

    /// Returns `true` when `self` lies in the half-open range
    /// `[start, start + length)`. A zero length still contains `start`.
    pub fn is_within(self, start: Rva, length: u64) -> bool
    {
        match self.offset_from(start) {
            Some(delta) => u64::from(delta) < length.max(1),
            None => false,
        }
    }
}

impl From<u32> for Rva
{
    fn from(value: u32) -> Self
    {
        Rva(value)
    }
}

impl From<Rva> for u32
{
    fn from(rva: Rva) -> Self
    {
        rva.0
    }
}

impl fmt::Display for Rva
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Section index and byte offset inside that section.
///
/// Section indices are one-based, matching the image's section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SectionOffset
{
    /// One-based section index.
    pub section: u32,
    /// Offset in bytes from the start of the section.
    pub offset: u32,
}

impl SectionOffset
{
    pub const fn new(section: u32, offset: u32) -> Self
    {
        Self { section, offset }
    }
}

impl fmt::Display for SectionOffset
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:04x}:{:08x}", self.section, self.offset)
    }
}

/// Exactly one coordinate of the address triple.
///
/// Lookups never mix coordinate systems in a single call; this enum is how the
/// session normalizes whichever one the caller used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address
{
    /// Section index and offset.
    Section(SectionOffset),
    /// Relative virtual address.
    Rva(Rva),
    /// Absolute virtual address.
    Va(Va),
}

impl From<SectionOffset> for Address
{
    fn from(value: SectionOffset) -> Self
    {
        Address::Section(value)
    }
}

impl From<Rva> for Address
{
    fn from(value: Rva) -> Self
    {
        Address::Rva(value)
    }
}

impl From<Va> for Address
{
    fn from(value: Va) -> Self
    {
        Address::Va(value)
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Address::Section(so) => write!(f, "[{so}]"),
            Address::Rva(rva) => write!(f, "rva {rva}"),
            Address::Va(va) => write!(f, "va {va}"),
        }
    }
}
