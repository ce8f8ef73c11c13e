//! Symbol tree nodes.

use std::fmt;
use std::sync::Arc;

use super::{Session, SessionShared};
use crate::demangle;
use crate::engine::SymbolRecord;
use crate::enumerator::{Enumerator, Named};
use crate::error::{HResult, Result};
use crate::types::{FrameLayout, NameSearchOptions, Rva, SectionOffset, SymTag, SymbolData, SymbolId, Va};

/// A node of a store's symbol tree, bound to the session it came from.
///
/// Children are not stored on the node; they are reached by query
/// ([`Symbol::find_children`] or [`Session::find_children`]).
#[derive(Clone)]
pub struct Symbol
{
    pub(crate) record: Arc<SymbolRecord>,
    pub(crate) session: Arc<SessionShared>,
}

impl Symbol
{
    pub(crate) fn new(record: Arc<SymbolRecord>, session: Arc<SessionShared>) -> Self
    {
        Self { record, session }
    }

    pub fn id(&self) -> SymbolId
    {
        self.record.id
    }

    pub fn tag(&self) -> SymTag
    {
        self.record.tag()
    }

    pub fn name(&self) -> Option<&str>
    {
        self.record.name.as_deref()
    }

    /// The undecorated name recorded in the store, or one derived locally
    /// from a Rust-mangled name.
    pub fn undecorated_name(&self) -> Option<String>
    {
        if let Some(name) = &self.record.undecorated_name {
            return Some(name.clone());
        }
        self.name().and_then(demangle::undecorate)
    }

    /// Tag-specific attributes.
    pub fn data(&self) -> &SymbolData
    {
        &self.record.data
    }

    pub fn record(&self) -> &SymbolRecord
    {
        &self.record
    }

    pub fn rva(&self) -> Option<Rva>
    {
        self.record.rva
    }

    /// Virtual address under the session's current load address.
    pub fn va(&self) -> Option<Va>
    {
        self.record.rva.map(|rva| rva.to_va(self.session.load_address()))
    }

    /// Section and offset of the symbol's start.
    pub fn section_offset(&self) -> Result<Option<SectionOffset>>
    {
        match self.record.rva {
            Some(rva) => self.session().address_for_rva(rva).map(Some),
            None => Ok(None),
        }
    }

    pub fn length(&self) -> u64
    {
        self.record.length
    }

    pub fn token(&self) -> Option<u32>
    {
        self.record.token
    }

    pub fn frame_layout(&self) -> Option<FrameLayout>
    {
        self.record.data.frame_layout()
    }

    /// Id of the session this symbol belongs to.
    pub fn session_id(&self) -> u64
    {
        self.session.id
    }

    /// The session this symbol belongs to.
    pub fn session(&self) -> Session
    {
        Session {
            shared: Arc::clone(&self.session),
        }
    }

    pub fn lexical_parent(&self) -> Result<Option<Symbol>>
    {
        match self.record.lexical_parent {
            Some(parent) => self.session().symbol_by_id(parent),
            None => Ok(None),
        }
    }

    /// Children of this symbol, filtered by tag and name.
    pub fn find_children(&self, tag: SymTag, name: Option<&str>, options: NameSearchOptions) -> Result<Enumerator<Symbol>>
    {
        self.session().find_children(Some(self), tag, name, options)
    }
}

impl PartialEq for Symbol
{
    fn eq(&self, other: &Self) -> bool
    {
        self.session.id == other.session.id && self.record.id == other.record.id
    }
}

impl Eq for Symbol {}

impl fmt::Debug for Symbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Symbol")
            .field("id", &self.record.id)
            .field("tag", &self.record.tag())
            .field("name", &self.record.name)
            .field("rva", &self.record.rva)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Symbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} {}", self.tag(), self.name().unwrap_or("<anonymous>"))
    }
}

impl Named for Symbol
{
    fn item_name(&self) -> Option<&str>
    {
        self.name()
    }
}

/// A symbol found by address, with the distance from its start.
#[derive(Debug, Clone)]
pub struct SymbolMatch
{
    pub symbol: Symbol,
    /// Signed byte offset of the queried address from the symbol's start.
    pub displacement: i32,
    /// The symbol does not contain the address; it is the nearest preceding
    /// public symbol.
    pub approximate: bool,
}

impl SymbolMatch
{
    /// `S_FALSE` for approximate matches, `S_OK` otherwise.
    pub fn status(&self) -> HResult
    {
        if self.approximate {
            HResult::S_FALSE
        } else {
            HResult::S_OK
        }
    }
}

/// Outcome of comparing two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equivalence
{
    Equivalent,
    NotEquivalent,
}

impl Equivalence
{
    pub fn status(self) -> HResult
    {
        match self {
            Equivalence::Equivalent => HResult::S_OK,
            Equivalence::NotEquivalent => HResult::S_FALSE,
        }
    }
}
