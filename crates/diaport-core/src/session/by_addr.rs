//! Address-ordered symbol enumeration.

use std::ops::{Deref, DerefMut};

use super::{Session, Symbol};
use crate::enumerator::Enumerator;
use crate::error::Result;
use crate::types::{Rva, SectionOffset, Va};

/// Every addressed symbol, ordered by RVA, with positioning by address.
///
/// Positioning returns the nearest symbol at or before the address and leaves
/// the cursor just after it, so `next_batch` continues with the following
/// symbols and `prev_batch` walks back from the returned one.
#[derive(Debug, Clone)]
pub struct SymbolsByAddr
{
    symbols: Enumerator<Symbol>,
    session: Session,
}

impl SymbolsByAddr
{
    pub(crate) fn new(symbols: Enumerator<Symbol>, session: Session) -> Self
    {
        Self { symbols, session }
    }

    pub fn symbol_by_rva(&mut self, rva: Rva) -> Result<Option<Symbol>>
    {
        self.session.check()?;
        let index = self
            .symbols
            .as_slice()
            .partition_point(|symbol| symbol.rva().is_some_and(|start| start <= rva));
        let Some(found) = index.checked_sub(1) else {
            return Ok(None);
        };
        self.symbols.seek(index);
        Ok(self.symbols.item(found).cloned())
    }

    pub fn symbol_by_addr(&mut self, address: SectionOffset) -> Result<Option<Symbol>>
    {
        let rva = self.session.rva_for_address(address)?;
        self.symbol_by_rva(rva)
    }

    pub fn symbol_by_va(&mut self, va: Va) -> Result<Option<Symbol>>
    {
        match va.to_rva(self.session.load_address()) {
            Some(rva) => self.symbol_by_rva(rva),
            None => Ok(None),
        }
    }

    pub fn into_inner(self) -> Enumerator<Symbol>
    {
        self.symbols
    }
}

impl Deref for SymbolsByAddr
{
    type Target = Enumerator<Symbol>;

    fn deref(&self) -> &Self::Target
    {
        &self.symbols
    }
}

impl DerefMut for SymbolsByAddr
{
    fn deref_mut(&mut self) -> &mut Self::Target
    {
        &mut self.symbols
    }
}
