//! # Enumerators
//!
//! Every plural result of the access layer is an [`Enumerator`]: an immutable
//! snapshot of items plus a cursor.
//!
//! ## States
//!
//! ```text
//!   Ready --next/skip/prev--> Positioned --past the end--> Exhausted
//!     ^                                                       |
//!     +-------------------------- reset ----------------------+
//! ```
//!
//! Random access (`item`, `item_by_name`) never moves the cursor. Cloning an
//! enumerator shares the snapshot and starts the clone at [`EnumeratorState::Ready`],
//! so two clones can be walked independently.
//!
//! ## Example
//!
//! ```rust
//! use diaport_core::enumerator::{Enumerator, EnumeratorState};
//!
//! let mut numbers = Enumerator::from_vec(vec![1, 2, 3, 4]);
//! assert_eq!(numbers.next_batch(3), vec![1, 2, 3]);
//! assert_eq!(numbers.next_batch(3), vec![4]);
//! assert_eq!(numbers.state(), EnumeratorState::Exhausted);
//!
//! numbers.reset();
//! numbers.skip(2);
//! assert_eq!(numbers.iter().next(), Some(3));
//! assert_eq!(numbers.count(), 4);
//! ```

use std::fmt;
use std::sync::Arc;

/// Items that can be looked up by name with [`Enumerator::item_by_name`].
pub trait Named
{
    fn item_name(&self) -> Option<&str>;
}

/// Cursor state of an [`Enumerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState
{
    /// Freshly created, cloned or reset.
    Ready,
    /// The cursor has moved and items remain ahead of it.
    Positioned,
    /// The cursor is past the last item.
    Exhausted,
}

/// A snapshot of query results with a movable cursor.
pub struct Enumerator<T>
{
    items: Arc<[T]>,
    cursor: usize,
    touched: bool,
}

impl<T> Enumerator<T>
{
    pub fn from_vec(items: Vec<T>) -> Self
    {
        Self {
            items: items.into(),
            cursor: 0,
            touched: false,
        }
    }

    pub fn empty() -> Self
    {
        Self::from_vec(Vec::new())
    }

    /// Number of items in the snapshot, independent of the cursor.
    pub fn count(&self) -> usize
    {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.items.is_empty()
    }

    /// Item at `index`, without moving the cursor.
    pub fn item(&self, index: usize) -> Option<&T>
    {
        self.items.get(index)
    }

    /// The full snapshot.
    pub fn as_slice(&self) -> &[T]
    {
        &self.items
    }

    /// Index of the item the next call to `next_batch` would return first.
    pub fn position(&self) -> usize
    {
        self.cursor
    }

    pub fn state(&self) -> EnumeratorState
    {
        if !self.touched {
            EnumeratorState::Ready
        } else if self.cursor >= self.items.len() {
            EnumeratorState::Exhausted
        } else {
            EnumeratorState::Positioned
        }
    }

    /// Advance by `n` items. Skipping past the end leaves the enumerator
    /// exhausted; it never fails.
    pub fn skip(&mut self, n: usize)
    {
        self.cursor = self.cursor.saturating_add(n).min(self.items.len());
        self.touched = true;
    }

    /// Return to [`EnumeratorState::Ready`].
    pub fn reset(&mut self)
    {
        self.cursor = 0;
        self.touched = false;
    }

    /// Place the cursor on `index` (clamped to the end).
    pub(crate) fn seek(&mut self, index: usize)
    {
        self.cursor = index.min(self.items.len());
        self.touched = true;
    }
}

impl<T: Clone> Enumerator<T>
{
    /// Up to `n` items from the cursor onward. Fewer than `n` means the end
    /// was reached.
    pub fn next_batch(&mut self, n: usize) -> Vec<T>
    {
        let start = self.cursor.min(self.items.len());
        let end = start.saturating_add(n).min(self.items.len());
        self.cursor = end;
        self.touched = true;
        self.items[start..end].to_vec()
    }

    /// Up to `n` items walking backwards from the cursor, nearest first.
    pub fn prev_batch(&mut self, n: usize) -> Vec<T>
    {
        let end = self.cursor.min(self.items.len());
        let start = end.saturating_sub(n);
        self.cursor = start;
        self.touched = true;
        self.items[start..end].iter().rev().cloned().collect()
    }
}

impl<T: Named> Enumerator<T>
{
    /// First item whose name equals `name`, without moving the cursor.
    pub fn item_by_name(&self, name: &str) -> Option<&T>
    {
        self.items.iter().find(|item| item.item_name() == Some(name))
    }
}

impl<T> Clone for Enumerator<T>
{
    fn clone(&self) -> Self
    {
        Self {
            items: Arc::clone(&self.items),
            cursor: 0,
            touched: false,
        }
    }
}

impl<T> Default for Enumerator<T>
{
    fn default() -> Self
    {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Enumerator<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Enumerator")
            .field("count", &self.items.len())
            .field("cursor", &self.cursor)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> From<Vec<T>> for Enumerator<T>
{
    fn from(items: Vec<T>) -> Self
    {
        Self::from_vec(items)
    }
}

impl<T: Clone> Enumerator<T>
{
    /// Drain the items ahead of the cursor, advancing it as items are taken.
    ///
    /// The enumerator itself is not an [`Iterator`], so [`Enumerator::count`]
    /// always reports the snapshot size.
    pub fn iter(&mut self) -> Iter<'_, T>
    {
        Iter { inner: self }
    }

    fn take_one(&mut self) -> Option<T>
    {
        self.touched = true;
        let item = self.items.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn remaining(&self) -> usize
    {
        self.items.len().saturating_sub(self.cursor)
    }
}

/// Draining iterator returned by [`Enumerator::iter`].
#[derive(Debug)]
pub struct Iter<'e, T>
{
    inner: &'e mut Enumerator<T>,
}

impl<T: Clone> Iterator for Iter<'_, T>
{
    type Item = T;

    fn next(&mut self) -> Option<T>
    {
        self.inner.take_one()
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        let remaining = self.inner.remaining();
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for Iter<'_, T> {}

/// Owning iterator over the items ahead of the cursor.
#[derive(Debug)]
pub struct IntoIter<T>
{
    inner: Enumerator<T>,
}

impl<T: Clone> Iterator for IntoIter<T>
{
    type Item = T;

    fn next(&mut self) -> Option<T>
    {
        self.inner.take_one()
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        let remaining = self.inner.remaining();
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for IntoIter<T> {}

impl<T: Clone> IntoIterator for Enumerator<T>
{
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T>
    {
        IntoIter { inner: self }
    }
}

impl<'e, T: Clone> IntoIterator for &'e mut Enumerator<T>
{
    type Item = T;
    type IntoIter = Iter<'e, T>;

    fn into_iter(self) -> Iter<'e, T>
    {
        self.iter()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry(&'static str);

    impl Named for Entry
    {
        fn item_name(&self) -> Option<&str>
        {
            Some(self.0)
        }
    }

    #[test]
    fn test_prev_batch_walks_backwards()
    {
        let mut items = Enumerator::from_vec(vec![1, 2, 3, 4, 5]);
        items.skip(4);
        assert_eq!(items.prev_batch(2), vec![4, 3]);
        assert_eq!(items.position(), 2);
        assert_eq!(items.prev_batch(10), vec![2, 1]);
        assert!(items.prev_batch(1).is_empty());
    }

    #[test]
    fn test_item_by_name_leaves_cursor()
    {
        let mut entries = Enumerator::from_vec(vec![Entry("FPO"), Entry("OMAPTO")]);
        entries.skip(1);
        assert_eq!(entries.item_by_name("FPO"), Some(&Entry("FPO")));
        assert_eq!(entries.position(), 1);
        assert!(entries.item_by_name("missing").is_none());
    }

    #[test]
    fn test_iter_drains_from_cursor()
    {
        let mut items = Enumerator::from_vec(vec![1, 2, 3]);
        items.skip(1);
        assert_eq!(items.iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(items.state(), EnumeratorState::Exhausted);
        assert_eq!(items.count(), 3);
    }

    #[test]
    fn test_empty_enumerator_states()
    {
        let mut empty: Enumerator<u8> = Enumerator::empty();
        assert_eq!(empty.state(), EnumeratorState::Ready);
        assert!(empty.next_batch(1).is_empty());
        assert_eq!(empty.state(), EnumeratorState::Exhausted);
    }
}
