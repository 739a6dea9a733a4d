use alloc::vec::Vec;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::ops::Index;
use core::ops::IndexMut;

use crate::error::Error;
use crate::error::fatal;

/// Smallest chunk size accepted by [`ChunkedVec::with_chunk_size`].
pub const MIN_CHUNK_SIZE: usize = 4;

/// How a [`ChunkedVec`] fills the hole left by `remove_at` and makes room for
/// `insert`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemoveBehavior {
    /// O(1): the last element is swapped into the affected position.
    #[default]
    SwapToEnd,
    /// O(n): elements are shifted across chunk boundaries so order is kept.
    MoveItems,
}

/// A vector stored as a list of fixed-size chunks.
///
/// Each chunk is allocated once at the chunk size, so pushing never moves
/// existing elements. The chunk size is always a power of two, which makes
/// splitting a flat index into `(chunk, at)` a shift and a mask.
///
/// ## Example
///
/// ```rust
/// use dense_hash::chunked_vec::ChunkedVec;
/// use dense_hash::chunked_vec::RemoveBehavior;
///
/// let mut v = ChunkedVec::with_chunk_size(4, RemoveBehavior::MoveItems);
/// v.extend(0..10);
/// assert_eq!(v.chunk_count(), 3);
///
/// v.remove_at(1);
/// assert_eq!(v[1], 2);
/// ```
#[derive(Clone)]
pub struct ChunkedVec<T> {
    chunks: Vec<Vec<T>>,
    shift: u32,
    behavior: RemoveBehavior,
    len: usize,
}

impl<T> ChunkedVec<T> {
    /// Creates an empty vector with the given chunk size and removal
    /// behavior.
    ///
    /// `chunk_size` is rounded up to a power of two and to at least
    /// [`MIN_CHUNK_SIZE`].
    pub fn with_chunk_size(chunk_size: usize, behavior: RemoveBehavior) -> Self {
        let chunk_size = chunk_size.max(MIN_CHUNK_SIZE).next_power_of_two();
        Self {
            chunks: Vec::new(),
            shift: chunk_size.trailing_zeros(),
            behavior,
            len: 0,
        }
    }

    /// Number of elements per chunk.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        1 << self.shift
    }

    /// Number of allocated chunks.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of elements that fit in the allocated chunks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.chunks.len() << self.shift
    }

    /// The behavior used by [`remove_at`](Self::remove_at) and
    /// [`insert`](Self::insert).
    pub fn behavior(&self) -> RemoveBehavior {
        self.behavior
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn split(&self, index: usize) -> (usize, usize) {
        (index >> self.shift, index & (self.chunk_size() - 1))
    }

    /// Returns the element at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let (chunk, at) = self.split(index);
        self.chunks.get(chunk)?.get(at)
    }

    /// Returns the element at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let (chunk, at) = self.split(index);
        self.chunks.get_mut(chunk)?.get_mut(at)
    }

    /// Returns the element at position `at` of chunk `chunk`.
    pub fn get_in_chunk(&self, chunk: usize, at: usize) -> Option<&T> {
        if at >= self.chunk_size() {
            return None;
        }
        self.chunks.get(chunk)?.get(at)
    }

    /// Appends `value`, allocating a new chunk when the last one is full.
    pub fn push(&mut self, value: T) {
        let chunk_size = self.chunk_size();
        match self.chunks.last_mut() {
            Some(last) if last.len() < chunk_size => last.push(value),
            _ => {
                let mut chunk = Vec::with_capacity(chunk_size);
                chunk.push(value);
                self.chunks.push(chunk);
            }
        }
        self.len += 1;
    }

    /// Removes and returns the last element. An emptied trailing chunk is
    /// released.
    pub fn pop(&mut self) -> Option<T> {
        let last = self.chunks.last_mut()?;
        let value = last.pop();
        if last.is_empty() {
            self.chunks.pop();
        }
        if value.is_some() {
            self.len -= 1;
        }
        value
    }

    /// Inserts `value` at `index`.
    ///
    /// With [`RemoveBehavior::SwapToEnd`] the element previously at `index`
    /// moves to the end; with [`RemoveBehavior::MoveItems`] every later
    /// element shifts up by one.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&mut self, index: usize, value: T) {
        if index > self.len {
            fatal(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        self.push(value);
        let last = self.len - 1;
        if index == last {
            return;
        }
        match self.behavior {
            RemoveBehavior::SwapToEnd => self.swap(index, last),
            RemoveBehavior::MoveItems => {
                // Bubble the new element down to `index`, one chunk boundary
                // at a time.
                let (target_chunk, target_at) = self.split(index);
                let (last_chunk, _) = self.split(last);
                for chunk in (target_chunk + 1..=last_chunk).rev() {
                    let moved = self.chunks[chunk].pop();
                    let carried = self.chunks[chunk - 1].pop();
                    if let (Some(moved), Some(carried)) = (moved, carried) {
                        self.chunks[chunk].insert(0, carried);
                        self.chunks[chunk - 1].push(moved);
                    }
                }
                let chunk = &mut self.chunks[target_chunk];
                if let Some(moved) = chunk.pop() {
                    chunk.insert(target_at, moved);
                }
            }
        }
    }

    /// Removes and returns the element at `index`.
    ///
    /// With [`RemoveBehavior::SwapToEnd`] the last element fills the hole;
    /// with [`RemoveBehavior::MoveItems`] every later element shifts down by
    /// one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove_at(&mut self, index: usize) -> T {
        if index >= self.len {
            fatal(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let last = self.len - 1;
        match self.behavior {
            RemoveBehavior::SwapToEnd => {
                self.swap(index, last);
            }
            RemoveBehavior::MoveItems => {
                let (chunk, at) = self.split(index);
                let (last_chunk, _) = self.split(last);
                let removed = self.chunks[chunk].remove(at);
                for next in chunk + 1..=last_chunk {
                    let carried = self.chunks[next].remove(0);
                    self.chunks[next - 1].push(carried);
                }
                // Put the removed value where `pop` will find it.
                self.chunks[last_chunk].push(removed);
            }
        }
        match self.pop() {
            Some(value) => value,
            None => fatal(Error::IndexOutOfRange { index, len: 0 }),
        }
    }

    /// Removes the first element equal to `item`. Returns whether one was
    /// found.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of(item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Position of the first element equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|v| v == item)
    }

    /// Returns `true` if an element equal to `item` is stored.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(item).is_some()
    }

    /// Swaps the elements at `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn swap(&mut self, a: usize, b: usize) {
        for index in [a, b] {
            if index >= self.len {
                fatal(Error::IndexOutOfRange {
                    index,
                    len: self.len,
                });
            }
        }
        let (chunk_a, at_a) = self.split(a);
        let (chunk_b, at_b) = self.split(b);
        if chunk_a == chunk_b {
            self.chunks[chunk_a].swap(at_a, at_b);
        } else {
            let (low, high) = (chunk_a.min(chunk_b), chunk_a.max(chunk_b));
            let (head, tail) = self.chunks.split_at_mut(high);
            let (low_at, high_at) = if chunk_a < chunk_b {
                (at_a, at_b)
            } else {
                (at_b, at_a)
            };
            core::mem::swap(&mut head[low][low_at], &mut tail[0][high_at]);
        }
    }

    /// Drops every element and releases every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }

    /// Iterates front to back; call `.rev()` for back to front.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.chunks.iter().flatten(),
            remaining: self.len,
        }
    }

    /// Iterates mutably front to back.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> {
        self.chunks.iter_mut().flatten()
    }
}

impl<T> Default for ChunkedVec<T> {
    fn default() -> Self {
        Self::with_chunk_size(MIN_CHUNK_SIZE, RemoveBehavior::default())
    }
}

impl<T: Debug> Debug for ChunkedVec<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Index<usize> for ChunkedVec<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        let len = self.len;
        self.get(index)
            .unwrap_or_else(|| fatal(Error::IndexOutOfRange { index, len }))
    }
}

impl<T> IndexMut<usize> for ChunkedVec<T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        self.get_mut(index)
            .unwrap_or_else(|| fatal(Error::IndexOutOfRange { index, len }))
    }
}

impl<T> Extend<T> for ChunkedVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a ChunkedVec<T> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the elements of a [`ChunkedVec`].
pub struct Iter<'a, T> {
    inner: core::iter::Flatten<core::slice::Iter<'a, Vec<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.inner.next();
        if next.is_some() {
            self.remaining -= 1;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let next = self.inner.next_back();
        if next.is_some() {
            self.remaining -= 1;
        }
        next
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use test_log::test;

    use super::*;

    fn strings(behavior: RemoveBehavior) -> ChunkedVec<String> {
        let mut v = ChunkedVec::with_chunk_size(4, behavior);
        for i in 0..16 {
            v.push(format!("{i}"));
        }
        v
    }

    #[test]
    fn push_and_index() {
        let v = strings(RemoveBehavior::SwapToEnd);
        assert_eq!(v.len(), 16);
        assert_eq!(v.chunk_count(), 4);
        assert_eq!(v.capacity(), 16);
        for i in 0..16 {
            assert_eq!(v[i], format!("{i}"));
        }
        assert_eq!(v.get_in_chunk(2, 1).map(String::as_str), Some("9"));
        assert_eq!(v.get_in_chunk(2, 4), None);
    }

    #[test]
    fn chunk_size_is_rounded() {
        let v: ChunkedVec<u8> = ChunkedVec::with_chunk_size(1, RemoveBehavior::SwapToEnd);
        assert_eq!(v.chunk_size(), 4);
        let v: ChunkedVec<u8> = ChunkedVec::with_chunk_size(5, RemoveBehavior::SwapToEnd);
        assert_eq!(v.chunk_size(), 8);
    }

    #[test]
    fn remove_at_swap_to_end() {
        let mut v = strings(RemoveBehavior::SwapToEnd);
        assert_eq!(v.remove_at(1), "1");
        assert_eq!(v.len(), 15);
        assert_eq!(v[1], "15");
        assert_eq!(v[2], "2");
    }

    #[test]
    fn remove_at_move_items() {
        let mut v = strings(RemoveBehavior::MoveItems);
        assert_eq!(v.remove_at(1), "1");
        assert_eq!(v.len(), 15);
        assert_eq!(v[1], "2");
        let expected: Vec<String> = (0..16).filter(|&i| i != 1).map(|i| format!("{i}")).collect();
        let actual: Vec<String> = v.iter().cloned().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn insert_front_swap_to_end() {
        let mut v = ChunkedVec::with_chunk_size(4, RemoveBehavior::SwapToEnd);
        for i in 0..16 {
            v.insert(0, i + 1);
        }
        let mut expected = vec![16];
        expected.extend(1..16);
        assert_eq!(v.iter().copied().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn insert_front_move_items() {
        let mut v = ChunkedVec::with_chunk_size(4, RemoveBehavior::MoveItems);
        for i in 0..16 {
            v.insert(0, i + 1);
        }
        let expected: Vec<i32> = (1..=16).rev().collect();
        assert_eq!(v.iter().copied().collect::<Vec<_>>(), expected);
        assert_eq!(v.chunk_count(), 4);
    }

    #[test]
    fn insert_middle_move_items() {
        let mut v = ChunkedVec::with_chunk_size(4, RemoveBehavior::MoveItems);
        v.extend(0..9);
        v.insert(5, 100);
        assert_eq!(
            v.iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 100, 5, 6, 7, 8]
        );
        v.insert(10, 200);
        assert_eq!(v[10], 200);
    }

    #[test]
    fn reverse_iteration() {
        let v = strings(RemoveBehavior::SwapToEnd);
        let reversed: Vec<&str> = v.iter().rev().map(String::as_str).collect();
        assert_eq!(reversed.first(), Some(&"15"));
        assert_eq!(reversed.last(), Some(&"0"));
        assert_eq!(v.iter().len(), 16);
    }

    #[test]
    fn remove_by_value_and_clear() {
        let mut v = strings(RemoveBehavior::MoveItems);
        assert!(v.remove(&String::from("7")));
        assert!(!v.remove(&String::from("7")));
        assert!(!v.contains(&String::from("7")));
        assert_eq!(v.index_of(&String::from("8")), Some(7));

        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.chunk_count(), 0);
        assert_eq!(v.iter().next(), None);
    }

    #[test]
    fn pop_releases_trailing_chunk() {
        let mut v = ChunkedVec::with_chunk_size(4, RemoveBehavior::SwapToEnd);
        v.extend(0..5);
        assert_eq!(v.chunk_count(), 2);
        assert_eq!(v.pop(), Some(4));
        assert_eq!(v.chunk_count(), 1);
    }
}
