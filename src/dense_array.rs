use alloc::alloc::alloc;
use alloc::alloc::dealloc;
use alloc::alloc::handle_alloc_error;
use alloc::alloc::realloc;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ops::DerefMut;
use core::ops::Index;
use core::ops::IndexMut;
use core::ptr;
use core::ptr::NonNull;
use core::slice;

use crate::error::Error;
use crate::error::fatal;

/// Smallest capacity allocated by the first growth of an empty array.
const MIN_CAPACITY: usize = 4;

/// A growable, contiguous, gap-free buffer.
///
/// Elements `[0, len)` are always live. Capacity doubles (starting at 4) when
/// an append hits a full buffer, and removal comes in two flavours:
/// [`swap_remove`](Self::swap_remove) is O(1) and moves the last element into
/// the hole, [`remove`](Self::remove) is O(n) and keeps relative order.
///
/// `DenseArray` dereferences to `[T]`, so the raw contiguous storage is
/// available for bulk access through [`as_ptr`](Self::as_ptr) and
/// [`as_slice`](Self::as_slice).
///
/// ## Example
///
/// ```rust
/// use dense_hash::DenseArray;
///
/// let mut array = DenseArray::new();
/// assert_eq!(array.push("a"), 0);
/// assert_eq!(array.push("b"), 1);
/// assert_eq!(array.push("c"), 2);
///
/// assert_eq!(array.swap_remove(0), "a");
/// assert_eq!(array.as_slice(), &["c", "b"]);
/// ```
pub struct DenseArray<T> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: `DenseArray` owns its elements exactly like `Vec<T>` does.
unsafe impl<T: Send> Send for DenseArray<T> {}
// SAFETY: Shared access only hands out `&T`.
unsafe impl<T: Sync> Sync for DenseArray<T> {}

impl<T> DenseArray<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Creates an empty array without allocating.
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Creates an empty array able to hold `capacity` elements before
    /// reallocating.
    ///
    /// # Panics
    ///
    /// Panics if the allocation size overflows.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut array = Self::new();
        array.reserve(capacity);
        array
    }

    /// Returns the number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements the array can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Returns a raw pointer to the first element.
    ///
    /// The pointer is valid for `len()` reads until the next operation that
    /// may reallocate or move elements.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a raw mutable pointer to the first element.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Views the live elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialized elements (or dangling
        // and well-aligned when `len == 0` or `T` is zero-sized).
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Views the live elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: See `as_slice`; `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn try_get(&self, index: usize) -> Result<&T, Error> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Returns a mutable reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn try_get_mut(&mut self, index: usize) -> Result<&mut T, Error> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Overwrites the element at `index`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`; the value is
    /// dropped in that case.
    pub fn try_set(&mut self, index: usize, value: T) -> Result<T, Error> {
        let slot = self.try_get_mut(index)?;
        Ok(mem::replace(slot, value))
    }

    /// Ensures room for at least `additional` more elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the new capacity does not fit
    /// in the address space. The array is unchanged in that case.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        if self.cap - self.len >= additional {
            return Ok(());
        }
        let new_cap = self.grown_capacity(additional)?;
        self.grow_to(new_cap)
    }

    /// Ensures room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            fatal(err);
        }
    }

    /// Appends `value` and returns its position.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows.
    #[inline]
    pub fn push(&mut self, value: T) -> usize {
        if self.len == self.cap {
            self.reserve(1);
        }
        let index = self.len;
        // SAFETY: `index < cap` after the reserve above, and the slot is
        // outside the live range so nothing is overwritten.
        unsafe { self.ptr.as_ptr().add(index).write(value) };
        self.len += 1;
        index
    }

    /// Removes and returns the last element.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: The slot at the old `len - 1` was live and is now outside
        // the live range, so it is read exactly once.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Removes the element at `index` by moving the last element into its
    /// place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn try_swap_remove(&mut self, index: usize) -> Result<T, Error> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let last = self.len - 1;
        // SAFETY: Both `index` and `last` are live positions. The removed
        // value is read out before the last element is moved over it, and the
        // length shrinks so the old last slot is no longer considered live.
        unsafe {
            let base = self.ptr.as_ptr();
            let value = base.add(index).read();
            if index != last {
                ptr::copy_nonoverlapping(base.add(last), base.add(index), 1);
            }
            self.len = last;
            Ok(value)
        }
    }

    /// Removes the element at `index` by moving the last element into its
    /// place.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[inline]
    pub fn swap_remove(&mut self, index: usize) -> T {
        self.try_swap_remove(index).unwrap_or_else(|err| fatal(err))
    }

    /// Inserts `value` at `index`, shifting every later element up by one.
    ///
    /// When the buffer is full the new allocation receives the elements on
    /// both sides of the gap directly, so nothing is copied twice.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the new capacity overflows.
    pub fn insert(&mut self, index: usize, value: T) {
        if index > self.len {
            fatal(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }

        if self.len == self.cap {
            let new_cap = self.grown_capacity(1).unwrap_or_else(|err| fatal(err));
            let new_layout = Self::layout(new_cap).unwrap_or_else(|err| fatal(err));
            // SAFETY: `new_layout` has non-zero size since `T` is not a ZST
            // here (a ZST buffer never reports `len == cap` short of
            // overflow, which `grown_capacity` rejected).
            let raw = unsafe { alloc(new_layout) } as *mut T;
            let Some(new_ptr) = NonNull::new(raw) else {
                handle_alloc_error(new_layout)
            };

            // SAFETY: The new buffer holds `new_cap > len` elements. The
            // prefix `[0, index)` and suffix `[index, len)` are moved into
            // disjoint ranges around the gap, then the old buffer is released
            // without dropping its (moved-out) contents.
            unsafe {
                let old = self.ptr.as_ptr();
                let new = new_ptr.as_ptr();
                ptr::copy_nonoverlapping(old, new, index);
                new.add(index).write(value);
                ptr::copy_nonoverlapping(old.add(index), new.add(index + 1), self.len - index);
                self.release();
            }
            self.ptr = new_ptr;
            self.cap = new_cap;
        } else {
            // SAFETY: `len < cap`, so shifting `[index, len)` up by one stays
            // in bounds; `ptr::copy` handles the overlap.
            unsafe {
                let at = self.ptr.as_ptr().add(index);
                ptr::copy(at, at.add(1), self.len - index);
                at.write(value);
            }
        }
        self.len += 1;
    }

    /// Removes the element at `index`, shifting every later element down by
    /// one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        if index >= self.len {
            fatal(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        // SAFETY: `index` is live. It is read out, then the tail closes the
        // hole and the length shrinks by one.
        unsafe {
            let at = self.ptr.as_ptr().add(index);
            let value = at.read();
            ptr::copy(at.add(1), at, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Drops every element while keeping the allocation.
    pub fn clear(&mut self) {
        let len = self.len;
        // Length first, so a panicking destructor cannot cause a double drop.
        self.len = 0;
        // SAFETY: `[0, len)` were live and are no longer reachable.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), len));
        }
    }

    fn layout(capacity: usize) -> Result<Layout, Error> {
        Layout::array::<T>(capacity).map_err(|_| Error::CapacityOverflow)
    }

    fn grown_capacity(&self, additional: usize) -> Result<usize, Error> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow)?;
        Ok(required.max(self.cap.saturating_mul(2)).max(MIN_CAPACITY))
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<(), Error> {
        debug_assert!(!Self::IS_ZST);
        debug_assert!(new_cap > self.cap);

        let new_layout = Self::layout(new_cap)?;
        let raw = if self.cap == 0 {
            // SAFETY: `new_layout` is non-zero sized since `new_cap >= 1` and
            // `T` is not a ZST.
            unsafe { alloc(new_layout) }
        } else {
            // SAFETY: `ptr` was allocated with `current_layout()`, and the new
            // size is non-zero and was validated by `Layout::array`.
            unsafe {
                realloc(
                    self.ptr.as_ptr() as *mut u8,
                    self.current_layout(),
                    new_layout.size(),
                )
            }
        };
        let Some(new_ptr) = NonNull::new(raw as *mut T) else {
            handle_alloc_error(new_layout)
        };
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    fn current_layout(&self) -> Layout {
        // SAFETY: This exact layout was validated by `Layout::array` when the
        // buffer was allocated.
        unsafe {
            Layout::from_size_align_unchecked(mem::size_of::<T>() * self.cap, mem::align_of::<T>())
        }
    }

    /// Frees the buffer without touching its elements.
    ///
    /// # Safety
    ///
    /// The caller must have moved out or dropped every live element and must
    /// replace `ptr`/`cap` before the array is used again.
    unsafe fn release(&mut self) {
        if !Self::IS_ZST && self.cap != 0 {
            // SAFETY: `ptr` was allocated with `current_layout()`.
            unsafe { dealloc(self.ptr.as_ptr() as *mut u8, self.current_layout()) };
        }
    }
}

impl<T> Drop for DenseArray<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: Every element was dropped by `clear`, and the array is never
        // used again.
        unsafe { self.release() };
    }
}

impl<T> Default for DenseArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for DenseArray<T> {
    fn clone(&self) -> Self {
        let mut array = Self::with_capacity(self.len);
        for value in self.iter() {
            array.push(value.clone());
        }
        array
    }
}

impl<T: Debug> Debug for DenseArray<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for DenseArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for DenseArray<T> {}

impl<T> Deref for DenseArray<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for DenseArray<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Index<usize> for DenseArray<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        self.try_get(index).unwrap_or_else(|err| fatal(err))
    }
}

impl<T> IndexMut<usize> for DenseArray<T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.try_get_mut(index).unwrap_or_else(|err| fatal(err))
    }
}

impl<T> FromIterator<T> for DenseArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = Self::new();
        array.extend(iter);
        array
    }
}

impl<T> Extend<T> for DenseArray<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a DenseArray<T> {
    type IntoIter = slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut DenseArray<T> {
    type IntoIter = slice::IterMut<'a, T>;
    type Item = &'a mut T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> IntoIterator for DenseArray<T> {
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        let array = ManuallyDrop::new(self);
        IntoIter {
            buf: array.ptr,
            cap: array.cap,
            start: 0,
            end: array.len,
            _marker: PhantomData,
        }
    }
}

/// An owning iterator over the elements of a [`DenseArray`], in position
/// order.
pub struct IntoIter<T> {
    buf: NonNull<T>,
    cap: usize,
    start: usize,
    end: usize,
    _marker: PhantomData<T>,
}

// SAFETY: Same ownership model as `DenseArray`.
unsafe impl<T: Send> Send for IntoIter<T> {}
// SAFETY: Same ownership model as `DenseArray`.
unsafe impl<T: Sync> Sync for IntoIter<T> {}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        // SAFETY: `[start, end)` are live and each is read exactly once.
        let value = unsafe { self.buf.as_ptr().add(self.start).read() };
        self.start += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.start;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        // SAFETY: See `next`.
        Some(unsafe { self.buf.as_ptr().add(self.end).read() })
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        // Hand the remaining elements back to an array so it drops them and
        // frees the buffer.
        let remaining = self.end - self.start;
        // SAFETY: `[start, end)` are the only live elements left; moving them
        // to the front makes them a valid `DenseArray` prefix.
        unsafe {
            let base = self.buf.as_ptr();
            ptr::copy(base.add(self.start), base, remaining);
        }
        drop(DenseArray {
            ptr: self.buf,
            cap: self.cap,
            len: remaining,
            _marker: PhantomData,
        });
    }
}
