use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::Chain;
use core::iter::FusedIterator;

use crate::ankerl::AnkerlIndex;
use crate::error::Error;
use crate::hash_map;
use crate::hash_map::HashMap;
use crate::hasher::DefaultHashBuilder;
#[cfg(feature = "stats")]
use crate::search::IndexStats;
use crate::search::HashIndex;

/// A hash set storing its values densely, backed by a [`HashMap`] with `()`
/// values.
///
/// Values are packed at the front of one array, in insertion order until the
/// first removal. [`as_slice`](Self::as_slice) exposes that array directly.
///
/// # Examples
///
/// ```rust
/// use dense_hash::HashSet;
///
/// let mut set = HashSet::new();
/// for i in 0..100 {
///     set.insert(i);
/// }
/// assert!(!set.try_add(1));
/// assert!(set.remove(&1));
/// assert!(!set.contains(&1));
/// assert!(set.contains(&50));
/// ```
#[derive(Clone)]
pub struct HashSet<T, I = AnkerlIndex, S = DefaultHashBuilder> {
    map: HashMap<T, (), I, S>,
}

impl<T, I, S> PartialEq for HashSet<T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<T, I, S> Eq for HashSet<T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
}

impl<T: Debug, I, S> Debug for HashSet<T, I, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T> HashSet<T, AnkerlIndex, DefaultHashBuilder> {
    /// Creates an empty set with the Robin-Hood index and the default mixer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self
    where
        T: Hash + Eq,
    {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }
}

impl<T, I, S> Default for HashSet<T, I, S>
where
    I: HashIndex,
    S: Default,
{
    fn default() -> Self {
        Self {
            map: HashMap::default(),
        }
    }
}

impl<T, I, S> HashSet<T, I, S> {
    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the hash mixer of the set.
    pub fn hasher(&self) -> &S {
        self.map.hasher()
    }

    /// The values in dense storage order.
    pub fn as_slice(&self) -> &[T] {
        self.map.keys_slice()
    }

    /// Returns an iterator over the values in dense storage order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.map.keys(),
        }
    }
}

impl<T, I, S> HashSet<T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    /// Creates an empty set using `hash_builder` to mix values.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            map: HashMap::with_hasher(hash_builder),
        }
    }

    /// Creates an empty set with room for `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest index the set can build.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Number of values the set holds before its index has to grow.
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    /// Reserves room for at least `additional` more values.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    /// Reserves room for at least `additional` more values, reporting
    /// failure instead of panicking.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        self.map.try_reserve(additional)
    }

    /// Removes every value, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Adds `value` unless an equal value is already stored.
    ///
    /// Returns `true` if the value was added.
    #[doc(alias = "try_add")]
    pub fn insert(&mut self, value: T) -> bool {
        self.map.try_add(value, ())
    }

    /// Same as [`insert`](Self::insert).
    pub fn try_add(&mut self, value: T) -> bool {
        self.insert(value)
    }

    /// Returns `true` if the set holds `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(value)
    }

    /// Returns the stored value equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_key_value(value).map(|(stored, _)| stored)
    }

    /// Removes `value`, returning `true` if it was present.
    ///
    /// The last value in dense storage moves into the freed position.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(value)
    }

    /// Removes and returns the stored value equal to `value`.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove_entry(value).map(|(stored, ())| stored)
    }

    /// Keeps only the values for which `f` returns `true`.
    ///
    /// ```rust
    /// use dense_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = (1..=6).collect();
    /// set.retain(|&x| x % 3 == 0);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.contains(&3) && set.contains(&6));
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.map.retain(|value, ()| f(value));
    }

    /// Removes every value, yielding them from the back of dense storage.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain {
            inner: self.map.drain(),
        }
    }

    /// Returns `true` if `self` and `other` share no value.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|v| !large.contains(v))
    }

    /// Returns `true` if every value of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|v| other.contains(v))
    }

    /// Returns `true` if every value of `other` is in `self`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Values in `self` or `other`, each yielded once.
    ///
    /// ```rust
    /// use dense_hash::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let b: HashSet<i32> = [3, 4].into_iter().collect();
    /// let mut union: Vec<_> = a.union(&b).copied().collect();
    /// union.sort();
    /// assert_eq!(union, [1, 2, 3, 4]);
    /// ```
    pub fn union<'a>(&'a self, other: &'a Self) -> Union<'a, T, I, S> {
        Union {
            inner: self.iter().chain(other.difference(self)),
        }
    }

    /// Values in both `self` and `other`.
    pub fn intersection<'a>(&'a self, other: &'a Self) -> Intersection<'a, T, I, S> {
        let (iter, other) = if self.len() <= other.len() {
            (self.iter(), other)
        } else {
            (other.iter(), self)
        };
        Intersection { iter, other }
    }

    /// Values in `self` but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Self) -> Difference<'a, T, I, S> {
        Difference {
            iter: self.iter(),
            other,
        }
    }

    /// Values in exactly one of `self` and `other`.
    pub fn symmetric_difference<'a>(&'a self, other: &'a Self) -> SymmetricDifference<'a, T, I, S> {
        SymmetricDifference {
            inner: self.difference(other).chain(other.difference(self)),
        }
    }

    /// Snapshot of the index layout.
    #[cfg(feature = "stats")]
    pub fn index_stats(&self) -> IndexStats {
        self.map.index_stats()
    }
}

impl<T, I, S> FromIterator<T> for HashSet<T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher + Default,
{
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        Self {
            map: iter.into_iter().map(|value| (value, ())).collect(),
        }
    }
}

impl<T, I, S> Extend<T> for HashSet<T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    fn extend<It: IntoIterator<Item = T>>(&mut self, iter: It) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.insert(value);
        }
    }
}

impl<'a, T, I, S> IntoIterator for &'a HashSet<T, I, S> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, I, S> IntoIterator for HashSet<T, I, S> {
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.map.into_iter(),
        }
    }
}

/// An iterator over the values of a `HashSet` in dense storage order.
#[derive(Clone)]
pub struct Iter<'a, T> {
    inner: hash_map::Keys<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// A draining iterator over the values of a `HashSet`.
pub struct Drain<'a, T> {
    inner: hash_map::Drain<'a, T, ()>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, ())| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An owning iterator over the values of a `HashSet`.
pub struct IntoIter<T> {
    inner: hash_map::IntoIter<T, ()>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, ())| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the union of two sets.
pub struct Union<'a, T, I, S> {
    inner: Chain<Iter<'a, T>, Difference<'a, T, I, S>>,
}

impl<'a, T, I, S> Iterator for Union<'a, T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// An iterator over the intersection of two sets.
pub struct Intersection<'a, T, I, S> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, I, S>,
}

impl<'a, T, I, S> Iterator for Intersection<'a, T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let other = self.other;
        self.iter.find(|v| other.contains(*v))
    }
}

/// An iterator over the difference of two sets.
pub struct Difference<'a, T, I, S> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, I, S>,
}

impl<'a, T, I, S> Iterator for Difference<'a, T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let other = self.other;
        self.iter.find(|v| !other.contains(*v))
    }
}

/// An iterator over the symmetric difference of two sets.
pub struct SymmetricDifference<'a, T, I, S> {
    inner: Chain<Difference<'a, T, I, S>, Difference<'a, T, I, S>>,
}

impl<'a, T, I, S> Iterator for SymmetricDifference<'a, T, I, S>
where
    T: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;
    use test_log::test;

    use super::*;
    use crate::chained::ChainedIndex;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            Self {
                k1: OsRng.try_next_u64().unwrap_or(0),
                k2: OsRng.try_next_u64().unwrap_or(0),
            }
        }
    }

    fn sip_set<T, I: HashIndex>() -> HashSet<T, I, SipHashBuilder> {
        HashSet::default()
    }

    fn set_of<I: HashIndex>(values: &[i32]) -> HashSet<i32, I, SipHashBuilder> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_new_and_with_hasher() {
        let set: HashSet<i32> = HashSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);

        let set2: HashSet<i32, ChainedIndex, _> = HashSet::with_hasher(SipHashBuilder::default());
        assert!(set2.is_empty());
    }

    #[test]
    fn test_with_capacity() {
        let set: HashSet<i32> = HashSet::with_capacity(100);
        assert!(set.capacity() >= 100);

        let set2: HashSet<i32, ChainedIndex, _> =
            HashSet::with_capacity_and_hasher(200, SipHashBuilder::default());
        assert!(set2.capacity() >= 200);
    }

    fn insert_and_contains<I: HashIndex>() {
        let mut set = sip_set::<i32, I>();

        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(!set.insert(1));
        assert!(!set.try_add(2));

        assert_eq!(set.len(), 2);
        assert!(set.contains(&1));
        assert!(set.contains(&2));
        assert!(!set.contains(&3));
    }

    #[test]
    fn test_insert_and_contains() {
        insert_and_contains::<AnkerlIndex>();
        insert_and_contains::<ChainedIndex>();
    }

    fn scenario<I: HashIndex>() {
        let mut set = sip_set::<i32, I>();
        for i in 0..100 {
            assert!(set.try_add(i));
        }
        assert!(!set.try_add(1));
        assert!(set.remove(&1));
        assert!(!set.contains(&1));
        assert!(set.contains(&50));
        assert_eq!(set.len(), 99);
        assert_eq!(set.as_slice()[1], 99);
    }

    #[test]
    fn test_scenario_hundred_integers() {
        scenario::<AnkerlIndex>();
        scenario::<ChainedIndex>();
    }

    #[test]
    fn test_remove_take_get() {
        let mut set = sip_set::<String, ChainedIndex>();
        set.insert("hello".to_string());
        set.insert("world".to_string());

        assert_eq!(set.get("hello"), Some(&"hello".to_string()));
        assert_eq!(set.get("nope"), None);

        assert_eq!(set.take("hello"), Some("hello".to_string()));
        assert_eq!(set.take("hello"), None);
        assert!(set.remove("world"));
        assert!(!set.remove("world"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut set = sip_set::<i32, AnkerlIndex>();
        set.extend(0..10);
        let capacity = set.capacity();

        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(&5));
        assert_eq!(set.capacity(), capacity);

        assert!(set.insert(5));
        assert!(set.contains(&5));
    }

    #[test]
    fn test_iter_and_into_iter() {
        let set = set_of::<AnkerlIndex>(&[3, 1, 2]);
        let values: Vec<i32> = set.iter().copied().collect();
        assert_eq!(values, [3, 1, 2]);
        assert_eq!(set.iter().len(), 3);

        let borrowed: Vec<&i32> = (&set).into_iter().collect();
        assert_eq!(borrowed.len(), 3);

        let owned: Vec<i32> = set.into_iter().collect();
        assert_eq!(owned, [3, 1, 2]);
    }

    #[test]
    fn test_drain() {
        let mut set = set_of::<ChainedIndex>(&[1, 2, 3]);
        let drained: Vec<i32> = set.drain().collect();
        assert_eq!(drained, [3, 2, 1]);
        assert!(set.is_empty());
        assert!(!set.contains(&1));
    }

    #[test]
    fn forgotten_drain_keeps_set_consistent() {
        let mut set = set_of::<AnkerlIndex>(&[1, 2]);
        core::mem::forget(set.drain());
        assert!(set.is_empty());
        assert!(set.insert(1));
        assert!(!set.insert(1));
        assert_eq!(set.len(), 1);
    }

    fn retain_evens<I: HashIndex>() {
        let mut set = sip_set::<i32, I>();
        set.extend(0..200);
        set.retain(|v| v % 2 == 0);
        assert_eq!(set.len(), 100);
        assert!((0..200).all(|v| set.contains(&v) == (v % 2 == 0)));
    }

    #[test]
    fn test_retain() {
        retain_evens::<AnkerlIndex>();
        retain_evens::<ChainedIndex>();
    }

    #[test]
    fn test_insert_remove_cycle() {
        let mut set = sip_set::<u64, ChainedIndex>();
        for round in 0..5u64 {
            let base = round * 1000;
            for i in 0..500 {
                assert!(set.insert(base + i));
            }
            for i in 0..500 {
                assert!(set.remove(&(base + i)));
            }
            assert!(set.is_empty(), "round {round}");
        }
    }

    #[test]
    fn test_eq_and_debug() {
        let a = set_of::<AnkerlIndex>(&[1, 2, 3]);
        let b = set_of::<AnkerlIndex>(&[3, 2, 1]);
        assert_eq!(a, b);
        assert_ne!(a, set_of::<AnkerlIndex>(&[1, 2]));

        assert_eq!(format!("{:?}", set_of::<AnkerlIndex>(&[7])), "{7}");
    }

    #[test]
    fn test_is_disjoint() {
        let a = set_of::<AnkerlIndex>(&[1, 2, 3]);
        let mut b = set_of::<AnkerlIndex>(&[4, 5, 6]);

        assert!(a.is_disjoint(&b));
        assert!(b.is_disjoint(&a));

        b.insert(2);
        assert!(!a.is_disjoint(&b));
        assert!(!b.is_disjoint(&a));
    }

    #[test]
    fn test_is_subset_and_superset() {
        let a = set_of::<ChainedIndex>(&[1, 2]);
        let b = set_of::<ChainedIndex>(&[1, 2, 3]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(a.is_subset(&a));

        assert!(b.is_superset(&a));
        assert!(!a.is_superset(&b));
        assert!(b.is_superset(&b));
    }

    fn sorted<'a>(iter: impl Iterator<Item = &'a i32>) -> Vec<i32> {
        let mut values: Vec<i32> = iter.copied().collect();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_union() {
        let a = set_of::<AnkerlIndex>(&[1, 2, 3]);
        let b = set_of::<AnkerlIndex>(&[3, 4, 5]);
        assert_eq!(sorted(a.union(&b)), [1, 2, 3, 4, 5]);
        assert_eq!(sorted(b.union(&a)), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_intersection() {
        let a = set_of::<ChainedIndex>(&[1, 2, 3]);
        let b = set_of::<ChainedIndex>(&[2, 3, 4, 5]);
        assert_eq!(sorted(a.intersection(&b)), [2, 3]);
        assert_eq!(sorted(b.intersection(&a)), [2, 3]);
    }

    #[test]
    fn test_difference() {
        let a = set_of::<AnkerlIndex>(&[1, 2, 3]);
        let b = set_of::<AnkerlIndex>(&[2, 3, 4]);
        assert_eq!(sorted(a.difference(&b)), [1]);
        assert_eq!(sorted(b.difference(&a)), [4]);
    }

    #[test]
    fn test_symmetric_difference() {
        let a = set_of::<ChainedIndex>(&[1, 2, 3]);
        let b = set_of::<ChainedIndex>(&[2, 3, 4]);
        assert_eq!(sorted(a.symmetric_difference(&b)), [1, 4]);
    }
}
