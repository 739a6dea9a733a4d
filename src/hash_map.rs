use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::iter::Zip;
use core::mem;
use core::ops::Index;
use core::slice;

use crate::ankerl::AnkerlIndex;
use crate::dense_array;
use crate::dense_array::DenseArray;
use crate::error::Error;
use crate::error::fatal;
use crate::hasher::DefaultHashBuilder;
#[cfg(feature = "stats")]
use crate::search::IndexStats;
use crate::search::EmplaceControl;
use crate::search::HashIndex;
use crate::search::RemoveControl;
use crate::search::SearchControl;

/// A hash map storing its keys and values in two parallel dense arrays.
///
/// `HashMap<K, V, I, S>` keeps every entry packed at the front of a
/// [`DenseArray`], so iteration is a straight walk over contiguous memory and
/// [`keys_slice`](Self::keys_slice)/[`values_slice`](Self::values_slice)
/// expose the storage directly. The hash index `I` ([`AnkerlIndex`] or
/// [`ChainedIndex`](crate::ChainedIndex)) maps hashes produced by the mixer
/// `S` to positions in those arrays.
///
/// Removal swaps the last entry into the hole, so the iteration order is the
/// insertion order only until the first removal.
///
/// # Performance Characteristics
///
/// - **Memory**: the keys and values themselves, plus 8 bytes per Robin-Hood
///   bucket (80% max load) or 12 bytes per chained element.
/// - **Iteration**: contiguous, independent of the index.
///
/// # Examples
///
/// ```rust
/// use dense_hash::HashMap;
///
/// let mut map = HashMap::new();
/// assert!(map.try_add("apple", 3));
/// assert!(!map.try_add("apple", 5));
/// assert_eq!(map.get("apple"), Some(&3));
///
/// map.add_or_update("apple", |n| *n += 1, || 0);
/// assert_eq!(map["apple"], 4);
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, I = AnkerlIndex, S = DefaultHashBuilder> {
    keys: DenseArray<K>,
    values: DenseArray<V>,
    index: I,
    hash_builder: S,
}

/// Finds the position of the first key satisfying `matches`.
struct Lookup<'a, K, S, P> {
    keys: &'a DenseArray<K>,
    hash_builder: &'a S,
    matches: P,
}

impl<K, S, P> SearchControl for Lookup<'_, K, S, P>
where
    K: Hash,
    S: BuildHasher,
    P: Fn(&K) -> bool,
{
    type Context = u32;
    type Output = Option<usize>;

    fn size(&self) -> u32 {
        self.keys.len() as u32
    }

    fn at(&self, index: u32) -> u32 {
        index
    }

    fn eq(&self, context: u32) -> bool {
        (self.matches)(&self.keys[context as usize])
    }

    fn hash(&self, context: u32) -> u64 {
        self.hash_builder.hash_one(&self.keys[context as usize])
    }

    fn get(&mut self, context: u32) -> Option<usize> {
        Some(context as usize)
    }

    fn none(&mut self) -> Option<usize> {
        None
    }
}

/// Finds `pending`'s key, appending it with a value from its factory when
/// absent. The factory is handed back untouched if the key exists.
struct Emplace<'a, K, V, S, F> {
    keys: &'a mut DenseArray<K>,
    values: &'a mut DenseArray<V>,
    hash_builder: &'a S,
    pending: Option<(K, F)>,
}

impl<K, V, S, F> SearchControl for Emplace<'_, K, V, S, F>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Context = u32;
    type Output = usize;

    fn size(&self) -> u32 {
        self.keys.len() as u32
    }

    fn at(&self, index: u32) -> u32 {
        index
    }

    fn eq(&self, context: u32) -> bool {
        matches!(&self.pending, Some((key, _)) if self.keys[context as usize] == *key)
    }

    fn hash(&self, context: u32) -> u64 {
        self.hash_builder.hash_one(&self.keys[context as usize])
    }

    fn get(&mut self, context: u32) -> usize {
        context as usize
    }

    /// The position the key would be appended at.
    fn none(&mut self) -> usize {
        self.keys.len()
    }
}

impl<K, V, S, F> EmplaceControl for Emplace<'_, K, V, S, F>
where
    K: Hash + Eq,
    S: BuildHasher,
    F: FnOnce() -> V,
{
    fn add(&mut self) -> u32 {
        if let Some((key, make)) = self.pending.take() {
            let value = make();
            self.keys.push(key);
            self.values.push(value);
        }
        self.keys.len() as u32 - 1
    }
}

/// Swap-removes the first entry satisfying `matches`, keeping it in
/// `removed`.
struct Remove<'a, K, V, S, P> {
    keys: &'a mut DenseArray<K>,
    values: &'a mut DenseArray<V>,
    hash_builder: &'a S,
    matches: P,
    removed: Option<(K, V)>,
}

impl<K, V, S, P> SearchControl for Remove<'_, K, V, S, P>
where
    K: Hash,
    S: BuildHasher,
    P: Fn(usize, &K) -> bool,
{
    type Context = u32;
    type Output = Option<usize>;

    fn size(&self) -> u32 {
        self.keys.len() as u32
    }

    fn at(&self, index: u32) -> u32 {
        index
    }

    fn eq(&self, context: u32) -> bool {
        (self.matches)(context as usize, &self.keys[context as usize])
    }

    fn hash(&self, context: u32) -> u64 {
        self.hash_builder.hash_one(&self.keys[context as usize])
    }

    fn get(&mut self, context: u32) -> Option<usize> {
        Some(context as usize)
    }

    fn none(&mut self) -> Option<usize> {
        None
    }
}

impl<K, V, S, P> RemoveControl for Remove<'_, K, V, S, P>
where
    K: Hash,
    S: BuildHasher,
    P: Fn(usize, &K) -> bool,
{
    fn remove_swap_last(&mut self, _last: u32, index: u32) -> Option<usize> {
        let index = index as usize;
        self.removed = Some((self.keys.swap_remove(index), self.values.swap_remove(index)));
        Some(index)
    }

    fn remove_last(&mut self) -> Option<usize> {
        self.removed = self.keys.pop().zip(self.values.pop());
        self.removed.as_ref().map(|_| self.keys.len())
    }
}

impl<K, V, I, S> Debug for HashMap<K, V, I, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.keys.iter().zip(self.values.iter()))
            .finish()
    }
}

impl<K, V> HashMap<K, V, AnkerlIndex, DefaultHashBuilder> {
    /// Creates an empty map with the Robin-Hood index and the default mixer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest index the map can build.
    pub fn with_capacity(capacity: usize) -> Self
    where
        K: Hash + Eq,
    {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, I, S> Default for HashMap<K, V, I, S>
where
    I: HashIndex,
    S: Default,
{
    fn default() -> Self {
        Self {
            keys: DenseArray::new(),
            values: DenseArray::new(),
            index: I::default(),
            hash_builder: S::default(),
        }
    }
}

impl<K, V, I, S> HashMap<K, V, I, S> {
    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the hash mixer of the map.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// The keys in dense storage order.
    ///
    /// Entry `i` of this slice pairs with entry `i` of
    /// [`values_slice`](Self::values_slice).
    pub fn keys_slice(&self) -> &[K] {
        self.keys.as_slice()
    }

    /// The values in dense storage order.
    pub fn values_slice(&self) -> &[V] {
        self.values.as_slice()
    }

    /// The values in dense storage order, mutably. Keys stay read-only.
    pub fn values_slice_mut(&mut self) -> &mut [V] {
        self.values.as_mut_slice()
    }

    /// Returns an iterator over the entries in dense storage order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let pairs: Vec<_> = map.iter().collect();
    /// assert_eq!(pairs, [(&1, &"a"), (&2, &"b")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.keys.iter().zip(self.values.iter()),
        }
    }

    /// Returns an iterator over the entries with mutable access to values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.keys.iter().zip(self.values.iter_mut()),
        }
    }

    /// Returns an iterator over the keys in dense storage order.
    pub fn keys(&self) -> Keys<'_, K> {
        Keys {
            inner: self.keys.iter(),
        }
    }

    /// Returns an iterator over the values in dense storage order.
    pub fn values(&self) -> Values<'_, V> {
        Values {
            inner: self.values.iter(),
        }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, V> {
        ValuesMut {
            inner: self.values.iter_mut(),
        }
    }
}

impl<K, V, I, S> HashMap<K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    /// Creates an empty map using `hash_builder` to mix keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::ChainedIndex;
    /// use dense_hash::HashMap;
    /// use dense_hash::hasher::RapidState;
    ///
    /// let mut map: HashMap<u64, &str, ChainedIndex, _> = HashMap::with_hasher(RapidState::new());
    /// map.insert(7, "seven");
    /// assert!(map.contains_key(&7));
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            keys: DenseArray::new(),
            values: DenseArray::new(),
            index: I::default(),
            hash_builder,
        }
    }

    /// Creates an empty map with room for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the largest index the map can build.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let mut map = Self::with_hasher(hash_builder);
        map.reserve(capacity);
        map
    }

    /// Number of entries the map holds before its index has to grow.
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// Reserves room for at least `additional` more entries.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow that
    /// far.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            fatal(err);
        }
    }

    /// Reserves room for at least `additional` more entries, reporting
    /// failure instead of panicking.
    ///
    /// ```rust
    /// use dense_hash::Error;
    /// use dense_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, u32> = HashMap::new();
    /// assert!(map.try_reserve(100).is_ok());
    /// assert_eq!(map.try_reserve(usize::MAX), Err(Error::CapacityOverflow));
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), Error> {
        let ctrl = Lookup {
            keys: &self.keys,
            hash_builder: &self.hash_builder,
            matches: |_: &K| false,
        };
        self.index.reserve(&ctrl, additional)?;
        self.keys.try_reserve(additional)?;
        self.values.try_reserve(additional)
    }

    /// Removes every entry, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.index.clear();
        self.keys.clear();
        self.values.clear();
    }

    fn find_index<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.find_hashed(hash, |k| Q::eq(key, k.borrow()))
    }

    fn find_hashed(&self, hash: u64, matches: impl Fn(&K) -> bool) -> Option<usize> {
        let mut ctrl = Lookup {
            keys: &self.keys,
            hash_builder: &self.hash_builder,
            matches,
        };
        self.index
            .try_find(&mut ctrl, hash)
            .unwrap_or_else(|err| fatal(err))
    }

    /// Finds or appends `key`. Returns its position and, when the key was
    /// already present, the unused key and factory.
    fn emplace_hashed<F>(&mut self, hash: u64, key: K, make: F) -> (usize, Option<(K, F)>)
    where
        F: FnOnce() -> V,
    {
        let mut ctrl = Emplace {
            keys: &mut self.keys,
            values: &mut self.values,
            hash_builder: &self.hash_builder,
            pending: Some((key, make)),
        };
        match self.index.try_emplace(&mut ctrl, hash) {
            Ok((index, _)) => (index, ctrl.pending),
            Err(err) => fatal(err),
        }
    }

    fn emplace<F>(&mut self, key: K, make: F) -> (usize, Option<(K, F)>)
    where
        F: FnOnce() -> V,
    {
        let hash = self.hash_builder.hash_one(&key);
        self.emplace_hashed(hash, key, make)
    }

    fn remove_where(&mut self, hash: u64, matches: impl Fn(usize, &K) -> bool) -> Option<(K, V)> {
        let mut ctrl = Remove {
            keys: &mut self.keys,
            values: &mut self.values,
            hash_builder: &self.hash_builder,
            matches,
            removed: None,
        };
        if let Err(err) = self.index.remove(&mut ctrl, hash) {
            fatal(err);
        }
        ctrl.removed
    }

    /// Adds `key` with `value` unless the key is already present.
    ///
    /// Returns `true` if the entry was added. An existing entry is left
    /// untouched and `value` is dropped.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// assert!(map.try_add(1, "first"));
    /// assert!(!map.try_add(1, "second"));
    /// assert_eq!(map[&1], "first");
    /// ```
    pub fn try_add(&mut self, key: K, value: V) -> bool {
        self.try_add_with(key, || value)
    }

    /// Adds `key` with a value computed by `make` unless the key is already
    /// present. `make` is only called when the entry is added.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    pub fn try_add_with(&mut self, key: K, make: impl FnOnce() -> V) -> bool {
        self.emplace(key, make).1.is_none()
    }

    /// Adds `key` with `value`, overwriting the value of an existing entry.
    ///
    /// Returns `true` if the entry is new and `false` if a value was
    /// replaced.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// assert!(map.add_or_replace("k", 1));
    /// assert!(!map.add_or_replace("k", 2));
    /// assert_eq!(map["k"], 2);
    /// ```
    pub fn add_or_replace(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_none()
    }

    /// Inserts a key-value pair, returning the previous value of the key.
    ///
    /// The stored key is kept when the entry already exists.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.emplace(key, || value) {
            (_, None) => None,
            (index, Some((_, make))) => Some(mem::replace(&mut self.values[index], make())),
        }
    }

    /// Returns the value of `key`, adding one computed by `make` first if
    /// the key is absent. `make` is called at most once.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map: HashMap<&str, Vec<u32>> = HashMap::new();
    /// map.get_or_add("evens", Vec::new).push(2);
    /// map.get_or_add("evens", Vec::new).push(4);
    /// assert_eq!(map["evens"], [2, 4]);
    /// ```
    pub fn get_or_add(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let (index, _) = self.emplace(key, make);
        &mut self.values[index]
    }

    /// Updates the value of `key` in place, or adds one computed by `add`.
    ///
    /// Returns `true` if the entry was added.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    pub fn add_or_update(
        &mut self,
        key: K,
        update: impl FnOnce(&mut V),
        add: impl FnOnce() -> V,
    ) -> bool {
        match self.emplace(key, add) {
            (_, None) => true,
            (index, Some(_)) => {
                update(&mut self.values[index]);
                false
            }
        }
    }

    /// Returns a reference to the value of `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert(String::from("one"), 1);
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    #[doc(alias = "try_get_value")]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key).map(|index| &self.values[index])
    }

    /// Returns a mutable reference to the value of `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key).map(|index| &mut self.values[index])
    }

    /// Returns the stored key and the value of `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key)
            .map(|index| (&self.keys[index], &self.values[index]))
    }

    /// Returns the value of `key`, or [`Error::KeyNotFound`].
    pub fn try_index<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map holds `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key).is_some()
    }

    /// Removes `key`, returning `true` if it was present.
    ///
    /// The last entry in dense storage moves into the freed position.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// map.insert('a', 1);
    /// map.insert('b', 2);
    /// map.insert('c', 3);
    ///
    /// assert!(map.remove(&'a'));
    /// assert!(!map.remove(&'a'));
    /// assert_eq!(map.keys_slice(), ['c', 'b']);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn try_remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value if it was present.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.remove_where(hash, |_, k| Q::eq(key, k.borrow()))
    }

    /// Removes the entry stored at dense position `index`.
    fn remove_at(&mut self, index: usize) -> (K, V) {
        let hash = self.hash_builder.hash_one(&self.keys[index]);
        match self.remove_where(hash, |position, _| position == index) {
            Some(entry) => entry,
            None => fatal(Error::KeyNotFound),
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// Every removal moves the last entry into the hole, so `f` sees each
    /// entry exactly once but not in storage order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut map: HashMap<u32, u32> = (0..8).map(|i| (i, i * 10)).collect();
    /// map.retain(|&k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// assert!(map.keys().all(|k| k % 2 == 0));
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut index = 0;
        while index < self.len() {
            if f(&self.keys[index], &mut self.values[index]) {
                index += 1;
            } else {
                self.remove_at(index);
            }
        }
    }

    /// Gets the entry of `key` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dense_hash::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// for word in ["a", "b", "a"] {
    ///     *counts.entry(word).or_insert(0) += 1;
    /// }
    /// assert_eq!(counts["a"], 2);
    /// assert_eq!(counts["b"], 1);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, I, S> {
        let hash = self.hash_builder.hash_one(&key);
        match self.find_hashed(hash, |k| *k == key) {
            Some(index) => Entry::Occupied(OccupiedEntry { map: self, index }),
            None => Entry::Vacant(VacantEntry {
                map: self,
                hash,
                key,
            }),
        }
    }

    /// Removes every entry, yielding them from the back of dense storage.
    ///
    /// The map is empty as soon as this returns. Its storage is handed back
    /// when the iterator is dropped; leaking the iterator leaks only that
    /// allocation.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        self.index.clear();
        Drain {
            keys: mem::take(&mut self.keys),
            values: mem::take(&mut self.values),
            home_keys: &mut self.keys,
            home_values: &mut self.values,
        }
    }

    /// Snapshot of the index layout.
    #[cfg(feature = "stats")]
    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }
}

impl<K, V, I, S> PartialEq for HashMap<K, V, I, S>
where
    K: Hash + Eq,
    V: PartialEq,
    I: HashIndex,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, I, S> Eq for HashMap<K, V, I, S>
where
    K: Hash + Eq,
    V: Eq,
    I: HashIndex,
    S: BuildHasher,
{
}

impl<K, Q, V, I, S> Index<&Q> for HashMap<K, V, I, S>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    I: HashIndex,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics with [`Error::KeyNotFound`] if the key is absent.
    fn index(&self, key: &Q) -> &V {
        self.try_index(key).unwrap_or_else(|err| fatal(err))
    }
}

impl<K, V, I, S> FromIterator<(K, V)> for HashMap<K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, I, S> Extend<(K, V)> for HashMap<K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V, I, S> IntoIterator for &'a HashMap<K, V, I, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, I, S> IntoIterator for &'a mut HashMap<K, V, I, S> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, I, S> IntoIterator for HashMap<K, V, I, S> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.keys.into_iter().zip(self.values),
        }
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, I, S> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, I, S>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, I, S>),
}

impl<'a, K, V, I, S> Entry<'a, K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the value.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, I, S> Entry<'a, K, V, I, S>
where
    K: Hash + Eq,
    V: Default,
    I: HashIndex,
    S: BuildHasher,
{
    /// Inserts the default value if the entry is vacant and returns a
    /// mutable reference to the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, I, S> {
    map: &'a mut HashMap<K, V, I, S>,
    hash: u64,
    key: K,
}

impl<'a, K, V, I, S> VacantEntry<'a, K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Appends the entry and returns a mutable reference to its value.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::CapacityOverflow`] if the index cannot grow.
    pub fn insert(self, value: V) -> &'a mut V {
        let (index, _) = self.map.emplace_hashed(self.hash, self.key, || value);
        &mut self.map.values[index]
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, I, S> {
    map: &'a mut HashMap<K, V, I, S>,
    index: usize,
}

impl<'a, K, V, I, S> OccupiedEntry<'a, K, V, I, S>
where
    K: Hash + Eq,
    I: HashIndex,
    S: BuildHasher,
{
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.map.keys[self.index]
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.map.values[self.index]
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.map.values[self.index]
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.map.values[self.index]
    }

    /// Replaces the value in the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.map.remove_at(self.index)
    }
}

/// An iterator over the entries of a `HashMap` in dense storage order.
#[derive(Clone)]
pub struct Iter<'a, K, V> {
    inner: Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the entries of a `HashMap` with mutable values.
pub struct IterMut<'a, K, V> {
    inner: Zip<slice::Iter<'a, K>, slice::IterMut<'a, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
#[derive(Clone)]
pub struct Keys<'a, K> {
    inner: slice::Iter<'a, K>,
}

impl<'a, K> Iterator for Keys<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for Keys<'_, K> {}

impl<K> FusedIterator for Keys<'_, K> {}

/// An iterator over the values of a `HashMap`.
#[derive(Clone)]
pub struct Values<'a, V> {
    inner: slice::Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Values<'_, V> {}

impl<V> FusedIterator for Values<'_, V> {}

/// An iterator over mutable references to the values of a `HashMap`.
pub struct ValuesMut<'a, V> {
    inner: slice::IterMut<'a, V>,
}

impl<'a, V> Iterator for ValuesMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for ValuesMut<'_, V> {}

impl<V> FusedIterator for ValuesMut<'_, V> {}

/// A draining iterator over the entries of a `HashMap`.
///
/// Entries come out from the back of dense storage. Whatever is left when
/// the iterator is dropped is dropped with it, and the emptied storage goes
/// back to the map.
pub struct Drain<'a, K, V> {
    keys: DenseArray<K>,
    values: DenseArray<V>,
    home_keys: &'a mut DenseArray<K>,
    home_values: &'a mut DenseArray<V>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.keys.pop().zip(self.values.pop())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.keys.len(), Some(self.keys.len()))
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

impl<K, V> Drop for Drain<'_, K, V> {
    fn drop(&mut self) {
        self.keys.clear();
        self.values.clear();
        mem::swap(self.home_keys, &mut self.keys);
        mem::swap(self.home_values, &mut self.values);
    }
}

/// An owning iterator over the entries of a `HashMap`.
pub struct IntoIter<K, V> {
    inner: Zip<dense_array::IntoIter<K>, dense_array::IntoIter<V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}
