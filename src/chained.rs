//! Separate chaining through a slot array co-indexed with dense storage.
//!
//! `buckets[b]` holds the 1-based position of the first slot in bucket `b`
//! (0 marks an empty bucket) and `slots[i]` caches the short hash of element
//! `i` together with the position of the next slot in the same chain.

use alloc::vec::Vec;

use crate::error::Error;
#[cfg(feature = "stats")]
use crate::search::IndexStats;
use crate::search::EmplaceControl;
use crate::search::HashIndex;
use crate::search::RemoveControl;
use crate::search::SearchControl;

const END: i32 = -1;
const INITIAL_BUCKETS: usize = 4;
const MAX_BUCKETS: usize = 1 << 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    hash: u32,
    next: i32,
}

/// Folds both halves of the hash so that mixers strong in either half
/// spread well over the buckets.
#[inline(always)]
fn short_hash(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

/// Bucket-chaining hash index.
///
/// Starts with four buckets and doubles them once every bucket would hold
/// one element on average. Chains are walked with a step counter bounded by
/// the bucket count; a longer walk can only come from a corrupted chain and
/// fails with [`Error::CollisionLimit`].
#[derive(Clone, Debug)]
pub struct ChainedIndex {
    buckets: Vec<u32>,
    slots: Vec<Slot>,
}

impl Default for ChainedIndex {
    fn default() -> Self {
        Self {
            buckets: alloc::vec![0; INITIAL_BUCKETS],
            slots: Vec::new(),
        }
    }
}

impl ChainedIndex {
    /// Number of allocated buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    #[inline(always)]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    #[inline(always)]
    fn head(&self, bucket: usize) -> i32 {
        self.buckets[bucket] as i32 - 1
    }

    /// Walks the chain of `hash`, returning the matching position and the
    /// position linking to it (`END` when it is the bucket head).
    fn search<C: SearchControl>(&self, ctrl: &C, hash: u32) -> Result<Option<(usize, i32)>, Error> {
        let mut prev = END;
        let mut i = self.head(self.bucket_of(hash));
        let mut collisions = 0;
        while i >= 0 {
            let slot = self.slots[i as usize];
            if slot.hash == hash && ctrl.eq(ctrl.at(i as u32)) {
                return Ok(Some((i as usize, prev)));
            }
            prev = i;
            i = slot.next;
            collisions += 1;
            if collisions > self.buckets.len() {
                return Err(Error::CollisionLimit);
            }
        }
        Ok(None)
    }

    fn grow(&mut self) -> Result<(), Error> {
        if self.buckets.len() >= MAX_BUCKETS {
            return Err(Error::CapacityOverflow);
        }
        self.relink(self.buckets.len() * 2)
    }

    /// Replaces the buckets with `num_buckets` new ones and rethreads every
    /// slot from its cached hash.
    fn relink(&mut self, num_buckets: usize) -> Result<(), Error> {
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(num_buckets)
            .map_err(|_| Error::CapacityOverflow)?;
        buckets.resize(num_buckets, 0u32);

        log::trace!(
            "chained index growing from {} to {} buckets ({} elements)",
            self.buckets.len(),
            num_buckets,
            self.slots.len()
        );

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let bucket = slot.hash as usize % num_buckets;
            slot.next = buckets[bucket] as i32 - 1;
            buckets[bucket] = i as u32 + 1;
        }
        self.buckets = buckets;
        Ok(())
    }

    /// Fills the hole at `i`, already unlinked, with the last slot.
    fn swap_out<C: RemoveControl>(&mut self, ctrl: &mut C, i: usize) -> Result<C::Output, Error> {
        let last = self.slots.len() - 1;
        if i == last {
            self.slots.pop();
            return Ok(ctrl.remove_last());
        }

        let moved = self.slots[last];
        let bucket = self.bucket_of(moved.hash);
        if self.head(bucket) == last as i32 {
            self.buckets[bucket] = i as u32 + 1;
        } else {
            let mut link = self.head(bucket);
            let mut collisions = 0;
            while self.slots[link as usize].next != last as i32 {
                link = self.slots[link as usize].next;
                collisions += 1;
                if link < 0 || collisions > self.buckets.len() {
                    return Err(Error::CollisionLimit);
                }
            }
            self.slots[link as usize].next = i as i32;
        }

        self.slots[i] = moved;
        self.slots.pop();
        let last = ctrl.at(last as u32);
        Ok(ctrl.remove_swap_last(last, i as u32))
    }

    /// Checks that every slot is reachable exactly once, from its own
    /// bucket, and that cached hashes match `hash_of`.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self, len: u32, hash_of: impl Fn(u32) -> u64) {
        assert_eq!(self.slots.len(), len as usize);
        assert!(self.slots.len() <= self.buckets.len());
        let mut seen = alloc::vec![false; self.slots.len()];
        for bucket in 0..self.buckets.len() {
            let mut i = self.head(bucket);
            while i >= 0 {
                let slot = self.slots[i as usize];
                assert!(!seen[i as usize], "slot {i} linked twice");
                seen[i as usize] = true;
                assert_eq!(self.bucket_of(slot.hash), bucket, "slot {i} in wrong bucket");
                assert_eq!(slot.hash, short_hash(hash_of(i as u32)));
                i = slot.next;
            }
        }
        assert!(seen.iter().all(|&s| s), "some slots are unreachable");
    }
}

impl HashIndex for ChainedIndex {
    fn try_emplace<C: EmplaceControl>(
        &mut self,
        ctrl: &mut C,
        hash: u64,
    ) -> Result<(C::Output, bool), Error> {
        let hash = short_hash(hash);
        if let Some((i, _)) = self.search(ctrl, hash)? {
            let ctx = ctrl.at(i as u32);
            return Ok((ctrl.get(ctx), false));
        }

        if self.slots.len() == self.buckets.len() {
            self.grow()?;
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| Error::CapacityOverflow)?;

        let ctx = ctrl.add();
        let bucket = self.bucket_of(hash);
        let i = self.slots.len();
        self.slots.push(Slot {
            hash,
            next: self.head(bucket),
        });
        self.buckets[bucket] = i as u32 + 1;
        Ok((ctrl.get(ctx), true))
    }

    fn try_find<C: SearchControl>(&self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error> {
        match self.search(ctrl, short_hash(hash))? {
            Some((i, _)) => {
                let ctx = ctrl.at(i as u32);
                Ok(ctrl.get(ctx))
            }
            None => Ok(ctrl.none()),
        }
    }

    fn remove<C: RemoveControl>(&mut self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error> {
        let hash = short_hash(hash);
        let Some((i, prev)) = self.search(ctrl, hash)? else {
            return Ok(ctrl.none());
        };

        let next = self.slots[i].next;
        if prev == END {
            let bucket = self.bucket_of(hash);
            self.buckets[bucket] = (next + 1) as u32;
        } else {
            self.slots[prev as usize].next = next;
        }
        self.swap_out(ctrl, i)
    }

    fn clear(&mut self) {
        self.buckets.fill(0);
        self.slots.clear();
    }

    fn reserve<C: SearchControl>(&mut self, ctrl: &C, additional: usize) -> Result<(), Error> {
        let target = (ctrl.size() as usize)
            .checked_add(additional)
            .filter(|&target| target <= MAX_BUCKETS)
            .ok_or(Error::CapacityOverflow)?;

        let mut num_buckets = self.buckets.len();
        while num_buckets < target {
            num_buckets *= 2;
        }
        if num_buckets > self.buckets.len() {
            self.relink(num_buckets)?;
        }
        self.slots
            .try_reserve(target - self.slots.len())
            .map_err(|_| Error::CapacityOverflow)
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[cfg(feature = "stats")]
    fn stats(&self) -> IndexStats {
        let mut probe_histogram = Vec::new();
        let mut occupied_buckets = 0;
        for bucket in 0..self.buckets.len() {
            let mut i = self.head(bucket);
            if i >= 0 {
                occupied_buckets += 1;
            }
            let mut depth = 0;
            while i >= 0 {
                if probe_histogram.len() <= depth {
                    probe_histogram.resize(depth + 1, 0);
                }
                probe_histogram[depth] += 1;
                depth += 1;
                i = self.slots[i as usize].next;
            }
        }

        IndexStats {
            len: self.slots.len(),
            capacity: self.buckets.len(),
            num_buckets: self.buckets.len(),
            occupied_buckets,
            load_factor: self.slots.len() as f64 / self.buckets.len() as f64,
            total_bytes: self.buckets.capacity() * core::mem::size_of::<u32>()
                + self.slots.capacity() * core::mem::size_of::<Slot>(),
            probe_histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use test_log::test;

    use super::*;

    /// Keys are `(id, hash)` pairs so tests can force collisions.
    struct Pairs<'a> {
        stored: &'a mut Vec<(u32, u64)>,
        key: (u32, u64),
    }

    impl SearchControl for Pairs<'_> {
        type Context = u32;
        type Output = Option<u32>;

        fn size(&self) -> u32 {
            self.stored.len() as u32
        }

        fn at(&self, index: u32) -> u32 {
            index
        }

        fn eq(&self, context: u32) -> bool {
            self.stored[context as usize] == self.key
        }

        fn hash(&self, context: u32) -> u64 {
            self.stored[context as usize].1
        }

        fn get(&mut self, context: u32) -> Option<u32> {
            Some(context)
        }

        fn none(&mut self) -> Option<u32> {
            None
        }
    }

    impl EmplaceControl for Pairs<'_> {
        fn add(&mut self) -> u32 {
            self.stored.push(self.key);
            self.stored.len() as u32 - 1
        }
    }

    impl RemoveControl for Pairs<'_> {
        fn remove_swap_last(&mut self, _last: u32, index: u32) -> Option<u32> {
            self.stored.swap_remove(index as usize);
            Some(index)
        }

        fn remove_last(&mut self) -> Option<u32> {
            self.stored.pop();
            Some(self.stored.len() as u32)
        }
    }

    type Stored = Vec<(u32, u64)>;

    fn emplace(index: &mut ChainedIndex, stored: &mut Stored, key: (u32, u64)) -> bool {
        let mut ctrl = Pairs { stored, key };
        index.try_emplace(&mut ctrl, key.1).map(|(_, new)| new).unwrap()
    }

    fn find(index: &ChainedIndex, stored: &mut Stored, key: (u32, u64)) -> Option<u32> {
        let mut ctrl = Pairs { stored, key };
        index.try_find(&mut ctrl, key.1).unwrap()
    }

    fn remove(index: &mut ChainedIndex, stored: &mut Stored, key: (u32, u64)) -> bool {
        let mut ctrl = Pairs { stored, key };
        index.remove(&mut ctrl, key.1).unwrap().is_some()
    }

    fn check(index: &ChainedIndex, stored: &Stored) {
        index.assert_invariants(stored.len() as u32, |i| stored[i as usize].1);
    }

    fn key(i: u32) -> (u32, u64) {
        (i, (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }

    #[test]
    fn insert_and_find() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        for i in 0..1000 {
            assert!(emplace(&mut index, &mut stored, key(i)));
        }
        for i in 0..1000 {
            assert!(!emplace(&mut index, &mut stored, key(i)));
            assert_eq!(find(&index, &mut stored, key(i)), Some(i));
        }
        assert_eq!(find(&index, &mut stored, key(1000)), None);
        check(&index, &stored);
    }

    #[test]
    fn doubles_when_full() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        for i in 0..4 {
            emplace(&mut index, &mut stored, key(i));
        }
        assert_eq!(index.num_buckets(), 4);
        emplace(&mut index, &mut stored, key(4));
        assert_eq!(index.num_buckets(), 8);
        check(&index, &stored);
    }

    #[test]
    fn full_collisions_chain_in_one_bucket() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        let keys: Vec<_> = (0..50).map(|i| (i, 7u64)).collect();
        for &k in &keys {
            assert!(emplace(&mut index, &mut stored, k));
        }
        for &k in &keys {
            assert_eq!(find(&index, &mut stored, k), Some(k.0));
        }
        check(&index, &stored);
    }

    #[test]
    fn remove_with_last_on_same_chain() {
        // Every key collides, so the moved last element always shares the
        // removed element's chain.
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        for i in 0..20 {
            emplace(&mut index, &mut stored, (i, 42));
        }
        for i in [0, 19, 7, 3, 12] {
            assert!(remove(&mut index, &mut stored, (i, 42)));
            check(&index, &stored);
        }
        for i in 0..20 {
            let present = ![0, 19, 7, 3, 12].contains(&i);
            assert_eq!(find(&index, &mut stored, (i, 42)).is_some(), present);
        }
    }

    #[test]
    fn remove_with_last_on_other_chain() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        for i in 0..200 {
            emplace(&mut index, &mut stored, key(i));
        }
        assert!(remove(&mut index, &mut stored, key(10)));
        assert_eq!(stored[10], key(199));
        assert_eq!(find(&index, &mut stored, key(199)), Some(10));
        check(&index, &stored);

        for i in 0..200 {
            if i != 10 {
                assert!(remove(&mut index, &mut stored, key(i)));
            }
        }
        assert!(stored.is_empty());
        check(&index, &stored);
    }

    #[test]
    fn collision_limit_stops_corrupted_walk() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        emplace(&mut index, &mut stored, (0, 8));
        emplace(&mut index, &mut stored, (1, 8));
        // Close the chain into a cycle.
        index.slots[0].next = 1;

        let mut ctrl = Pairs {
            stored: &mut stored,
            key: (2, 8),
        };
        assert_eq!(index.try_find(&mut ctrl, 8), Err(Error::CollisionLimit));
        assert_eq!(index.try_emplace(&mut ctrl, 8), Err(Error::CollisionLimit));
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn reserve_and_clear() {
        let mut index = ChainedIndex::default();
        let mut stored = Vec::new();
        let ctrl = Pairs {
            stored: &mut stored,
            key: (0, 0),
        };
        index.reserve(&ctrl, 100).unwrap();
        assert_eq!(index.num_buckets(), 128);
        for i in 0..100 {
            emplace(&mut index, &mut stored, key(i));
        }
        assert_eq!(index.num_buckets(), 128);

        index.clear();
        stored.clear();
        assert_eq!(find(&index, &mut stored, key(1)), None);
        assert!(emplace(&mut index, &mut stored, key(1)));
        check(&index, &stored);
    }
}
