//! Robin-Hood open addressing with backward-shift deletion.
//!
//! Each bucket packs the probe distance (in units of [`DIST_INC`]) and an
//! 8-bit fingerprint of the hash into one `u32`, next to the position of
//! the element in dense storage. Comparing the packed word against the
//! searched key's word both filters fingerprints and detects, through the
//! Robin-Hood ordering, when the key cannot be further along the chain.

use alloc::vec::Vec;
use core::mem;

use crate::error::Error;
#[cfg(feature = "stats")]
use crate::search::IndexStats;
use crate::search::EmplaceControl;
use crate::search::HashIndex;
use crate::search::RemoveControl;
use crate::search::SearchControl;

/// One unit of probe distance, above the fingerprint byte.
const DIST_INC: u32 = 1 << 8;
const FINGERPRINT_MASK: u32 = DIST_INC - 1;

/// Four buckets to start with.
const INITIAL_SHIFTS: u32 = 64 - 2;
const MIN_SHIFTS: u32 = 64 - 31;
const MAX_BUCKETS: usize = 1 << 31;
const MAX_LOAD_FACTOR: f32 = 0.8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Bucket {
    dist_and_fingerprint: u32,
    value_idx: u32,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        dist_and_fingerprint: 0,
        value_idx: 0,
    };

    #[inline(always)]
    fn is_occupied(self) -> bool {
        self.dist_and_fingerprint != 0
    }
}

#[inline(always)]
fn dist_and_fingerprint_from_hash(hash: u64) -> u32 {
    DIST_INC | (hash as u32 & FINGERPRINT_MASK)
}

/// One bucket further from home. The distance field holds 24 bits.
#[inline(always)]
fn step(dist_and_fingerprint: u32) -> Result<u32, Error> {
    dist_and_fingerprint
        .checked_add(DIST_INC)
        .ok_or(Error::CapacityOverflow)
}

#[inline]
fn calc_num_buckets(shifts: u32) -> usize {
    1usize << (64 - shifts)
}

#[inline]
fn calc_max_bucket_capacity(num_buckets: usize) -> usize {
    if num_buckets >= MAX_BUCKETS {
        MAX_BUCKETS
    } else {
        (num_buckets as f32 * MAX_LOAD_FACTOR) as usize
    }
}

/// Robin-Hood hash index.
///
/// The bucket count is always a power of two, `2^(64 - shifts)`, and the
/// home bucket of a hash is its top bits: `hash >> shifts`. The index grows
/// once the number of elements would exceed 80% of the buckets, and refuses
/// to grow past `2^31` buckets.
#[derive(Clone, Debug)]
pub struct AnkerlIndex {
    buckets: Vec<Bucket>,
    shifts: u32,
    max_bucket_capacity: usize,
}

impl Default for AnkerlIndex {
    fn default() -> Self {
        let num_buckets = calc_num_buckets(INITIAL_SHIFTS);
        Self {
            buckets: alloc::vec![Bucket::EMPTY; num_buckets],
            shifts: INITIAL_SHIFTS,
            max_bucket_capacity: calc_max_bucket_capacity(num_buckets),
        }
    }
}

impl AnkerlIndex {
    /// Number of allocated buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Number of elements the index holds before it has to grow.
    pub fn max_bucket_capacity(&self) -> usize {
        self.max_bucket_capacity
    }

    #[inline(always)]
    fn bucket_idx(&self, hash: u64) -> usize {
        (hash >> self.shifts) as usize
    }

    #[inline(always)]
    fn next(&self, idx: usize) -> usize {
        if idx + 1 == self.buckets.len() {
            0
        } else {
            idx + 1
        }
    }

    /// Skips the buckets that sort before `hash`, returning where its walk
    /// continues.
    fn next_while_less(&self, hash: u64) -> Result<(u32, usize), Error> {
        let mut dist_and_fingerprint = dist_and_fingerprint_from_hash(hash);
        let mut idx = self.bucket_idx(hash);
        while dist_and_fingerprint < self.buckets[idx].dist_and_fingerprint {
            dist_and_fingerprint = step(dist_and_fingerprint)?;
            idx = self.next(idx);
        }
        Ok((dist_and_fingerprint, idx))
    }

    /// Fails if shifting the run starting at `place` one bucket up would
    /// push a distance out of range.
    fn check_shift_up(&self, mut place: usize) -> Result<(), Error> {
        while self.buckets[place].is_occupied() {
            step(self.buckets[place].dist_and_fingerprint)?;
            place = self.next(place);
        }
        Ok(())
    }

    /// Puts `bucket` at `place`, pushing every occupant up to the next free
    /// bucket one step further from home. Callers run
    /// [`check_shift_up`](Self::check_shift_up) first.
    fn place_and_shift_up(&mut self, mut bucket: Bucket, mut place: usize) {
        while self.buckets[place].is_occupied() {
            bucket = mem::replace(&mut self.buckets[place], bucket);
            bucket.dist_and_fingerprint += DIST_INC;
            place = self.next(place);
        }
        self.buckets[place] = bucket;
    }

    /// Backward-shift deletion starting at the emptied bucket `idx`.
    fn shift_down(&mut self, mut idx: usize) {
        let mut next = self.next(idx);
        while self.buckets[next].dist_and_fingerprint >= 2 * DIST_INC {
            let moved = self.buckets[next];
            self.buckets[idx] = Bucket {
                dist_and_fingerprint: moved.dist_and_fingerprint - DIST_INC,
                value_idx: moved.value_idx,
            };
            idx = next;
            next = self.next(next);
        }
        self.buckets[idx] = Bucket::EMPTY;
    }

    fn grow<C: SearchControl>(&mut self, ctrl: &C) -> Result<(), Error> {
        if self.max_bucket_capacity == MAX_BUCKETS {
            return Err(Error::CapacityOverflow);
        }
        self.rebuild(ctrl, self.shifts - 1)
    }

    /// Replaces the bucket array with one of `2^(64 - shifts)` buckets and
    /// re-inserts every live element.
    /// On error the previous bucket array is restored.
    fn rebuild<C: SearchControl>(&mut self, ctrl: &C, shifts: u32) -> Result<(), Error> {
        let num_buckets = calc_num_buckets(shifts);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(num_buckets)
            .map_err(|_| Error::CapacityOverflow)?;
        buckets.resize(num_buckets, Bucket::EMPTY);

        log::trace!(
            "robin-hood index growing from {} to {} buckets ({} elements)",
            self.buckets.len(),
            num_buckets,
            ctrl.size()
        );

        let old_buckets = mem::replace(&mut self.buckets, buckets);
        let old_shifts = mem::replace(&mut self.shifts, shifts);
        let old_capacity = mem::replace(
            &mut self.max_bucket_capacity,
            calc_max_bucket_capacity(num_buckets),
        );

        if let Err(err) = self.reinsert_all(ctrl) {
            self.buckets = old_buckets;
            self.shifts = old_shifts;
            self.max_bucket_capacity = old_capacity;
            return Err(err);
        }
        Ok(())
    }

    fn reinsert_all<C: SearchControl>(&mut self, ctrl: &C) -> Result<(), Error> {
        for value_idx in 0..ctrl.size() {
            let hash = ctrl.hash(ctrl.at(value_idx));
            let (dist_and_fingerprint, idx) = self.next_while_less(hash)?;
            self.check_shift_up(idx)?;
            self.place_and_shift_up(
                Bucket {
                    dist_and_fingerprint,
                    value_idx,
                },
                idx,
            );
        }
        Ok(())
    }

    /// Checks the structural invariants against the hashes of the `len`
    /// stored elements.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self, len: u32, hash_of: impl Fn(u32) -> u64) {
        let mut seen = alloc::vec![false; len as usize];
        let mut prev_dist = self.buckets[self.buckets.len() - 1].dist_and_fingerprint >> 8;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            let dist = bucket.dist_and_fingerprint >> 8;
            assert!(dist <= prev_dist + 1, "distance jumps at bucket {idx}");
            prev_dist = dist;
            if !bucket.is_occupied() {
                continue;
            }

            let value_idx = bucket.value_idx;
            assert!(value_idx < len, "bucket {idx} points past the end");
            assert!(!seen[value_idx as usize], "element {value_idx} indexed twice");
            seen[value_idx as usize] = true;

            let hash = hash_of(value_idx);
            let home = self.bucket_idx(hash);
            let expected = (home + dist as usize - 1) & (self.buckets.len() - 1);
            assert_eq!(expected, idx, "element {value_idx} is not at its distance");
            assert_eq!(
                bucket.dist_and_fingerprint & FINGERPRINT_MASK,
                hash as u32 & FINGERPRINT_MASK
            );
        }
        assert!(seen.iter().all(|&s| s), "some elements are not indexed");
    }
}

impl HashIndex for AnkerlIndex {
    fn try_emplace<C: EmplaceControl>(
        &mut self,
        ctrl: &mut C,
        hash: u64,
    ) -> Result<(C::Output, bool), Error> {
        let mut dist_and_fingerprint = dist_and_fingerprint_from_hash(hash);
        let mut idx = self.bucket_idx(hash);

        loop {
            let bucket = self.buckets[idx];
            if dist_and_fingerprint == bucket.dist_and_fingerprint {
                let ctx = ctrl.at(bucket.value_idx);
                if ctrl.eq(ctx) {
                    return Ok((ctrl.get(ctx), false));
                }
            } else if dist_and_fingerprint > bucket.dist_and_fingerprint {
                break;
            }
            dist_and_fingerprint = step(dist_and_fingerprint)?;
            idx = self.next(idx);
        }

        let value_idx = ctrl.size();
        if value_idx as usize >= self.max_bucket_capacity {
            self.grow(ctrl)?;
            (dist_and_fingerprint, idx) = self.next_while_less(hash)?;
        }
        self.check_shift_up(idx)?;

        let ctx = ctrl.add();
        self.place_and_shift_up(
            Bucket {
                dist_and_fingerprint,
                value_idx,
            },
            idx,
        );
        Ok((ctrl.get(ctx), true))
    }

    fn try_find<C: SearchControl>(&self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error> {
        if ctrl.size() == 0 {
            return Ok(ctrl.none());
        }

        let mut dist_and_fingerprint = dist_and_fingerprint_from_hash(hash);
        let mut idx = self.bucket_idx(hash);

        // The first two probes resolve nearly every lookup.
        for _ in 0..2 {
            let bucket = self.buckets[idx];
            if dist_and_fingerprint == bucket.dist_and_fingerprint {
                let ctx = ctrl.at(bucket.value_idx);
                if ctrl.eq(ctx) {
                    return Ok(ctrl.get(ctx));
                }
            }
            dist_and_fingerprint += DIST_INC;
            idx = self.next(idx);
        }

        loop {
            let bucket = self.buckets[idx];
            if dist_and_fingerprint == bucket.dist_and_fingerprint {
                let ctx = ctrl.at(bucket.value_idx);
                if ctrl.eq(ctx) {
                    return Ok(ctrl.get(ctx));
                }
            } else if dist_and_fingerprint > bucket.dist_and_fingerprint {
                return Ok(ctrl.none());
            }
            dist_and_fingerprint = step(dist_and_fingerprint)?;
            idx = self.next(idx);
        }
    }

    fn remove<C: RemoveControl>(&mut self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error> {
        if ctrl.size() == 0 {
            return Ok(ctrl.none());
        }

        let (mut dist_and_fingerprint, mut idx) = self.next_while_less(hash)?;
        while dist_and_fingerprint == self.buckets[idx].dist_and_fingerprint
            && !ctrl.eq(ctrl.at(self.buckets[idx].value_idx))
        {
            dist_and_fingerprint = step(dist_and_fingerprint)?;
            idx = self.next(idx);
        }
        if dist_and_fingerprint != self.buckets[idx].dist_and_fingerprint {
            return Ok(ctrl.none());
        }

        let value_idx = self.buckets[idx].value_idx;
        self.shift_down(idx);

        let last_idx = ctrl.size() - 1;
        if value_idx == last_idx {
            return Ok(ctrl.remove_last());
        }

        // The last element moves into the hole; retarget its bucket.
        let last = ctrl.at(last_idx);
        let mut idx = self.bucket_idx(ctrl.hash(last));
        while !self.buckets[idx].is_occupied() || self.buckets[idx].value_idx != last_idx {
            idx = self.next(idx);
        }
        self.buckets[idx].value_idx = value_idx;

        Ok(ctrl.remove_swap_last(last, value_idx))
    }

    fn clear(&mut self) {
        self.buckets.fill(Bucket::EMPTY);
    }

    fn reserve<C: SearchControl>(&mut self, ctrl: &C, additional: usize) -> Result<(), Error> {
        let target = (ctrl.size() as usize)
            .checked_add(additional)
            .filter(|&target| target <= MAX_BUCKETS)
            .ok_or(Error::CapacityOverflow)?;

        let mut shifts = self.shifts;
        while shifts > MIN_SHIFTS
            && calc_max_bucket_capacity(calc_num_buckets(shifts)) < target
        {
            shifts -= 1;
        }
        if shifts < self.shifts {
            self.rebuild(ctrl, shifts)?;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.max_bucket_capacity
    }

    #[cfg(feature = "stats")]
    fn stats(&self) -> IndexStats {
        let mut probe_histogram = Vec::new();
        let mut len = 0;
        for bucket in self.buckets.iter().filter(|b| b.is_occupied()) {
            let probes = (bucket.dist_and_fingerprint / DIST_INC - 1) as usize;
            if probe_histogram.len() <= probes {
                probe_histogram.resize(probes + 1, 0);
            }
            probe_histogram[probes] += 1;
            len += 1;
        }

        IndexStats {
            len,
            capacity: self.max_bucket_capacity,
            num_buckets: self.buckets.len(),
            occupied_buckets: len,
            load_factor: len as f64 / self.buckets.len() as f64,
            total_bytes: self.buckets.capacity() * mem::size_of::<Bucket>(),
            probe_histogram,
        }
    }
}
