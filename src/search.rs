//! The contract between a container and the hash index that locates its
//! entries.
//!
//! An index never owns values. It maps a 64-bit hash to a position in the
//! container's dense storage and calls back through a [`SearchControl`] to
//! compare keys, append new entries and swap-remove old ones. A container
//! builds a short-lived control for each operation, so the index stays
//! ignorant of whether it is serving a map, a set or something else.

use crate::error::Error;

/// Callbacks a container hands to a [`HashIndex`] for one lookup.
///
/// Contexts are positions in the container's dense storage. They are only
/// valid until the next call that adds or removes an element.
pub trait SearchControl {
    /// Handle to one stored element.
    type Context: Copy;

    /// What the operation reports back to the container.
    type Output;

    /// Number of live elements.
    fn size(&self) -> u32;

    /// Handle to the element at `index`. Callers only pass `index < size()`.
    fn at(&self, index: u32) -> Self::Context;

    /// Whether the element at `context` matches the key being searched for.
    fn eq(&self, context: Self::Context) -> bool;

    /// Recomputes the hash of the element at `context`.
    ///
    /// Must return the same value the element was inserted with.
    fn hash(&self, context: Self::Context) -> u64;

    /// Reports a match at `context`.
    fn get(&mut self, context: Self::Context) -> Self::Output;

    /// Reports that no element matched.
    fn none(&mut self) -> Self::Output;
}

/// A control that can append the element being searched for.
pub trait EmplaceControl: SearchControl {
    /// Appends the element being inserted and returns its handle. Must grow
    /// [`size`](SearchControl::size) by exactly one.
    fn add(&mut self) -> Self::Context;
}

/// A control that can swap-remove elements from dense storage.
pub trait RemoveControl: SearchControl {
    /// Removes the element at `index` by moving the last element, `last`,
    /// into its place.
    fn remove_swap_last(&mut self, last: Self::Context, index: u32) -> Self::Output;

    /// Removes the last element.
    fn remove_last(&mut self) -> Self::Output;
}

/// A hash-to-position index over a container's dense storage.
///
/// Implementations keep every live element reachable by exactly one index
/// entry. After every call, the positions referenced by the index are
/// exactly `0..ctrl.size()`.
pub trait HashIndex: Default {
    /// Finds the element matching `hash` and [`SearchControl::eq`], adding
    /// it through [`EmplaceControl::add`] when absent.
    ///
    /// Returns the control's output along with `true` if the element is new.
    /// On error nothing has been added and the index is unchanged.
    fn try_emplace<C: EmplaceControl>(
        &mut self,
        ctrl: &mut C,
        hash: u64,
    ) -> Result<(C::Output, bool), Error>;

    /// Finds the element matching `hash` and [`SearchControl::eq`].
    fn try_find<C: SearchControl>(&self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error>;

    /// Removes the element matching `hash` and [`SearchControl::eq`],
    /// swap-removing it from the container's storage.
    fn remove<C: RemoveControl>(&mut self, ctrl: &mut C, hash: u64) -> Result<C::Output, Error>;

    /// Forgets every entry. The caller clears its storage alongside.
    fn clear(&mut self);

    /// Makes room for `additional` more elements without growing again.
    fn reserve<C: SearchControl>(&mut self, ctrl: &C, additional: usize) -> Result<(), Error>;

    /// Number of elements that fit before the next growth.
    fn capacity(&self) -> usize;

    /// Snapshot of the index layout.
    #[cfg(feature = "stats")]
    fn stats(&self) -> IndexStats;
}

/// Layout statistics of a hash index.
///
/// Available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of indexed elements
    pub len: usize,
    /// Number of elements that fit before the next growth
    pub capacity: usize,
    /// Number of buckets allocated
    pub num_buckets: usize,
    /// Number of buckets holding an entry (or a chain head)
    pub occupied_buckets: usize,
    /// Load factor (len / num_buckets)
    pub load_factor: f64,
    /// Bytes allocated by the index itself, excluding the stored elements
    pub total_bytes: usize,
    /// `probe_histogram[n]` counts the elements found after `n` extra probes
    pub probe_histogram: alloc::vec::Vec<usize>,
}

#[cfg(feature = "stats")]
impl IndexStats {
    /// Average number of extra probes per element.
    pub fn mean_probe_length(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let total: usize = self
            .probe_histogram
            .iter()
            .enumerate()
            .map(|(probes, count)| probes * count)
            .sum();
        total as f64 / self.len as f64
    }

    /// Pretty-print the statistics, followed by the probe histogram drawn
    /// as a horizontal bar chart.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Index Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.num_buckets,
            self.load_factor * 100.0
        );
        println!("Capacity before growth: {}", self.capacity);
        println!(
            "Occupied buckets: {}/{}",
            self.occupied_buckets, self.num_buckets
        );
        println!("Index memory: {} bytes", self.total_bytes);
        println!("Mean extra probes: {:.3}", self.mean_probe_length());

        let max = self.probe_histogram.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        const MAX_BAR: usize = 60;
        println!("probe histogram ({} entries):", self.len);
        for (probes, &count) in self.probe_histogram.iter().enumerate() {
            let width = (count * MAX_BAR).div_ceil(max);
            println!("{probes:>3} | {} ({count})", "█".repeat(width));
        }
    }
}
