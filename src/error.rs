//! Error types for the `dense-hash` crate

/// Errors raised by the dense containers, their indexes and the hash mixers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Growing a bucket array or a dense buffer would exceed the
    /// representable range.
    ///
    /// The operation that hit this limit is aborted before any state is
    /// modified.
    #[error("capacity overflow, the container cannot grow any further")]
    CapacityOverflow,

    /// A checked dense-array access used a position past the live length.
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The requested position.
        index: usize,
        /// The live length at the time of the access.
        len: usize,
    },

    /// Indexer-style access for a key that is not stored in the map.
    #[error("the given key was not present in the map")]
    KeyNotFound,

    /// A chain walk visited more links than there are buckets.
    ///
    /// The chains of a well-formed index are acyclic, so this only happens
    /// when the index was corrupted, for example by a `Hash` or `Eq`
    /// implementation that changed while the key was stored.
    #[error("collision limit exceeded, the index was mutated during a probe")]
    CollisionLimit,

    /// The AES mixer was selected on a CPU without AES instructions.
    #[error("AES instructions are not available on this CPU, select a different hash mixer")]
    UnsupportedHardware,
}

/// Raise a fatal container error as a panic.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fatal(err: Error) -> ! {
    panic!("{err}")
}
