#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod ankerl;
mod chained;
mod error;

/// Contiguous growable storage with swap-removal.
pub mod dense_array;

/// Storage split into fixed-size chunks, so growth never moves elements.
pub mod chunked_vec;

pub mod hasher;

pub mod search;

/// A dense `HashMap` over an interchangeable hash index.
///
/// Keys and values live in two parallel arrays. The index only stores
/// positions into them.
pub mod hash_map;

/// A dense `HashSet`, a [`HashMap`] with `()` values.
pub mod hash_set;

pub use ankerl::AnkerlIndex;
pub use chained::ChainedIndex;
pub use dense_array::DenseArray;
pub use error::Error;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hasher::DefaultHashBuilder;
