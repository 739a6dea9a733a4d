//! Hash mixers: [`BuildHasher`] strategies that turn a key's writes into the
//! 64-bit hash consumed by the indexes.
//!
//! Every mixer here starts each hasher from the same state, so hashing a
//! stored key again always reproduces the hash it was inserted with. The
//! indexes rely on that when they relocate entries during growth and
//! swap-removal.

use core::hash::BuildHasher;
use core::hash::Hasher;

mod aes;
mod identity;
mod rapid;

pub use aes::AesHasher;
pub use aes::AesState;
pub use identity::IdentityHasher;
pub use identity::IdentityState;
pub use rapid::DEFAULT_SEED;
pub use rapid::RapidHasher;
pub use rapid::RapidState;

/// foldhash's fixed-seed state, usable as another interchangeable mixer.
#[cfg(feature = "foldhash")]
pub type FoldState = foldhash::fast::FixedState;

cfg_if::cfg_if! {
    if #[cfg(all(
        feature = "std",
        target_feature = "aes",
        any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"),
    ))] {
        /// The mixer used when none is named: AES, since this target always
        /// has AES instructions.
        pub type DefaultHashBuilder = AesState;
    } else {
        /// The mixer used when none is named: Rapid, since this target does
        /// not guarantee AES instructions.
        pub type DefaultHashBuilder = RapidState;
    }
}

/// Mixes a precomputed 32-bit hash code into a 64-bit hash.
///
/// Implemented for every [`BuildHasher`]; the code is written as a single
/// `i32`, so [`IdentityState`] returns it sign-extended.
///
/// ```rust
/// use dense_hash::hasher::HashMixer;
/// use dense_hash::hasher::IdentityState;
/// use dense_hash::hasher::RapidState;
///
/// assert_eq!(IdentityState.mix(5), 5);
/// assert_ne!(RapidState::new().mix(5), 5);
/// ```
pub trait HashMixer: BuildHasher {
    /// Hash `native` with a fresh hasher from this builder.
    #[inline]
    fn mix(&self, native: i32) -> u64 {
        let mut hasher = self.build_hasher();
        hasher.write_i32(native);
        hasher.finish()
    }
}

impl<S: BuildHasher> HashMixer for S {}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use test_log::test;

    use super::*;

    const SAMPLES: usize = 10_000;

    fn average_popcount<S: BuildHasher>(state: &S, rng: &mut SmallRng) -> f64 {
        let mut sum = 0.0;
        for _ in 0..SAMPLES {
            let hash = state.hash_one(rng.random::<i64>());
            sum += hash.count_ones() as f64 / 64.0;
        }
        sum / SAMPLES as f64
    }

    /// Average number of output bits flipped by flipping one input bit.
    fn average_avalanche<S: BuildHasher>(state: &S, rng: &mut SmallRng) -> f64 {
        let mut flipped = 0u64;
        let mut trials = 0u64;
        for _ in 0..SAMPLES / 64 {
            let input = rng.random::<u64>();
            let base = state.hash_one(input);
            for bit in 0..64 {
                flipped += (base ^ state.hash_one(input ^ (1 << bit))).count_ones() as u64;
                trials += 1;
            }
        }
        flipped as f64 / trials as f64
    }

    fn check_quality<S: BuildHasher>(state: &S) {
        let mut rng = SmallRng::from_os_rng();
        let popcount = average_popcount(state, &mut rng);
        assert!((0.45..=0.55).contains(&popcount), "popcount ratio {popcount}");
        let avalanche = average_avalanche(state, &mut rng);
        assert!((28.0..=36.0).contains(&avalanche), "avalanche {avalanche}");
    }

    #[test]
    fn rapid_distributes_bits() {
        check_quality(&RapidState::new());
    }

    #[test]
    fn aes_distributes_bits() {
        let Ok(state) = AesState::with_keys(0x1234, 0x5678) else {
            assert!(!AesState::is_supported());
            return;
        };
        check_quality(&state);
    }

    #[cfg(feature = "foldhash")]
    #[test]
    fn foldhash_distributes_bits() {
        let mut rng = SmallRng::from_os_rng();
        let popcount = average_popcount(&FoldState::default(), &mut rng);
        assert!((0.45..=0.55).contains(&popcount), "popcount ratio {popcount}");
    }

    #[test]
    fn mix_matches_hash_one() {
        let rapid = RapidState::new();
        assert_eq!(rapid.mix(-5), rapid.hash_one(-5i32));
        assert_eq!(IdentityState.mix(-1), u64::MAX);
    }

    #[test]
    fn rebuilt_hashers_reproduce() {
        let state = DefaultHashBuilder::default();
        for key in 0..100u64 {
            assert_eq!(state.hash_one(key), state.hash_one(key));
        }
    }
}
