use core::hash::BuildHasher;
use core::hash::Hasher;

/// Builds [`IdentityHasher`]s.
///
/// Suited to keys whose hash is already well distributed, such as
/// precomputed digests. The Robin-Hood index picks buckets from the *high*
/// bits of the hash, so small sequential integers all land in the same
/// neighbourhood with this mixer.
///
/// A Robin-Hood displacement is limited to 2^24 - 1 buckets. Once a
/// cluster that long forms, inserts fail with
/// [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) instead of
/// corrupting the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentityState;

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    #[inline]
    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher::default()
    }
}

/// Passes a single integer through unchanged.
///
/// Unsigned values are zero-extended and signed values sign-extended to 64
/// bits. Further writes are folded in with a rotate and xor, so composite
/// keys still hash, just without any mixing.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityHasher {
    hash: u64,
}

impl IdentityHasher {
    #[inline(always)]
    fn fold(&mut self, value: u64) {
        self.hash = self.hash.rotate_left(32) ^ value;
    }
}

impl Hasher for IdentityHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            self.fold(u64::from_le_bytes(word));
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.fold(i as u64);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.fold(i as u64);
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.fold(i as u64);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.fold(i);
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.fold(i as u64);
    }

    #[inline]
    fn write_i8(&mut self, i: i8) {
        self.fold(i as i64 as u64);
    }

    #[inline]
    fn write_i16(&mut self, i: i16) {
        self.fold(i as i64 as u64);
    }

    #[inline]
    fn write_i32(&mut self, i: i32) {
        self.fold(i as i64 as u64);
    }

    #[inline]
    fn write_i64(&mut self, i: i64) {
        self.fold(i as u64);
    }

    #[inline]
    fn write_isize(&mut self, i: isize) {
        self.fold(i as i64 as u64);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn integers_pass_through() {
        let state = IdentityState;
        assert_eq!(state.hash_one(12345u64), 12345);
        assert_eq!(state.hash_one(7u8), 7);
        assert_eq!(state.hash_one(-1i32), u64::MAX);
        assert_eq!(state.hash_one(-2i64), u64::MAX - 1);
    }

    #[test]
    fn composite_keys_fold() {
        let state = IdentityState;
        assert_eq!(state.hash_one((1u32, 2u32)), (1u64 << 32) ^ 2);
        assert_ne!(state.hash_one("ab"), state.hash_one("ba"));
    }
}
