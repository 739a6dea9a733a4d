use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hasher;

use crate::error::Error;
#[cfg(feature = "std")]
use crate::error::fatal;

const fn pack(lo: u64, hi: u64) -> u128 {
    ((hi as u128) << 64) | lo as u128
}

// Fractional digits of pi, xored into both keys.
const PI0: u128 = pack(0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344);
const PI1: u128 = pack(0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89);

const SHUFFLE: [u8; 16] = [
    0x02, 0x0a, 0x07, 0x00, 0x0c, 0x01, 0x03, 0x0e, 0x05, 0x0f, 0x0d, 0x08, 0x06, 0x09, 0x0b, 0x04,
];

// Multipliers that broadcast a narrow integer into every lane of a block.
const SPLAT_8: u128 = u128::from_le_bytes([1; 16]);
const SPLAT_16: u128 = 0x0001_0001_0001_0001_0001_0001_0001_0001;
const SPLAT_32: u128 = 0x0000_0001_0000_0001_0000_0001_0000_0001;
const SPLAT_64: u128 = pack(1, 1);

#[inline(always)]
fn shuffle_and_add(value: u128, add: u128) -> u128 {
    let bytes = value.to_le_bytes();
    let mut shuffled = [0u8; 16];
    for (dst, &src) in shuffled.iter_mut().zip(SHUFFLE.iter()) {
        *dst = bytes[src as usize];
    }
    let shuffled = u128::from_le_bytes(shuffled);
    let lo = (shuffled as u64).wrapping_add(add as u64);
    let hi = ((shuffled >> 64) as u64).wrapping_add((add >> 64) as u64);
    pack(lo, hi)
}

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        mod arch {
            #[cfg(target_arch = "x86")]
            use core::arch::x86::{__m128i, _mm_aesdec_si128, _mm_aesenc_si128};
            #[cfg(target_arch = "x86_64")]
            use core::arch::x86_64::{__m128i, _mm_aesdec_si128, _mm_aesenc_si128};
            use core::mem::transmute;

            pub(super) fn supported() -> bool {
                #[cfg(target_feature = "aes")]
                {
                    return true;
                }

                #[cfg(all(not(target_feature = "aes"), feature = "std"))]
                {
                    return std::arch::is_x86_feature_detected!("aes");
                }

                #[allow(unreachable_code)]
                false
            }

            /// One AES encryption round (`ShiftRows`, `SubBytes`,
            /// `MixColumns`, then xor `key`).
            ///
            /// # Safety
            ///
            /// The CPU must support AES-NI.
            #[inline]
            #[target_feature(enable = "aes")]
            pub(super) unsafe fn aesenc(value: u128, key: u128) -> u128 {
                // SAFETY: `u128` and `__m128i` are both 16 bytes of plain data.
                unsafe {
                    let value = transmute::<u128, __m128i>(value);
                    let key = transmute::<u128, __m128i>(key);
                    transmute::<__m128i, u128>(_mm_aesenc_si128(value, key))
                }
            }

            /// One AES decryption round (inverse steps, then xor `key`).
            ///
            /// # Safety
            ///
            /// The CPU must support AES-NI.
            #[inline]
            #[target_feature(enable = "aes")]
            pub(super) unsafe fn aesdec(value: u128, key: u128) -> u128 {
                // SAFETY: `u128` and `__m128i` are both 16 bytes of plain data.
                unsafe {
                    let value = transmute::<u128, __m128i>(value);
                    let key = transmute::<u128, __m128i>(key);
                    transmute::<__m128i, u128>(_mm_aesdec_si128(value, key))
                }
            }
        }
    } else if #[cfg(target_arch = "aarch64")] {
        mod arch {
            use core::arch::aarch64::{
                uint8x16_t, vaesdq_u8, vaeseq_u8, vaesimcq_u8, vaesmcq_u8, vdupq_n_u8, veorq_u8,
            };
            use core::mem::transmute;

            pub(super) fn supported() -> bool {
                #[cfg(target_feature = "aes")]
                {
                    return true;
                }

                #[cfg(all(not(target_feature = "aes"), feature = "std"))]
                {
                    return std::arch::is_aarch64_feature_detected!("aes");
                }

                #[allow(unreachable_code)]
                false
            }

            /// One AES encryption round with the x86 `aesenc` semantics.
            ///
            /// `AESE` xors its key before the S-box, so it runs with a zero key
            /// and the real key is applied after `AESMC`.
            ///
            /// # Safety
            ///
            /// The CPU must support the ARMv8 crypto extension.
            #[inline]
            #[target_feature(enable = "aes")]
            pub(super) unsafe fn aesenc(value: u128, key: u128) -> u128 {
                // SAFETY: `u128` and `uint8x16_t` are both 16 bytes of plain data.
                unsafe {
                    let value = transmute::<u128, uint8x16_t>(value);
                    let key = transmute::<u128, uint8x16_t>(key);
                    let round = vaesmcq_u8(vaeseq_u8(value, vdupq_n_u8(0)));
                    transmute::<uint8x16_t, u128>(veorq_u8(round, key))
                }
            }

            /// One AES decryption round with the x86 `aesdec` semantics.
            ///
            /// # Safety
            ///
            /// The CPU must support the ARMv8 crypto extension.
            #[inline]
            #[target_feature(enable = "aes")]
            pub(super) unsafe fn aesdec(value: u128, key: u128) -> u128 {
                // SAFETY: `u128` and `uint8x16_t` are both 16 bytes of plain data.
                unsafe {
                    let value = transmute::<u128, uint8x16_t>(value);
                    let key = transmute::<u128, uint8x16_t>(key);
                    let round = vaesimcq_u8(vaesdq_u8(value, vdupq_n_u8(0)));
                    transmute::<uint8x16_t, u128>(veorq_u8(round, key))
                }
            }
        }
    } else {
        mod arch {
            pub(super) fn supported() -> bool {
                false
            }

            pub(super) unsafe fn aesenc(_value: u128, _key: u128) -> u128 {
                unreachable!("AES state built without AES instructions")
            }

            pub(super) unsafe fn aesdec(_value: u128, _key: u128) -> u128 {
                unreachable!("AES state built without AES instructions")
            }
        }
    }
}

/// Process-wide random keys, drawn from the OS on first use.
#[cfg(feature = "std")]
fn process_keys() -> (u128, u128) {
    use std::sync::OnceLock;

    use rand::TryRngCore;
    use rand::rngs::OsRng;

    static KEYS: OnceLock<(u128, u128)> = OnceLock::new();

    *KEYS.get_or_init(|| {
        let mut k1 = [0u8; 16];
        let mut k2 = [0u8; 16];
        let mut rng = OsRng;
        match rng
            .try_fill_bytes(&mut k1)
            .and_then(|()| rng.try_fill_bytes(&mut k2))
        {
            Ok(()) => {
                log::debug!("seeded AES hash keys from OS entropy");
                (u128::from_le_bytes(k1), u128::from_le_bytes(k2))
            }
            Err(err) => {
                log::warn!("OS entropy unavailable ({err}), seeding AES hash keys from addresses");
                let anchor = &KEYS as *const OnceLock<(u128, u128)> as u64;
                let local = &k1 as *const [u8; 16] as u64;
                let rapid = super::RapidState::with_seed(anchor);
                (
                    pack(rapid.hash_one(local), rapid.hash_one(anchor)),
                    pack(rapid.hash_one(!local), rapid.hash_one(!anchor)),
                )
            }
        }
    })
}

/// Builds [`AesHasher`]s from a pair of 128-bit keys.
///
/// Requires AES instructions: AES-NI on x86/x86_64 or the crypto extension
/// on aarch64. Construction reports [`Error::UnsupportedHardware`] when they
/// are missing; there is no software fallback, so select another mixer (for
/// example [`RapidState`](super::RapidState)) on such machines.
#[derive(Clone, Copy)]
pub struct AesState {
    enc: u128,
    sum: u128,
    key: u128,
}

impl AesState {
    /// Whether this CPU can run the AES mixer.
    pub fn is_supported() -> bool {
        arch::supported()
    }

    /// A state seeded from explicit keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHardware`] if the CPU lacks AES
    /// instructions.
    pub fn with_keys(key1: u128, key2: u128) -> Result<Self, Error> {
        if !arch::supported() {
            return Err(Error::UnsupportedHardware);
        }
        let enc = key1 ^ PI0;
        let sum = key2 ^ PI1;
        Ok(Self {
            enc,
            sum,
            key: enc ^ sum,
        })
    }

    /// A state seeded from the process-wide random keys. Every state created
    /// this way in one process hashes identically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHardware`] if the CPU lacks AES
    /// instructions.
    #[cfg(feature = "std")]
    pub fn try_new() -> Result<Self, Error> {
        let (key1, key2) = process_keys();
        Self::with_keys(key1, key2)
    }
}

/// # Panics
///
/// Panics if the CPU lacks AES instructions.
#[cfg(feature = "std")]
impl Default for AesState {
    fn default() -> Self {
        Self::try_new().unwrap_or_else(|err| fatal(err))
    }
}

impl Debug for AesState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesState").finish_non_exhaustive()
    }
}

impl BuildHasher for AesState {
    type Hasher = AesHasher;

    #[inline]
    fn build_hasher(&self) -> AesHasher {
        AesHasher {
            enc: self.enc,
            sum: self.sum,
            key: self.key,
        }
    }
}

/// Hasher driving two 128-bit lanes with hardware AES rounds.
///
/// Each written block runs one decryption round on `enc` (keyed by the
/// block) and a byte shuffle plus lane-wise add on `sum`. `finish` encrypts
/// `sum` under `enc` and runs two more decryption rounds before returning the
/// low 64 bits. Integers are broadcast across the whole block, byte slices
/// are consumed as zero-padded 16-byte little-endian blocks.
#[derive(Clone, Copy)]
pub struct AesHasher {
    enc: u128,
    sum: u128,
    key: u128,
}

impl AesHasher {
    #[inline(always)]
    fn write_block(&mut self, block: u128) {
        // SAFETY: An `AesHasher` only comes from an `AesState`, whose
        // constructor verified AES support.
        self.enc = unsafe { arch::aesdec(self.enc, block) };
        self.sum = shuffle_and_add(self.sum, block);
    }
}

impl Debug for AesHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesHasher").finish_non_exhaustive()
    }
}

impl Hasher for AesHasher {
    #[inline]
    fn finish(&self) -> u64 {
        // SAFETY: See `write_block`.
        let result = unsafe {
            let combined = arch::aesenc(self.sum, self.enc);
            arch::aesdec(arch::aesdec(combined, self.key), combined)
        };
        result as u64
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(16);
        for chunk in &mut chunks {
            let mut block = [0u8; 16];
            block.copy_from_slice(chunk);
            self.write_block(u128::from_le_bytes(block));
        }
        let rest = chunks.remainder();
        if !rest.is_empty() {
            let mut block = [0u8; 16];
            block[..rest.len()].copy_from_slice(rest);
            self.write_block(u128::from_le_bytes(block));
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.write_block(i as u128 * SPLAT_8);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.write_block(i as u128 * SPLAT_16);
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.write_block(i as u128 * SPLAT_32);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.write_block(i as u128 * SPLAT_64);
    }

    #[inline]
    fn write_u128(&mut self, i: u128) {
        self.write_block(i);
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const KEY1: u128 = 0x0123_4567_89ab_cdef_fedc_ba98_7654_3210;
    const KEY2: u128 = 0x0f1e_2d3c_4b5a_6978_8796_a5b4_c3d2_e1f0;

    fn fixed_state() -> Option<AesState> {
        match AesState::with_keys(KEY1, KEY2) {
            Ok(state) => Some(state),
            Err(err) => {
                assert_eq!(err, Error::UnsupportedHardware);
                assert!(!AesState::is_supported());
                None
            }
        }
    }

    #[test]
    fn shuffle_and_add_permutes_then_adds_lanes() {
        let value = u128::from_le_bytes(core::array::from_fn(|i| i as u8));
        let shuffled = shuffle_and_add(value, 0);
        assert_eq!(shuffled.to_le_bytes(), SHUFFLE);

        // Lanes add independently, without carrying into each other.
        assert_eq!(shuffle_and_add(u128::MAX, pack(1, 0)), pack(0, u64::MAX));
        assert_eq!(shuffle_and_add(0, pack(5, 6)), pack(5, 6));
    }

    #[test]
    fn splat_broadcasts_every_lane() {
        assert_eq!((0xabu128 * SPLAT_8).to_le_bytes(), [0xab; 16]);
        assert_eq!(0xbeefu128 * SPLAT_16, 0xbeef_beef_beef_beef_beef_beef_beef_beef);
        assert_eq!(
            0xdead_beefu128 * SPLAT_32,
            0xdead_beef_dead_beef_dead_beef_dead_beef
        );
        assert_eq!(7u128 * SPLAT_64, pack(7, 7));
    }

    #[test]
    fn known_answers_with_fixed_keys() {
        let Some(state) = fixed_state() else {
            return;
        };
        assert_eq!(state.hash_one(0u64), 0x5098_07b0_cc89_7f26);
        assert_eq!(state.hash_one(42u64), 0x0eb8_261a_2e06_11bb);
        assert_eq!(state.hash_one(7i32), 0x0b83_9186_d08d_6277);

        let mut hasher = state.build_hasher();
        hasher.write_u64(1);
        hasher.write_u64(2);
        assert_eq!(hasher.finish(), 0x3e2f_dcce_37c8_81c2);

        let bytes: [u8; 20] = core::array::from_fn(|i| i as u8);
        let mut hasher = state.build_hasher();
        hasher.write(&bytes);
        assert_eq!(hasher.finish(), 0x07fd_d7a4_a3df_4158);
    }

    #[cfg(feature = "std")]
    #[test]
    fn process_keys_are_shared() {
        let (Ok(a), Ok(b)) = (AesState::try_new(), AesState::try_new()) else {
            assert!(!AesState::is_supported());
            return;
        };
        assert_eq!(a.hash_one(99u64), b.hash_one(99u64));
        assert_ne!(a.hash_one(99u64), a.hash_one(100u64));
    }
}
