use core::hash::BuildHasher;
use core::hash::Hasher;

/// Seed used by [`RapidState::new`] and [`RapidState::default`].
pub const DEFAULT_SEED: u64 = 0xbdd8_9aa9_8270_4029;

const SECRET: [u64; 3] = [
    0x2d35_8dcc_aa6c_78a5,
    0x8bb8_4b93_962e_acc9,
    0x4b33_a62e_d433_d4a3,
];

#[inline(always)]
fn mum(a: u64, b: u64) -> (u64, u64) {
    let r = a as u128 * b as u128;
    (r as u64, (r >> 64) as u64)
}

#[inline(always)]
fn mix(a: u64, b: u64) -> u64 {
    let (lo, hi) = mum(a, b);
    lo ^ hi
}

#[inline(always)]
fn reseed(seed: u64, size: u64) -> u64 {
    seed ^ mix(seed ^ SECRET[0], SECRET[1]) ^ size
}

#[inline(always)]
fn read_u32(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf) as u64
}

#[inline(always)]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Two little-endian `u32` reads glued into one word, `top` in the high half.
#[inline(always)]
fn read_u32_pair(data: &[u8], top: usize, bottom: usize) -> u64 {
    (read_u32(data, top) << 32) | read_u32(data, bottom)
}

/// Builds [`RapidHasher`]s that all start from the same seed.
///
/// Unlike the AES mixer this one is fully portable and deterministic: the
/// same seed and the same writes produce the same hash on every platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RapidState {
    seed: u64,
}

impl RapidState {
    /// A state using [`DEFAULT_SEED`].
    pub const fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// A state using a caller-chosen seed.
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for RapidState {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildHasher for RapidState {
    type Hasher = RapidHasher;

    #[inline]
    fn build_hasher(&self) -> RapidHasher {
        RapidHasher::with_seed(self.seed)
    }
}

/// Streaming multiply-mix hasher from the wyhash/rapidhash family.
///
/// Every write first re-derives the seed from the running byte count, then
/// folds the new data into the `(a, b)` pair through a 64x64->128
/// multiplication. Integer writes take a fast single-word path; byte writes
/// read from both ends for short inputs and run three interleaved seeds over
/// 48/96-byte blocks for long ones.
#[derive(Clone, Copy, Debug)]
pub struct RapidHasher {
    seed: u64,
    a: u64,
    b: u64,
    size: u64,
}

impl RapidHasher {
    /// A fresh hasher starting from `seed`.
    pub const fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            a: 0,
            b: 0,
            size: 0,
        }
    }

    #[inline(always)]
    fn write_word(&mut self, data: u64) {
        self.size = self.size.wrapping_add(8);
        let seed = reseed(self.seed, self.size);

        let a = self.a ^ data ^ SECRET[1];
        let b = self.b ^ (data as u32 as u64) ^ seed;

        (self.a, self.b) = mum(a, b);
        self.seed = seed;
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.size = self.size.wrapping_add(data.len() as u64);
        let mut seed = reseed(self.seed, self.size);
        let mut a = self.a;
        let mut b = self.b;
        let len = data.len();

        if len <= 16 {
            if len >= 8 {
                let plast = len - 4;
                a ^= read_u32_pair(data, 0, plast);
                b ^= read_u32_pair(data, 4, plast - 4);
            } else if len >= 4 {
                let v = read_u32_pair(data, 0, len - 4);
                a ^= v;
                b ^= v;
            } else if len > 0 {
                a ^= ((data[0] as u64) << 56) | ((data[len >> 1] as u64) << 32) | data[len - 1] as u64;
            }
        } else {
            let mut slice = data;
            let mut see1 = seed;
            let mut see2 = seed;

            while slice.len() >= 96 {
                seed = mix(read_u64(slice, 0) ^ SECRET[0], read_u64(slice, 8) ^ seed);
                see1 = mix(read_u64(slice, 16) ^ SECRET[1], read_u64(slice, 24) ^ see1);
                see2 = mix(read_u64(slice, 32) ^ SECRET[2], read_u64(slice, 40) ^ see2);
                seed = mix(read_u64(slice, 48) ^ SECRET[0], read_u64(slice, 56) ^ seed);
                see1 = mix(read_u64(slice, 64) ^ SECRET[1], read_u64(slice, 72) ^ see1);
                see2 = mix(read_u64(slice, 80) ^ SECRET[2], read_u64(slice, 88) ^ see2);
                slice = &slice[96..];
            }
            if slice.len() >= 48 {
                seed = mix(read_u64(slice, 0) ^ SECRET[0], read_u64(slice, 8) ^ seed);
                see1 = mix(read_u64(slice, 16) ^ SECRET[1], read_u64(slice, 24) ^ see1);
                see2 = mix(read_u64(slice, 32) ^ SECRET[2], read_u64(slice, 40) ^ see2);
                slice = &slice[48..];
            }
            seed ^= see1 ^ see2;

            if slice.len() > 16 {
                seed = mix(
                    read_u64(slice, 0) ^ SECRET[2],
                    read_u64(slice, 8) ^ seed ^ SECRET[1],
                );
                if slice.len() > 32 {
                    seed = mix(read_u64(slice, 16) ^ SECRET[2], read_u64(slice, 24) ^ seed);
                }
            }

            // The tail reads may overlap bytes already consumed above.
            a ^= read_u64(data, len - 16);
            b ^= read_u64(data, len - 8);
        }

        a ^= SECRET[1];
        b ^= seed;

        (self.a, self.b) = mum(a, b);
        self.seed = seed;
    }
}

impl Default for RapidHasher {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl Hasher for RapidHasher {
    #[inline]
    fn finish(&self) -> u64 {
        mix(self.a ^ SECRET[0] ^ self.size, self.b ^ SECRET[1])
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.write_word(i as u64);
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.write_word(i as u64);
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.write_word(i as u64);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.write_word(i);
    }

    #[inline]
    fn write_u128(&mut self, i: u128) {
        self.write_bytes(&i.to_le_bytes());
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.write_word(i as u64);
    }

    // Signed integers are sign-extended to a full word.

    #[inline]
    fn write_i8(&mut self, i: i8) {
        self.write_word(i as i64 as u64);
    }

    #[inline]
    fn write_i16(&mut self, i: i16) {
        self.write_word(i as i64 as u64);
    }

    #[inline]
    fn write_i32(&mut self, i: i32) {
        self.write_word(i as i64 as u64);
    }

    #[inline]
    fn write_i64(&mut self, i: i64) {
        self.write_word(i as u64);
    }

    #[inline]
    fn write_isize(&mut self, i: isize) {
        self.write_word(i as i64 as u64);
    }
}
