use crate::{HEIGHT, WIDTH};

/// Default number of buckets, a prime to spread keys evenly
pub const TABLE_MAX_SIZE: usize = (1 << 23) + 9;

// every position key is below 2^KEY_BITS
const KEY_BITS: u32 = (WIDTH * (HEIGHT + 1)) as u32;

/// The part of a key stored in a bucket
///
/// Together with the bucket index `key % size` the stored part must identify
/// the full key. `u32` works for bitboard keys below `size * 2^32` when `size`
/// is odd, `u64` stores keys whole.
pub trait PartialKey: Copy + Default + PartialEq {
    /// Number of low key bits kept
    const BITS: u32;

    fn from_key(key: u64) -> Self;
}

impl PartialKey for u32 {
    const BITS: u32 = 32;

    fn from_key(key: u64) -> Self {
        key as u32
    }
}

impl PartialKey for u64 {
    const BITS: u32 = 64;

    fn from_key(key: u64) -> Self {
        key
    }
}

/// A fixed size cache from position keys to non-zero 8-bit values
///
/// Each bucket holds one entry and a new entry always replaces the old one.
/// A value of 0 means "no data" and must never be stored.
#[derive(Clone)]
pub struct TranspositionTable<K = u32> {
    keys: Vec<K>,
    values: Vec<u8>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::with_size(TABLE_MAX_SIZE)
    }
}

impl<K: PartialKey> TranspositionTable<K> {
    /// Creates a table with `size` buckets, `size` should be prime
    ///
    /// # Panics
    /// Panics if `size` is too small for the bucket index and the stored part of
    /// a position key to identify it, see [`TranspositionTable::min_size`].
    pub fn with_size(size: usize) -> Self {
        assert!(size > 0, "a transposition table needs at least one bucket");
        if K::BITS < KEY_BITS {
            assert!(
                size % 2 == 1 && size >= Self::min_size(),
                "a table storing {}-bit partial keys needs an odd size of at least {}, got {}",
                K::BITS,
                Self::min_size(),
                size
            );
        }
        Self {
            keys: vec![K::default(); size],
            values: vec![0; size],
        }
    }

    /// Smallest number of buckets that keeps position keys exact
    pub fn min_size() -> usize {
        if K::BITS >= KEY_BITS {
            1
        } else {
            (1 << (KEY_BITS - K::BITS)) + 1
        }
    }

    fn index(&self, key: u64) -> usize {
        (key % self.keys.len() as u64) as usize
    }

    pub fn put(&mut self, key: u64, value: u8) {
        let i = self.index(key);
        self.keys[i] = K::from_key(key);
        self.values[i] = value;
    }

    /// Returns the value stored for `key`, or 0 if there is none
    pub fn get(&self, key: u64) -> u8 {
        let i = self.index(key);
        if self.keys[i] == K::from_key(key) {
            self.values[i]
        } else {
            0
        }
    }

    pub fn reset(&mut self) {
        for key in self.keys.iter_mut() {
            *key = K::default();
        }
        for value in self.values.iter_mut() {
            *value = 0;
        }
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest prime greater than or equal to `n`
pub fn next_prime(n: usize) -> usize {
    fn is_prime(n: usize) -> bool {
        if n < 2 {
            return false;
        }
        let mut divisor = 2;
        while divisor * divisor <= n {
            if n % divisor == 0 {
                return false;
            }
            divisor += 1;
        }
        true
    }

    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}
