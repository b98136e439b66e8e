//! Seeded shuffling that produces the same permutations as CPython's `random.shuffle`.
//!
//! The generator is the 32-bit Mersenne Twister seeded from an integer the way CPython's
//! `random.seed(int)` does it. The shuffle is the Fisher-Yates variant that draws every index
//! by rejection sampling on the bit length of the bound.

use rand::{Error as RandError, RngCore};
use rand_core::impls;

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

#[derive(Debug, Clone)]
pub struct Mt19937 {
    state: Box<[u32; N]>,
    index: usize,
}

impl Mt19937 {
    /// Seeds with the 32-bit words of `seed`, least significant first.
    pub fn new(seed: u64) -> Self {
        let low = seed as u32;
        let high = (seed >> 32) as u32;
        if high == 0 {
            Self::with_key(&[low])
        } else {
            Self::with_key(&[low, high])
        }
    }

    fn with_key(key: &[u32]) -> Self {
        let mut mt = Self::with_seed(19_650_218);
        let state = &mut mt.state;
        let (mut i, mut j) = (1, 0);
        for _ in 0..N.max(key.len()) {
            let previous = state[i - 1] ^ (state[i - 1] >> 30);
            state[i] = (state[i] ^ previous.wrapping_mul(1_664_525))
                .wrapping_add(key[j])
                .wrapping_add(j as u32);
            i += 1;
            j += 1;
            if i >= N {
                state[0] = state[N - 1];
                i = 1;
            }
            if j >= key.len() {
                j = 0;
            }
        }
        for _ in 0..N - 1 {
            let previous = state[i - 1] ^ (state[i - 1] >> 30);
            state[i] = (state[i] ^ previous.wrapping_mul(1_566_083_941)).wrapping_sub(i as u32);
            i += 1;
            if i >= N {
                state[0] = state[N - 1];
                i = 1;
            }
        }
        state[0] = UPPER_MASK;
        mt
    }

    fn with_seed(seed: u32) -> Self {
        let mut state = Box::new([0u32; N]);
        state[0] = seed;
        for i in 1..N {
            let previous = state[i - 1] ^ (state[i - 1] >> 30);
            state[i] = previous.wrapping_mul(1_812_433_253).wrapping_add(i as u32);
        }
        Mt19937 { state, index: N }
    }

    fn twist(&mut self) {
        for k in 0..N {
            let y = (self.state[k] & UPPER_MASK) | (self.state[(k + 1) % N] & LOWER_MASK);
            let mut next = self.state[(k + M) % N] ^ (y >> 1);
            if y & 1 == 1 {
                next ^= MATRIX_A;
            }
            self.state[k] = next;
        }
        self.index = 0;
    }

    /// `bits` random bits, `1 <= bits <= 64`, built from 32-bit words like `getrandbits`.
    fn random_bits(&mut self, bits: u32) -> u64 {
        let mut value = 0u64;
        let mut remaining = bits;
        let mut shift = 0;
        while remaining > 0 {
            let mut word = u64::from(self.next_u32());
            if remaining < 32 {
                word >>= 32 - remaining;
            }
            value |= word << shift;
            shift += 32;
            remaining = remaining.saturating_sub(32);
        }
        value
    }

    /// Uniform index in `0..bound`. `bound` must be positive.
    pub fn below(&mut self, bound: usize) -> usize {
        let bound = bound as u64;
        let bits = u64::BITS - bound.leading_zeros();
        loop {
            let candidate = self.random_bits(bits);
            if candidate < bound {
                return candidate as usize;
            }
        }
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;
        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Shuffles `items` in place, swapping every position from the back with a drawn earlier one.
pub fn shuffle<T>(items: &mut [T], rng: &mut Mt19937) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_words() {
        let mut rng = Mt19937::new(1);
        let words: Vec<u32> = (0..3).map(|_| rng.next_u32()).collect();
        assert_eq!(words, vec![577_090_037, 2_444_712_010, 3_639_700_191]);

        let mut wide = Mt19937::new((1 << 40) + 3);
        assert_eq!(wide.next_u32(), 943_978_446);
    }

    #[test]
    fn test_shuffle() {
        let mut items: Vec<usize> = (0..10).collect();
        shuffle(&mut items, &mut Mt19937::new(1));
        assert_eq!(items, vec![6, 8, 9, 7, 5, 3, 0, 4, 1, 2]);

        let mut items: Vec<usize> = (0..10).collect();
        shuffle(&mut items, &mut Mt19937::new(7));
        assert_eq!(items, vec![8, 3, 1, 4, 7, 0, 9, 6, 2, 5]);

        let mut single = vec!['a'];
        shuffle(&mut single, &mut Mt19937::new(3));
        assert_eq!(single, vec!['a']);
    }

    #[test]
    fn test_below_stays_in_range() {
        let mut rng = Mt19937::new(42);
        for bound in [1, 2, 3, 7, 310, 1 << 33] {
            for _ in 0..50 {
                assert!(rng.below(bound) < bound);
            }
        }
    }
}
