//! A small pseudo random generator.
//!
//! Used to pick ephemeral ports. Nothing here is suitable for secrets, initial sequence numbers
//! come from the keyed generator in `layer::tcp` instead.

/// Xoroshiro256**, yes this is far too good.
#[derive(Copy, Clone, Debug, Hash)]
pub struct Xoroshiro256 {
    state: [u64; 4],
}

impl Xoroshiro256 {
    /// Expand a single seed into the full state.
    ///
    /// The state words are drawn from splitmix64 so that no seed, zero included, produces the
    /// all-zero state.
    pub fn new(seed: u64) -> Self {
        let mut mix = seed;
        let mut state = [0; 4];
        for word in state.iter_mut() {
            mix = mix.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = mix;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            *word = z ^ (z >> 31);
        }
        Xoroshiro256 { state }
    }

    /// Generate the next value.
    pub fn next(&mut self) -> u64 {
        let s = &mut self.state;
        let result_starstar = s[1]
            .wrapping_mul(5)
            .rotate_left(7)
            .wrapping_mul(9);

        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;

        s[3] = s[3].rotate_left(45);

        result_starstar
    }

    /// Generate the next value, truncated to 16 bits.
    pub fn next_u16(&mut self) -> u16 {
        (self.next() >> 48) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::Xoroshiro256;

    #[test]
    fn zero_seed_is_not_degenerate() {
        let mut prng = Xoroshiro256::new(0);
        let first = prng.next();
        let second = prng.next();
        assert_ne!(first, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn deterministic() {
        let mut a = Xoroshiro256::new(42);
        let mut b = Xoroshiro256::new(42);
        for _ in 0..16 {
            assert_eq!(a.next(), b.next());
        }
    }
}
