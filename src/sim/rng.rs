//! Seeded xorshift generator for the simulation host.

/// Simple xorshift64 RNG for deterministic simulations.
#[derive(Debug, Clone)]
pub(crate) struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed.
    pub(crate) const fn new(seed: u64) -> Self {
        // Ensure non-zero state
        let state = if seed == 0 { 0x5555_5555_5555_5555 } else { seed };
        Self { state }
    }

    /// Generate next random u64.
    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Random index in `[0, len)`; 0 when `len` is 0.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_u64() % len as u64) as usize
    }

    /// Random coordinate in `[0, max)`.
    pub(crate) fn coord(&mut self, max: i32) -> i32 {
        let len = usize::try_from(max).unwrap_or(0);
        i32::try_from(self.below(len)).unwrap_or(0)
    }

    /// Random step in `-1..=1`.
    pub(crate) fn step(&mut self) -> i32 {
        match self.below(3) {
            0 => -1,
            1 => 0,
            _ => 1,
        }
    }

    /// True with probability `p`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn chance(&mut self, p: f64) -> bool {
        (self.next_u64() as f64) / (u64::MAX as f64) < p
    }
}
