use crate::{Float, Point2f};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Per-kernel random sampler. Each worker owns one, seeded from its kernel
/// index, so pseudorandom streams never overlap across threads.
pub struct Sampler {
    rng: Xoshiro256Plus,
}

impl Sampler {
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256Plus::seed_from_u64(seed),
        }
    }

    pub fn get_1d(&mut self) -> Float {
        self.rng.gen()
    }

    pub fn get_2d(&mut self) -> Point2f {
        Point2f::new(self.rng.gen(), self.rng.gen())
    }
}
