//! Synthetic data: random feature vectors and random lookup ids.
//!
//! Everything is driven by a seeded `StdRng` so two runs with the same seed
//! insert the same vectors and probe the same ids.

use crate::schema::{Vector, VectorId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 0xDEAD_BEEF_CAFE_1337;

pub struct VectorGenerator {
    rng: StdRng,
    columns: usize,
}

impl VectorGenerator {
    pub fn new(columns: u16, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            columns: columns as usize,
        }
    }

    /// One vector with every attribute drawn uniformly from `[0, 1)`.
    pub fn next_vector(&mut self) -> Vector {
        (0..self.columns).map(|_| self.rng.gen::<f64>()).collect()
    }

    /// A uniformly random id among the first `table_size` vectors.
    pub fn random_id(&mut self, table_size: u32) -> VectorId {
        self.rng.gen_range(0..table_size.max(1))
    }
}

/// `count` vectors from a fresh generator.
pub fn generate_vectors(count: usize, columns: u16, seed: u64) -> Vec<Vector> {
    let mut generator = VectorGenerator::new(columns, seed);
    (0..count).map(|_| generator.next_vector()).collect()
}
