// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Seeded Noise Streams
// ─────────────────────────────────────────────────────────────────────
//! One ChaCha8 stream per cell, keyed by (seed, cell id), so a cell's
//! noise sequence is independent of grid size and iteration order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Stream id reserved for the pacemaker phase scrambler.
pub const RHYTHM_STREAM: u64 = u64::MAX;

/// Build a generator for one stream of a seed.
pub fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Standard normal via Box-Muller (one draw per call).
pub fn next_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-300);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

pub struct NoiseBank {
    streams: Vec<ChaCha8Rng>,
}

impl NoiseBank {
    /// Streams `0..n`, one per cell.
    pub fn new(seed: u64, n: usize) -> Self {
        Self::with_streams(seed, &(0..n as u64).collect::<Vec<_>>())
    }

    /// Explicit stream ids; `ids[i]` feeds local cell `i`.
    pub fn with_streams(seed: u64, ids: &[u64]) -> Self {
        Self {
            streams: ids.iter().map(|&id| stream_rng(seed, id)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[inline]
    pub fn normal(&mut self, cell: usize) -> f64 {
        next_normal(&mut self.streams[cell])
    }
}
