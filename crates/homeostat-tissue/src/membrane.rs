// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Membrane Integrator
// ─────────────────────────────────────────────────────────────────────
//! Euler-Maruyama step of the reduced RC membrane:
//!
//!   V ← V + dt·(−gL(V − EL) + D·Lap(V) + rhythm(t) + drive) + σ·√dt·ξ
//!
//! Writes into a pre-allocated buffer; the caller commits it.

use rand_chacha::ChaCha8Rng;
use rand::Rng;

use homeostat_types::{RhythmConfig, TissueConfig};

use crate::grid::Grid;
use crate::noise::{stream_rng, NoiseBank, RHYTHM_STREAM};

/// Shared pacemaker drive `A·sin(2πft + φ)`.
pub struct Rhythm {
    amplitude: f64,
    omega: f64,
    phase: f64,
    scrambler: ChaCha8Rng,
}

impl Rhythm {
    pub fn new(cfg: &RhythmConfig, seed: u64) -> Self {
        Self {
            amplitude: cfg.amplitude_mv,
            omega: std::f64::consts::TAU * cfg.frequency_hz,
            phase: cfg.phase_rad,
            scrambler: stream_rng(seed, RHYTHM_STREAM),
        }
    }

    pub fn is_active(&self) -> bool {
        self.amplitude != 0.0
    }

    /// Drive at time `t`. When `scrambled`, the phase is redrawn uniformly.
    pub fn sample(&mut self, t: f64, scrambled: bool) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        let phase = if scrambled {
            self.scrambler.gen::<f64>() * std::f64::consts::TAU
        } else {
            self.phase
        };
        self.amplitude * (self.omega * t + phase).sin()
    }
}

pub struct MembraneStepper {
    pub dt: f64,
    pub el: f64,
    pub g_leak: f64,
    pub coupling_d: f64,
    pub noise_amp: f64,
    noise: NoiseBank,
    rhythm: Rhythm,
    // Pre-allocated scratch
    lap: Vec<f64>,
    next: Vec<f64>,
}

impl MembraneStepper {
    pub fn new(cfg: &TissueConfig, seed: u64, n_cells: usize) -> Self {
        Self::with_noise(cfg, seed, NoiseBank::new(seed, n_cells))
    }

    /// Use an explicit noise bank (one stream per local cell).
    pub fn with_noise(cfg: &TissueConfig, seed: u64, noise: NoiseBank) -> Self {
        let n = noise.len();
        Self {
            dt: cfg.dt_s,
            el: cfg.el_mv,
            g_leak: cfg.g_leak,
            coupling_d: cfg.coupling_d,
            noise_amp: cfg.noise_amp,
            noise,
            rhythm: Rhythm::new(&cfg.rhythm, seed),
            lap: vec![0.0; n],
            next: vec![0.0; n],
        }
    }

    /// Compute the next V into the scratch buffer.
    ///
    /// Returns the index of the first non-finite cell, if any. `v` is not
    /// modified.
    pub fn advance(
        &mut self,
        grid: &Grid,
        v: &[f64],
        drive: &[f64],
        t: f64,
        rhythm_scrambled: bool,
    ) -> Option<usize> {
        let coupled = self.coupling_d != 0.0;
        if coupled {
            grid.laplacian(v, &mut self.lap);
        }
        let rhythm = self.rhythm.sample(t, rhythm_scrambled);
        let noise_scale = self.noise_amp * self.dt.sqrt();

        let mut first_bad = None;
        for i in 0..v.len() {
            let mut dv = -self.g_leak * (v[i] - self.el) + rhythm + drive[i];
            if coupled {
                dv += self.coupling_d * self.lap[i];
            }
            let mut vi = v[i] + self.dt * dv;
            if noise_scale != 0.0 {
                vi += noise_scale * self.noise.normal(i);
            }
            if first_bad.is_none() && !vi.is_finite() {
                first_bad = Some(i);
            }
            self.next[i] = vi;
        }
        first_bad
    }

    /// Swap the computed buffer into `v`.
    pub fn commit(&mut self, v: &mut Vec<f64>) {
        std::mem::swap(v, &mut self.next);
    }

    pub fn pending(&self) -> &[f64] {
        &self.next
    }
}
