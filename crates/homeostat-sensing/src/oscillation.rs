// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Oscillation Detector
// ─────────────────────────────────────────────────────────────────────
//! Phase-locking value of a region's mean-V rhythm.
//!
//! Pipeline, run on every new downsampled sample:
//!   1. Demean the window, forward FFT
//!   2. Keep positive in-band bins (doubled), zero the rest
//!   3. Inverse FFT → zero-phase band-passed analytic signal z_t
//!   4. φ_t = arg z_t − 2π k* t / N, k* the dominant in-band bin
//!   5. PLV = |mean exp(iφ_t)|
//!
//! A persistence timer turns "PLV below the floor" into "unhealthy" only
//! after `min_bad_duration_s`.
//!
//! The detector reads intrinsic tissue rhythm only. The engine subtracts
//! [`DriveResponse`], the membrane's response to the region's own pulses,
//! before a sample reaches [`OscillationDetector::update`].

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use homeostat_types::{OscillationStatus, OscillatorConfig};

/// PLV result. Too few samples is a state, never a degenerate 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlvEstimate {
    Insufficient,
    Value(f64),
}

impl PlvEstimate {
    pub fn value(self) -> Option<f64> {
        match self {
            PlvEstimate::Insufficient => None,
            PlvEstimate::Value(p) => Some(p),
        }
    }
}

/// Band limits and floors for one PLV evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PlvBand {
    pub lo_hz: f64,
    pub hi_hz: f64,
    pub sample_dt: f64,
    pub min_samples: usize,
    pub min_rms: f64,
}

impl PlvBand {
    pub fn from_config(cfg: &OscillatorConfig, dt: f64) -> Self {
        Self {
            lo_hz: cfg.band_lo_hz,
            hi_hz: cfg.band_hi_hz,
            sample_dt: cfg.sample_dt(dt),
            min_samples: cfg.min_samples,
            min_rms: cfg.min_rhythm_rms_mv,
        }
    }
}

/// Cached forward/inverse plans plus a work buffer for one window length.
pub struct PlvEstimator {
    band: PlvBand,
    planner: FftPlanner<f64>,
    plans: Option<(usize, Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>)>,
    buf: Vec<Complex<f64>>,
}

impl PlvEstimator {
    pub fn new(band: PlvBand) -> Self {
        Self {
            band,
            planner: FftPlanner::new(),
            plans: None,
            buf: Vec::new(),
        }
    }

    fn plans_for(&mut self, n: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        match &self.plans {
            Some((len, fwd, inv)) if *len == n => (Arc::clone(fwd), Arc::clone(inv)),
            _ => {
                let fwd = self.planner.plan_fft_forward(n);
                let inv = self.planner.plan_fft_inverse(n);
                self.plans = Some((n, Arc::clone(&fwd), Arc::clone(&inv)));
                (fwd, inv)
            }
        }
    }

    /// PLV of `samples` (oldest first).
    pub fn estimate(&mut self, samples: &[f64]) -> PlvEstimate {
        let n = samples.len();
        if n < self.band.min_samples.max(4) {
            return PlvEstimate::Insufficient;
        }
        let df = 1.0 / (n as f64 * self.band.sample_dt);
        let nyquist = n / 2;
        let in_band: Vec<usize> = (1..=nyquist)
            .filter(|&k| {
                let f = k as f64 * df;
                f >= self.band.lo_hz && f <= self.band.hi_hz
            })
            .collect();
        if in_band.is_empty() {
            return PlvEstimate::Insufficient;
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        self.buf.clear();
        self.buf
            .extend(samples.iter().map(|&x| Complex::new(x - mean, 0.0)));

        let (fwd, inv) = self.plans_for(n);
        fwd.process(&mut self.buf);

        let mut dominant = in_band[0];
        let mut dominant_mag = -1.0;
        for &k in &in_band {
            let mag = self.buf[k].norm_sqr();
            if mag > dominant_mag {
                dominant = k;
                dominant_mag = mag;
            }
        }

        // Analytic band-pass: double positive in-band bins, keep Nyquist
        // as is, drop DC and negative frequencies.
        for k in 0..n {
            let keep = in_band.binary_search(&k).is_ok();
            let w = if !keep {
                0.0
            } else if n % 2 == 0 && k == nyquist {
                1.0
            } else {
                2.0
            };
            self.buf[k] *= w;
        }
        inv.process(&mut self.buf);
        let scale = 1.0 / n as f64;

        let rms = (self
            .buf
            .iter()
            .map(|z| (z.re * scale).powi(2))
            .sum::<f64>()
            / n as f64)
            .sqrt();
        if rms < self.band.min_rms || rms == 0.0 {
            return PlvEstimate::Value(0.0);
        }

        let step = std::f64::consts::TAU * dominant as f64 / n as f64;
        let mut acc = Complex::new(0.0, 0.0);
        for (t, z) in self.buf.iter().enumerate() {
            let phase = z.arg() - step * t as f64;
            acc += Complex::from_polar(1.0, phase);
        }
        PlvEstimate::Value((acc.norm() / n as f64).clamp(0.0, 1.0))
    }
}

/// Per-region ring buffer, PLV and bad-coherence timer.
pub struct OscillationDetector {
    healthy_plv_min: f64,
    min_bad_duration_s: f64,
    downsample: usize,
    sample_dt: f64,
    ring: Vec<f64>,
    head: usize,
    count: usize,
    acc_ticks: usize,
    window: Vec<f64>,
    estimator: PlvEstimator,
    plv: PlvEstimate,
    bad_s: f64,
    status: OscillationStatus,
}

impl OscillationDetector {
    pub fn new(cfg: &OscillatorConfig, dt: f64) -> Self {
        let capacity = cfg.capacity(dt);
        if capacity < cfg.min_samples {
            log::warn!(
                "oscillation window holds {capacity} samples, fewer than min_samples={}; PLV will stay insufficient",
                cfg.min_samples
            );
        }
        Self {
            healthy_plv_min: cfg.healthy_plv_min,
            min_bad_duration_s: cfg.min_bad_duration_s,
            downsample: cfg.downsample.max(1),
            sample_dt: cfg.sample_dt(dt),
            ring: vec![0.0; capacity],
            head: 0,
            count: 0,
            acc_ticks: 0,
            window: Vec::with_capacity(capacity),
            estimator: PlvEstimator::new(PlvBand::from_config(cfg, dt)),
            plv: PlvEstimate::Insufficient,
            bad_s: 0.0,
            status: OscillationStatus::Insufficient,
        }
    }

    /// Feed one tick's region mean V. Returns true when a sample was taken
    /// and the estimate refreshed.
    pub fn update(&mut self, mean_v: f64) -> bool {
        self.acc_ticks += 1;
        if self.acc_ticks < self.downsample {
            return false;
        }
        self.acc_ticks = 0;

        let cap = self.ring.len();
        self.ring[self.head] = mean_v;
        self.head = (self.head + 1) % cap;
        self.count = (self.count + 1).min(cap);

        self.window.clear();
        if self.count == cap {
            self.window.extend_from_slice(&self.ring[self.head..]);
            self.window.extend_from_slice(&self.ring[..self.head]);
        } else {
            self.window.extend_from_slice(&self.ring[..self.count]);
        }

        self.plv = self.estimator.estimate(&self.window);
        self.status = self.advance_timer(self.plv);
        true
    }

    fn advance_timer(&mut self, plv: PlvEstimate) -> OscillationStatus {
        match plv {
            PlvEstimate::Insufficient => {
                self.bad_s = 0.0;
                OscillationStatus::Insufficient
            }
            PlvEstimate::Value(p) if p >= self.healthy_plv_min => {
                self.bad_s = 0.0;
                OscillationStatus::Healthy
            }
            PlvEstimate::Value(_) => {
                self.bad_s += self.sample_dt;
                if self.bad_s >= self.min_bad_duration_s {
                    OscillationStatus::Unhealthy
                } else {
                    OscillationStatus::Dipping
                }
            }
        }
    }

    pub fn plv(&self) -> PlvEstimate {
        self.plv
    }

    pub fn status(&self) -> OscillationStatus {
        self.status
    }

    /// Seconds PLV has stayed below the floor.
    pub fn bad_seconds(&self) -> f64 {
        self.bad_s
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }
}

/// Leak-only membrane response of a region mean to its own actuator drive.
///
/// Integrated with the same explicit step as the membrane, so for an
/// uncoupled region `mean V − level` is the voltage the tissue would have
/// had without actuation. Diffusion across region borders is not modelled.
#[derive(Debug, Clone, Copy)]
pub struct DriveResponse {
    g_leak: f64,
    dt: f64,
    level: f64,
}

impl DriveResponse {
    pub fn new(g_leak: f64, dt: f64) -> Self {
        Self {
            g_leak,
            dt,
            level: 0.0,
        }
    }

    /// Advance one tick under the drive (mV/s) the tissue just integrated.
    pub fn advance(&mut self, drive: f64) -> f64 {
        self.level += self.dt * (-self.g_leak * self.level + drive);
        self.level
    }

    /// Accumulated response (mV).
    pub fn level(&self) -> f64 {
        self.level
    }
}
