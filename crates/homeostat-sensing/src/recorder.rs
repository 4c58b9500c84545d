// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Recorder
// ─────────────────────────────────────────────────────────────────────
//! Per-cell Schmitt banding with a leaky time-in-LOW accumulator, neighbor
//! mismatch, whole-patch LOW fraction and a slow mean-V estimate.

use serde::{Deserialize, Serialize};

use homeostat_tissue::{Grid, Regions};
use homeostat_types::RecorderConfig;

/// Voltage band of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Low,
    Mid,
    High,
}

/// Schmitt transition. Depends only on the previous band and current V.
pub fn next_band(prev: Band, v: f64, cfg: &RecorderConfig) -> Band {
    let from_mid = |v: f64| {
        if v <= cfg.low_enter_mv {
            Band::Low
        } else if v >= cfg.high_enter_mv {
            Band::High
        } else {
            Band::Mid
        }
    };
    match prev {
        Band::Low if v < cfg.low_exit_mv => Band::Low,
        Band::High if v > cfg.high_exit_mv => Band::High,
        _ => from_mid(v),
    }
}

pub struct Recorder {
    cfg: RecorderConfig,
    dt: f64,
    occ_decay: f64,
    ema_alpha: f64,
    healthy_ref: f64,
    bands: Vec<Band>,
    occupancy: Vec<f64>,
    v_ema: Vec<f64>,
    mismatch: Vec<f64>,
    low_fraction: f64,
}

impl Recorder {
    /// Bands start from MID classification of `v0`; the EMA starts at `v0`.
    pub fn new(cfg: &RecorderConfig, dt: f64, healthy_ref: f64, v0: &[f64]) -> Self {
        let bands: Vec<Band> = v0.iter().map(|&v| next_band(Band::Mid, v, cfg)).collect();
        let low_fraction = fraction_low(&bands);
        Self {
            cfg: cfg.clone(),
            dt,
            occ_decay: (-dt / cfg.tau_low_s).exp(),
            ema_alpha: 1.0 - (-dt / cfg.v_mean_tau_s).exp(),
            healthy_ref,
            bands,
            occupancy: vec![0.0; v0.len()],
            v_ema: v0.to_vec(),
            mismatch: vec![0.0; v0.len()],
            low_fraction,
        }
    }

    /// Fold the state of one completed tick into the recorder.
    pub fn update(&mut self, grid: &Grid, v: &[f64]) {
        let thr = self.cfg.mismatch_threshold_mv;
        for i in 0..v.len() {
            let band = next_band(self.bands[i], v[i], &self.cfg);
            self.bands[i] = band;
            let low = if band == Band::Low { self.dt } else { 0.0 };
            self.occupancy[i] = self.occupancy[i] * self.occ_decay + low;
            self.v_ema[i] += self.ema_alpha * (v[i] - self.v_ema[i]);

            // reflective edges point back at the cell; those are not neighbors
            let (mut real, mut differing) = (0usize, 0usize);
            for &n in grid.neighbors(i).iter().filter(|&&n| n != i) {
                real += 1;
                if (v[n] - v[i]).abs() > thr {
                    differing += 1;
                }
            }
            self.mismatch[i] = if real == 0 {
                0.0
            } else {
                differing as f64 / real as f64
            };
        }
        self.low_fraction = fraction_low(&self.bands);
    }

    pub fn band(&self, cell: usize) -> Band {
        self.bands[cell]
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// LOW occupancy per cell (s).
    pub fn occupancy(&self) -> &[f64] {
        &self.occupancy
    }

    pub fn mismatch(&self) -> &[f64] {
        &self.mismatch
    }

    pub fn v_ema(&self) -> &[f64] {
        &self.v_ema
    }

    /// Fraction of all grid cells currently LOW.
    pub fn domain_low_fraction(&self) -> f64 {
        self.low_fraction
    }

    /// Whole-patch depolarization: local contrast is unreliable.
    pub fn domain_pathology(&self) -> bool {
        self.low_fraction > self.cfg.domain_low_fraction_threshold
    }

    pub fn region_occupancy(&self, regions: &Regions, region: usize) -> f64 {
        regions.mean(region, &self.occupancy)
    }

    pub fn region_mismatch(&self, regions: &Regions, region: usize) -> f64 {
        regions.mean(region, &self.mismatch)
    }

    /// `healthy_ref − mean(EMA V)` over the region. Positive when sunk
    /// toward LOW.
    pub fn global_v_offset(&self, regions: &Regions, region: usize) -> f64 {
        self.healthy_ref - regions.mean(region, &self.v_ema)
    }
}

fn fraction_low(bands: &[Band]) -> f64 {
    if bands.is_empty() {
        return 0.0;
    }
    bands.iter().filter(|b| **b == Band::Low).count() as f64 / bands.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeostat_types::{Boundary, GridConfig};

    fn cfg() -> RecorderConfig {
        RecorderConfig::default()
    }

    #[test]
    fn test_low_band_hysteresis() {
        let c = cfg();
        let mut b = next_band(Band::Mid, -16.0, &c);
        assert_eq!(b, Band::Low);
        // anywhere inside (low_enter, low_exit) keeps LOW
        for v in [-14.9, -12.0, -9.0, -8.01] {
            b = next_band(b, v, &c);
            assert_eq!(b, Band::Low, "V={v} must hold LOW");
        }
        b = next_band(b, -8.0, &c);
        assert_eq!(b, Band::Mid);
        // and re-entry needs low_enter again
        b = next_band(b, -12.0, &c);
        assert_eq!(b, Band::Mid);
    }

    #[test]
    fn test_high_band_hysteresis() {
        let c = cfg();
        let mut b = next_band(Band::Mid, 10.0, &c);
        assert_eq!(b, Band::High);
        b = next_band(b, 6.0, &c);
        assert_eq!(b, Band::High);
        b = next_band(b, 5.0, &c);
        assert_eq!(b, Band::Mid);
    }

    #[test]
    fn test_jump_across_bands() {
        let c = cfg();
        assert_eq!(next_band(Band::Low, 20.0, &c), Band::High);
        assert_eq!(next_band(Band::High, -30.0, &c), Band::Low);
    }

    #[test]
    fn test_occupancy_is_leaky_seconds() {
        let c = cfg();
        let grid = Grid::new(1, 1, Boundary::Periodic);
        let mut rec = Recorder::new(&c, 1.0, -5.0, &[-20.0]);
        for _ in 0..600 {
            rec.update(&grid, &[-20.0]);
        }
        let q: f64 = (-1.0f64 / 600.0).exp();
        let expected = (1.0 - q.powi(600)) / (1.0 - q);
        assert!((rec.occupancy()[0] - expected).abs() < 1e-9);
        assert!(rec.occupancy()[0] < 600.0);

        let peak = rec.occupancy()[0];
        for _ in 0..600 {
            rec.update(&grid, &[-2.0]);
        }
        assert!((rec.occupancy()[0] - peak * q.powi(600)).abs() < 1e-9);
    }

    #[test]
    fn test_mismatch_fraction() {
        let c = cfg();
        let grid = Grid::new(1, 3, Boundary::Reflective);
        let v = [-20.0, -5.0, -6.0];
        let mut rec = Recorder::new(&c, 1.0, -5.0, &v);
        rec.update(&grid, &v);
        // cell 0: its one real neighbor (cell 1) differs
        assert!((rec.mismatch()[0] - 1.0).abs() < 1e-12);
        // cell 1: left neighbor differs by 15 mV, right by 1 mV
        assert!((rec.mismatch()[1] - 0.5).abs() < 1e-12);
        assert!((rec.mismatch()[2] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatch_isolated_edge_and_corner_cells() {
        let c = cfg();
        let strip = Grid::new(1, 3, Boundary::Reflective);
        let v = [-20.0, -5.0, -5.0];
        let mut rec = Recorder::new(&c, 1.0, -5.0, &v);
        rec.update(&strip, &v);
        assert!((rec.mismatch()[0] - 1.0).abs() < 1e-12);
        assert!((rec.mismatch()[1] - 0.5).abs() < 1e-12);
        assert_eq!(rec.mismatch()[2], 0.0);

        let square = Grid::new(3, 3, Boundary::Reflective);
        let mut v = [-5.0; 9];
        v[0] = -20.0;
        let mut rec = Recorder::new(&c, 1.0, -5.0, &v);
        rec.update(&square, &v);
        assert!((rec.mismatch()[0] - 1.0).abs() < 1e-12);
        // cell 1 sees the corner as one of its three real neighbors
        assert!((rec.mismatch()[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(rec.mismatch()[4], 0.0);
    }

    #[test]
    fn test_mismatch_without_neighbors_is_zero() {
        let grid = Grid::new(1, 1, Boundary::Reflective);
        let mut rec = Recorder::new(&cfg(), 1.0, -5.0, &[-20.0]);
        rec.update(&grid, &[-20.0]);
        assert_eq!(rec.mismatch()[0], 0.0);
    }

    #[test]
    fn test_domain_fraction_and_pathology() {
        let c = cfg();
        let grid = Grid::new(2, 2, Boundary::Periodic);
        let v = [-20.0, -20.0, -5.0, -5.0];
        let mut rec = Recorder::new(&c, 1.0, -5.0, &v);
        rec.update(&grid, &v);
        assert!((rec.domain_low_fraction() - 0.5).abs() < 1e-12);
        assert!(rec.domain_pathology());
        let v = [-20.0, -5.0, -5.0, -5.0];
        rec.update(&grid, &[-5.0, -5.0, -5.0, -5.0]);
        rec.update(&grid, &v);
        assert!((rec.domain_low_fraction() - 0.25).abs() < 1e-12);
        assert!(!rec.domain_pathology());
    }

    #[test]
    fn test_global_offset_sign() {
        let c = cfg();
        let gc = GridConfig {
            rows: 1,
            cols: 2,
            region_rows: 1,
            region_cols: 1,
            ..GridConfig::default()
        };
        let grid = Grid::from_config(&gc);
        let regions = Regions::from_config(&gc);
        let mut rec = Recorder::new(&c, 1.0, -5.0, &[-20.0, -5.0]);
        rec.update(&grid, &[-20.0, -5.0]);
        assert!((rec.global_v_offset(&regions, 0) - 15.0).abs() < 1e-9);
        assert!(rec.global_v_offset(&regions, 1).abs() < 1e-9);
    }
}
