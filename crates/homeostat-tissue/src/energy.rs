// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Energy Integrator
// ─────────────────────────────────────────────────────────────────────
//! Forward-Euler step of the per-cell energy reserve:
//!
//!   E ← E + dt·(k·I_pump(E) − α·cost − β·tnt_flux − γ·E)
//!
//! with `I_pump(E) = b + (1 − b)·E/(E + K)` and `tnt_flux = −Lap(E)`.

use homeostat_types::EnergyConfig;

use crate::grid::Grid;

/// Saturating pump output with basal production. Zero for negative E.
#[inline]
pub fn pump_output(e: f64, basal: f64, half_sat: f64) -> f64 {
    if e < 0.0 {
        return 0.0;
    }
    basal + (1.0 - basal) * e / (e + half_sat)
}

pub struct EnergyStepper {
    pub dt: f64,
    pub k_oxphos: f64,
    pub pump_basal: f64,
    pub pump_half_sat: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    lap: Vec<f64>,
    next: Vec<f64>,
}

impl EnergyStepper {
    pub fn new(cfg: &EnergyConfig, dt: f64, n_cells: usize) -> Self {
        Self {
            dt,
            k_oxphos: cfg.k_oxphos,
            pump_basal: cfg.pump_basal,
            pump_half_sat: cfg.pump_half_sat,
            alpha: cfg.alpha_actuation_cost,
            beta: cfg.beta_tnt_flux,
            gamma: cfg.gamma_decay,
            lap: vec![0.0; n_cells],
            next: vec![0.0; n_cells],
        }
    }

    /// Compute the next E into the scratch buffer; returns the first
    /// non-finite cell, if any.
    pub fn advance(&mut self, grid: &Grid, e: &[f64], cost: &[f64]) -> Option<usize> {
        let exchange = self.beta != 0.0;
        if exchange {
            grid.laplacian(e, &mut self.lap);
        }
        let mut first_bad = None;
        for i in 0..e.len() {
            let mut de = self.k_oxphos * pump_output(e[i], self.pump_basal, self.pump_half_sat)
                - self.alpha * cost[i]
                - self.gamma * e[i];
            if exchange {
                // −β·tnt_flux with tnt_flux = −Lap(E)
                de += self.beta * self.lap[i];
            }
            let ei = e[i] + self.dt * de;
            if first_bad.is_none() && !ei.is_finite() {
                first_bad = Some(i);
            }
            self.next[i] = ei;
        }
        first_bad
    }

    pub fn commit(&mut self, e: &mut Vec<f64>) {
        std::mem::swap(e, &mut self.next);
    }
}
