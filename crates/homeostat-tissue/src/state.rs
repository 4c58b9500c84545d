// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Tissue State & Coupled Step
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use homeostat_types::{HomeostatConfig, HomeostatError, HomeostatResult};

use crate::grid::Grid;
use crate::membrane::MembraneStepper;
use crate::energy::EnergyStepper;
use crate::noise::NoiseBank;

/// Snapshot of every cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TissueState {
    /// Membrane potential per cell (mV).
    pub v: Vec<f64>,
    /// Energy reserve per cell. Not clamped.
    pub e: Vec<f64>,
    /// Simulation time (s).
    pub t: f64,
    /// Completed integration steps.
    pub tick: u64,
}

impl TissueState {
    pub fn uniform(n_cells: usize, v0: f64, e0: f64) -> Self {
        Self {
            v: vec![v0; n_cells],
            e: vec![e0; n_cells],
            t: 0.0,
            tick: 0,
        }
    }

    pub fn from_config(cfg: &HomeostatConfig) -> Self {
        Self::uniform(cfg.grid.cell_count(), cfg.tissue.v0_mv, cfg.energy.e0)
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn mean_v(&self) -> f64 {
        mean(&self.v)
    }

    pub fn mean_e(&self) -> f64 {
        mean(&self.e)
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Membrane and energy steppers advanced together.
///
/// Both read the previous tick; nothing is committed unless every cell of
/// both fields stays finite.
pub struct TissueIntegrator {
    pub membrane: MembraneStepper,
    pub energy: EnergyStepper,
    dt: f64,
}

impl TissueIntegrator {
    pub fn new(cfg: &HomeostatConfig) -> Self {
        let n = cfg.grid.cell_count();
        Self::with_noise(cfg, NoiseBank::new(cfg.seed, n))
    }

    pub fn with_noise(cfg: &HomeostatConfig, noise: NoiseBank) -> Self {
        let n = noise.len();
        Self {
            membrane: MembraneStepper::with_noise(&cfg.tissue, cfg.seed, noise),
            energy: EnergyStepper::new(&cfg.energy, cfg.tissue.dt_s, n),
            dt: cfg.tissue.dt_s,
        }
    }

    /// Advance one tick. `drive` (mV/s) and `cost` are per cell.
    ///
    /// On divergence the state is left at the last valid tick.
    pub fn step(
        &mut self,
        grid: &Grid,
        state: &mut TissueState,
        drive: &[f64],
        cost: &[f64],
        rhythm_scrambled: bool,
    ) -> HomeostatResult<()> {
        let n = state.len();
        if grid.len() != n || drive.len() != n || cost.len() != n || state.e.len() != n {
            return Err(HomeostatError::Validation(format!(
                "tissue step: grid={} v={} e={} drive={} cost={}",
                grid.len(),
                n,
                state.e.len(),
                drive.len(),
                cost.len()
            )));
        }

        if let Some(i) = self
            .membrane
            .advance(grid, &state.v, drive, state.t, rhythm_scrambled)
        {
            return Err(HomeostatError::NumericDivergence {
                tick: state.tick,
                detail: format!("V[{i}] = {}", self.membrane.pending()[i]),
            });
        }
        if let Some(i) = self.energy.advance(grid, &state.e, cost) {
            return Err(HomeostatError::NumericDivergence {
                tick: state.tick,
                detail: format!("E[{i}] is not finite"),
            });
        }

        self.membrane.commit(&mut state.v);
        self.energy.commit(&mut state.e);
        state.tick += 1;
        state.t = state.tick as f64 * self.dt;
        Ok(())
    }
}
