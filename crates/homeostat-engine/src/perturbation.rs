// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Perturbation Schedule
// ─────────────────────────────────────────────────────────────────────

use homeostat_tissue::{Regions, TissueState};
use homeostat_types::Perturbation;

/// Scheduled disturbances, applied at tick boundaries before integration.
#[derive(Debug, Clone, Default)]
pub struct PerturbationSchedule {
    items: Vec<Perturbation>,
}

impl PerturbationSchedule {
    pub fn new(items: &[Perturbation]) -> Self {
        Self {
            items: items.to_vec(),
        }
    }

    /// Apply every injury due at `tick`. Returns how many fired.
    pub fn apply_due(&self, tick: u64, state: &mut TissueState, regions: &Regions) -> usize {
        let mut fired = 0;
        for p in &self.items {
            if let Perturbation::Injury {
                at_tick,
                region,
                delta_v_mv,
                energy,
            } = p
            {
                if *at_tick != tick {
                    continue;
                }
                for &cell in regions.cells(*region) {
                    if let Some(dv) = delta_v_mv {
                        state.v[cell] += dv;
                    }
                    if let Some(e) = energy {
                        state.e[cell] = *e;
                    }
                }
                log::info!(
                    "tick {tick}: injury on region {region} (dV={delta_v_mv:?}, E={energy:?})"
                );
                fired += 1;
            }
        }
        fired
    }

    /// True while any rhythm dropout window covers `tick`.
    pub fn rhythm_scrambled(&self, tick: u64) -> bool {
        self.items.iter().any(|p| match p {
            Perturbation::RhythmDropout {
                start_tick,
                duration_ticks,
            } => tick >= *start_tick && tick - start_tick < *duration_ticks,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeostat_types::GridConfig;

    #[test]
    fn test_injury_hits_only_its_region() {
        let gc = GridConfig {
            rows: 2,
            cols: 2,
            region_rows: 1,
            region_cols: 2,
            ..GridConfig::default()
        };
        let regions = Regions::from_config(&gc);
        let mut state = TissueState::uniform(4, -5.0, 0.8);
        let sched = PerturbationSchedule::new(&[Perturbation::Injury {
            at_tick: 3,
            region: 1,
            delta_v_mv: Some(-12.0),
            energy: Some(0.1),
        }]);
        assert_eq!(sched.apply_due(2, &mut state, &regions), 0);
        assert_eq!(sched.apply_due(3, &mut state, &regions), 1);
        assert_eq!(state.v, vec![-5.0, -5.0, -17.0, -17.0]);
        assert_eq!(state.e, vec![0.8, 0.8, 0.1, 0.1]);
    }

    #[test]
    fn test_dropout_window_is_half_open() {
        let sched = PerturbationSchedule::new(&[Perturbation::RhythmDropout {
            start_tick: 10,
            duration_ticks: 5,
        }]);
        assert!(!sched.rhythm_scrambled(9));
        assert!(sched.rhythm_scrambled(10));
        assert!(sched.rhythm_scrambled(14));
        assert!(!sched.rhythm_scrambled(15));
    }
}
