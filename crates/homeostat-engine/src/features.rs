// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Feature Assembly
// ─────────────────────────────────────────────────────────────────────

use homeostat_sensing::{CouplingEstimator, OscillationDetector, Recorder};
use homeostat_tissue::{Regions, TissueState};
use homeostat_types::{EnergyConfig, FeatureVector};

/// Read-only view of everything the features are built from.
pub struct FeatureSources<'a> {
    pub state: &'a TissueState,
    pub regions: &'a Regions,
    pub recorder: &'a Recorder,
    pub coupling: &'a CouplingEstimator,
    pub energy: &'a EnergyConfig,
}

impl FeatureSources<'_> {
    pub fn assemble(&self, region: usize, detector: &OscillationDetector) -> FeatureVector {
        let regions = self.regions;
        let energy = regions.mean(region, &self.state.e);
        let low_energy_fraction = match &self.energy.adaptive_emin {
            Some(a) => {
                let cells = regions.cells(region);
                let low = cells
                    .iter()
                    .filter(|&&i| self.state.e[i] < a.low_energy_level)
                    .count();
                if cells.is_empty() {
                    0.0
                } else {
                    low as f64 / cells.len() as f64
                }
            }
            None => 0.0,
        };

        FeatureVector {
            region,
            mean_v_mv: regions.mean(region, &self.state.v),
            low_occupancy_s: self.recorder.region_occupancy(regions, region),
            mismatch: self.recorder.region_mismatch(regions, region),
            domain_low_fraction: self.recorder.domain_low_fraction(),
            domain_pathology: self.recorder.domain_pathology(),
            energy,
            low_energy_fraction,
            plv: detector.plv().value(),
            oscillation: detector.status(),
            global_v_offset_mv: self.recorder.global_v_offset(regions, region),
            coupling_estimate: self.coupling.estimate(regions, region),
            redox_flag: self.energy.redox_threshold.map(|th| energy < th),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeostat_tissue::Grid;
    use homeostat_types::{
        AdaptiveEminConfig, GridConfig, OscillationStatus, OscillatorConfig, RecorderConfig,
    };

    #[test]
    fn test_assemble_region_features() {
        let gc = GridConfig {
            rows: 1,
            cols: 4,
            region_rows: 1,
            region_cols: 2,
            ..GridConfig::default()
        };
        let grid = Grid::from_config(&gc);
        let regions = Regions::from_config(&gc);
        let mut state = TissueState::uniform(4, -5.0, 0.8);
        state.v = vec![-20.0, -20.0, -5.0, -5.0];
        state.e = vec![0.1, 0.5, 0.8, 0.8];
        let mut recorder = Recorder::new(&RecorderConfig::default(), 1.0, -5.0, &state.v);
        recorder.update(&grid, &state.v);
        let coupling = CouplingEstimator::new(regions.count(), 10);
        let energy = EnergyConfig {
            adaptive_emin: Some(AdaptiveEminConfig::default()),
            redox_threshold: Some(0.4),
            ..EnergyConfig::default()
        };
        let detector = OscillationDetector::new(&OscillatorConfig::default(), 1.0);
        let src = FeatureSources {
            state: &state,
            regions: &regions,
            recorder: &recorder,
            coupling: &coupling,
            energy: &energy,
        };

        let f = src.assemble(0, &detector);
        assert_eq!(f.region, 0);
        assert!((f.mean_v_mv + 20.0).abs() < 1e-12);
        assert!((f.energy - 0.3).abs() < 1e-12);
        assert!((f.low_energy_fraction - 0.5).abs() < 1e-12);
        assert_eq!(f.redox_flag, Some(true));
        assert!((f.low_occupancy_s - 1.0).abs() < 1e-12);
        assert!((f.domain_low_fraction - 0.5).abs() < 1e-12);
        assert!((f.global_v_offset_mv - 15.0).abs() < 1e-9);
        assert_eq!(f.plv, None);
        assert_eq!(f.oscillation, OscillationStatus::Insufficient);
        assert_eq!(f.coupling_estimate, None);

        let g = src.assemble(1, &detector);
        assert_eq!(g.redox_flag, Some(false));
        assert_eq!(g.low_occupancy_s, 0.0);
    }
}
