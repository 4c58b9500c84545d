// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Closed-Loop Engine
// ─────────────────────────────────────────────────────────────────────
//! One tick:
//!   1. Apply perturbations due at this tick boundary
//!   2. Integrate V and E with the previous tick's drive and cost
//!   3. Recorder, coupling estimator, oscillation detectors (fed the
//!      region mean less the region's own drive response)
//!   4. Assemble features per region
//!   5. Policy scores → stabilizer → requested action
//!   6. Safety gates → allowed action
//!   7. Actuator → drive and cost for the next tick
//!   8. Emit events, extend the run trace

use std::sync::Arc;

use homeostat_control::{build_policy, PulseActuator, SafetyGates, ScoringPolicy, Stabilizer};
use homeostat_sensing::{CouplingEstimator, DriveResponse, OscillationDetector, Recorder};
use homeostat_tissue::{Grid, Regions, TissueIntegrator, TissueState};
use homeostat_types::{
    Action, EventRecord, FeatureVector, GateResult, HomeostatConfig, HomeostatError,
    HomeostatResult, OscillationStatus, RunSummary,
};

use crate::features::FeatureSources;
use crate::metrics::{flicker_rate, plv_retention, RunTrace};
use crate::perturbation::PerturbationSchedule;
use crate::sink::{EventSink, NullSink};

/// Everything one control region owns.
struct RegionControl {
    policy: Box<dyn ScoringPolicy>,
    stabilizer: Stabilizer,
    detector: OscillationDetector,
    response: DriveResponse,
    actuator: PulseActuator,
    features: Option<FeatureVector>,
    gate: Option<GateResult>,
    // Drive emitted last tick, integrated this tick
    drive: f64,
}

/// Closed-loop homeostat over one tissue patch.
pub struct HomeostatEngine {
    cfg: HomeostatConfig,
    grid: Grid,
    regions: Regions,
    state: TissueState,
    integrator: TissueIntegrator,
    recorder: Recorder,
    coupling: CouplingEstimator,
    gates: SafetyGates,
    controls: Vec<RegionControl>,
    schedule: PerturbationSchedule,
    sink: Arc<dyn EventSink>,
    // Actuator output per cell, consumed by the next integration step
    drive: Vec<f64>,
    cost: Vec<f64>,
    trace: RunTrace,
}

impl HomeostatEngine {
    /// Validate the configuration and build every component.
    pub fn new(cfg: HomeostatConfig) -> HomeostatResult<Self> {
        Self::with_sink(cfg, Arc::new(NullSink))
    }

    pub fn with_sink(cfg: HomeostatConfig, sink: Arc<dyn EventSink>) -> HomeostatResult<Self> {
        cfg.validate()?;

        let grid = Grid::from_config(&cfg.grid);
        let regions = Regions::from_config(&cfg.grid);
        let n_cells = grid.len();
        let n_regions = regions.count();
        let dt = cfg.tissue.dt_s;

        let state = TissueState::from_config(&cfg);
        let recorder = Recorder::new(&cfg.recorder, dt, cfg.tissue.healthy_ref_mv, &state.v);

        let mut controls = Vec::with_capacity(n_regions);
        for _ in 0..n_regions {
            controls.push(RegionControl {
                policy: build_policy(&cfg.decoder.policy)?,
                stabilizer: Stabilizer::from_config(&cfg.decoder),
                detector: OscillationDetector::new(&cfg.oscillator, dt),
                response: DriveResponse::new(cfg.tissue.g_leak, dt),
                actuator: PulseActuator::new(&cfg.actuation, dt),
                features: None,
                gate: None,
                drive: 0.0,
            });
        }

        log::info!(
            "homeostat: {}x{} grid, {} regions, policy={}, dt={}s, steps={}, seed={}",
            cfg.grid.rows,
            cfg.grid.cols,
            n_regions,
            controls
                .first()
                .map(|c| c.policy.name())
                .unwrap_or("none"),
            dt,
            cfg.tissue.steps,
            cfg.seed
        );

        Ok(Self {
            integrator: TissueIntegrator::new(&cfg),
            coupling: CouplingEstimator::new(n_regions, cfg.gates.coupling_window),
            gates: SafetyGates::new(&cfg, n_regions),
            schedule: PerturbationSchedule::new(&cfg.perturbations),
            trace: RunTrace::with_capacity(cfg.tissue.steps as usize),
            drive: vec![0.0; n_cells],
            cost: vec![0.0; n_cells],
            grid,
            regions,
            state,
            recorder,
            controls,
            sink,
            cfg,
        })
    }

    /// Advance one tick.
    pub fn step(&mut self) -> HomeostatResult<()> {
        let tick = self.state.tick;

        // 1-2: perturb, integrate
        self.schedule.apply_due(tick, &mut self.state, &self.regions);
        let scrambled = self.schedule.rhythm_scrambled(tick);
        if let Err(e) = self.integrator.step(
            &self.grid,
            &mut self.state,
            &self.drive,
            &self.cost,
            scrambled,
        ) {
            if let HomeostatError::NumericDivergence { tick, detail } = &e {
                log::error!("numeric divergence after tick {tick}: {detail}");
            }
            return Err(e);
        }

        // 3: observers
        self.recorder.update(&self.grid, &self.state.v);
        self.coupling.update(&self.grid, &self.regions, &self.state.v);
        for (r, ctl) in self.controls.iter_mut().enumerate() {
            let own = ctl.response.advance(ctl.drive);
            ctl.detector.update(self.regions.mean(r, &self.state.v) - own);
        }

        // 4-7: per-region decide, gate, act
        let sources = FeatureSources {
            state: &self.state,
            regions: &self.regions,
            recorder: &self.recorder,
            coupling: &self.coupling,
            energy: &self.cfg.energy,
        };
        let t = self.state.t;
        for (r, ctl) in self.controls.iter_mut().enumerate() {
            let features = sources.assemble(r, &ctl.detector);
            let scores = ctl.policy.scores(&features);
            let before = ctl.stabilizer.active();
            let requested = ctl.stabilizer.decide(&scores);
            if requested != before {
                self.trace.switch_times_s.push(t);
            }

            let gate = self.gates.evaluate(requested, &features);
            let out = ctl.actuator.step(&gate);
            for &cell in self.regions.cells(r) {
                self.drive[cell] = out.drive;
                self.cost[cell] = out.cost;
            }
            ctl.drive = out.drive;
            ctl.features = Some(features);
            ctl.gate = Some(gate);
        }

        // 8: events and trace
        if self.state.tick % self.cfg.logging.event_stride == 0 {
            for ctl in &self.controls {
                if let (Some(f), Some(g)) = (&ctl.features, &ctl.gate) {
                    self.sink.record(&event_record(self.state.tick, t, f, g, ctl.drive));
                }
            }
        }
        let known: Vec<f64> = self
            .controls
            .iter()
            .filter_map(|c| c.detector.plv().value())
            .collect();
        let plv = if known.is_empty() {
            None
        } else {
            Some(known.iter().sum::<f64>() / known.len() as f64)
        };
        self.trace.push(t, self.state.mean_v(), plv);
        Ok(())
    }

    /// Run the configured number of steps and summarize.
    pub fn run(&mut self) -> HomeostatResult<RunSummary> {
        for _ in 0..self.cfg.tissue.steps {
            self.step()?;
        }
        let summary = self.summary();
        log::info!(
            "run complete: {} ticks, recovery={:?}s, flicker={:.5}/region·s, plv_retention={:?}, V={:.2}mV, E={:.3}, blocks={}, caps={}",
            summary.ticks,
            summary.recovery_time_s,
            summary.flicker_rate,
            summary.plv_retention,
            summary.final_mean_v_mv,
            summary.final_mean_energy,
            summary.gate_blocks,
            summary.gate_caps
        );
        Ok(summary)
    }

    /// Summary of the ticks completed so far.
    pub fn summary(&self) -> RunSummary {
        let dt = self.cfg.tissue.dt_s;
        let s = &self.cfg.summary;
        let dwell = (s.recovery_dwell_s / dt).round() as usize;
        let duration = self.state.t;
        let observed = (duration - s.warmup_s).max(0.0);
        RunSummary {
            ticks: self.state.tick,
            duration_s: duration,
            recovery_time_s: self.trace.recovery_time(
                self.cfg.recorder.low_exit_mv,
                self.cfg.recorder.high_enter_mv,
                dwell,
            ),
            flicker_rate: flicker_rate(
                self.trace.switches_after(s.warmup_s),
                self.regions.count(),
                observed,
            ),
            plv_retention: plv_retention(
                &self.trace.plv,
                (s.plv_window_s / dt).round() as usize,
            ),
            final_mean_v_mv: self.state.mean_v(),
            final_mean_energy: self.state.mean_e(),
            gate_blocks: self.gates.blocks(),
            gate_caps: self.gates.caps(),
            pulses_started: self.controls.iter().map(|c| c.actuator.pulses_started()).sum(),
            action_switches: self.trace.switch_times_s.len() as u64,
        }
    }

    pub fn config(&self) -> &HomeostatConfig {
        &self.cfg
    }

    pub fn state(&self) -> &TissueState {
        &self.state
    }

    /// Mutable tissue state, for seeding non-uniform initial conditions
    /// before the first step.
    pub fn state_mut(&mut self) -> &mut TissueState {
        &mut self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn trace(&self) -> &RunTrace {
        &self.trace
    }

    pub fn step_count(&self) -> u64 {
        self.state.tick
    }

    pub fn active_action(&self, region: usize) -> Action {
        self.controls[region].stabilizer.active()
    }

    pub fn oscillation_status(&self, region: usize) -> OscillationStatus {
        self.controls[region].detector.status()
    }

    pub fn last_features(&self, region: usize) -> Option<&FeatureVector> {
        self.controls[region].features.as_ref()
    }

    pub fn last_gate(&self, region: usize) -> Option<&GateResult> {
        self.controls[region].gate.as_ref()
    }

    pub fn emin_eff(&self, region: usize) -> f64 {
        self.gates.emin_eff(region)
    }
}

fn event_record(tick: u64, t: f64, f: &FeatureVector, g: &GateResult, drive: f64) -> EventRecord {
    EventRecord {
        tick,
        time_s: t,
        region: f.region,
        requested: g.requested,
        allowed: g.allowed,
        capped: g.capped,
        reasons: g.reasons.clone(),
        mean_v_mv: f.mean_v_mv,
        low_occupancy_s: f.low_occupancy_s,
        mismatch: f.mismatch,
        energy: f.energy,
        plv: f.plv,
        global_v_offset_mv: f.global_v_offset_mv,
        domain_low_fraction: f.domain_low_fraction,
        coupling_estimate: f.coupling_estimate,
        redox_flag: f.redox_flag,
        pulse_amplitude_mv: drive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn small() -> HomeostatConfig {
        let mut cfg = HomeostatConfig::default();
        cfg.grid.rows = 4;
        cfg.grid.cols = 4;
        cfg.grid.region_rows = 2;
        cfg.grid.region_cols = 2;
        cfg.tissue.steps = 200;
        cfg
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let mut cfg = small();
        cfg.recorder.low_exit_mv = -20.0;
        assert!(matches!(
            HomeostatEngine::new(cfg),
            Err(HomeostatError::Config(_))
        ));
    }

    #[test]
    fn test_step_count_and_time() {
        let mut eng = HomeostatEngine::new(small()).unwrap();
        for _ in 0..10 {
            eng.step().unwrap();
        }
        assert_eq!(eng.step_count(), 10);
        assert!((eng.state().t - 10.0).abs() < 1e-12);
        assert_eq!(eng.trace().len(), 10);
    }

    #[test]
    fn test_event_stride() {
        let mut cfg = small();
        cfg.logging.event_stride = 5;
        cfg.tissue.steps = 20;
        let sink = Arc::new(MemorySink::new());
        let mut eng = HomeostatEngine::with_sink(cfg, sink.clone()).unwrap();
        eng.run().unwrap();
        // ticks 5, 10, 15, 20 × 4 regions
        assert_eq!(sink.len(), 16);
        let ev = sink.events();
        assert!(ev.iter().all(|e| e.tick % 5 == 0));
        assert_eq!(ev[0].region, 0);
        assert_eq!(ev[3].region, 3);
    }

    #[test]
    fn test_events_carry_allowed_not_above_requested() {
        let sink = Arc::new(MemorySink::new());
        let mut eng = HomeostatEngine::with_sink(small(), sink.clone()).unwrap();
        eng.run().unwrap();
        for e in sink.events() {
            if !e.requested.is_corrective() {
                assert_eq!(e.allowed, Action::Rest);
            }
            if e.allowed == Action::Rest && e.requested != Action::Rest {
                assert!(!e.reasons.is_empty(), "block without reason at tick {}", e.tick);
            }
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut eng = HomeostatEngine::new(small()).unwrap();
        let summary = eng.run().unwrap();
        assert_eq!(summary.ticks, 200);
        assert!((summary.duration_s - 200.0).abs() < 1e-9);
        assert!(summary.final_mean_v_mv.is_finite());
        assert!(summary.flicker_rate >= 0.0);
    }
}
