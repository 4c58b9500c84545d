// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Closed-Loop Scenarios
// ─────────────────────────────────────────────────────────────────────
//! Whole-loop behavior on small, hand-checkable patches.

use std::sync::Arc;

use homeostat_types::{
    Action, AdaptiveEminConfig, Boundary, EventRecord, GateReason, HomeostatConfig,
    HomeostatError, MlpConfig, OscillationStatus, Perturbation, PolicyConfig,
};

use crate::engine::HomeostatEngine;
use crate::sink::MemorySink;

const CHRONIC_S: f64 = 180.0;

/// Single noiseless, uncoupled cell sitting at −20 mV with a constant
/// energy reserve. Oscillator and gates keep their defaults.
fn lone_depolarized_cell(e0: f64) -> HomeostatConfig {
    let mut cfg = HomeostatConfig::default();
    cfg.grid.rows = 1;
    cfg.grid.cols = 1;
    cfg.grid.region_rows = 1;
    cfg.grid.region_cols = 1;
    cfg.tissue.el_mv = -20.0;
    cfg.tissue.v0_mv = -20.0;
    cfg.tissue.coupling_d = 0.0;
    cfg.tissue.noise_amp = 0.0;
    cfg.tissue.steps = 600;
    cfg.energy.e0 = e0;
    cfg.energy.k_oxphos = 0.0;
    cfg.energy.alpha_actuation_cost = 0.0;
    cfg.energy.beta_tnt_flux = 0.0;
    cfg.energy.gamma_decay = 0.0;
    cfg
}

fn run_collect(cfg: HomeostatConfig) -> (HomeostatEngine, Vec<EventRecord>) {
    let sink = Arc::new(MemorySink::new());
    let mut eng = HomeostatEngine::with_sink(cfg, sink.clone()).unwrap();
    eng.run().unwrap();
    (eng, sink.drain())
}

fn pulse_onsets(events: &[EventRecord]) -> u64 {
    let mut prev = 0.0;
    let mut onsets = 0;
    for e in events {
        if prev == 0.0 && e.pulse_amplitude_mv != 0.0 {
            onsets += 1;
        }
        prev = e.pulse_amplitude_mv;
    }
    onsets
}

#[test]
fn test_chronic_depolarization_repaired_under_default_gates() {
    let mut cfg = lone_depolarized_cell(0.9);
    cfg.tissue.steps = 3000;
    let low_exit = cfg.recorder.low_exit_mv;
    let (eng, events) = run_collect(cfg);
    assert_eq!(events.len(), 3000);

    let first = events
        .iter()
        .position(|e| e.requested == Action::Repair)
        .expect("chronic LOW occupancy must trigger REPAIR");
    assert!(first > 0);
    assert!(events[first].low_occupancy_s >= CHRONIC_S);
    assert!(events[first - 1].low_occupancy_s < CHRONIC_S);
    assert!(events[..first].iter().all(|e| e.requested == Action::Rest));

    // The cell's own pulse train never counts as a healthy rhythm.
    assert!(events
        .iter()
        .all(|e| !e.reasons.contains(&GateReason::RhythmHealthy)));
    assert_eq!(eng.oscillation_status(0), OscillationStatus::Unhealthy);

    let full = events
        .iter()
        .find(|e| e.requested == Action::Repair && e.allowed == Action::Repair && !e.capped)
        .expect("REPAIR must eventually pass every gate uncapped");
    assert!(full.reasons.is_empty());
    assert!(events
        .iter()
        .any(|e| !e.capped && e.pulse_amplitude_mv > 0.0));
    assert!(
        events.iter().any(|e| e.mean_v_mv >= low_exit),
        "cell never left LOW"
    );

    // Leaving REPAIR happens only once the occupancy has decayed.
    let mut returns = 0;
    for pair in events.windows(2) {
        if pair[0].requested == Action::Repair && pair[1].requested == Action::Rest {
            assert!(
                pair[1].low_occupancy_s < CHRONIC_S,
                "REST at tick {} with occupancy {}",
                pair[1].tick,
                pair[1].low_occupancy_s
            );
            returns += 1;
        }
    }
    assert!(returns >= 1, "REPAIR never released");

    let summary = eng.summary();
    assert!(summary.pulses_started >= 1);
    assert_eq!(summary.pulses_started, pulse_onsets(&events));
}

#[test]
fn test_low_energy_caps_every_pulse() {
    let mut cfg = lone_depolarized_cell(0.15);
    cfg.tissue.steps = 400;
    cfg.gates.oscillation_enabled = false;
    let cap = cfg.actuation.low_energy_cap.amplitude_mv;
    let (eng, events) = run_collect(cfg);

    let mut driven = 0;
    for e in &events {
        assert!(e.energy < eng.emin_eff(0));
        if e.pulse_amplitude_mv != 0.0 {
            assert!(e.capped, "uncapped drive at tick {}", e.tick);
            assert!(e.pulse_amplitude_mv.abs() <= cap + 1e-12);
            driven += 1;
        }
    }
    assert!(driven > 0);
    let summary = eng.summary();
    assert!(summary.gate_caps > 0);
    assert_eq!(summary.gate_blocks, 0);
}

#[test]
fn test_unusable_cap_blocks_depleted_cell() {
    let mut cfg = lone_depolarized_cell(0.15);
    cfg.tissue.steps = 400;
    cfg.actuation.low_energy_cap.amplitude_mv = 0.0;
    let (eng, events) = run_collect(cfg);

    assert!(events.iter().any(|e| e.requested == Action::Repair));
    assert!(events
        .iter()
        .all(|e| e.allowed == Action::Rest && e.pulse_amplitude_mv == 0.0));
    assert!(eng.summary().gate_blocks > 0);
    assert_eq!(eng.summary().pulses_started, 0);
}

#[test]
fn test_geometry_gate_blocks_mismatched_coupled_region() {
    let ramp = |geometry: bool| {
        let mut cfg = HomeostatConfig::default();
        cfg.grid.rows = 1;
        cfg.grid.cols = 6;
        cfg.grid.boundary = Boundary::Reflective;
        cfg.grid.region_rows = 1;
        cfg.grid.region_cols = 6;
        cfg.tissue.g_leak = 0.0;
        cfg.tissue.coupling_d = 0.0;
        cfg.tissue.noise_amp = 0.0;
        cfg.tissue.v0_mv = -40.0;
        cfg.tissue.steps = 900;
        cfg.energy.e0 = 0.9;
        cfg.energy.k_oxphos = 0.0;
        cfg.energy.alpha_actuation_cost = 0.0;
        cfg.energy.beta_tnt_flux = 0.0;
        cfg.energy.gamma_decay = 0.0;
        cfg.gates.geometry_enabled = geometry;
        let sink = Arc::new(MemorySink::new());
        let mut eng = HomeostatEngine::with_sink(cfg, sink.clone()).unwrap();
        // 6 mV steps: every cell LOW, every neighbor pair apart
        for (i, v) in eng.state_mut().v.iter_mut().enumerate() {
            *v = -55.0 + 6.0 * i as f64;
        }
        eng.run().unwrap();
        (eng, sink.drain())
    };

    let (eng, events) = ramp(true);
    let requests: Vec<_> = events
        .iter()
        .filter(|e| e.requested == Action::Repair)
        .collect();
    assert!(!requests.is_empty());
    for e in &requests {
        assert!(e.mismatch > 0.3);
        assert!(e.coupling_estimate.is_some_and(|d| d >= 0.6));
        assert_eq!(e.allowed, Action::Rest, "tick {}", e.tick);
        assert!(e.reasons.contains(&GateReason::NoConsensus));
        assert_eq!(e.pulse_amplitude_mv, 0.0);
    }
    let summary = eng.summary();
    assert!(summary.gate_blocks >= requests.len() as u64);
    assert_eq!(summary.pulses_started, 0);

    let (eng, events) = ramp(false);
    assert!(eng.summary().pulses_started > 0);
    assert!(events
        .iter()
        .all(|e| !e.reasons.contains(&GateReason::NoConsensus)));
}

#[test]
fn test_adaptive_emin_lifts_cap_mid_run() {
    let mut cfg = lone_depolarized_cell(0.15);
    cfg.gates.oscillation_enabled = false;
    cfg.energy.adaptive_emin = Some(AdaptiveEminConfig {
        floor: 0.1,
        sensitivity: 0.5,
        rate_per_s: 0.002,
        low_energy_level: 0.3,
    });
    let (eng, events) = run_collect(cfg);

    // Emin_eff = 0.1 + 0.1·exp(−0.002·t) drops under E = 0.15 near t = 347 s
    let repair: Vec<_> = events
        .iter()
        .filter(|e| e.requested == Action::Repair)
        .collect();
    let first_capped = repair
        .iter()
        .find(|e| e.capped)
        .expect("depleted cell starts capped");
    assert_eq!(first_capped.reasons, vec![GateReason::LowEnergy]);
    let first_full = repair
        .iter()
        .find(|e| !e.capped)
        .expect("relaxed Emin must lift the cap");
    assert!(first_full.tick > first_capped.tick);
    assert!((340..=355).contains(&first_full.tick), "tick {}", first_full.tick);
    assert!(first_full.reasons.is_empty());
    assert!(repair
        .iter()
        .all(|e| e.allowed == Action::Repair && e.capped == (e.tick < first_full.tick)));
    assert!(eng.emin_eff(0) < 0.15);
    assert!(events
        .iter()
        .any(|e| e.tick > first_full.tick && e.pulse_amplitude_mv > 0.1));
}

#[test]
fn test_plv_dip_is_not_pathology() {
    let mut cfg = HomeostatConfig::default();
    cfg.tissue.el_mv = -5.0;
    cfg.tissue.v0_mv = -5.0;
    cfg.tissue.rhythm.amplitude_mv = 0.05;
    cfg.tissue.steps = 2400;
    // full windows only: 64 samples span exactly four rhythm periods
    cfg.oscillator.min_samples = 64;
    cfg.perturbations = vec![Perturbation::RhythmDropout {
        start_tick: 1500,
        duration_ticks: 150,
    }];
    let sink = Arc::new(MemorySink::new());
    let mut eng = HomeostatEngine::with_sink(cfg, sink.clone()).unwrap();

    for _ in 0..2400 {
        eng.step().unwrap();
        assert_ne!(
            eng.oscillation_status(0),
            OscillationStatus::Unhealthy,
            "tick {}",
            eng.step_count()
        );
    }
    assert!(sink
        .events()
        .iter()
        .all(|e| !e.requested.is_corrective() && e.pulse_amplitude_mv == 0.0));
    assert!(eng.last_features(0).and_then(|f| f.plv).is_some());
}

#[test]
fn test_identical_seeds_identical_runs() {
    let make = || {
        let mut cfg = HomeostatConfig::default();
        cfg.grid.rows = 4;
        cfg.grid.cols = 4;
        cfg.grid.region_rows = 2;
        cfg.grid.region_cols = 2;
        cfg.tissue.steps = 300;
        cfg.seed = 99;
        cfg.perturbations = vec![Perturbation::Injury {
            at_tick: 20,
            region: 3,
            delta_v_mv: Some(-15.0),
            energy: Some(0.5),
        }];
        cfg
    };
    let (a_eng, a) = run_collect(make());
    let (b_eng, b) = run_collect(make());
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a_eng.summary()).unwrap(),
        serde_json::to_string(&b_eng.summary()).unwrap()
    );

    let mut other = make();
    other.seed = 100;
    let (_, c) = run_collect(other);
    assert_ne!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&c).unwrap()
    );
}

#[test]
fn test_divergence_reports_tick_and_keeps_state() {
    let mut cfg = HomeostatConfig::default();
    cfg.grid.rows = 3;
    cfg.grid.cols = 3;
    cfg.grid.region_rows = 1;
    cfg.grid.region_cols = 1;
    cfg.perturbations = vec![Perturbation::Injury {
        at_tick: 5,
        region: 4,
        delta_v_mv: Some(f64::MAX),
        energy: None,
    }];
    let mut eng = HomeostatEngine::new(cfg).unwrap();
    match eng.run() {
        Err(HomeostatError::NumericDivergence { tick, .. }) => assert_eq!(tick, 5),
        other => panic!("expected divergence, got {other:?}"),
    }
    assert_eq!(eng.step_count(), 5);
    assert!(eng.state().v.iter().all(|v| v.is_finite()));
    assert!(eng.state().e.iter().all(|e| e.is_finite()));
}

#[test]
fn test_mlp_policy_runs_closed_loop() {
    let mut cfg = lone_depolarized_cell(0.9);
    cfg.decoder.policy = PolicyConfig::Mlp(MlpConfig::default());
    cfg.tissue.steps = 300;
    let (eng, events) = run_collect(cfg);
    assert_eq!(events.len(), 300);
    assert_eq!(eng.step_count(), 300);
    for e in &events {
        if e.requested.is_corrective() && e.allowed == Action::Rest {
            assert!(!e.reasons.is_empty(), "silent block at tick {}", e.tick);
        }
    }
}
