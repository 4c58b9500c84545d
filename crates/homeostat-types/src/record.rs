// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Shared Records
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::config::N_FEATURE_INPUTS;

/// Control action for one region.
///
/// Declaration order is the tie-break order of the stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Rest,
    Repair,
    Prune,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Rest, Action::Repair, Action::Prune];

    pub fn index(self) -> usize {
        match self {
            Action::Rest => 0,
            Action::Repair => 1,
            Action::Prune => 2,
        }
    }

    /// REPAIR and PRUNE drive the actuator; REST does not.
    pub fn is_corrective(self) -> bool {
        !matches!(self, Action::Rest)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Rest => "REST",
            Action::Repair => "REPAIR",
            Action::Prune => "PRUNE",
        };
        f.write_str(s)
    }
}

/// Per-action scores produced by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionScores {
    pub rest: f64,
    pub repair: f64,
    pub prune: f64,
}

impl ActionScores {
    pub fn new(rest: f64, repair: f64, prune: f64) -> Self {
        Self {
            rest,
            repair,
            prune,
        }
    }

    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Rest => self.rest,
            Action::Repair => self.repair,
            Action::Prune => self.prune,
        }
    }

    /// Winner-take-all; ties resolve to the lowest action index.
    pub fn winner(&self) -> Action {
        let mut best = Action::Rest;
        for a in [Action::Repair, Action::Prune] {
            if self.get(a) > self.get(best) {
                best = a;
            }
        }
        best
    }
}

/// Coherence state of a region's rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscillationStatus {
    /// Not enough samples to estimate PLV.
    Insufficient,
    Healthy,
    /// PLV below the floor, but not for long enough to count.
    Dipping,
    /// PLV below the floor for at least the persistence window.
    Unhealthy,
}

/// Per-region features for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub region: usize,
    pub mean_v_mv: f64,
    /// Mean leaky LOW occupancy over the region's cells (s).
    pub low_occupancy_s: f64,
    /// Mean neighbor mismatch fraction over the region's cells.
    pub mismatch: f64,
    pub domain_low_fraction: f64,
    pub domain_pathology: bool,
    pub energy: f64,
    /// Fraction of the region's cells whose energy is below the adaptive-Emin level.
    pub low_energy_fraction: f64,
    pub plv: Option<f64>,
    pub oscillation: OscillationStatus,
    pub global_v_offset_mv: f64,
    pub coupling_estimate: Option<f64>,
    pub redox_flag: Option<bool>,
}

impl FeatureVector {
    pub fn oscillation_unhealthy(&self) -> bool {
        self.oscillation == OscillationStatus::Unhealthy
    }

    /// Raw network inputs: mean V, occupancy, mismatch, domain-low fraction,
    /// energy, PLV (1 when unknown), global offset, redox flag (0/1).
    pub fn to_inputs(&self) -> [f64; N_FEATURE_INPUTS] {
        [
            self.mean_v_mv,
            self.low_occupancy_s,
            self.mismatch,
            self.domain_low_fraction,
            self.energy,
            self.plv.unwrap_or(1.0),
            self.global_v_offset_mv,
            if self.redox_flag.unwrap_or(false) {
                1.0
            } else {
                0.0
            },
        ]
    }
}

/// Why a gate capped or blocked an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Energy below Emin; pulse replaced by the low-energy cap.
    LowEnergy,
    /// Energy below Emin and no usable cap.
    EnergyDepleted,
    /// Too few samples to judge the rhythm.
    RhythmUnknown,
    RhythmHealthy,
    RhythmDipping,
    /// Neighbors disagree while coupling is strong.
    NoConsensus,
}

/// Outcome of the safety gates for one region and tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub requested: Action,
    pub allowed: Action,
    pub capped: bool,
    pub reasons: Vec<GateReason>,
}

impl GateResult {
    pub fn pass(action: Action) -> Self {
        Self {
            requested: action,
            allowed: action,
            capped: false,
            reasons: Vec::new(),
        }
    }

    pub fn blocked(&self) -> bool {
        self.requested != self.allowed
    }
}

/// One row of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tick: u64,
    pub time_s: f64,
    pub region: usize,
    pub requested: Action,
    pub allowed: Action,
    pub capped: bool,
    pub reasons: Vec<GateReason>,
    pub mean_v_mv: f64,
    pub low_occupancy_s: f64,
    pub mismatch: f64,
    pub energy: f64,
    pub plv: Option<f64>,
    pub global_v_offset_mv: f64,
    pub domain_low_fraction: f64,
    pub coupling_estimate: Option<f64>,
    pub redox_flag: Option<bool>,
    /// Drive applied on the next integration step (mV/s).
    pub pulse_amplitude_mv: f64,
}

/// End-of-run aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub duration_s: f64,
    /// Seconds until global mean V entered the healthy band for good.
    pub recovery_time_s: Option<f64>,
    /// Action switches per region-second after warm-up.
    pub flicker_rate: f64,
    pub plv_retention: Option<f64>,
    pub final_mean_v_mv: f64,
    pub final_mean_energy: f64,
    pub gate_blocks: u64,
    pub gate_caps: u64,
    pub pulses_started: u64,
    pub action_switches: u64,
}
