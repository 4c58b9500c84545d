// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Safety Gates
// ─────────────────────────────────────────────────────────────────────
//! Energy → oscillation → geometry checks on a requested corrective
//! action. Each gate yields Allow, Cap or Block; the strictest wins and
//! every non-Allow reason is kept.

use serde::{Deserialize, Serialize};

use homeostat_types::{
    Action, AdaptiveEminConfig, FeatureVector, GateConfig, GateReason, GateResult,
    HomeostatConfig, OscillationStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateVerdict {
    Allow,
    Cap(GateReason),
    Block(GateReason),
}

impl GateVerdict {
    fn severity(self) -> u8 {
        match self {
            GateVerdict::Allow => 0,
            GateVerdict::Cap(_) => 1,
            GateVerdict::Block(_) => 2,
        }
    }

    fn reason(self) -> Option<GateReason> {
        match self {
            GateVerdict::Allow => None,
            GateVerdict::Cap(r) | GateVerdict::Block(r) => Some(r),
        }
    }
}

/// Energy gate with an optional adaptive minimum.
///
/// The effective minimum relaxes toward
/// `max(floor, e_min·(1 − sensitivity·f_lowE))` at `rate_per_s`.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    e_min: f64,
    adaptive: Option<AdaptiveEminConfig>,
    relax: f64,
    emin_eff: f64,
    cap_usable: bool,
}

impl EnergyGate {
    pub fn new(e_min: f64, adaptive: Option<AdaptiveEminConfig>, dt: f64, cap_usable: bool) -> Self {
        let relax = adaptive
            .as_ref()
            .map(|a| 1.0 - (-a.rate_per_s * dt).exp())
            .unwrap_or(0.0);
        Self {
            e_min,
            adaptive,
            relax,
            emin_eff: e_min,
            cap_usable,
        }
    }

    /// Advance the adaptive minimum by one tick.
    pub fn adapt(&mut self, low_energy_fraction: f64) {
        if let Some(a) = &self.adaptive {
            let target = a
                .floor
                .max(self.e_min * (1.0 - a.sensitivity * low_energy_fraction));
            self.emin_eff += self.relax * (target - self.emin_eff);
        }
    }

    pub fn emin_eff(&self) -> f64 {
        self.emin_eff
    }

    pub fn check(&self, energy: f64) -> GateVerdict {
        if energy >= self.emin_eff {
            GateVerdict::Allow
        } else if self.cap_usable {
            GateVerdict::Cap(GateReason::LowEnergy)
        } else {
            GateVerdict::Block(GateReason::EnergyDepleted)
        }
    }
}

/// Only a persistently incoherent rhythm licenses intervention.
pub fn oscillation_verdict(status: OscillationStatus) -> GateVerdict {
    match status {
        OscillationStatus::Unhealthy => GateVerdict::Allow,
        OscillationStatus::Insufficient => GateVerdict::Cap(GateReason::RhythmUnknown),
        OscillationStatus::Healthy => GateVerdict::Block(GateReason::RhythmHealthy),
        OscillationStatus::Dipping => GateVerdict::Block(GateReason::RhythmDipping),
    }
}

/// Neighbor consensus, waived when coupling is unknown or weak.
pub fn geometry_verdict(
    mismatch: f64,
    coupling: Option<f64>,
    max_mismatch: f64,
    min_coupling: f64,
) -> GateVerdict {
    match coupling {
        None => GateVerdict::Allow,
        Some(d) if d < min_coupling => GateVerdict::Allow,
        Some(_) if mismatch <= max_mismatch => GateVerdict::Allow,
        Some(_) => GateVerdict::Block(GateReason::NoConsensus),
    }
}

/// Gates for every region, plus block/cap counters.
pub struct SafetyGates {
    cfg: GateConfig,
    energy: Vec<EnergyGate>,
    blocks: u64,
    caps: u64,
}

impl SafetyGates {
    pub fn new(cfg: &HomeostatConfig, n_regions: usize) -> Self {
        let cap_usable = cfg.actuation.low_energy_cap.is_usable();
        let gate = EnergyGate::new(
            cfg.energy.e_min,
            cfg.energy.adaptive_emin.clone(),
            cfg.tissue.dt_s,
            cap_usable,
        );
        Self {
            cfg: cfg.gates.clone(),
            energy: vec![gate; n_regions],
            blocks: 0,
            caps: 0,
        }
    }

    /// Filter one region's requested action for this tick.
    pub fn evaluate(&mut self, requested: Action, f: &FeatureVector) -> GateResult {
        let energy_gate = &mut self.energy[f.region];
        energy_gate.adapt(f.low_energy_fraction);

        if !requested.is_corrective() {
            return GateResult::pass(requested);
        }

        let verdicts = [
            if self.cfg.energy_enabled {
                energy_gate.check(f.energy)
            } else {
                GateVerdict::Allow
            },
            if self.cfg.oscillation_enabled {
                oscillation_verdict(f.oscillation)
            } else {
                GateVerdict::Allow
            },
            if self.cfg.geometry_enabled {
                geometry_verdict(
                    f.mismatch,
                    f.coupling_estimate,
                    self.cfg.max_mismatch,
                    self.cfg.min_coupling,
                )
            } else {
                GateVerdict::Allow
            },
        ];

        let worst = verdicts
            .iter()
            .copied()
            .max_by_key(|v| v.severity())
            .unwrap_or(GateVerdict::Allow);
        let reasons: Vec<GateReason> = verdicts.iter().filter_map(|v| v.reason()).collect();

        let result = match worst {
            GateVerdict::Allow => GateResult::pass(requested),
            GateVerdict::Cap(_) => GateResult {
                requested,
                allowed: requested,
                capped: true,
                reasons,
            },
            GateVerdict::Block(_) => GateResult {
                requested,
                allowed: Action::Rest,
                capped: false,
                reasons,
            },
        };

        if result.blocked() {
            self.blocks += 1;
            log::warn!(
                "region {}: {} blocked ({:?})",
                f.region,
                requested,
                result.reasons
            );
        } else if result.capped {
            self.caps += 1;
            log::warn!(
                "region {}: {} capped ({:?})",
                f.region,
                requested,
                result.reasons
            );
        }
        result
    }

    pub fn emin_eff(&self, region: usize) -> f64 {
        self.energy[region].emin_eff()
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn caps(&self) -> u64 {
        self.caps
    }
}
