// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Scoring Policies
// ─────────────────────────────────────────────────────────────────────
//! `FeatureVector → ActionScores`. Two interchangeable implementations
//! behind one trait; stabilization lives in `stabilizer`, not here.

use homeostat_types::{
    ActionScores, FeatureVector, HomeostatError, HomeostatResult, MlpConfig, PolicyConfig,
    RuleThresholds, N_FEATURE_INPUTS,
};

/// Raw action scoring. Implementations may keep per-region evidence
/// state, so one instance serves exactly one region.
pub trait ScoringPolicy: Send {
    fn scores(&mut self, features: &FeatureVector) -> ActionScores;

    fn name(&self) -> &'static str;
}

/// Build a policy from configuration.
pub fn build_policy(cfg: &PolicyConfig) -> HomeostatResult<Box<dyn ScoringPolicy>> {
    match cfg {
        PolicyConfig::Rules(th) => Ok(Box::new(RulePolicy::new(th.clone()))),
        PolicyConfig::Mlp(mlp) => Ok(Box::new(MlpPolicy::new(mlp.clone())?)),
    }
}

fn fraction(conds: &[bool]) -> f64 {
    conds.iter().filter(|c| **c).count() as f64 / conds.len() as f64
}

/// Soft rule tree: each score is the fraction of its conditions met.
pub struct RulePolicy {
    th: RuleThresholds,
    prune_ticks: u32,
}

impl RulePolicy {
    pub fn new(th: RuleThresholds) -> Self {
        Self { th, prune_ticks: 0 }
    }

    /// Consecutive ticks the strict PRUNE evidence has held.
    pub fn prune_evidence_ticks(&self) -> u32 {
        self.prune_ticks
    }
}

impl ScoringPolicy for RulePolicy {
    fn scores(&mut self, f: &FeatureVector) -> ActionScores {
        let th = &self.th;
        let chronic = f.low_occupancy_s >= th.low_occ_threshold_s;
        let unhealthy = f.oscillation_unhealthy();

        let repair = if chronic {
            fraction(&[
                true,
                f.mismatch <= th.mismatch_ok || f.domain_pathology,
                f.energy >= th.energy_ok,
                unhealthy,
                f.global_v_offset_mv >= th.global_v_offset_mv || f.domain_pathology,
            ])
        } else {
            0.0
        };

        let rest = fraction(&[!unhealthy, !chronic, f.mismatch > th.mismatch_ok]);

        let prune = if th.prune_enabled {
            let evidence = f.low_occupancy_s >= th.prune_low_occ_threshold_s
                && f.energy <= th.prune_energy_max
                && f.mismatch >= th.prune_mismatch_min;
            self.prune_ticks = if evidence {
                self.prune_ticks.saturating_add(1)
            } else {
                0
            };
            if evidence && self.prune_ticks >= th.prune_dwell_ticks.max(1) {
                1.0
            } else {
                0.0
            }
        } else {
            self.prune_ticks = 0;
            0.0
        };

        ActionScores::new(rest, repair, prune)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// One-hidden-layer network with tanh hidden units and softmax output.
pub struct MlpPolicy {
    w: MlpConfig,
    hidden: Vec<f64>,
}

impl MlpPolicy {
    pub fn new(w: MlpConfig) -> HomeostatResult<Self> {
        w.validate()
            .map_err(|e| HomeostatError::Validation(format!("mlp weights: {e}")))?;
        let hidden = vec![0.0; w.hidden_weights.len()];
        Ok(Self { w, hidden })
    }
}

impl ScoringPolicy for MlpPolicy {
    fn scores(&mut self, f: &FeatureVector) -> ActionScores {
        let x = f.to_inputs();
        let mut z = [0.0; N_FEATURE_INPUTS];
        for k in 0..N_FEATURE_INPUTS {
            z[k] = (x[k] - self.w.input_mean[k]) / self.w.input_scale[k];
        }
        for (j, row) in self.w.hidden_weights.iter().enumerate() {
            let pre: f64 = row.iter().zip(z.iter()).map(|(w, x)| w * x).sum::<f64>()
                + self.w.hidden_bias[j];
            self.hidden[j] = pre.tanh();
        }
        let mut logits = [0.0; 3];
        for (a, row) in self.w.output_weights.iter().enumerate() {
            logits[a] = row
                .iter()
                .zip(self.hidden.iter())
                .map(|(w, h)| w * h)
                .sum::<f64>()
                + self.w.output_bias[a];
        }
        let p = softmax(logits);
        ActionScores::new(p[0], p[1], p[2])
    }

    fn name(&self) -> &'static str {
        "mlp"
    }
}

fn softmax(logits: [f64; 3]) -> [f64; 3] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let e = logits.map(|l| (l - max).exp());
    let sum: f64 = e.iter().sum();
    e.map(|v| v / sum)
}
