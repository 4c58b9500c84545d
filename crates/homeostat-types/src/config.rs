// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{HomeostatError, HomeostatResult};

/// Number of inputs the learned policy consumes (see `FeatureVector::to_inputs`).
pub const N_FEATURE_INPUTS: usize = 8;

fn config_err(msg: String) -> HomeostatError {
    HomeostatError::Config(msg)
}

/// Boundary policy of the tissue grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Opposite edges are neighbors (torus).
    Periodic,
    /// Out-of-grid neighbors mirror the cell itself (zero flux).
    Reflective,
}

/// Grid geometry and control-region tiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub boundary: Boundary,
    /// Rows per control region. Edge regions may be smaller.
    pub region_rows: usize,
    /// Columns per control region.
    pub region_cols: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            cols: 8,
            boundary: Boundary::Periodic,
            region_rows: 8,
            region_cols: 8,
        }
    }
}

impl GridConfig {
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of region tiles along (rows, cols).
    pub fn region_tiles(&self) -> (usize, usize) {
        let rr = self.region_rows.max(1);
        let rc = self.region_cols.max(1);
        ((self.rows + rr - 1) / rr, (self.cols + rc - 1) / rc)
    }

    pub fn region_count(&self) -> usize {
        let (r, c) = self.region_tiles();
        r * c
    }

    pub fn validate(&self) -> HomeostatResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(config_err(format!(
                "grid must be at least 1x1, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.region_rows == 0 || self.region_cols == 0 {
            return Err(config_err(format!(
                "region shape must be at least 1x1, got {}x{}",
                self.region_rows, self.region_cols
            )));
        }
        Ok(())
    }
}

/// Optional pacemaker drive shared by every cell: `A·sin(2πft + φ)` in mV/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmConfig {
    pub amplitude_mv: f64,
    pub frequency_hz: f64,
    pub phase_rad: f64,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            amplitude_mv: 0.0,
            frequency_hz: 1.0 / 320.0,
            phase_rad: 0.0,
        }
    }
}

/// Membrane (RC + diffusion) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TissueConfig {
    /// Integration timestep (s).
    pub dt_s: f64,
    /// Number of ticks in a full run.
    pub steps: u64,
    /// Leak reversal potential (mV).
    pub el_mv: f64,
    /// Leak conductance (1/s).
    pub g_leak: f64,
    /// Diffusive coupling strength D (1/s).
    pub coupling_d: f64,
    /// Noise amplitude σ (mV/√s).
    pub noise_amp: f64,
    /// Initial membrane potential of every cell (mV).
    pub v0_mv: f64,
    /// Healthy reference potential used by the global offset signal (mV).
    pub healthy_ref_mv: f64,
    pub rhythm: RhythmConfig,
}

impl Default for TissueConfig {
    fn default() -> Self {
        Self {
            dt_s: 1.0,
            steps: 20_000,
            el_mv: -18.0,
            g_leak: 0.01,
            coupling_d: 0.05,
            noise_amp: 0.05,
            v0_mv: -18.0,
            healthy_ref_mv: -5.0,
            rhythm: RhythmConfig::default(),
        }
    }
}

impl TissueConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        if !(self.dt_s.is_finite() && self.dt_s > 0.0) {
            return Err(config_err(format!("dt_s must be > 0, got {}", self.dt_s)));
        }
        if self.steps == 0 {
            return Err(config_err("steps must be > 0".to_string()));
        }
        for (name, v) in [
            ("g_leak", self.g_leak),
            ("coupling_d", self.coupling_d),
            ("noise_amp", self.noise_amp),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(config_err(format!("{name} must be >= 0, got {v}")));
            }
        }
        for (name, v) in [
            ("el_mv", self.el_mv),
            ("v0_mv", self.v0_mv),
            ("healthy_ref_mv", self.healthy_ref_mv),
            ("rhythm.amplitude_mv", self.rhythm.amplitude_mv),
            ("rhythm.phase_rad", self.rhythm.phase_rad),
        ] {
            if !v.is_finite() {
                return Err(config_err(format!("{name} must be finite, got {v}")));
            }
        }
        if !(self.rhythm.frequency_hz.is_finite() && self.rhythm.frequency_hz >= 0.0) {
            return Err(config_err(format!(
                "rhythm.frequency_hz must be >= 0, got {}",
                self.rhythm.frequency_hz
            )));
        }
        // Explicit Euler on the 5-point Laplacian: eigenvalues of the update
        // lie in [1 - dt(gL + 8D), 1 - dt·gL].
        let stiffness = self.dt_s * (self.g_leak + 8.0 * self.coupling_d);
        if stiffness > 2.0 {
            return Err(config_err(format!(
                "dt_s * (g_leak + 8 * coupling_d) must be <= 2 for a stable step, got {stiffness}"
            )));
        }
        Ok(())
    }
}

/// Adaptive minimum-energy threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveEminConfig {
    /// Lowest value Emin may adapt down to.
    pub floor: f64,
    /// How strongly the low-energy fraction lowers the target.
    pub sensitivity: f64,
    /// Relaxation rate toward the target (1/s).
    pub rate_per_s: f64,
    /// A cell counts as low-energy below this level.
    pub low_energy_level: f64,
}

impl Default for AdaptiveEminConfig {
    fn default() -> Self {
        Self {
            floor: 0.1,
            sensitivity: 0.5,
            rate_per_s: 0.01,
            low_energy_level: 0.3,
        }
    }
}

/// Energy reserve dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub e0: f64,
    /// Production rate scale.
    pub k_oxphos: f64,
    /// Pump output at E = 0, as a fraction of the saturated output.
    pub pump_basal: f64,
    /// Half-saturation constant of the pump.
    pub pump_half_sat: f64,
    /// Energy drawn per unit of (amplitude × duty) per second.
    pub alpha_actuation_cost: f64,
    /// Nanotube exchange coefficient.
    pub beta_tnt_flux: f64,
    pub gamma_decay: f64,
    /// Energy gate threshold.
    pub e_min: f64,
    pub adaptive_emin: Option<AdaptiveEminConfig>,
    /// Region mean energy below this raises the redox flag.
    pub redox_threshold: Option<f64>,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            e0: 0.8,
            k_oxphos: 0.05,
            pump_basal: 0.2,
            pump_half_sat: 0.3,
            alpha_actuation_cost: 0.02,
            beta_tnt_flux: 0.0,
            gamma_decay: 0.05,
            e_min: 0.2,
            adaptive_emin: None,
            redox_threshold: None,
        }
    }
}

impl EnergyConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        for (name, v) in [
            ("k_oxphos", self.k_oxphos),
            ("alpha_actuation_cost", self.alpha_actuation_cost),
            ("beta_tnt_flux", self.beta_tnt_flux),
            ("gamma_decay", self.gamma_decay),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(config_err(format!("{name} must be >= 0, got {v}")));
            }
        }
        if !self.e0.is_finite() || !self.e_min.is_finite() {
            return Err(config_err(format!(
                "e0 and e_min must be finite, got {} and {}",
                self.e0, self.e_min
            )));
        }
        if !(0.0..=1.0).contains(&self.pump_basal) {
            return Err(config_err(format!(
                "pump_basal must be in [0, 1], got {}",
                self.pump_basal
            )));
        }
        if !(self.pump_half_sat.is_finite() && self.pump_half_sat > 0.0) {
            return Err(config_err(format!(
                "pump_half_sat must be > 0, got {}",
                self.pump_half_sat
            )));
        }
        if let Some(a) = &self.adaptive_emin {
            if !(a.floor.is_finite() && a.floor >= 0.0 && a.floor <= self.e_min) {
                return Err(config_err(format!(
                    "adaptive_emin.floor must be in [0, e_min], got {}",
                    a.floor
                )));
            }
            if !(a.sensitivity.is_finite() && a.sensitivity >= 0.0) {
                return Err(config_err(format!(
                    "adaptive_emin.sensitivity must be >= 0, got {}",
                    a.sensitivity
                )));
            }
            if !(a.rate_per_s.is_finite() && a.rate_per_s >= 0.0) {
                return Err(config_err(format!(
                    "adaptive_emin.rate_per_s must be >= 0, got {}",
                    a.rate_per_s
                )));
            }
        }
        Ok(())
    }
}

/// Schmitt banding and occupancy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub low_enter_mv: f64,
    pub low_exit_mv: f64,
    pub high_enter_mv: f64,
    pub high_exit_mv: f64,
    /// Leak time constant of the LOW-occupancy accumulator (s).
    pub tau_low_s: f64,
    /// Neighbor voltage difference counted as a mismatch (mV).
    pub mismatch_threshold_mv: f64,
    /// Fraction of LOW cells above which the whole patch is pathological.
    pub domain_low_fraction_threshold: f64,
    /// Time constant of the long-horizon mean-V estimate (s).
    pub v_mean_tau_s: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            low_enter_mv: -15.0,
            low_exit_mv: -8.0,
            high_enter_mv: 10.0,
            high_exit_mv: 5.0,
            tau_low_s: 600.0,
            mismatch_threshold_mv: 5.0,
            domain_low_fraction_threshold: 0.4,
            v_mean_tau_s: 600.0,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        for (name, v) in [
            ("low_enter_mv", self.low_enter_mv),
            ("low_exit_mv", self.low_exit_mv),
            ("high_enter_mv", self.high_enter_mv),
            ("high_exit_mv", self.high_exit_mv),
        ] {
            if !v.is_finite() {
                return Err(config_err(format!("{name} must be finite, got {v}")));
            }
        }
        if !(self.low_exit_mv > self.low_enter_mv) {
            return Err(config_err(format!(
                "low_exit_mv ({}) must be > low_enter_mv ({})",
                self.low_exit_mv, self.low_enter_mv
            )));
        }
        if !(self.high_exit_mv < self.high_enter_mv) {
            return Err(config_err(format!(
                "high_exit_mv ({}) must be < high_enter_mv ({})",
                self.high_exit_mv, self.high_enter_mv
            )));
        }
        if !(self.low_exit_mv < self.high_exit_mv) {
            return Err(config_err(format!(
                "LOW and HIGH bands overlap: low_exit_mv ({}) must be < high_exit_mv ({})",
                self.low_exit_mv, self.high_exit_mv
            )));
        }
        if !(self.tau_low_s.is_finite() && self.tau_low_s > 0.0) {
            return Err(config_err(format!(
                "tau_low_s must be > 0, got {}",
                self.tau_low_s
            )));
        }
        if !(self.v_mean_tau_s.is_finite() && self.v_mean_tau_s > 0.0) {
            return Err(config_err(format!(
                "v_mean_tau_s must be > 0, got {}",
                self.v_mean_tau_s
            )));
        }
        if !(self.mismatch_threshold_mv.is_finite() && self.mismatch_threshold_mv >= 0.0) {
            return Err(config_err(format!(
                "mismatch_threshold_mv must be >= 0, got {}",
                self.mismatch_threshold_mv
            )));
        }
        if !(0.0..=1.0).contains(&self.domain_low_fraction_threshold) {
            return Err(config_err(format!(
                "domain_low_fraction_threshold must be in [0, 1], got {}",
                self.domain_low_fraction_threshold
            )));
        }
        Ok(())
    }
}

/// Oscillation detector parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    /// Analysis window length (s).
    pub window_s: f64,
    /// Ticks per retained sample.
    pub downsample: usize,
    pub healthy_plv_min: f64,
    /// PLV must stay below the floor this long before the rhythm is unhealthy (s).
    pub min_bad_duration_s: f64,
    /// Fewest samples a PLV estimate may be computed from.
    pub min_samples: usize,
    pub band_lo_hz: f64,
    pub band_hi_hz: f64,
    /// Band-passed RMS below this means there is no rhythm at all (mV).
    pub min_rhythm_rms_mv: f64,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            window_s: 1280.0,
            downsample: 20,
            healthy_plv_min: 0.5,
            min_bad_duration_s: 300.0,
            min_samples: 16,
            band_lo_hz: 0.0005,
            band_hi_hz: 0.01,
            min_rhythm_rms_mv: 0.05,
        }
    }
}

impl OscillatorConfig {
    /// Seconds between retained samples.
    pub fn sample_dt(&self, dt_s: f64) -> f64 {
        dt_s * self.downsample.max(1) as f64
    }

    /// Ring buffer capacity for the given timestep.
    pub fn capacity(&self, dt_s: f64) -> usize {
        ((self.window_s / self.sample_dt(dt_s)).round() as usize).max(1)
    }

    pub fn validate(&self) -> HomeostatResult<()> {
        if !(self.window_s.is_finite() && self.window_s > 0.0) {
            return Err(config_err(format!(
                "window_s must be > 0, got {}",
                self.window_s
            )));
        }
        if self.downsample == 0 {
            return Err(config_err("downsample must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.healthy_plv_min) {
            return Err(config_err(format!(
                "healthy_plv_min must be in [0, 1], got {}",
                self.healthy_plv_min
            )));
        }
        if !(self.min_bad_duration_s.is_finite() && self.min_bad_duration_s >= 0.0) {
            return Err(config_err(format!(
                "min_bad_duration_s must be >= 0, got {}",
                self.min_bad_duration_s
            )));
        }
        if self.min_samples < 4 {
            return Err(config_err(format!(
                "min_samples must be >= 4, got {}",
                self.min_samples
            )));
        }
        if !(self.band_lo_hz >= 0.0 && self.band_hi_hz > self.band_lo_hz) {
            return Err(config_err(format!(
                "band must satisfy 0 <= lo < hi, got [{}, {}]",
                self.band_lo_hz, self.band_hi_hz
            )));
        }
        if !(self.min_rhythm_rms_mv.is_finite() && self.min_rhythm_rms_mv >= 0.0) {
            return Err(config_err(format!(
                "min_rhythm_rms_mv must be >= 0, got {}",
                self.min_rhythm_rms_mv
            )));
        }
        Ok(())
    }
}

/// Thresholds of the rule-tree policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    /// LOW occupancy (s) above which depolarization is chronic.
    pub low_occ_threshold_s: f64,
    pub energy_ok: f64,
    pub mismatch_ok: f64,
    pub global_v_offset_mv: f64,
    pub prune_enabled: bool,
    pub prune_low_occ_threshold_s: f64,
    pub prune_energy_max: f64,
    pub prune_mismatch_min: f64,
    /// Consecutive ticks of PRUNE evidence required.
    pub prune_dwell_ticks: u32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            low_occ_threshold_s: 180.0,
            energy_ok: 0.35,
            mismatch_ok: 0.3,
            global_v_offset_mv: 10.0,
            prune_enabled: false,
            prune_low_occ_threshold_s: 510.0,
            prune_energy_max: 0.2,
            prune_mismatch_min: 0.6,
            prune_dwell_ticks: 200,
        }
    }
}

/// Fixed weights of the one-hidden-layer scoring network.
///
/// Inputs are standardized as `(x - input_mean) / input_scale` in the order
/// of `FeatureVector::to_inputs`. Hidden units use tanh, outputs are
/// softmax-normalized into (rest, repair, prune).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    pub input_mean: [f64; N_FEATURE_INPUTS],
    pub input_scale: [f64; N_FEATURE_INPUTS],
    pub hidden_weights: Vec<[f64; N_FEATURE_INPUTS]>,
    pub hidden_bias: Vec<f64>,
    /// Three rows (rest, repair, prune), one weight per hidden unit.
    pub output_weights: Vec<Vec<f64>>,
    pub output_bias: [f64; 3],
}

impl Default for MlpConfig {
    /// A hand-set network with one "chronic evidence" and one "healthy
    /// evidence" unit.
    fn default() -> Self {
        Self {
            input_mean: [-10.0, 180.0, 0.3, 0.4, 0.35, 0.5, 10.0, 0.0],
            input_scale: [10.0, 60.0, 0.2, 0.2, 0.1, 0.2, 5.0, 1.0],
            hidden_weights: vec![
                [0.0, 2.0, -1.0, 0.5, 1.0, 0.0, 0.5, 0.0],
                [0.0, -2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            ],
            hidden_bias: vec![0.0, 0.0],
            output_weights: vec![vec![0.0, 2.0], vec![2.0, 0.0], vec![0.0, 0.0]],
            output_bias: [0.0, 0.0, -4.0],
        }
    }
}

impl MlpConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        let hidden = self.hidden_weights.len();
        if hidden == 0 {
            return Err(config_err("mlp needs at least one hidden unit".to_string()));
        }
        if self.hidden_bias.len() != hidden {
            return Err(config_err(format!(
                "mlp hidden_bias has {} entries, expected {hidden}",
                self.hidden_bias.len()
            )));
        }
        if self.output_weights.len() != 3 {
            return Err(config_err(format!(
                "mlp output_weights must have 3 rows, got {}",
                self.output_weights.len()
            )));
        }
        if let Some(row) = self.output_weights.iter().find(|r| r.len() != hidden) {
            return Err(config_err(format!(
                "mlp output row has {} weights, expected {hidden}",
                row.len()
            )));
        }
        if self.input_scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(config_err(
                "mlp input_scale entries must be finite and non-zero".to_string(),
            ));
        }
        let all_finite = self.input_mean.iter().all(|v| v.is_finite())
            && self.hidden_weights.iter().flatten().all(|v| v.is_finite())
            && self.hidden_bias.iter().all(|v| v.is_finite())
            && self.output_weights.iter().flatten().all(|v| v.is_finite())
            && self.output_bias.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(config_err("mlp weights must be finite".to_string()));
        }
        Ok(())
    }
}

/// Scoring policy selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Rules(RuleThresholds),
    Mlp(MlpConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Rules(RuleThresholds::default())
    }
}

/// Decoder: policy plus the shared stabilization layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub policy: PolicyConfig,
    /// Score lead a new winner needs over the active action.
    pub hysteresis_margin: f64,
    /// Minimum ticks between action changes.
    pub decision_dwell: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            hysteresis_margin: 0.05,
            decision_dwell: 50,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        if !(self.hysteresis_margin.is_finite() && self.hysteresis_margin >= 0.0) {
            return Err(config_err(format!(
                "hysteresis_margin must be >= 0, got {}",
                self.hysteresis_margin
            )));
        }
        match &self.policy {
            PolicyConfig::Rules(th) => {
                for (name, v) in [
                    ("energy_ok", th.energy_ok),
                    ("mismatch_ok", th.mismatch_ok),
                    ("global_v_offset_mv", th.global_v_offset_mv),
                    ("prune_low_occ_threshold_s", th.prune_low_occ_threshold_s),
                    ("prune_energy_max", th.prune_energy_max),
                    ("prune_mismatch_min", th.prune_mismatch_min),
                ] {
                    if !v.is_finite() {
                        return Err(config_err(format!("{name} must be finite, got {v}")));
                    }
                }
                if !(th.low_occ_threshold_s.is_finite() && th.low_occ_threshold_s >= 0.0) {
                    return Err(config_err(format!(
                        "low_occ_threshold_s must be >= 0, got {}",
                        th.low_occ_threshold_s
                    )));
                }
                if th.prune_enabled && th.prune_dwell_ticks == 0 {
                    return Err(config_err(
                        "prune_dwell_ticks must be >= 1 when prune is enabled".to_string(),
                    ));
                }
                Ok(())
            }
            PolicyConfig::Mlp(mlp) => mlp.validate(),
        }
    }
}

/// Low-energy replacement pulse parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseCap {
    pub amplitude_mv: f64,
    pub duty: f64,
}

impl Default for PulseCap {
    fn default() -> Self {
        Self {
            amplitude_mv: 0.1,
            duty: 0.1,
        }
    }
}

impl PulseCap {
    /// A cap with zero amplitude or duty cannot stand in for a full pulse.
    pub fn is_usable(&self) -> bool {
        self.amplitude_mv != 0.0 && self.duty > 0.0
    }
}

/// Corrective pulse waveform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Signed drive while a pulse is on (mV/s).
    pub amplitude_mv: f64,
    pub duty: f64,
    pub period_s: f64,
    pub refractory_s: f64,
    pub low_energy_cap: PulseCap,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            amplitude_mv: 0.5,
            duty: 0.5,
            period_s: 60.0,
            refractory_s: 30.0,
            low_energy_cap: PulseCap::default(),
        }
    }
}

impl ActuationConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        if !self.amplitude_mv.is_finite() {
            return Err(config_err(format!(
                "amplitude_mv must be finite, got {}",
                self.amplitude_mv
            )));
        }
        if !(self.duty > 0.0 && self.duty <= 1.0) {
            return Err(config_err(format!("duty must be in (0, 1], got {}", self.duty)));
        }
        if !(self.period_s.is_finite() && self.period_s > 0.0) {
            return Err(config_err(format!(
                "period_s must be > 0, got {}",
                self.period_s
            )));
        }
        if !(self.refractory_s.is_finite() && self.refractory_s >= 0.0) {
            return Err(config_err(format!(
                "refractory_s must be >= 0, got {}",
                self.refractory_s
            )));
        }
        let cap = &self.low_energy_cap;
        if !(0.0..=1.0).contains(&cap.duty) {
            return Err(config_err(format!(
                "low_energy_cap.duty must be in [0, 1], got {}",
                cap.duty
            )));
        }
        if !cap.amplitude_mv.is_finite() || cap.amplitude_mv.abs() > self.amplitude_mv.abs() {
            return Err(config_err(format!(
                "|low_energy_cap.amplitude_mv| ({}) must not exceed |amplitude_mv| ({})",
                cap.amplitude_mv, self.amplitude_mv
            )));
        }
        Ok(())
    }
}

/// Safety gate switches and geometry parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub energy_enabled: bool,
    pub oscillation_enabled: bool,
    pub geometry_enabled: bool,
    /// Largest region mismatch that still counts as neighbor consensus.
    pub max_mismatch: f64,
    /// Coupling estimate below which consensus is not required.
    pub min_coupling: f64,
    /// Frames averaged by the coupling estimator.
    pub coupling_window: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            energy_enabled: true,
            oscillation_enabled: true,
            geometry_enabled: true,
            max_mismatch: 0.3,
            min_coupling: 0.6,
            coupling_window: 50,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> HomeostatResult<()> {
        if !(0.0..=1.0).contains(&self.max_mismatch) {
            return Err(config_err(format!(
                "max_mismatch must be in [0, 1], got {}",
                self.max_mismatch
            )));
        }
        if !(0.0..=1.0).contains(&self.min_coupling) {
            return Err(config_err(format!(
                "min_coupling must be in [0, 1], got {}",
                self.min_coupling
            )));
        }
        if self.coupling_window < 4 {
            return Err(config_err(format!(
                "coupling_window must be >= 4, got {}",
                self.coupling_window
            )));
        }
        Ok(())
    }
}

/// Event stream cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit one record per region every `event_stride` ticks.
    pub event_stride: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { event_stride: 1 }
    }
}

/// Run-summary windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Mean V must stay healthy this long to count as recovered (s).
    pub recovery_dwell_s: f64,
    /// Switches before this time are excluded from the flicker rate (s).
    pub warmup_s: f64,
    /// Baseline and final PLV windows (s).
    pub plv_window_s: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            recovery_dwell_s: 60.0,
            warmup_s: 0.0,
            plv_window_s: 300.0,
        }
    }
}

/// Scheduled disturbance applied at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Perturbation {
    /// Shift V and/or reset E in every cell of one region.
    Injury {
        at_tick: u64,
        region: usize,
        #[serde(default)]
        delta_v_mv: Option<f64>,
        #[serde(default)]
        energy: Option<f64>,
    },
    /// Scramble the pacemaker phase every tick for a while.
    RhythmDropout { start_tick: u64, duration_ticks: u64 },
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeostatConfig {
    pub seed: u64,
    pub grid: GridConfig,
    pub tissue: TissueConfig,
    pub energy: EnergyConfig,
    pub recorder: RecorderConfig,
    pub oscillator: OscillatorConfig,
    pub decoder: DecoderConfig,
    pub actuation: ActuationConfig,
    pub gates: GateConfig,
    pub logging: LoggingConfig,
    pub summary: SummaryConfig,
    pub perturbations: Vec<Perturbation>,
}

impl HomeostatConfig {
    /// Validate every section. Nothing is applied if any check fails.
    pub fn validate(&self) -> HomeostatResult<()> {
        self.grid.validate()?;
        self.tissue.validate()?;
        self.energy.validate()?;
        self.recorder.validate()?;
        self.oscillator.validate()?;
        self.decoder.validate()?;
        self.actuation.validate()?;
        self.gates.validate()?;
        if self.logging.event_stride == 0 {
            return Err(config_err("event_stride must be >= 1".to_string()));
        }
        let s = &self.summary;
        if !(s.recovery_dwell_s >= 0.0 && s.warmup_s >= 0.0 && s.plv_window_s > 0.0) {
            return Err(config_err(format!(
                "summary windows must be non-negative (plv_window_s > 0), got dwell={} warmup={} plv={}",
                s.recovery_dwell_s, s.warmup_s, s.plv_window_s
            )));
        }
        let regions = self.grid.region_count();
        for p in &self.perturbations {
            if let Perturbation::Injury {
                region,
                delta_v_mv,
                energy,
                ..
            } = p
            {
                if *region >= regions {
                    return Err(config_err(format!(
                        "injury targets region {region}, grid has {regions} regions"
                    )));
                }
                if delta_v_mv.is_some_and(|v| !v.is_finite())
                    || energy.is_some_and(|e| !e.is_finite())
                {
                    return Err(config_err("injury values must be finite".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Load and validate from a JSON string. Missing sections take defaults.
    pub fn from_json(json: &str) -> HomeostatResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| HomeostatError::Config(format!("JSON parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
