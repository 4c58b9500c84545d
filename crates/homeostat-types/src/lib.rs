// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Configuration, error hierarchy and the records shared by every layer
//! of the homeostat loop.

pub mod config;
pub mod error;
pub mod record;

pub use config::{
    ActuationConfig, AdaptiveEminConfig, Boundary, DecoderConfig, EnergyConfig, GateConfig,
    GridConfig, HomeostatConfig, LoggingConfig, MlpConfig, OscillatorConfig, Perturbation,
    PolicyConfig, PulseCap, RecorderConfig, RhythmConfig, RuleThresholds, SummaryConfig,
    TissueConfig, N_FEATURE_INPUTS,
};
pub use error::{HomeostatError, HomeostatResult};
pub use record::{
    Action, ActionScores, EventRecord, FeatureVector, GateReason, GateResult, OscillationStatus,
    RunSummary,
};
