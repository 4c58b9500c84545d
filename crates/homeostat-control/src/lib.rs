// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Control
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Decide → gate → act: scoring policies, the shared anti-flicker
//! stabilizer, safety gates and the pulse actuator.

pub mod actuator;
pub mod gates;
pub mod policy;
pub mod stabilizer;

pub use actuator::{PulseActuator, PulseOutput, PulsePhase};
pub use gates::{geometry_verdict, oscillation_verdict, EnergyGate, GateVerdict, SafetyGates};
pub use policy::{build_policy, MlpPolicy, RulePolicy, ScoringPolicy};
pub use stabilizer::Stabilizer;
