// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Closed-Loop Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Sense → decide → gate → act, once per tick, over a simulated tissue
//! patch.
//!
//! # Loop Invariants
//!
//! 1. **Observers never write tissue state**: the recorder, coupling
//!    estimator and oscillation detectors read the tick that just
//!    completed.
//!
//! 2. **Actuation lags by one tick**: drive and cost chosen at tick `t`
//!    enter the integration of tick `t + 1`.
//!
//! 3. **Gates are the last word**: the actuator only ever sees the
//!    allowed action. A blocked request emits no drive; a capped one
//!    never exceeds the low-energy cap.
//!
//! 4. **Seeded and reproducible**: identical configuration and seed give
//!    identical event streams and summaries.
//!
//! 5. **Divergence stops the run**: a non-finite V or E aborts with
//!    `NumericDivergence` and the last valid state is kept.

pub mod engine;
pub mod features;
pub mod metrics;
pub mod perturbation;
pub mod sink;

#[cfg(test)]
mod scenarios;

pub use engine::HomeostatEngine;
pub use features::FeatureSources;
pub use metrics::{flicker_rate, plv_retention, recovery_index, RunTrace};
pub use perturbation::PerturbationSchedule;
pub use sink::{EventSink, MemorySink, NullSink};
