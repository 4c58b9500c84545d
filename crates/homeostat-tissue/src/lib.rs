// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Tissue
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Simulated tissue patch: grid topology, control regions, seeded noise
//! and the coupled membrane/energy integrators.

pub mod energy;
pub mod grid;
pub mod membrane;
pub mod noise;
pub mod state;

pub use energy::{pump_output, EnergyStepper};
pub use grid::{Grid, Regions};
pub use membrane::{MembraneStepper, Rhythm};
pub use noise::NoiseBank;
pub use state::{TissueIntegrator, TissueState};
