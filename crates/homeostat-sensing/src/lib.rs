// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Sensing
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Observers of the tissue state: band recorder, oscillation-health
//! detector and coupling estimator. Each reads the previous completed tick
//! and never writes tissue state.

pub mod coupling;
pub mod oscillation;
pub mod recorder;

pub use coupling::CouplingEstimator;
pub use oscillation::{DriveResponse, OscillationDetector, PlvBand, PlvEstimate, PlvEstimator};
pub use recorder::{next_band, Band, Recorder};
