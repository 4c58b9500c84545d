// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Pulse Actuator
// ─────────────────────────────────────────────────────────────────────
//! Per-region pulse state machine: IDLE → ACTIVE → REFRACTORY → IDLE.
//!
//! Output is a drive rate (mV/s) and an energy cost that the integrators
//! consume on the next tick.

use serde::{Deserialize, Serialize};

use homeostat_types::{ActuationConfig, GateResult, PulseCap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PulsePhase {
    Idle,
    Active { remaining: u32, duty: f64 },
    Refractory { remaining: u32 },
}

/// What the actuator emits for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PulseOutput {
    pub drive: f64,
    pub cost: f64,
    pub started: bool,
}

fn ticks(seconds: f64, dt: f64) -> u32 {
    (seconds / dt).round().max(0.0) as u32
}

pub struct PulseActuator {
    amplitude: f64,
    duty: f64,
    cap: PulseCap,
    period_ticks: u32,
    refractory_ticks: u32,
    dt: f64,
    phase: PulsePhase,
    since_start: Option<u64>,
    pulses_started: u64,
}

impl PulseActuator {
    pub fn new(cfg: &ActuationConfig, dt: f64) -> Self {
        Self {
            amplitude: cfg.amplitude_mv,
            duty: cfg.duty,
            cap: cfg.low_energy_cap.clone(),
            period_ticks: ticks(cfg.period_s, dt).max(1),
            refractory_ticks: ticks(cfg.refractory_s, dt),
            dt,
            phase: PulsePhase::Idle,
            since_start: None,
            pulses_started: 0,
        }
    }

    /// On-time of a pulse with the given duty, at least one tick.
    pub fn on_ticks(&self, duty: f64) -> u32 {
        ticks(duty * self.period_ticks as f64 * self.dt, self.dt).max(1)
    }

    fn after_pulse(&self, on: u32) -> PulsePhase {
        match self
            .refractory_ticks
            .max(self.period_ticks.saturating_sub(on))
        {
            0 => PulsePhase::Idle,
            remaining => PulsePhase::Refractory { remaining },
        }
    }

    /// Capped amplitude keeps the sign of the full pulse.
    fn capped_amplitude(&self) -> f64 {
        self.amplitude.signum() * self.amplitude.abs().min(self.cap.amplitude_mv.abs())
    }

    /// Apply one tick's gate outcome.
    pub fn step(&mut self, gate: &GateResult) -> PulseOutput {
        if let Some(s) = self.since_start.as_mut() {
            *s += 1;
        }
        let corrective = gate.allowed.is_corrective();
        let mut started = false;

        match self.phase {
            PulsePhase::Refractory { remaining } => {
                self.phase = if remaining <= 1 {
                    PulsePhase::Idle
                } else {
                    PulsePhase::Refractory {
                        remaining: remaining - 1,
                    }
                };
                return PulseOutput::default();
            }
            PulsePhase::Idle => {
                if !corrective {
                    return PulseOutput::default();
                }
                let duty = if gate.capped { self.cap.duty } else { self.duty };
                self.phase = PulsePhase::Active {
                    remaining: self.on_ticks(duty),
                    duty,
                };
                self.since_start = Some(0);
                self.pulses_started += 1;
                started = true;
            }
            PulsePhase::Active { remaining, duty } => {
                if !corrective {
                    // cut short: refractory counts from the ticks actually on
                    let done = self.on_ticks(duty).saturating_sub(remaining);
                    self.phase = self.after_pulse(done);
                    return PulseOutput::default();
                }
                if gate.capped && duty > self.cap.duty {
                    // capped mid-pulse: the pulse may only be as long as a
                    // capped one, counting the ticks already on
                    let done = self.on_ticks(duty).saturating_sub(remaining);
                    let left = self.on_ticks(self.cap.duty).saturating_sub(done);
                    if left == 0 {
                        self.phase = self.after_pulse(done);
                        return PulseOutput::default();
                    }
                    self.phase = PulsePhase::Active {
                        remaining: left,
                        duty: self.cap.duty,
                    };
                }
            }
        }

        let PulsePhase::Active { remaining, duty } = self.phase else {
            return PulseOutput::default();
        };
        let (drive, cost_duty) = if gate.capped {
            (self.capped_amplitude(), self.cap.duty.min(duty))
        } else {
            (self.amplitude, duty)
        };

        self.phase = if remaining <= 1 {
            self.after_pulse(self.on_ticks(duty))
        } else {
            PulsePhase::Active {
                remaining: remaining - 1,
                duty,
            }
        };

        PulseOutput {
            drive,
            cost: drive.abs() * cost_duty,
            started,
        }
    }

    pub fn phase(&self) -> PulsePhase {
        self.phase
    }

    /// Ticks since the most recent pulse started.
    pub fn ticks_since_start(&self) -> Option<u64> {
        self.since_start
    }

    pub fn pulses_started(&self) -> u64 {
        self.pulses_started
    }
}
