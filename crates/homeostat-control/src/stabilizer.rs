// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Decision Stabilizer
// ─────────────────────────────────────────────────────────────────────
//! Winner-take-all with hysteresis margin and minimum dwell. Shared by
//! every scoring policy.

use homeostat_types::{Action, ActionScores, DecoderConfig};

#[derive(Debug, Clone)]
pub struct Stabilizer {
    margin: f64,
    dwell: u32,
    active: Action,
    since_change: u32,
}

impl Stabilizer {
    /// Starts in REST with the dwell already satisfied.
    pub fn new(margin: f64, dwell: u32) -> Self {
        Self {
            margin,
            dwell,
            active: Action::Rest,
            since_change: dwell,
        }
    }

    pub fn from_config(cfg: &DecoderConfig) -> Self {
        Self::new(cfg.hysteresis_margin, cfg.decision_dwell)
    }

    /// Feed one tick's scores; returns the active action.
    ///
    /// A switch needs all of: a different winner, a lead over the active
    /// action strictly greater than the margin, and at least `dwell` ticks
    /// since the previous switch.
    pub fn decide(&mut self, scores: &ActionScores) -> Action {
        self.since_change = self.since_change.saturating_add(1);
        let proposed = scores.winner();
        if proposed != self.active
            && self.since_change >= self.dwell
            && scores.get(proposed) - scores.get(self.active) > self.margin
        {
            log::debug!(
                "decision switch {} -> {} (lead {:.3})",
                self.active,
                proposed,
                scores.get(proposed) - scores.get(self.active)
            );
            self.active = proposed;
            self.since_change = 0;
        }
        self.active
    }

    pub fn active(&self) -> Action {
        self.active
    }

    pub fn ticks_since_change(&self) -> u32 {
        self.since_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_first_switch_is_immediate() {
        let mut s = Stabilizer::new(0.05, 50);
        assert_eq!(s.decide(&ActionScores::new(0.0, 1.0, 0.0)), Action::Repair);
    }

    #[test]
    fn test_margin_blocks_near_tie() {
        let mut s = Stabilizer::new(0.05, 0);
        assert_eq!(s.decide(&ActionScores::new(0.50, 0.54, 0.0)), Action::Rest);
        assert_eq!(s.decide(&ActionScores::new(0.50, 0.56, 0.0)), Action::Repair);
    }

    #[test]
    fn test_margin_equal_does_not_switch() {
        let mut s = Stabilizer::new(0.25, 0);
        assert_eq!(s.decide(&ActionScores::new(0.25, 0.5, 0.0)), Action::Rest);
    }

    #[test]
    fn test_dwell_holds_action() {
        let mut s = Stabilizer::new(0.05, 10);
        assert_eq!(s.decide(&ActionScores::new(0.0, 1.0, 0.0)), Action::Repair);
        for _ in 0..9 {
            assert_eq!(s.decide(&ActionScores::new(1.0, 0.0, 0.0)), Action::Repair);
        }
        assert_eq!(s.decide(&ActionScores::new(1.0, 0.0, 0.0)), Action::Rest);
    }

    #[test]
    fn test_dwell_property_random_scores() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let dwell = 7;
        let mut s = Stabilizer::new(0.05, dwell);
        let mut prev = s.active();
        let mut last_change: Option<usize> = None;
        let mut changes = 0;
        for t in 0..5000 {
            let scores = ActionScores::new(rng.gen(), rng.gen(), rng.gen());
            let a = s.decide(&scores);
            if a != prev {
                if let Some(lc) = last_change {
                    assert!(t - lc >= dwell as usize, "switch after {} ticks", t - lc);
                }
                last_change = Some(t);
                changes += 1;
                prev = a;
            }
        }
        assert!(changes > 10, "random scores should still switch sometimes");
    }
}
