// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Run Metrics
// ─────────────────────────────────────────────────────────────────────
//! Post-run scalars: recovery time, flicker rate, PLV retention.

/// First index from which `healthy` stays true for at least `dwell` samples.
pub fn recovery_index(healthy: &[bool], dwell: usize) -> Option<usize> {
    let dwell = dwell.max(1);
    let mut run = 0;
    for (i, ok) in healthy.iter().enumerate() {
        run = if *ok { run + 1 } else { 0 };
        if run >= dwell {
            return Some(i + 1 - dwell);
        }
    }
    None
}

/// Action switches per region-second.
pub fn flicker_rate(switches: u64, n_regions: usize, seconds: f64) -> f64 {
    if n_regions == 0 || seconds <= 0.0 {
        return 0.0;
    }
    switches as f64 / (n_regions as f64 * seconds)
}

fn mean_known(xs: &[Option<f64>]) -> Option<f64> {
    let known: Vec<f64> = xs.iter().flatten().copied().collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    }
}

/// Mean PLV of the final `window` samples over the mean of the first
/// `window` known samples, clipped to [0, 1].
///
/// The baseline window starts at the first known PLV. `None` when the two
/// windows cannot be formed or the baseline is ~0.
pub fn plv_retention(series: &[Option<f64>], window: usize) -> Option<f64> {
    let window = window.max(1);
    let start = series.iter().position(|p| p.is_some())?;
    let usable = &series[start..];
    if usable.len() < 2 * window {
        return None;
    }
    let baseline = mean_known(&usable[..window])?;
    let last = mean_known(&usable[usable.len() - window..])?;
    if baseline <= 1e-6 {
        return None;
    }
    Some((last / baseline).clamp(0.0, 1.0))
}

/// Per-tick series the summary is computed from.
#[derive(Debug, Clone, Default)]
pub struct RunTrace {
    pub time_s: Vec<f64>,
    pub mean_v_mv: Vec<f64>,
    /// Mean PLV over regions with a known estimate.
    pub plv: Vec<Option<f64>>,
    /// Time of every action switch, any region.
    pub switch_times_s: Vec<f64>,
}

impl RunTrace {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            time_s: Vec::with_capacity(n),
            mean_v_mv: Vec::with_capacity(n),
            plv: Vec::with_capacity(n),
            switch_times_s: Vec::new(),
        }
    }

    pub fn push(&mut self, t: f64, mean_v: f64, plv: Option<f64>) {
        self.time_s.push(t);
        self.mean_v_mv.push(mean_v);
        self.plv.push(plv);
    }

    pub fn len(&self) -> usize {
        self.time_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_s.is_empty()
    }

    /// Time from which mean V stays in `[lo, hi)` for `dwell` samples.
    pub fn recovery_time(&self, lo: f64, hi: f64, dwell: usize) -> Option<f64> {
        let healthy: Vec<bool> = self
            .mean_v_mv
            .iter()
            .map(|v| *v >= lo && *v < hi)
            .collect();
        recovery_index(&healthy, dwell).map(|i| self.time_s[i])
    }

    pub fn switches_after(&self, warmup_s: f64) -> u64 {
        self.switch_times_s.iter().filter(|t| **t >= warmup_s).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_index_smoke() {
        let healthy = [false, false, true, true, false, true, true, true, true];
        assert_eq!(recovery_index(&healthy, 3), Some(5));
        assert_eq!(recovery_index(&healthy, 2), Some(2));
        assert_eq!(recovery_index(&healthy, 5), None);
        assert_eq!(recovery_index(&[], 1), None);
    }

    #[test]
    fn test_flicker_rate() {
        assert!((flicker_rate(6, 2, 30.0) - 0.1).abs() < 1e-12);
        assert_eq!(flicker_rate(6, 0, 30.0), 0.0);
        assert_eq!(flicker_rate(6, 2, 0.0), 0.0);
    }

    #[test]
    fn test_plv_retention_smoke() {
        let mut series: Vec<Option<f64>> = vec![None; 5];
        series.extend(std::iter::repeat(Some(0.8)).take(10));
        series.extend(std::iter::repeat(Some(0.4)).take(10));
        let r = plv_retention(&series, 10).unwrap();
        assert!((r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_plv_retention_clipped_and_undefined() {
        let mut up: Vec<Option<f64>> = vec![Some(0.3); 4];
        up.extend(vec![Some(0.9); 4]);
        assert_eq!(plv_retention(&up, 4), Some(1.0));
        assert_eq!(plv_retention(&up, 5), None);
        assert_eq!(plv_retention(&[None; 10], 2), None);
        assert_eq!(plv_retention(&[Some(0.0); 10], 2), None);
    }

    #[test]
    fn test_trace_recovery_time() {
        let mut tr = RunTrace::default();
        for (i, v) in [-20.0, -12.0, -7.0, -6.0, -5.0, -5.0].iter().enumerate() {
            tr.push(i as f64 * 2.0, *v, None);
        }
        assert_eq!(tr.recovery_time(-8.0, 10.0, 3), Some(4.0));
        tr.switch_times_s = vec![1.0, 5.0, 9.0];
        assert_eq!(tr.switches_after(4.0), 2);
    }
}
