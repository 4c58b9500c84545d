// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Coupling Estimator
// ─────────────────────────────────────────────────────────────────────
//! Short-lag spatial correlation between each cell's V and the mean of its
//! neighbors, averaged over recent frames and mapped to [0, 1]
//! (0.5 = uncorrelated).

use homeostat_tissue::{Grid, Regions};

/// Fewest frames before an estimate is reported.
pub const MIN_COUPLING_FRAMES: usize = 4;

struct RegionCorr {
    ring: Vec<f64>,
    head: usize,
    count: usize,
}

pub struct CouplingEstimator {
    regions: Vec<RegionCorr>,
    // scratch
    a: Vec<f64>,
    b: Vec<f64>,
}

impl CouplingEstimator {
    pub fn new(n_regions: usize, window: usize) -> Self {
        let window = window.max(1);
        Self {
            regions: (0..n_regions)
                .map(|_| RegionCorr {
                    ring: vec![0.0; window],
                    head: 0,
                    count: 0,
                })
                .collect(),
            a: Vec::new(),
            b: Vec::new(),
        }
    }

    /// Add one frame's correlation for every region.
    pub fn update(&mut self, grid: &Grid, regions: &Regions, v: &[f64]) {
        for r in 0..self.regions.len() {
            let cells = regions.cells(r);
            let corr = self.frame_correlation(grid, cells, v);
            let rc = &mut self.regions[r];
            let cap = rc.ring.len();
            rc.ring[rc.head] = corr;
            rc.head = (rc.head + 1) % cap;
            rc.count = (rc.count + 1).min(cap);
        }
    }

    fn frame_correlation(&mut self, grid: &Grid, cells: &[usize], v: &[f64]) -> f64 {
        self.a.clear();
        self.b.clear();
        for &i in cells {
            let nb = grid.neighbors(i);
            self.a.push(v[i]);
            self.b.push((v[nb[0]] + v[nb[1]] + v[nb[2]] + v[nb[3]]) / 4.0);
        }
        pearson(&self.a, &self.b)
    }

    /// `None` for single-cell regions or before enough frames arrived.
    pub fn estimate(&self, regions: &Regions, region: usize) -> Option<f64> {
        let rc = &self.regions[region];
        if regions.cells(region).len() < 2 || rc.count < MIN_COUPLING_FRAMES {
            return None;
        }
        let mean = rc.ring[..rc.count].iter().sum::<f64>() / rc.count as f64;
        Some(((mean + 1.0) / 2.0).clamp(0.0, 1.0))
    }
}

/// Pearson correlation; 0 when either side has no variance.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.len() < 2 {
        return 0.0;
    }
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        sab / denom
    }
}
