// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Grid Topology & Control Regions
// ─────────────────────────────────────────────────────────────────────
//! Fixed 4-neighborhood adjacency, computed once at construction.
//!
//! Cells are indexed row-major: `i = r * cols + c`. Neighbor order is
//! (up, down, left, right).

use homeostat_types::{Boundary, GridConfig};

#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    boundary: Boundary,
    neighbors: Vec<[usize; 4]>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, boundary: Boundary) -> Self {
        let mut neighbors = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let me = r * cols + c;
                let at = |rr: Option<usize>, cc: Option<usize>| -> usize {
                    match (rr, cc) {
                        (Some(rr), Some(cc)) => rr * cols + cc,
                        _ => me,
                    }
                };
                let (up, down, left, right) = match boundary {
                    Boundary::Periodic => (
                        Some((r + rows - 1) % rows),
                        Some((r + 1) % rows),
                        Some((c + cols - 1) % cols),
                        Some((c + 1) % cols),
                    ),
                    Boundary::Reflective => (
                        r.checked_sub(1),
                        (r + 1 < rows).then_some(r + 1),
                        c.checked_sub(1),
                        (c + 1 < cols).then_some(c + 1),
                    ),
                };
                neighbors.push([
                    at(up, Some(c)),
                    at(down, Some(c)),
                    at(Some(r), left),
                    at(Some(r), right),
                ]);
            }
        }
        Self {
            rows,
            cols,
            boundary,
            neighbors,
        }
    }

    pub fn from_config(cfg: &GridConfig) -> Self {
        Self::new(cfg.rows, cfg.cols, cfg.boundary)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn neighbors(&self, cell: usize) -> &[usize; 4] {
        &self.neighbors[cell]
    }

    /// 5-point Laplacian `Σ_n x_n − 4·x_i` into `out`.
    ///
    /// A neighbor equal to the cell itself contributes zero, which is the
    /// zero-flux condition under reflective boundaries.
    pub fn laplacian(&self, field: &[f64], out: &mut [f64]) {
        for (i, nb) in self.neighbors.iter().enumerate() {
            let x = field[i];
            out[i] = (field[nb[0]] - x) + (field[nb[1]] - x) + (field[nb[2]] - x) + (field[nb[3]] - x);
        }
    }
}

/// Tiling of the grid into control regions.
#[derive(Debug, Clone)]
pub struct Regions {
    cell_region: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl Regions {
    pub fn from_config(cfg: &GridConfig) -> Self {
        let (tiles_r, tiles_c) = cfg.region_tiles();
        let rr = cfg.region_rows.max(1);
        let rc = cfg.region_cols.max(1);
        let mut members = vec![Vec::new(); tiles_r * tiles_c];
        let mut cell_region = Vec::with_capacity(cfg.cell_count());
        for r in 0..cfg.rows {
            for c in 0..cfg.cols {
                let region = (r / rr) * tiles_c + c / rc;
                members[region].push(r * cfg.cols + c);
                cell_region.push(region);
            }
        }
        Self {
            cell_region,
            members,
        }
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn region_of(&self, cell: usize) -> usize {
        self.cell_region[cell]
    }

    pub fn cells(&self, region: usize) -> &[usize] {
        &self.members[region]
    }

    /// Mean of `field` over the region's cells.
    pub fn mean(&self, region: usize, field: &[f64]) -> f64 {
        let cells = &self.members[region];
        if cells.is_empty() {
            return 0.0;
        }
        cells.iter().map(|&i| field[i]).sum::<f64>() / cells.len() as f64
    }
}
