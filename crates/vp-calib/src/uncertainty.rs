//! Jet energy-scale uncertainty grid.

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

/// One |eta| row of the uncertainty grid: relative uncertainties sampled at
/// the shared pt nodes, interpolated linearly in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyRow {
    /// Lower |eta| edge (inclusive).
    pub abs_eta_min: f64,
    /// Upper |eta| edge (exclusive).
    pub abs_eta_max: f64,
    /// Relative uncertainty at each pt node.
    pub values: Vec<f64>,
}

/// Relative scale uncertainty keyed by corrected pt and |eta|.
///
/// pt is clamped into the node range; an |eta| outside row coverage is a
/// fatal configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyGrid {
    /// pt sample nodes, strictly increasing.
    pub pt_nodes: Vec<f64>,
    /// |eta| rows.
    pub rows: Vec<UncertaintyRow>,
}

impl UncertaintyGrid {
    /// Relative (unsigned) uncertainty at (pt, eta).
    pub fn relative(&self, pt: f64, eta: f64) -> Result<f64> {
        let abs_eta = eta.abs();
        let row = self
            .rows
            .iter()
            .find(|r| abs_eta >= r.abs_eta_min && abs_eta < r.abs_eta_max)
            .ok_or_else(|| {
                Error::Validation(format!("no uncertainty row covers |eta| = {abs_eta}"))
            })?;

        let n = self.pt_nodes.len();
        let pt = pt.clamp(self.pt_nodes[0], self.pt_nodes[n - 1]);
        let hi = match self.pt_nodes.iter().position(|&node| pt <= node) {
            Some(0) => return Ok(row.values[0]),
            Some(i) => i,
            None => return Ok(row.values[n - 1]),
        };
        let (p0, p1) = (self.pt_nodes[hi - 1], self.pt_nodes[hi]);
        let (v0, v1) = (row.values[hi - 1], row.values[hi]);
        Ok(v0 + (v1 - v0) * (pt - p0) / (p1 - p0))
    }

    /// Reject malformed grids at load time.
    pub fn validate(&self) -> Result<()> {
        if self.pt_nodes.len() < 2 {
            return Err(Error::Validation("uncertainty grid needs at least 2 pt nodes".into()));
        }
        if !self.pt_nodes.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Validation("uncertainty grid pt nodes must increase".into()));
        }
        for row in &self.rows {
            if row.values.len() != self.pt_nodes.len() {
                return Err(Error::Validation(format!(
                    "uncertainty row [{}, {}) has {} values for {} pt nodes",
                    row.abs_eta_min,
                    row.abs_eta_max,
                    row.values.len(),
                    self.pt_nodes.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> UncertaintyGrid {
        UncertaintyGrid {
            pt_nodes: vec![20.0, 100.0, 1000.0],
            rows: vec![
                UncertaintyRow { abs_eta_min: 0.0, abs_eta_max: 1.3, values: vec![0.03, 0.01, 0.02] },
                UncertaintyRow { abs_eta_min: 1.3, abs_eta_max: 5.0, values: vec![0.05, 0.02, 0.04] },
            ],
        }
    }

    #[test]
    fn interpolates_in_pt() {
        let g = grid();
        assert_relative_eq!(g.relative(60.0, 0.5).unwrap(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(g.relative(20.0, 0.5).unwrap(), 0.03, epsilon = 1e-12);
    }

    #[test]
    fn clamps_pt_outside_nodes() {
        let g = grid();
        assert_relative_eq!(g.relative(5.0, 0.5).unwrap(), 0.03, epsilon = 1e-12);
        assert_relative_eq!(g.relative(5000.0, 0.5).unwrap(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn eta_outside_rows_is_fatal() {
        assert!(grid().relative(50.0, 6.0).is_err());
    }

    #[test]
    fn mismatched_row_rejected() {
        let mut g = grid();
        g.rows[0].values.pop();
        assert!(g.validate().is_err());
    }
}
