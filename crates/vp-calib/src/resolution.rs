//! Jet energy and large-radius mass resolution tables.

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

/// One |eta| bin of the resolution scale: nominal value plus the additive
/// shift applied for resolution-up/down variations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionBin {
    /// Lower |eta| edge (inclusive).
    pub abs_eta_min: f64,
    /// Upper |eta| edge (exclusive).
    pub abs_eta_max: f64,
    /// Nominal resolution scale.
    pub nominal: f64,
    /// Additive one-sigma shift.
    pub shift: f64,
}

/// Stepwise resolution-scale function of |eta|.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionTable {
    /// Bins ordered in |eta|.
    pub bins: Vec<ResolutionBin>,
}

impl ResolutionTable {
    /// Resolution scale at |eta|, shifted by `fac` sigma (+1/-1/0).
    pub fn scale(&self, abs_eta: f64, fac: f64) -> Result<f64> {
        self.bins
            .iter()
            .find(|b| abs_eta >= b.abs_eta_min && abs_eta < b.abs_eta_max)
            .map(|b| b.nominal + b.shift * fac)
            .ok_or_else(|| {
                Error::Validation(format!("no resolution bin covers |eta| = {abs_eta}"))
            })
    }

    /// Reject empty or overlapping bins at load time.
    pub fn validate(&self) -> Result<()> {
        if self.bins.is_empty() {
            return Err(Error::Validation("resolution table has no bins".into()));
        }
        for w in self.bins.windows(2) {
            if w[1].abs_eta_min < w[0].abs_eta_max {
                return Err(Error::Validation(format!(
                    "resolution bins overlap at |eta| = {}",
                    w[1].abs_eta_min
                )));
            }
        }
        Ok(())
    }
}

/// One |eta| bin of the large-radius mass resolution parameterization:
/// sigma(pt, rho) = sqrt(a^2/pt^2 + b^2 * rho/pt + c^2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassResolutionBin {
    /// Lower |eta| edge (inclusive).
    pub abs_eta_min: f64,
    /// Upper |eta| edge (exclusive).
    pub abs_eta_max: f64,
    /// Noise-like term.
    pub a: f64,
    /// Pileup term.
    pub b: f64,
    /// Constant term.
    pub c: f64,
}

/// Mass-resolution table for stochastic substructure-mass smearing, plus the
/// data/simulation resolution scale factor and its uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassResolutionTable {
    /// Data/simulation resolution scale factor.
    pub sf: f64,
    /// One-sigma uncertainty on `sf`.
    pub unc: f64,
    /// Bins ordered in |eta|.
    pub bins: Vec<MassResolutionBin>,
}

impl MassResolutionTable {
    /// Relative mass resolution at (pt, |eta|, rho).
    pub fn sigma(&self, pt: f64, abs_eta: f64, rho: f64) -> Result<f64> {
        let bin = self
            .bins
            .iter()
            .find(|b| abs_eta >= b.abs_eta_min && abs_eta < b.abs_eta_max)
            .ok_or_else(|| {
                Error::Validation(format!("no mass-resolution bin covers |eta| = {abs_eta}"))
            })?;
        let pt = pt.max(1.0);
        Ok((bin.a * bin.a / (pt * pt) + bin.b * bin.b * rho / pt + bin.c * bin.c).sqrt())
    }

    /// Smearing width factor sqrt(max(0, (sf + fac*unc)^2 - 1)).
    pub fn width_factor(&self, fac: f64) -> f64 {
        let s = self.sf + fac * self.unc;
        (s * s - 1.0).max(0.0).sqrt()
    }

    /// Reject empty tables at load time.
    pub fn validate(&self) -> Result<()> {
        if self.bins.is_empty() {
            return Err(Error::Validation("mass-resolution table has no bins".into()));
        }
        Ok(())
    }
}
