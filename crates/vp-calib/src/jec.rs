//! Jet energy correction coefficients.

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

/// One |eta| bin of the response polynomial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBin {
    /// Lower |eta| edge (inclusive).
    pub abs_eta_min: f64,
    /// Upper |eta| edge (exclusive).
    pub abs_eta_max: f64,
    /// Constant term.
    pub p0: f64,
    /// Coefficient of ln(pt).
    pub p1: f64,
    /// Coefficient of ln(pt)^2.
    pub p2: f64,
}

/// Calibration function parameterized by pt, |eta|, jet area, pileup density
/// and primary-vertex count: a pileup-offset (L1) term times a piecewise
/// response polynomial in ln(pt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JecTable {
    /// Coefficient of the rho*area/pt pileup offset.
    pub offset_coeff: f64,
    /// Linear primary-vertex-count term added to the response.
    #[serde(default)]
    pub npv_coeff: f64,
    /// Response bins, ordered in |eta|.
    pub response: Vec<ResponseBin>,
}

impl JecTable {
    fn response_bin(&self, abs_eta: f64) -> Result<&ResponseBin> {
        self.response
            .iter()
            .find(|b| abs_eta >= b.abs_eta_min && abs_eta < b.abs_eta_max)
            .ok_or_else(|| {
                Error::Validation(format!("no JEC response bin covers |eta| = {abs_eta}"))
            })
    }

    /// Pileup-offset (L1) correction factor, clamped at zero.
    pub fn l1_correction(&self, pt: f64, area: f64, rho: f64) -> f64 {
        if pt <= 0.0 {
            return 1.0;
        }
        (1.0 - self.offset_coeff * rho * area / pt).max(0.0)
    }

    /// Response-only (no pileup term) correction factor.
    pub fn response_correction(&self, pt: f64, eta: f64, npv: usize) -> Result<f64> {
        let bin = self.response_bin(eta.abs())?;
        // ln(pt) is evaluated with a floor so very soft jets stay finite
        let l = pt.max(4.0).ln();
        Ok(bin.p0 + bin.p1 * l + bin.p2 * l * l + self.npv_coeff * npv as f64)
    }

    /// Full correction: L1 offset times response.
    pub fn correction(&self, pt: f64, eta: f64, area: f64, rho: f64, npv: usize) -> Result<f64> {
        Ok(self.l1_correction(pt, area, rho) * self.response_correction(pt, eta, npv)?)
    }

    /// Reject unordered or empty bins at load time.
    pub fn validate(&self) -> Result<()> {
        if self.response.is_empty() {
            return Err(Error::Validation("JEC table has no response bins".into()));
        }
        for w in self.response.windows(2) {
            if w[1].abs_eta_min < w[0].abs_eta_max {
                return Err(Error::Validation(format!(
                    "JEC response bins overlap at |eta| = {}",
                    w[1].abs_eta_min
                )));
            }
        }
        Ok(())
    }
}
