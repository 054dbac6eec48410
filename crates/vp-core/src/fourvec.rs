//! Minimal four-vector in (pt, eta, phi, E) representation.
//!
//! Only the operations the correction and selection code needs: scaling,
//! addition/subtraction, angular distance, invariant mass.

use std::ops::{Add, Mul, Sub};

/// A four-momentum stored in collider coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourVec {
    px: f64,
    py: f64,
    pz: f64,
    e: f64,
}

impl FourVec {
    /// Build from (pt, eta, phi, E).
    pub fn from_ptetaphie(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self {
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: pt * eta.sinh(),
            e,
        }
    }

    /// Build from Cartesian components.
    pub fn from_pxpypze(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Zero vector.
    pub fn zero() -> Self {
        Self { px: 0.0, py: 0.0, pz: 0.0, e: 0.0 }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Pseudorapidity. Returns 0 for a vector with no momentum.
    pub fn eta(&self) -> f64 {
        let p = (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt();
        if p == 0.0 {
            return 0.0;
        }
        if p == self.pz.abs() {
            // straight along the beam axis
            return if self.pz >= 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        }
        0.5 * ((p + self.pz) / (p - self.pz)).ln()
    }

    /// Azimuthal angle in (-pi, pi].
    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }

    /// Energy component.
    pub fn energy(&self) -> f64 {
        self.e
    }

    /// x-component of momentum.
    pub fn px(&self) -> f64 {
        self.px
    }

    /// y-component of momentum.
    pub fn py(&self) -> f64 {
        self.py
    }

    /// z-component of momentum.
    pub fn pz(&self) -> f64 {
        self.pz
    }

    /// Invariant mass; 0 for spacelike vectors.
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz);
        if m2 > 0.0 { m2.sqrt() } else { 0.0 }
    }

    /// Angular distance sqrt(deta^2 + dphi^2).
    pub fn delta_r(&self, other: &FourVec) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = delta_phi(self.phi(), other.phi());
        (deta * deta + dphi * dphi).sqrt()
    }
}

impl Mul<f64> for FourVec {
    type Output = FourVec;

    fn mul(self, s: f64) -> FourVec {
        FourVec { px: self.px * s, py: self.py * s, pz: self.pz * s, e: self.e * s }
    }
}

impl Add for FourVec {
    type Output = FourVec;

    fn add(self, o: FourVec) -> FourVec {
        FourVec { px: self.px + o.px, py: self.py + o.py, pz: self.pz + o.pz, e: self.e + o.e }
    }
}

impl Sub for FourVec {
    type Output = FourVec;

    fn sub(self, o: FourVec) -> FourVec {
        FourVec { px: self.px - o.px, py: self.py - o.py, pz: self.pz - o.pz, e: self.e - o.e }
    }
}

/// Signed azimuthal difference wrapped into (-pi, pi].
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let mut d = phi1 - phi2;
    while d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    }
    while d <= -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn roundtrip_ptetaphie() {
        let v = FourVec::from_ptetaphie(50.0, 1.2, 0.7, 120.0);
        assert_relative_eq!(v.pt(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(v.eta(), 1.2, epsilon = 1e-9);
        assert_relative_eq!(v.phi(), 0.7, epsilon = 1e-9);
        assert_relative_eq!(v.energy(), 120.0, epsilon = 1e-9);
    }

    #[test]
    fn scaling_scales_pt_and_energy() {
        let v = FourVec::from_ptetaphie(40.0, -0.5, 2.0, 90.0) * 1.1;
        assert_relative_eq!(v.pt(), 44.0, epsilon = 1e-9);
        assert_relative_eq!(v.energy(), 99.0, epsilon = 1e-9);
        assert_relative_eq!(v.eta(), -0.5, epsilon = 1e-9);
    }

    #[test]
    fn mass_of_back_to_back_pair() {
        let a = FourVec::from_ptetaphie(50.0, 0.0, 0.0, 50.0);
        let b = FourVec::from_ptetaphie(50.0, 0.0, std::f64::consts::PI, 50.0);
        assert_relative_eq!((a + b).mass(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn delta_phi_wraps() {
        assert_relative_eq!(delta_phi(3.0, -3.0), 6.0 - 2.0 * std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn delta_r_simple() {
        let a = FourVec::from_ptetaphie(30.0, 1.0, 0.5, 60.0);
        let b = FourVec::from_ptetaphie(30.0, 0.0, 0.5, 60.0);
        assert_relative_eq!(a.delta_r(&b), 1.0, epsilon = 1e-9);
    }
}
