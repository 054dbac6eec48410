//! Event-level kinematic variables: transverse masses, the W-constrained
//! neutrino solution, and missing-energy direction.

use vp_core::{delta_phi, FourVec};

const W_MASS: f64 = 80.4;

/// Azimuth of a (px, py) vector with explicit quadrant handling, in
/// (-pi, pi].
pub fn quadrant_phi(px: f64, py: f64) -> f64 {
    if px < 0.0 {
        if py > 0.0 {
            (py / px).atan() + std::f64::consts::PI
        } else {
            (py / px).atan() - std::f64::consts::PI
        }
    } else {
        (py / px).atan()
    }
}

/// W transverse mass of a lepton against the missing energy.
pub fn transverse_mass(lepton_pt: f64, lepton_phi: f64, met_pt: f64, met_phi: f64) -> f64 {
    let dphi = delta_phi(lepton_phi, met_phi).abs();
    (2.0 * lepton_pt * met_pt * (1.0 - dphi.cos())).sqrt()
}

/// Transverse mass of a visible system (lepton + b jet) against the missing
/// energy, treating the invisible side as massless.
pub fn system_transverse_mass(visible: FourVec, met_px: f64, met_py: f64) -> f64 {
    let m = visible.mass();
    let et = (m * m + visible.pt() * visible.pt()).sqrt();
    let met = met_px.hypot(met_py);
    let mt2 = (et + met) * (et + met)
        - (visible.px() + met_px) * (visible.px() + met_px)
        - (visible.py() + met_py) * (visible.py() + met_py);
    mt2.max(0.0).sqrt()
}

/// Longitudinal neutrino momentum from the W mass constraint; when the
/// discriminant is negative the real part of the complex solution is used.
pub fn neutrino_pz(lepton: FourVec, met_px: f64, met_py: f64) -> f64 {
    let mu = W_MASS * W_MASS / 2.0 + lepton.px() * met_px + lepton.py() * met_py;
    let lepton_e = lepton.energy();
    let pz = lepton.pz();
    let pt2 = lepton.pt() * lepton.pt();
    if pt2 == 0.0 {
        return 0.0;
    }
    let a = mu * pz / pt2;
    let met2 = met_px * met_px + met_py * met_py;
    let disc = a * a - (lepton_e * lepton_e * met2 - mu * mu) / pt2;
    if disc < 0.0 {
        a
    } else {
        // smaller-|pz| root
        let root = disc.sqrt();
        if (a + root).abs() < (a - root).abs() { a + root } else { a - root }
    }
}

/// Semileptonic top four-momentum: lepton + b jet + W-constrained neutrino.
pub fn semileptonic_top(lepton: FourVec, bjet: FourVec, met_px: f64, met_py: f64) -> FourVec {
    let pz = neutrino_pz(lepton, met_px, met_py);
    let e = (met_px * met_px + met_py * met_py + pz * pz).sqrt();
    let neutrino = FourVec::from_pxpypze(met_px, met_py, pz, e);
    lepton + bjet + neutrino
}

/// Conservative stransverse-mass proxy for the single-lepton channel: the
/// smallest, over b-jet choices, of the larger of the lepton-side and
/// (lepton + b)-side transverse masses. Sentinel-free: returns 0 with no
/// b jets.
pub fn mt2w_proxy(lepton: FourVec, bjets: &[FourVec], met_px: f64, met_py: f64) -> f64 {
    if bjets.is_empty() {
        return 0.0;
    }
    let met_pt = met_px.hypot(met_py);
    let met_phi = quadrant_phi(met_px, met_py);
    let lep_mt = transverse_mass(lepton.pt(), lepton.phi(), met_pt, met_phi);
    bjets
        .iter()
        .map(|b| system_transverse_mass(lepton + *b, met_px, met_py).max(lep_mt))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadrant_phi_covers_all_quadrants() {
        assert_relative_eq!(quadrant_phi(1.0, 1.0), std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_relative_eq!(
            quadrant_phi(-1.0, 1.0),
            3.0 * std::f64::consts::FRAC_PI_4,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            quadrant_phi(-1.0, -1.0),
            -3.0 * std::f64::consts::FRAC_PI_4,
            epsilon = 1e-12
        );
        assert_relative_eq!(quadrant_phi(1.0, -1.0), -std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn back_to_back_transverse_mass() {
        // lepton and met back to back: mt = sqrt(4 * pt_l * pt_met) at
        // dphi = pi
        let mt = transverse_mass(50.0, 0.0, 50.0, std::f64::consts::PI);
        assert_relative_eq!(mt, 100.0, epsilon = 1e-9);
        // aligned: zero
        assert_relative_eq!(transverse_mass(50.0, 1.0, 50.0, 1.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn neutrino_pz_is_zero_for_central_balanced_w() {
        // lepton at eta = 0 with met exactly balancing the W mass gives a
        // real solution symmetric around zero
        let lepton = FourVec::from_ptetaphie(40.2, 0.0, 0.0, 40.2);
        let pz = neutrino_pz(lepton, -40.2, 0.0);
        assert!(pz.abs() < 1.0);
    }

    #[test]
    fn mt2w_proxy_picks_smallest_b_assignment() {
        let lepton = FourVec::from_ptetaphie(50.0, 0.2, 0.0, 51.0);
        let b_near = FourVec::from_ptetaphie(60.0, 0.3, 0.2, 63.0);
        let b_far = FourVec::from_ptetaphie(60.0, -1.0, 3.0, 95.0);
        let one = mt2w_proxy(lepton, &[b_near], -30.0, 10.0);
        let both = mt2w_proxy(lepton, &[b_near, b_far], -30.0, 10.0);
        assert!(both <= one + 1e-9);
        assert_eq!(mt2w_proxy(lepton, &[], -30.0, 10.0), 0.0);
    }
}
