//! Top-quark reconstruction: boosted (large-radius) top and W tagging,
//! resolved hadronic trijet candidates, and resolved semileptonic
//! lepton + b candidates.

use vp_core::{delta_phi, FourVec};

use crate::kinematics::{semileptonic_top, system_transverse_mass};
use crate::selection::SelectedLepton;

const TOP_TAG_SOFT_DROP_MIN: f64 = 105.0;
const TOP_TAG_SOFT_DROP_MAX: f64 = 220.0;
const TOP_TAG_TAU32_MAX: f64 = 0.81;
const TOP_TAG_PT_MIN: f64 = 500.0;

const W_TAG_PRUNED_MIN: f64 = 65.0;
const W_TAG_PRUNED_MAX: f64 = 95.0;
const W_TAG_TAU21_MAX: f64 = 0.6;
const W_TAG_PT_MIN: f64 = 200.0;

const W_TAG_PAIR_DR_MIN: f64 = 0.8;
const W_TAG_PAIR_DR_MAX: f64 = 2.5;
const W_TAG_TOP_MASS_MIN: f64 = 140.0;
const W_TAG_TOP_MASS_MAX: f64 = 250.0;

/// Outcome of boosted tagging for one large-radius jet.
#[derive(Debug, Clone, Copy)]
pub struct BoostedTag {
    pub is_top: bool,
    pub is_w: bool,
    /// Reconstructed top momentum: the jet itself for a top tag, jet plus
    /// the paired small-radius jet for a W tag.
    pub top_p4: FourVec,
}

/// Classify a corrected large-radius jet as a boosted top or a boosted W.
///
/// A W tag additionally requires a small-radius jet at moderate angular
/// distance whose pairing with the W candidate lands in the top mass window;
/// the nearest such jet is used.
pub fn boosted_tag(
    p4: FourVec,
    soft_drop_mass: f64,
    pruned_mass: f64,
    tau3_over_tau2: f64,
    tau2_over_tau1: f64,
    small_jets: &[FourVec],
) -> BoostedTag {
    let pt = p4.pt();
    let is_top = (TOP_TAG_SOFT_DROP_MIN..=TOP_TAG_SOFT_DROP_MAX).contains(&soft_drop_mass)
        && tau3_over_tau2 <= TOP_TAG_TAU32_MAX
        && pt > TOP_TAG_PT_MIN;

    let mut is_w = (W_TAG_PRUNED_MIN..=W_TAG_PRUNED_MAX).contains(&pruned_mass)
        && tau2_over_tau1 <= W_TAG_TAU21_MAX
        && pt > W_TAG_PT_MIN;

    let mut top_p4 = FourVec::zero();
    if is_w {
        let mut best_top_mass = 0.0;
        let mut best_pair = FourVec::zero();
        let mut dr_min = W_TAG_PAIR_DR_MAX + 0.1;
        for small in small_jets {
            let dr = p4.delta_r(small);
            if dr <= W_TAG_PAIR_DR_MIN || dr > W_TAG_PAIR_DR_MAX {
                continue;
            }
            if dr < dr_min {
                dr_min = dr;
                best_top_mass = (p4 + *small).mass();
                best_pair = *small;
            }
        }
        if !(W_TAG_TOP_MASS_MIN..=W_TAG_TOP_MASS_MAX).contains(&best_top_mass) {
            is_w = false;
        } else {
            top_p4 = p4 + best_pair;
        }
    }
    if is_top {
        top_p4 = p4;
    }

    BoostedTag { is_top, is_w, top_p4 }
}

/// One resolved hadronic trijet candidate.
#[derive(Debug, Clone, Copy)]
pub struct HadronicTopCandidate {
    pub p4: FourVec,
    pub w_mass: f64,
    /// Mass drop of the W-side dijet scaled by its opening angle.
    pub mass_drop: f64,
    pub delta_r_jets: f64,
    pub index_b: usize,
    pub index_j1: usize,
    pub index_j2: usize,
}

/// A small-radius jet as seen by the resolved-top combinatorics.
#[derive(Debug, Clone, Copy)]
pub struct TopInputJet {
    pub p4: FourVec,
    pub is_tight: bool,
    pub is_b_tagged: bool,
}

/// Enumerate trijet combinations among the leading jets with exactly one
/// b tag and all three passing the tight identification.
pub fn resolved_hadronic_tops(
    jets: &[TopInputJet],
    max_leading: usize,
    capacity: usize,
) -> Vec<HadronicTopCandidate> {
    let mut out = Vec::new();
    let n = jets.len().min(max_leading);
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if out.len() >= capacity {
                    return out;
                }
                let (a, b, c) = (&jets[i], &jets[j], &jets[k]);
                if a.p4.pt() <= 0.0 || b.p4.pt() <= 0.0 || c.p4.pt() <= 0.0 {
                    continue;
                }
                if !(a.is_tight && b.is_tight && c.is_tight) {
                    continue;
                }
                let n_b = [a, b, c].iter().filter(|x| x.is_b_tagged).count();
                if n_b != 1 {
                    continue;
                }
                let (bi, j1, j2) = if a.is_b_tagged {
                    (i, j, k)
                } else if b.is_b_tagged {
                    (j, i, k)
                } else {
                    (k, i, j)
                };
                let p4_w = jets[j1].p4 + jets[j2].p4;
                let top = p4_w + jets[bi].p4;
                let w_mass = p4_w.mass();
                let dr = jets[j1].p4.delta_r(&jets[j2].p4);
                let drop = if w_mass > 0.0 {
                    jets[j1].p4.mass().max(jets[j2].p4.mass()) / w_mass
                } else {
                    0.0
                };
                if top.mass() < 0.0 || w_mass < 0.0 {
                    continue;
                }
                out.push(HadronicTopCandidate {
                    p4: top,
                    w_mass,
                    mass_drop: drop * dr,
                    delta_r_jets: dr,
                    index_b: bi,
                    index_j1: j1,
                    index_j2: j2,
                });
            }
        }
    }
    out
}

/// One resolved semileptonic candidate: lepton + b jet + neutrino.
#[derive(Debug, Clone, Copy)]
pub struct SemileptonicTopCandidate {
    pub p4: FourVec,
    /// Transverse mass of the lepton + b system against the missing energy.
    pub mt: f64,
    pub lb_met_phi: f64,
    pub lepton_met_phi: f64,
    pub b_met_phi: f64,
    pub top_met_phi: f64,
    pub lepton_b_phi: f64,
    pub index_b: usize,
    pub index_lepton: usize,
    /// 13 for a muon, 11 for an electron.
    pub lepton_flavour: f64,
}

/// Pair every selected b jet with every selected lepton. The caller gates on
/// the single-lepton topology.
pub fn resolved_semileptonic_tops(
    leptons: &[SelectedLepton],
    bjets: &[(usize, FourVec)],
    met_px: f64,
    met_py: f64,
    met_phi: f64,
    capacity: usize,
) -> Vec<SemileptonicTopCandidate> {
    let mut out = Vec::new();
    for (bi, b) in bjets {
        for lep in leptons {
            if out.len() >= capacity {
                return out;
            }
            let top = semileptonic_top(lep.p4, *b, met_px, met_py);
            out.push(SemileptonicTopCandidate {
                p4: top,
                mt: system_transverse_mass(lep.p4 + *b, met_px, met_py),
                lb_met_phi: delta_phi((lep.p4 + *b).phi(), met_phi),
                lepton_met_phi: delta_phi(lep.p4.phi(), met_phi),
                b_met_phi: delta_phi(b.phi(), met_phi),
                top_met_phi: delta_phi(top.phi(), met_phi),
                lepton_b_phi: delta_phi(lep.p4.phi(), b.phi()),
                index_b: *bi,
                index_lepton: lep.index,
                lepton_flavour: lep.flavour,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fat(pt: f64, eta: f64, phi: f64, e: f64) -> FourVec {
        FourVec::from_ptetaphie(pt, eta, phi, e)
    }

    #[test]
    fn boosted_top_tag_thresholds() {
        let p4 = fat(550.0, 0.3, 0.0, 600.0);
        let tag = boosted_tag(p4, 170.0, 40.0, 0.5, 0.9, &[]);
        assert!(tag.is_top);
        assert!(!tag.is_w);
        assert_relative_eq!(tag.top_p4.pt(), p4.pt(), epsilon = 1e-9);

        // fails on pt
        let soft = boosted_tag(fat(450.0, 0.3, 0.0, 500.0), 170.0, 40.0, 0.5, 0.9, &[]);
        assert!(!soft.is_top);
        // fails on subjettiness
        let wide = boosted_tag(p4, 170.0, 40.0, 0.9, 0.9, &[]);
        assert!(!wide.is_top);
    }

    #[test]
    fn w_tag_needs_partner_in_top_window() {
        let p4 = fat(300.0, 0.0, 0.0, 320.0);
        // no partner jets
        assert!(!boosted_tag(p4, 40.0, 80.0, 0.9, 0.5, &[]).is_w);

        // partner at dR ~ 1.5 with a pairing in the top mass window
        let partner = fat(80.0, 0.0, 1.5, 110.0);
        let mass = (p4 + partner).mass();
        assert!(mass > 140.0 && mass < 250.0, "fixture mass {mass}");
        let tag = boosted_tag(p4, 40.0, 80.0, 0.9, 0.5, &[partner]);
        assert!(tag.is_w);
        assert!(!tag.is_top);
        assert_relative_eq!(tag.top_p4.mass(), mass, epsilon = 1e-9);

        // partner too close
        let near = fat(80.0, 0.0, 0.3, 110.0);
        assert!(!boosted_tag(p4, 40.0, 80.0, 0.9, 0.5, &[near]).is_w);
    }

    #[test]
    fn hadronic_combinatorics_require_one_b() {
        let j = |pt: f64, phi: f64| TopInputJet {
            p4: fat(pt, 0.1, phi, pt * 1.2),
            is_tight: true,
            is_b_tagged: false,
        };
        let b = |pt: f64, phi: f64| TopInputJet { is_b_tagged: true, ..j(pt, phi) };

        // one b among three: one candidate with the b singled out
        let cands = resolved_hadronic_tops(&[j(100.0, 0.0), b(80.0, 1.5), j(60.0, 3.0)], 6, 36);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].index_b, 1);
        assert_eq!((cands[0].index_j1, cands[0].index_j2), (0, 2));

        // zero or two b tags: nothing
        assert!(resolved_hadronic_tops(&[j(100.0, 0.0), j(80.0, 1.5), j(60.0, 3.0)], 6, 36)
            .is_empty());
        assert!(resolved_hadronic_tops(&[b(100.0, 0.0), b(80.0, 1.5), j(60.0, 3.0)], 6, 36)
            .is_empty());

        // a loose jet in the trio kills it
        let mut loose = j(60.0, 3.0);
        loose.is_tight = false;
        assert!(resolved_hadronic_tops(&[j(100.0, 0.0), b(80.0, 1.5), loose], 6, 36).is_empty());
    }

    #[test]
    fn hadronic_candidates_respect_leading_window() {
        let j = |pt: f64, phi: f64, tagged: bool| TopInputJet {
            p4: fat(pt, 0.1, phi, pt * 1.2),
            is_tight: true,
            is_b_tagged: tagged,
        };
        let jets = vec![
            j(100.0, 0.0, false),
            j(90.0, 1.0, false),
            j(80.0, 2.0, false),
            j(70.0, 3.0, true),
        ];
        // b jet sits outside the 3-jet leading window
        assert!(resolved_hadronic_tops(&jets, 3, 36).is_empty());
        assert_eq!(resolved_hadronic_tops(&jets, 4, 36).len(), 3);
    }

    #[test]
    fn semileptonic_pairs_all_combinations() {
        let lep = SelectedLepton {
            p4: fat(40.0, 0.2, 0.3, 42.0),
            flavour: 13.0,
            charge: -1.0,
            index: 0,
        };
        let bjets = vec![(2, fat(70.0, -0.4, 2.0, 90.0)), (5, fat(45.0, 0.8, -1.0, 70.0))];
        let cands = resolved_semileptonic_tops(&[lep], &bjets, 30.0, -20.0, -0.6, 36);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].index_b, 2);
        assert_eq!(cands[1].index_b, 5);
        assert_eq!(cands[0].lepton_flavour, 13.0);
        assert!(cands[0].mt > 0.0);
        assert!(cands[0].p4.mass() > 0.0);
    }
}
