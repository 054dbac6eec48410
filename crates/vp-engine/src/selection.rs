//! Object identification and selection: photons, muons, electrons, jet
//! constituent requirements.

use vp_core::FourVec;

use crate::config::SelectionCuts;
use crate::input::{ElectronInput, JetInput, MuonInput, PhotonInput};

/// A lepton passing the analysis selection, with its provenance.
#[derive(Debug, Clone, Copy)]
pub struct SelectedLepton {
    pub p4: FourVec,
    /// 13 for muons, 11 for electrons.
    pub flavour: f64,
    pub charge: f64,
    /// Index into the originating input collection.
    pub index: usize,
}

/// Effective-area species for pileup-corrected photon isolation.
#[derive(Debug, Clone, Copy)]
pub enum IsoSpecies {
    Photon,
    ChargedHadron,
    NeutralHadron,
}

/// Pileup effective area as a step function of |eta|.
pub fn effective_area(species: IsoSpecies, eta: f64) -> f64 {
    let aeta = eta.abs();
    let table: &[(f64, f64)] = match species {
        IsoSpecies::Photon => &[
            (1.0, 0.0725),
            (1.479, 0.0604),
            (2.0, 0.0320),
            (2.2, 0.0512),
            (2.3, 0.0766),
            (2.4, 0.0949),
            (f64::INFINITY, 0.1160),
        ],
        IsoSpecies::ChargedHadron => &[
            (1.0, 0.0157),
            (1.479, 0.0143),
            (2.0, 0.0115),
            (2.2, 0.0094),
            (2.3, 0.0095),
            (2.4, 0.0068),
            (f64::INFINITY, 0.0053),
        ],
        IsoSpecies::NeutralHadron => &[
            (1.0, 0.0143),
            (1.479, 0.0210),
            (2.0, 0.0147),
            (2.2, 0.0082),
            (2.3, 0.0124),
            (2.4, 0.0186),
            (f64::INFINITY, 0.0320),
        ],
    };
    for &(edge, area) in table {
        if aeta < edge {
            return area;
        }
    }
    0.0
}

/// Loose/medium/tight photon identification flags.
///
/// Shower-shape and pileup-corrected isolation cuts, separate barrel and
/// endcap requirements; photons outside both acceptances fail everything.
pub fn photon_flags(photon: &PhotonInput, rho: f64) -> (bool, bool, bool) {
    let abseta = photon.eta.abs();
    let pt = photon.pt;

    let iso_ch =
        (photon.charged_hadron_iso - rho * effective_area(IsoSpecies::ChargedHadron, abseta)).max(0.0);
    let iso_neu =
        (photon.neutral_hadron_iso - rho * effective_area(IsoSpecies::NeutralHadron, abseta)).max(0.0);
    let iso_pho = (photon.photon_iso - rho * effective_area(IsoSpecies::Photon, abseta)).max(0.0);

    let hoe_ok = photon.h_over_e < 0.05;
    if abseta < 1.479 {
        let neu = |c: f64| iso_neu < c + (0.0044 * pt + 0.5809).exp();
        let pho = |c: f64, s: f64| iso_pho < c + s * pt;
        let loose =
            photon.sigma_ieta_ieta < 0.0103 && hoe_ok && iso_ch < 2.44 && neu(2.57) && pho(1.92, 0.0043);
        let medium =
            photon.sigma_ieta_ieta < 0.01 && hoe_ok && iso_ch < 1.31 && neu(0.60) && pho(1.33, 0.0043);
        let tight =
            photon.sigma_ieta_ieta < 0.01 && hoe_ok && iso_ch < 0.91 && neu(0.33) && pho(0.61, 0.0043);
        (loose, medium, tight)
    } else if abseta < 2.5 {
        let neu = |c: f64| iso_neu < c + (0.0040 * pt + 0.9402).exp();
        let pho = |c: f64| iso_pho < c + 0.0043 * pt;
        let loose =
            photon.sigma_ieta_ieta < 0.0277 && hoe_ok && iso_ch < 1.84 && neu(4.00) && pho(1.92);
        let medium =
            photon.sigma_ieta_ieta < 0.0267 && hoe_ok && iso_ch < 1.25 && neu(1.65) && pho(1.33);
        let tight =
            photon.sigma_ieta_ieta < 0.0267 && hoe_ok && iso_ch < 0.65 && neu(0.93) && pho(0.61);
        (loose, medium, tight)
    } else {
        (false, false, false)
    }
}

/// Analysis muons plus the looser population used for cross-cleaning.
pub struct MuonSelection {
    pub selected: Vec<SelectedLepton>,
    /// Loose muons above the cross-clean pt floor.
    pub loose_for_cleaning: Vec<FourVec>,
    pub n_loose: usize,
}

pub fn select_muons(muons: &[MuonInput], cuts: &SelectionCuts) -> MuonSelection {
    let mut selected = Vec::new();
    let mut loose_for_cleaning = Vec::new();
    let mut n_loose = 0;
    for (i, mu) in muons.iter().enumerate() {
        if mu.is_medium
            && mu.pt > cuts.muon_pt_min
            && mu.eta.abs() < cuts.muon_abs_eta_max
            && mu.iso < cuts.muon_iso_max
        {
            selected.push(SelectedLepton { p4: mu.p4(), flavour: 13.0, charge: mu.charge, index: i });
        }
        if mu.is_loose
            && mu.pt > cuts.muon_pt_min
            && mu.eta.abs() < cuts.loose_muon_abs_eta_max
            && mu.iso < cuts.muon_iso_max
        {
            n_loose += 1;
        }
        if mu.is_loose && mu.pt > cuts.loose_muon_pt_min {
            loose_for_cleaning.push(mu.p4());
        }
    }
    MuonSelection { selected, loose_for_cleaning, n_loose }
}

/// Tight electrons cross-cleaned against loose muons, plus the veto count.
pub struct ElectronSelection {
    pub selected: Vec<SelectedLepton>,
    pub n_veto: usize,
}

pub fn select_electrons(
    electrons: &[ElectronInput],
    loose_muons: &[FourVec],
    cuts: &SelectionCuts,
) -> ElectronSelection {
    let mut selected = Vec::new();
    let mut n_veto = 0;
    for (i, el) in electrons.iter().enumerate() {
        let barrel = el.sc_eta.abs() <= cuts.electron_barrel_abs_sc_eta;
        let iso_max =
            if barrel { cuts.electron_barrel_iso_max } else { cuts.electron_endcap_iso_max };
        let tight = el.is_tight && el.iso < iso_max;

        if tight && el.pt > cuts.electron_pt_min && el.eta.abs() < cuts.electron_abs_eta_max {
            let p4 = el.p4();
            let min_dr = loose_muons
                .iter()
                .map(|m| p4.delta_r(m))
                .fold(f64::INFINITY, f64::min);
            if min_dr > cuts.electron_muon_dr_min {
                selected.push(SelectedLepton { p4, flavour: 11.0, charge: el.charge, index: i });
            }
        }

        if el.is_veto && el.pt > 10.0 && el.eta.abs() < 2.5 {
            let veto_iso_max = if barrel { 0.175 } else { 0.159 };
            if el.iso < veto_iso_max {
                n_veto += 1;
            }
        }
    }
    ElectronSelection { selected, n_veto }
}

/// Indices of the leading and subleading lepton by pt; the subleading one is
/// never the leading one.
pub fn leading_pair(leptons: &[SelectedLepton]) -> (Option<usize>, Option<usize>) {
    let mut first = None;
    let mut max_pt = 0.0;
    for (i, l) in leptons.iter().enumerate() {
        if l.p4.pt() > max_pt {
            max_pt = l.p4.pt();
            first = Some(i);
        }
    }
    let mut second = None;
    max_pt = 0.0;
    for (i, l) in leptons.iter().enumerate() {
        if Some(i) != first && l.p4.pt() > max_pt {
            max_pt = l.p4.pt();
            second = Some(i);
        }
    }
    (first, second)
}

/// Constituent-based jet identification, binned in the recalibrated |eta|.
pub fn jet_passes_id(jet: &JetInput, corr_eta: f64) -> bool {
    if jet.jec_factor * jet.energy <= 0.0 {
        return false;
    }
    let abseta = corr_eta.abs();
    let num_const = jet.charged_multiplicity + jet.neutral_multiplicity;
    if abseta <= 2.7 {
        let neutral_ok =
            jet.neutral_had_frac < 0.90 && jet.neutral_em_frac < 0.90 && num_const > 1.0;
        let central_ok = abseta > 2.4
            || (jet.charged_had_frac > 0.0
                && jet.charged_multiplicity > 0.0
                && jet.charged_em_frac < 0.99);
        neutral_ok && central_ok
    } else if abseta <= 3.0 {
        jet.neutral_multiplicity > 2.0
            && jet.neutral_had_frac < 0.98
            && jet.neutral_em_frac > 0.01
    } else {
        jet.neutral_em_frac < 0.90 && jet.neutral_multiplicity > 10.0
    }
}
