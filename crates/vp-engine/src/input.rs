//! The event input model: one flat record per collision event, deserialized
//! from JSON lines. Field names follow the upstream dump conventions.

use serde::{Deserialize, Serialize};
use vp_core::FourVec;

fn one() -> f64 {
    1.0
}

/// A reconstructed primary-vertex candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct VertexInput {
    pub z: f64,
    pub ndof: f64,
    /// Transverse displacement from the beamline.
    pub rho: f64,
}

impl VertexInput {
    /// Vertex quality requirement for pileup counting.
    pub fn is_good(&self) -> bool {
        self.z.abs() < 24.0 && self.ndof > 4.0 && self.rho < 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MuonInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub charge: f64,
    /// Relative isolation in a 0.4 cone.
    pub iso: f64,
    pub is_loose: bool,
    pub is_medium: bool,
    pub is_tight: bool,
    pub is_global: bool,
    pub is_tracker: bool,
    /// Constituent keys shared with jets.
    #[serde(default)]
    pub keys: Vec<u64>,
}

impl MuonInput {
    pub fn p4(&self) -> FourVec {
        FourVec::from_ptetaphie(self.pt, self.eta, self.phi, self.energy)
    }

    /// Muons reconstructed globally or standalone-only are subtracted from
    /// overlapping jets before recalibration.
    pub fn subtractable(&self) -> bool {
        self.is_global || (!self.is_global && !self.is_tracker)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElectronInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub charge: f64,
    /// Supercluster eta, used for the barrel/endcap split.
    pub sc_eta: f64,
    /// Relative isolation in a 0.3 cone.
    pub iso: f64,
    pub is_veto: bool,
    pub is_tight: bool,
}

impl ElectronInput {
    pub fn p4(&self) -> FourVec {
        FourVec::from_ptetaphie(self.pt, self.eta, self.phi, self.energy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhotonInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub sigma_ieta_ieta: f64,
    pub h_over_e: f64,
    pub charged_hadron_iso: f64,
    pub neutral_hadron_iso: f64,
    pub photon_iso: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JetInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    /// Matched generator-jet pt; non-positive when unmatched.
    #[serde(default)]
    pub gen_pt: f64,
    /// Factor multiplying the stored four-vector back to raw.
    #[serde(default = "one")]
    pub jec_factor: f64,
    pub area: f64,
    pub csv: f64,
    pub parton_flavour: f64,
    pub charged_em_frac: f64,
    pub neutral_em_frac: f64,
    pub charged_had_frac: f64,
    pub neutral_had_frac: f64,
    pub charged_multiplicity: f64,
    pub neutral_multiplicity: f64,
    /// Constituent keys shared with muons.
    #[serde(default)]
    pub keys: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FatJetInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    #[serde(default)]
    pub gen_pt: f64,
    #[serde(default = "one")]
    pub jec_factor: f64,
    pub area: f64,
    pub pruned_mass: f64,
    pub soft_drop_mass: f64,
    pub tau1: f64,
    pub tau2: f64,
    pub tau3: f64,
    /// Indices of the two leading subjets; negative when absent.
    #[serde(default)]
    pub subjet_index_0: i64,
    #[serde(default)]
    pub subjet_index_1: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubjetInput {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub csv: f64,
    pub parton_flavour: f64,
}

impl SubjetInput {
    pub fn p4(&self) -> FourVec {
        FourVec::from_ptetaphie(self.pt, self.eta, self.phi, self.energy)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct MetInput {
    pub pt: f64,
    pub phi: f64,
    /// Uncorrected (raw) missing energy, anchor of the type-1 sum and the
    /// unclustered shift.
    pub uncor_pt: f64,
    pub uncor_phi: f64,
}

/// A generator-record parton used for flavour classification and the
/// boson/top pt reweighting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PartonInput {
    pub pdg_id: i32,
    pub status: i32,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
}

/// One collision event as read from the input stream.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EventInput {
    pub run: u64,
    pub lumi: u64,
    pub event: u64,
    /// Median pileup energy density.
    pub rho: f64,
    #[serde(default = "one")]
    pub gen_weight: f64,
    pub vertices: Vec<VertexInput>,
    pub muons: Vec<MuonInput>,
    pub electrons: Vec<ElectronInput>,
    pub photons: Vec<PhotonInput>,
    pub jets: Vec<JetInput>,
    pub large_radius_jets: Vec<FatJetInput>,
    pub subjets: Vec<SubjetInput>,
    pub met: MetInput,
    pub partons: Vec<PartonInput>,
}

impl EventInput {
    /// Count of vertices passing the quality requirement.
    pub fn good_vertices(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_good()).count()
    }
}
