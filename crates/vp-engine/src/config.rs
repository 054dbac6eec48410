//! Analysis configuration: which variations run, which thresholds are
//! scanned, which working points and buckets get weights.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vp_btag::TagCountBucket;
use vp_core::{Error, Result, Variation};

/// A tagging working point: discriminant threshold plus the name used in
/// store keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingPoint {
    pub name: String,
    pub threshold: f64,
}

/// Fixed instance capacities per collection. Capacities bound the store
/// buffers; events with more objects than this keep only the leading ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    pub jets: usize,
    pub large_radius_jets: usize,
    pub subjets: usize,
    pub muons: usize,
    pub electrons: usize,
    pub photons: usize,
    pub resolved_tops: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            jets: 20,
            large_radius_jets: 8,
            subjets: 16,
            muons: 10,
            electrons: 10,
            photons: 10,
            resolved_tops: 36,
        }
    }
}

/// Object selection cut values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCuts {
    pub muon_pt_min: f64,
    pub muon_abs_eta_max: f64,
    pub muon_iso_max: f64,
    pub loose_muon_pt_min: f64,
    pub loose_muon_abs_eta_max: f64,
    pub electron_pt_min: f64,
    pub electron_abs_eta_max: f64,
    /// Isolation cut for barrel-cluster electrons.
    pub electron_barrel_iso_max: f64,
    /// Isolation cut for endcap-cluster electrons.
    pub electron_endcap_iso_max: f64,
    /// Supercluster |eta| separating barrel from endcap.
    pub electron_barrel_abs_sc_eta: f64,
    /// Minimum distance of a selected electron from any loose muon.
    pub electron_muon_dr_min: f64,
    /// Jet-lepton cleaning radii; cleaning is computed but only enforced
    /// when `clean_jets_against_leptons` is set.
    pub jet_electron_dr_min: f64,
    pub jet_muon_dr_min: f64,
    pub clean_jets_against_leptons: bool,
    /// Jets entering the scalar pt sum.
    pub ht_jet_pt_min: f64,
    pub ht_jet_abs_eta_max: f64,
    /// Acceptance of tag counting and the reweighting lists.
    pub tag_abs_eta_max: f64,
    /// Acceptance of the jet threshold scan.
    pub scan_abs_eta_max: f64,
}

impl Default for SelectionCuts {
    fn default() -> Self {
        Self {
            muon_pt_min: 30.0,
            muon_abs_eta_max: 2.1,
            muon_iso_max: 0.25,
            loose_muon_pt_min: 15.0,
            loose_muon_abs_eta_max: 2.4,
            electron_pt_min: 30.0,
            electron_abs_eta_max: 2.1,
            electron_barrel_iso_max: 0.0588,
            electron_endcap_iso_max: 0.0571,
            electron_barrel_abs_sc_eta: 1.479,
            electron_muon_dr_min: 0.1,
            jet_electron_dr_min: 0.3,
            jet_muon_dr_min: 0.4,
            clean_jets_against_leptons: false,
            ht_jet_pt_min: 50.0,
            ht_jet_abs_eta_max: 2.4,
            tag_abs_eta_max: 2.4,
            scan_abs_eta_max: 4.0,
        }
    }
}

/// Event preselection thresholds: an event variation is kept when any of
/// the three sums clears its threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreselectionCuts {
    pub met_min: f64,
    pub ht_min: f64,
    pub lepton_met_min: f64,
}

impl Default for PreselectionCuts {
    fn default() -> Self {
        Self { met_min: 100.0, ht_min: 400.0, lepton_met_min: 100.0 }
    }
}

/// Top-level analysis configuration, deserialized from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Variations to run, in order. The baseline must come first.
    pub variations: Vec<Variation>,
    /// Jet pt thresholds scanned for per-threshold counts; the first one
    /// defines the analysis jets.
    pub jet_scan_cuts: Vec<f64>,
    /// Tagging working points for standard jets, tightest first.
    pub working_points: Vec<WorkingPoint>,
    /// Tagging working points for subjets.
    pub subjet_working_points: Vec<WorkingPoint>,
    /// Tag-count buckets weighted per working point and nuisance.
    pub tag_buckets: Vec<TagCountBucket>,
    /// Re-evaluate the jet energy correction instead of keeping the stored
    /// calibration.
    pub recalibrate_jets: bool,
    pub do_preselection: bool,
    pub do_resolved_top_had: bool,
    pub do_resolved_top_semilep: bool,
    /// Classify the event's generator flavour content.
    pub classify_event_flavour: bool,
    /// Leading jets entering the hadronic-top triple loop.
    pub max_leading_jets: usize,
    pub capacities: Capacities,
    pub selection: SelectionCuts,
    pub preselection: PreselectionCuts,
    /// Seed of the stochastic mass smearing generator.
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            variations: vec![
                Variation::Nominal,
                Variation::JesUp,
                Variation::JesDown,
                Variation::JerUp,
                Variation::JerDown,
                Variation::UnclusteredMetUp,
                Variation::UnclusteredMetDown,
            ],
            jet_scan_cuts: vec![30.0],
            working_points: vec![
                WorkingPoint { name: "tight".into(), threshold: 0.9535 },
                WorkingPoint { name: "medium".into(), threshold: 0.8484 },
                WorkingPoint { name: "loose".into(), threshold: 0.5426 },
            ],
            subjet_working_points: vec![
                WorkingPoint { name: "medium".into(), threshold: 0.8484 },
                WorkingPoint { name: "loose".into(), threshold: 0.5426 },
            ],
            tag_buckets: vec![
                TagCountBucket::exactly(0),
                TagCountBucket::exactly(1),
                TagCountBucket::exactly(2),
            ],
            recalibrate_jets: true,
            do_preselection: true,
            do_resolved_top_had: true,
            do_resolved_top_semilep: true,
            classify_event_flavour: false,
            max_leading_jets: 6,
            capacities: Capacities::default(),
            selection: SelectionCuts::default(),
            preselection: PreselectionCuts::default(),
            seed: 0x5eed,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file; absent fields take defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pass cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.variations.first() != Some(&Variation::Nominal) {
            return Err(Error::Validation(
                "the first variation must be the baseline".into(),
            ));
        }
        if self.jet_scan_cuts.is_empty() {
            return Err(Error::Validation("at least one jet scan threshold is required".into()));
        }
        if !self.jet_scan_cuts.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Validation("jet scan thresholds must increase".into()));
        }
        if self.working_points.is_empty() {
            return Err(Error::Validation("at least one working point is required".into()));
        }
        for b in &self.tag_buckets {
            if b.min_tags() > b.max_tags() {
                return Err(Error::Validation(format!(
                    "tag bucket [{}, {}] is empty",
                    b.min_tags(),
                    b.max_tags()
                )));
            }
        }
        if self.max_leading_jets < 3 && self.do_resolved_top_had {
            return Err(Error::Validation(
                "resolved hadronic tops need at least 3 leading jets".into(),
            ));
        }
        Ok(())
    }
}
