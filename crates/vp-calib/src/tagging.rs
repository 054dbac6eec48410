//! Tag efficiency and data/simulation scale-factor tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

/// Jet flavor classes the tagging calibration distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlavorClass {
    /// b jets (|pdg| == 5).
    B,
    /// c jets (|pdg| == 4).
    C,
    /// Everything else (mistag side).
    Light,
}

impl FlavorClass {
    /// Classify a parton flavor code.
    pub fn from_pdg(flavor: i32) -> Self {
        match flavor.abs() {
            5 => FlavorClass::B,
            4 => FlavorClass::C,
            _ => FlavorClass::Light,
        }
    }
}

/// Calibration nuisance applied to the scale-factor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagNuisance {
    /// Central scale factors.
    Central,
    /// Light-flavor (mistag) scale factor shifted up.
    MistagUp,
    /// Light-flavor scale factor shifted down.
    MistagDown,
    /// Heavy-flavor (tag) scale factor shifted up.
    TagUp,
    /// Heavy-flavor scale factor shifted down.
    TagDown,
}

impl TagNuisance {
    /// The five nuisances evaluated per working point and bucket.
    pub const ALL: [TagNuisance; 5] = [
        TagNuisance::Central,
        TagNuisance::MistagUp,
        TagNuisance::MistagDown,
        TagNuisance::TagUp,
        TagNuisance::TagDown,
    ];

    /// Stable name used in record labels.
    pub fn name(&self) -> &'static str {
        match self {
            TagNuisance::Central => "central",
            TagNuisance::MistagUp => "mistag_up",
            TagNuisance::MistagDown => "mistag_down",
            TagNuisance::TagUp => "tag_up",
            TagNuisance::TagDown => "tag_down",
        }
    }
}

/// One (|eta|, pt) cell of an efficiency table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyBin {
    /// Lower |eta| edge (inclusive).
    pub abs_eta_min: f64,
    /// Upper |eta| edge (exclusive).
    pub abs_eta_max: f64,
    /// Lower pt edge (inclusive).
    pub pt_min: f64,
    /// Upper pt edge (exclusive).
    pub pt_max: f64,
    /// Simulation tag efficiency.
    pub value: f64,
}

/// Efficiency bins for the three flavor classes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlavorEfficiencies {
    /// b-jet bins.
    pub b: Vec<EfficiencyBin>,
    /// c-jet bins.
    pub c: Vec<EfficiencyBin>,
    /// Light-jet bins.
    pub light: Vec<EfficiencyBin>,
}

/// Simulation tag efficiency keyed by working point, flavor, pt and |eta|.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagEfficiencyTable {
    /// Per-working-point tables, keyed by working-point name.
    pub working_points: BTreeMap<String, FlavorEfficiencies>,
}

fn lookup_bins(bins: &[EfficiencyBin], pt: f64, abs_eta: f64) -> Option<f64> {
    // clamp pt into table coverage; eta must match a declared row
    let (lo, hi) = bins
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| (lo.min(b.pt_min), hi.max(b.pt_max)));
    let pt = pt.clamp(lo, hi * (1.0 - 1e-12));
    bins.iter()
        .find(|b| {
            abs_eta >= b.abs_eta_min && abs_eta < b.abs_eta_max && pt >= b.pt_min && pt < b.pt_max
        })
        .map(|b| b.value)
}

impl TagEfficiencyTable {
    fn flavor_bins(&self, wp: &str, class: FlavorClass) -> Result<&[EfficiencyBin]> {
        let fe = self
            .working_points
            .get(wp)
            .ok_or_else(|| Error::Validation(format!("no efficiency table for working point '{wp}'")))?;
        let bins = match class {
            FlavorClass::B => &fe.b,
            FlavorClass::C => &fe.c,
            FlavorClass::Light => &fe.light,
        };
        if bins.is_empty() {
            return Err(Error::Validation(format!(
                "efficiency table for '{wp}' has no bins for {class:?} jets"
            )));
        }
        Ok(bins)
    }

    /// Simulation-estimated tag efficiency; pt is clamped into coverage, an
    /// uncovered |eta| is fatal.
    pub fn efficiency(&self, wp: &str, class: FlavorClass, pt: f64, eta: f64) -> Result<f64> {
        let bins = self.flavor_bins(wp, class)?;
        lookup_bins(bins, pt, eta.abs()).ok_or_else(|| {
            Error::Validation(format!(
                "no efficiency bin for '{wp}' {class:?} at pt = {pt}, |eta| = {}",
                eta.abs()
            ))
        })
    }
}

/// One pt bin of a scale-factor table: central value and the four shifted
/// variants. Carrying all nuisances per bin keeps one calibration release in
/// one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleFactorBin {
    /// Lower pt edge (inclusive).
    pub pt_min: f64,
    /// Upper pt edge (exclusive).
    pub pt_max: f64,
    /// Central data/simulation scale factor.
    pub central: f64,
    /// Mistag-up variant.
    pub mistag_up: f64,
    /// Mistag-down variant.
    pub mistag_down: f64,
    /// Tag-efficiency-up variant.
    pub tag_up: f64,
    /// Tag-efficiency-down variant.
    pub tag_down: f64,
}

/// Scale-factor bins for the three flavor classes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlavorScaleFactors {
    /// b-jet bins.
    pub b: Vec<ScaleFactorBin>,
    /// c-jet bins.
    pub c: Vec<ScaleFactorBin>,
    /// Light-jet bins.
    pub light: Vec<ScaleFactorBin>,
}

/// Data/simulation scale factors keyed by working point, flavor, nuisance
/// and pt. The lookup is a pluggable external table; nothing in the engine
/// assumes unity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagScaleFactorTable {
    /// Per-working-point tables, keyed by working-point name.
    pub working_points: BTreeMap<String, FlavorScaleFactors>,
}

impl TagScaleFactorTable {
    /// Scale factor for (working point, flavor class, nuisance) at pt.
    pub fn scale_factor(
        &self,
        wp: &str,
        class: FlavorClass,
        nuisance: TagNuisance,
        pt: f64,
    ) -> Result<f64> {
        let fs = self
            .working_points
            .get(wp)
            .ok_or_else(|| Error::Validation(format!("no scale-factor table for working point '{wp}'")))?;
        let bins = match class {
            FlavorClass::B => &fs.b,
            FlavorClass::C => &fs.c,
            FlavorClass::Light => &fs.light,
        };
        if bins.is_empty() {
            return Err(Error::Validation(format!(
                "scale-factor table for '{wp}' has no bins for {class:?} jets"
            )));
        }
        let (lo, hi) = bins
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| (lo.min(b.pt_min), hi.max(b.pt_max)));
        let pt = pt.clamp(lo, hi * (1.0 - 1e-12));
        let bin = bins
            .iter()
            .find(|b| pt >= b.pt_min && pt < b.pt_max)
            .ok_or_else(|| {
                Error::Validation(format!("no scale-factor bin for '{wp}' {class:?} at pt = {pt}"))
            })?;
        Ok(match nuisance {
            TagNuisance::Central => bin.central,
            TagNuisance::MistagUp => bin.mistag_up,
            TagNuisance::MistagDown => bin.mistag_down,
            TagNuisance::TagUp => bin.tag_up,
            TagNuisance::TagDown => bin.tag_down,
        })
    }
}
