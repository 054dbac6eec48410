//! The bundled calibration release loaded at startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

use crate::jec::JecTable;
use crate::resolution::{MassResolutionTable, ResolutionTable};
use crate::tagging::{TagEfficiencyTable, TagScaleFactorTable};
use crate::uncertainty::UncertaintyGrid;

/// One versioned calibration release: every table the reprocessing engine
/// consults, loaded from a single JSON document and validated before the
/// first event is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSet {
    /// Release identifier, echoed into logs.
    pub version: String,
    /// Standard-radius jet energy correction.
    pub jet_energy: JecTable,
    /// Large-radius jet energy correction, also used without its pileup
    /// term for substructure-mass calibration.
    pub large_radius_energy: JecTable,
    /// Energy resolution scale vs |eta|.
    pub resolution: ResolutionTable,
    /// Relative jet energy-scale uncertainty vs (pt, |eta|).
    pub scale_uncertainty: UncertaintyGrid,
    /// Large-radius substructure mass resolution.
    pub mass_resolution: MassResolutionTable,
    /// Relative large-radius mass-scale uncertainty.
    pub mass_scale_uncertainty: f64,
    /// Simulation tag efficiency for standard jets.
    pub tag_efficiency: TagEfficiencyTable,
    /// Data/simulation tag scale factors for standard jets.
    pub tag_scale_factors: TagScaleFactorTable,
    /// Simulation tag efficiency for subjets of large-radius jets.
    pub subjet_tag_efficiency: TagEfficiencyTable,
    /// Data/simulation tag scale factors for subjets.
    pub subjet_tag_scale_factors: TagScaleFactorTable,
}

impl CalibrationSet {
    /// Load and validate a calibration release from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let set: CalibrationSet = serde_json::from_str(&text)?;
        set.validate()?;
        tracing::info!(version = %set.version, path = %path.display(), "loaded calibration set");
        Ok(set)
    }

    /// Reject a malformed release before any event is processed.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::Validation("calibration set has no version".into()));
        }
        self.jet_energy.validate()?;
        self.large_radius_energy.validate()?;
        self.resolution.validate()?;
        self.scale_uncertainty.validate()?;
        self.mass_resolution.validate()?;
        if !(0.0..1.0).contains(&self.mass_scale_uncertainty) {
            return Err(Error::Validation(format!(
                "mass-scale uncertainty {} outside [0, 1)",
                self.mass_scale_uncertainty
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jec::ResponseBin;
    use crate::resolution::{MassResolutionBin, ResolutionBin};
    use crate::uncertainty::UncertaintyRow;

    fn minimal_set() -> CalibrationSet {
        CalibrationSet {
            version: "test-v1".to_string(),
            jet_energy: JecTable {
                offset_coeff: 1.0,
                npv_coeff: 0.0,
                response: vec![ResponseBin {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    p0: 1.0,
                    p1: 0.0,
                    p2: 0.0,
                }],
            },
            large_radius_energy: JecTable {
                offset_coeff: 1.0,
                npv_coeff: 0.0,
                response: vec![ResponseBin {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    p0: 1.0,
                    p1: 0.0,
                    p2: 0.0,
                }],
            },
            resolution: ResolutionTable {
                bins: vec![ResolutionBin {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    nominal: 0.1,
                    shift: 0.01,
                }],
            },
            scale_uncertainty: UncertaintyGrid {
                pt_nodes: vec![20.0, 1000.0],
                rows: vec![UncertaintyRow {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    values: vec![0.02, 0.02],
                }],
            },
            mass_resolution: MassResolutionTable {
                sf: 1.23,
                unc: 0.18,
                bins: vec![MassResolutionBin {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    a: 20.0,
                    b: 1.0,
                    c: 0.02,
                }],
            },
            mass_scale_uncertainty: 0.023,
            tag_efficiency: TagEfficiencyTable::default(),
            tag_scale_factors: TagScaleFactorTable::default(),
            subjet_tag_efficiency: TagEfficiencyTable::default(),
            subjet_tag_scale_factors: TagScaleFactorTable::default(),
        }
    }

    #[test]
    fn valid_set_passes() {
        assert!(minimal_set().validate().is_ok());
    }

    #[test]
    fn empty_version_rejected() {
        let mut s = minimal_set();
        s.version.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn bad_mass_scale_rejected() {
        let mut s = minimal_set();
        s.mass_scale_uncertainty = 1.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let s = minimal_set();
        let text = serde_json::to_string(&s).unwrap();
        let back: CalibrationSet = serde_json::from_str(&text).unwrap();
        back.validate().unwrap();
        assert_eq!(back.version, "test-v1");
    }
}
