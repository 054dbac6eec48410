//! # vp-calib
//!
//! Calibration tables as external, versioned data: jet energy correction
//! coefficients, resolution scales, scale-uncertainty grids, large-radius
//! mass resolution, and tag efficiency/scale-factor tables.
//!
//! Tables are deserialized once at startup; a malformed table or a lookup
//! outside declared coverage is a fatal configuration error, never a
//! per-event condition.

#![warn(clippy::all)]

mod jec;
mod resolution;
mod set;
mod tagging;
mod uncertainty;

pub use jec::{JecTable, ResponseBin};
pub use resolution::{MassResolutionBin, MassResolutionTable, ResolutionBin, ResolutionTable};
pub use set::CalibrationSet;
pub use tagging::{
    EfficiencyBin, FlavorClass, FlavorEfficiencies, FlavorScaleFactors, ScaleFactorBin,
    TagEfficiencyTable, TagNuisance, TagScaleFactorTable,
};
pub use uncertainty::{UncertaintyGrid, UncertaintyRow};
