//! # vp-jet
//!
//! The jet correction pipeline: undo the stored calibration, recalibrate
//! against the loaded tables, smear the energy resolution toward data, and
//! apply signed scale shifts for the scale variations. Every correction
//! also reports its contribution to the recomputed missing-energy sums.
//!
//! Large-radius jets get their own path: substructure masses are corrected
//! without the pileup-offset term and stochastically smeared, with
//! dedicated mass-resolution and mass-scale variations.

#![warn(clippy::all)]

mod corrector;
mod fatjet;

pub use corrector::{CorrectedJet, EventConditions, JetCorrector, JetInput, MetShift};
pub use fatjet::{CorrectedFatJet, FatJetCorrector, FatJetInput};
