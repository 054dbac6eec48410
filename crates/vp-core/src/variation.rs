//! Systematic-variation tags.

use serde::{Deserialize, Serialize};

/// A systematic variation of the event reprocessing pass.
///
/// The configured list always contains [`Variation::Nominal`]; every other
/// entry selects one branch of the correction formulas. Exactly one analysis
/// record is emitted per variation per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variation {
    /// Baseline: no shift applied anywhere.
    Nominal,
    /// Jet energy scale shifted up.
    JesUp,
    /// Jet energy scale shifted down.
    JesDown,
    /// Jet energy resolution shifted up.
    JerUp,
    /// Jet energy resolution shifted down.
    JerDown,
    /// Unclustered missing-energy shifted up.
    UnclusteredMetUp,
    /// Unclustered missing-energy shifted down.
    UnclusteredMetDown,
}

impl Variation {
    /// Resolution-shift direction: +1 for resolution-up, -1 for
    /// resolution-down, 0 otherwise.
    pub fn resolution_shift(&self) -> f64 {
        match self {
            Variation::JerUp => 1.0,
            Variation::JerDown => -1.0,
            _ => 0.0,
        }
    }

    /// Energy-scale shift direction: +1/-1 for scale up/down, 0 otherwise.
    pub fn scale_shift(&self) -> f64 {
        match self {
            Variation::JesUp => 1.0,
            Variation::JesDown => -1.0,
            _ => 0.0,
        }
    }

    /// Unclustered-energy shift direction.
    pub fn unclustered_shift(&self) -> f64 {
        match self {
            Variation::UnclusteredMetUp => 1.0,
            Variation::UnclusteredMetDown => -1.0,
            _ => 0.0,
        }
    }

    /// Stable name used in record labels and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Variation::Nominal => "nominal",
            Variation::JesUp => "jes_up",
            Variation::JesDown => "jes_down",
            Variation::JerUp => "jer_up",
            Variation::JerDown => "jer_down",
            Variation::UnclusteredMetUp => "unclustered_met_up",
            Variation::UnclusteredMetDown => "unclustered_met_down",
        }
    }
}
