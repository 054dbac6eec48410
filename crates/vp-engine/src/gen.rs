//! Generator-record summaries: boson/top transverse momenta, pt-dependent
//! reweighting factors, and the event flavour code.
//!
//! All of these are variation-independent; the processor computes them once
//! per event and stores them as preserved scalars (reweighting) or
//! recomputes the flavour code from the jet flavours per variation.

use crate::input::PartonInput;

/// Boson and top-quark transverse momenta found in the generator record;
/// negative when absent.
#[derive(Debug, Clone, Copy)]
pub struct GenSummary {
    pub top_pt: f64,
    pub antitop_pt: f64,
    pub w_pt: f64,
    pub z_pt: f64,
}

/// Scan the parton list for the first top, antitop, W and Z.
pub fn summarize(partons: &[PartonInput]) -> GenSummary {
    let mut s = GenSummary { top_pt: -1.0, antitop_pt: -1.0, w_pt: -1.0, z_pt: -1.0 };
    for p in partons {
        match p.pdg_id {
            6 if s.top_pt < 0.0 => s.top_pt = p.pt,
            -6 if s.antitop_pt < 0.0 => s.antitop_pt = p.pt,
            24 | -24 if s.w_pt < 0.0 => s.w_pt = p.pt,
            23 if s.z_pt < 0.0 => s.z_pt = p.pt,
            _ => {}
        }
    }
    s
}

fn step(pt: f64, table: &[(f64, f64)], fallback: f64) -> f64 {
    for &(edge, value) in table {
        if pt < edge {
            return value;
        }
    }
    fallback
}

/// Higher-order QCD correction to the W pt spectrum.
pub fn w_qcd_weight(pt: f64) -> f64 {
    step(
        pt,
        &[
            (150.0, 1.89123),
            (200.0, 1.70414),
            (250.0, 1.60726),
            (300.0, 1.57206),
            (350.0, 1.51689),
            (400.0, 1.4109),
            (500.0, 1.30758),
            (600.0, 1.32046),
            (1000.0, 1.26853),
        ],
        1.0,
    )
}

/// Electroweak correction to the W pt spectrum.
pub fn w_ew_weight(pt: f64) -> f64 {
    step(
        pt,
        &[
            (150.0, 0.980859),
            (200.0, 0.962119),
            (250.0, 0.944429),
            (300.0, 0.927686),
            (350.0, 0.911802),
            (400.0, 0.8967),
            (500.0, 0.875368),
            (600.0, 0.849097),
            (1000.0, 0.792159),
        ],
        1.0,
    )
}

/// Higher-order QCD correction to the Z pt spectrum.
pub fn z_qcd_weight(pt: f64) -> f64 {
    step(
        pt,
        &[
            (150.0, 1.685005),
            (200.0, 1.552560),
            (250.0, 1.522595),
            (300.0, 1.520624),
            (350.0, 1.432282),
            (400.0, 1.457417),
            (500.0, 1.368499),
            (600.0, 1.358024),
        ],
        1.164847,
    )
}

/// Electroweak correction to the Z pt spectrum.
pub fn z_ew_weight(pt: f64) -> f64 {
    step(
        pt,
        &[
            (150.0, 0.984525),
            (200.0, 0.969079),
            (250.0, 0.954627),
            (300.0, 0.941059),
            (350.0, 0.928284),
            (400.0, 0.91622),
            (500.0, 0.899312),
            (600.0, 0.878693),
            (1000.0, 0.834718),
        ],
        1.0,
    )
}

/// Top-pair pt reweighting: geometric mean of per-top exponential factors,
/// applied only when both tops are found and within the fit range.
pub fn top_pt_weight(pt_top: f64, pt_antitop: f64) -> f64 {
    if pt_top > 0.0 && pt_antitop > 0.0 && pt_top <= 400.0 && pt_antitop <= 400.0 {
        let a = 0.0615;
        let b = -0.0005;
        let sf_t = (a + b * pt_top).exp();
        let sf_tbar = (a + b * pt_antitop).exp();
        (sf_t * sf_tbar).sqrt()
    } else {
        1.0
    }
}

/// Flavour code of the event's jet content: 1 = light only, 2 = charm
/// without bottom, 3 = any bottom. Zero when classification is off.
pub fn event_flavour(enabled: bool, nb: usize, nc: usize) -> f64 {
    if !enabled {
        return 0.0;
    }
    if nb == 0 && nc == 0 {
        1.0
    } else if nb == 0 {
        2.0
    } else {
        3.0
    }
}
