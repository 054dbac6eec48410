//! End-to-end runs of the variation loop over hand-built events against an
//! identity calibration, where every nominal quantity can be predicted
//! exactly.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use vp_calib::{
    CalibrationSet, EfficiencyBin, FlavorEfficiencies, FlavorScaleFactors, JecTable,
    MassResolutionBin, MassResolutionTable, ResolutionBin, ResolutionTable, ResponseBin,
    ScaleFactorBin, TagEfficiencyTable, TagScaleFactorTable, UncertaintyGrid, UncertaintyRow,
};
use vp_core::{Variation, SENTINEL};
use vp_engine::input::{FatJetInput, JetInput, MetInput, MuonInput, VertexInput};
use vp_engine::{AnalysisConfig, EventInput, EventProcessor};

fn identity_jec() -> JecTable {
    JecTable {
        offset_coeff: 0.0,
        npv_coeff: 0.0,
        response: vec![ResponseBin { abs_eta_min: 0.0, abs_eta_max: 5.0, p0: 1.0, p1: 0.0, p2: 0.0 }],
    }
}

fn eff_table(wps: &[&str]) -> TagEfficiencyTable {
    let mut working_points = BTreeMap::new();
    for wp in wps {
        let bin = |value| EfficiencyBin {
            abs_eta_min: 0.0,
            abs_eta_max: 2.4,
            pt_min: 20.0,
            pt_max: 1000.0,
            value,
        };
        working_points.insert(
            wp.to_string(),
            FlavorEfficiencies { b: vec![bin(0.6)], c: vec![bin(0.12)], light: vec![bin(0.01)] },
        );
    }
    TagEfficiencyTable { working_points }
}

fn sf_table(wps: &[&str]) -> TagScaleFactorTable {
    let mut working_points = BTreeMap::new();
    for wp in wps {
        let bin = ScaleFactorBin {
            pt_min: 20.0,
            pt_max: 1000.0,
            central: 0.95,
            mistag_up: 1.05,
            mistag_down: 0.85,
            tag_up: 0.98,
            tag_down: 0.92,
        };
        working_points.insert(
            wp.to_string(),
            FlavorScaleFactors { b: vec![bin.clone()], c: vec![bin.clone()], light: vec![bin] },
        );
    }
    TagScaleFactorTable { working_points }
}

/// Identity energy corrections, no smearing at the baseline, a flat 5%
/// scale uncertainty and deterministic mass smearing (width factor zero).
fn calib() -> CalibrationSet {
    CalibrationSet {
        version: "pipeline-test".into(),
        jet_energy: identity_jec(),
        large_radius_energy: identity_jec(),
        resolution: ResolutionTable {
            bins: vec![ResolutionBin { abs_eta_min: 0.0, abs_eta_max: 5.0, nominal: 0.0, shift: 0.1 }],
        },
        scale_uncertainty: UncertaintyGrid {
            pt_nodes: vec![20.0, 1000.0],
            rows: vec![UncertaintyRow { abs_eta_min: 0.0, abs_eta_max: 5.0, values: vec![0.05, 0.05] }],
        },
        mass_resolution: MassResolutionTable {
            sf: 1.0,
            unc: 0.0,
            bins: vec![MassResolutionBin { abs_eta_min: 0.0, abs_eta_max: 5.0, a: 20.0, b: 1.0, c: 0.02 }],
        },
        mass_scale_uncertainty: 0.023,
        tag_efficiency: eff_table(&["tight", "medium", "loose"]),
        tag_scale_factors: sf_table(&["tight", "medium", "loose"]),
        subjet_tag_efficiency: eff_table(&["medium", "loose"]),
        subjet_tag_scale_factors: sf_table(&["medium", "loose"]),
    }
}

fn analysis_jet(pt: f64, eta: f64, phi: f64, csv: f64, flavour: f64) -> JetInput {
    JetInput {
        pt,
        eta,
        phi,
        energy: pt * eta.cosh() * 1.01,
        gen_pt: 0.0,
        jec_factor: 1.0,
        area: 0.5,
        csv,
        parton_flavour: flavour,
        charged_em_frac: 0.05,
        neutral_em_frac: 0.1,
        charged_had_frac: 0.6,
        neutral_had_frac: 0.1,
        charged_multiplicity: 10.0,
        neutral_multiplicity: 5.0,
        keys: vec![],
    }
}

fn selected_muon(pt: f64) -> MuonInput {
    MuonInput {
        pt,
        eta: 0.5,
        phi: 0.0,
        energy: pt * 0.5f64.cosh(),
        charge: 1.0,
        iso: 0.1,
        is_loose: true,
        is_medium: true,
        is_tight: true,
        is_global: true,
        is_tracker: true,
        keys: vec![],
    }
}

fn event() -> EventInput {
    EventInput {
        run: 1,
        lumi: 2,
        event: 42,
        rho: 20.0,
        gen_weight: 0.9,
        vertices: vec![VertexInput { z: 1.0, ndof: 10.0, rho: 0.1 }; 3],
        muons: vec![selected_muon(60.0)],
        jets: vec![
            analysis_jet(120.0, 0.4, 1.2, 0.99, 5.0),
            analysis_jet(80.0, -1.0, -2.0, 0.1, 0.0),
            analysis_jet(60.0, 0.8, 2.5, 0.2, 0.0),
        ],
        met: MetInput { pt: 150.0, phi: 0.3, uncor_pt: 140.0, uncor_phi: 0.25 },
        ..EventInput::default()
    }
}

#[test]
fn one_record_per_variation_in_configured_order() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    assert_eq!(records.len(), 7);
    assert_eq!(records[0].variation, Variation::Nominal);
    assert_eq!(records[1].variation, Variation::JesUp);
    assert_eq!(records[6].variation, Variation::UnclusteredMetDown);
}

#[test]
fn nominal_keeps_stored_kinematics() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    let r = &records[0].record;

    // identity tables, matched gen pt absent: corrected == stored
    assert_relative_eq!(r.arrays["jetsAK4_CorrPt"][0], 120.0, epsilon = 1e-9);
    assert_relative_eq!(r.arrays["jetsAK4_CorrPt"][1], 80.0, epsilon = 1e-9);
    assert_relative_eq!(r.arrays["jetsAK4_NoCorrPt"][0], 120.0, epsilon = 1e-9);
    assert_eq!(r.arrays["jetsAK4_CorrPt"][3], SENTINEL);

    assert_relative_eq!(r.scalars["Event_MetCorrPt"], 150.0, epsilon = 1e-9);
    assert_relative_eq!(r.scalars["Event_Ht"], 260.0, epsilon = 1e-9);
    assert_eq!(r.scalars["Event_nJetsCut30"], 3.0);
    assert_eq!(r.scalars["Event_passesPreselection"], 1.0);
    assert_eq!(r.scalars["Event_nMediumMuons"], 1.0);
    assert_eq!(r.scalars["Event_Lepton1_Flavour"], 13.0);
    assert_relative_eq!(r.scalars["Event_GenWeight"], 0.9);
    assert_eq!(r.scalars["Event_nGoodPV"], 3.0);
}

#[test]
fn jes_up_scales_jets_and_moves_met() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    let nominal = &records[0].record;
    let up = &records[1].record;

    // flat 5% scale shift
    assert_relative_eq!(up.arrays["jetsAK4_CorrPt"][0], 126.0, epsilon = 1e-9);
    assert_relative_eq!(up.arrays["jetsAK4_CorrPt"][1], 84.0, epsilon = 1e-9);
    assert!(
        (up.scalars["Event_MetCorrPt"] - nominal.scalars["Event_MetCorrPt"]).abs() > 1e-6,
        "scale shift must move the corrected missing energy"
    );
    // stored inputs are untouched by the variation
    assert_relative_eq!(up.arrays["jetsAK4_Pt"][0], 120.0);
}

#[test]
fn unclustered_variations_shift_only_the_full_met() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    let nominal = &records[0].record;
    let up = &records[5].record;
    let down = &records[6].record;

    assert!((up.scalars["Event_MetCorrPt"] - nominal.scalars["Event_MetCorrPt"]).abs() > 1e-6);
    assert!((down.scalars["Event_MetCorrPt"] - nominal.scalars["Event_MetCorrPt"]).abs() > 1e-6);
    // the base and type-1 stages are untouched by the unclustered shift
    assert_relative_eq!(
        up.scalars["Event_MetCorrBasePt"],
        nominal.scalars["Event_MetCorrBasePt"],
        epsilon = 1e-12
    );
    assert_relative_eq!(
        up.scalars["Event_MetCorrT1Pt"],
        nominal.scalars["Event_MetCorrT1Pt"],
        epsilon = 1e-12
    );
    // jets themselves are nominal under the unclustered variations
    assert_relative_eq!(up.arrays["jetsAK4_CorrPt"][0], 120.0, epsilon = 1e-9);
}

#[test]
fn single_lepton_transverse_masses_are_filled() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    let r = &records[0].record;

    // one medium muon and one medium b tag: mt and the proxy are live
    assert!(r.scalars["Event_mt"] > 0.0);
    assert!(r.scalars["Event_Mt2w"] > 0.0);
    assert_eq!(r.scalars["Event_nTaggedJets_medium"], 1.0);
}

#[test]
fn category_code_composes_counts() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    // 1 muon, 0 electrons, 3 jets, 1 medium b, no boosted tags
    assert_eq!(records[0].record.scalars["Event_category"], 103_100.0);
}

#[test]
fn tag_weights_cover_every_bucket_and_nuisance() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&event()).unwrap();
    let r = &records[0].record;

    // one observed medium tag: only the 1-tag bucket is populated
    assert_eq!(r.scalars["Event_bWeight_medium_0Tag_central"], 0.0);
    assert!(r.scalars["Event_bWeight_medium_1Tag_central"] > 0.0);
    assert_eq!(r.scalars["Event_bWeight_medium_2Tag_central"], 0.0);
    // heavy-flavor nuisances move the 1-tag weight, in opposite directions
    let central = r.scalars["Event_bWeight_medium_1Tag_central"];
    let up = r.scalars["Event_bWeight_medium_1Tag_tag_up"];
    let down = r.scalars["Event_bWeight_medium_1Tag_tag_down"];
    assert!(up > central && down < central);
}

#[test]
fn preselection_failure_zeroes_derived_scalars_but_keeps_arrays() {
    let mut ev = event();
    ev.muons.clear();
    ev.jets = vec![analysis_jet(40.0, 0.4, 1.2, 0.1, 0.0)];
    ev.met = MetInput { pt: 20.0, phi: 0.3, uncor_pt: 18.0, uncor_phi: 0.25 };

    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&ev).unwrap();
    let r = &records[0].record;

    assert_eq!(r.scalars["Event_passesPreselection"], 0.0);
    assert_eq!(r.scalars["Event_Ht"], 0.0);
    assert_eq!(r.scalars["Event_MetCorrPt"], 0.0);
    // per-jet results and preserved inputs survive the rejection
    assert_relative_eq!(r.arrays["jetsAK4_CorrPt"][0], 40.0, epsilon = 1e-9);
    assert_relative_eq!(r.scalars["Event_GenWeight"], 0.9);
}

#[test]
fn boosted_top_tag_from_substructure() {
    let mut ev = event();
    ev.large_radius_jets = vec![FatJetInput {
        pt: 550.0,
        eta: 0.3,
        phi: 0.5,
        energy: 600.0,
        gen_pt: 0.0,
        jec_factor: 1.0,
        area: 2.0,
        pruned_mass: 150.0,
        soft_drop_mass: 170.0,
        tau1: 1.0,
        tau2: 0.8,
        tau3: 0.4,
        subjet_index_0: -1,
        subjet_index_1: -1,
    }];

    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&ev).unwrap();
    let r = &records[0].record;

    assert_eq!(r.arrays["jetsAK8_IsTopTag"][0], 1.0);
    assert_eq!(r.scalars["Event_nTopTagJets"], 1.0);
    assert_relative_eq!(r.arrays["jetsAK8_Tau3OverTau2"][0], 0.5, epsilon = 1e-12);
    // the boosted tag feeds the category units digit
    assert_eq!(r.scalars["Event_category"] % 10.0, 1.0);
}

#[test]
fn repeated_runs_are_deterministic() {
    let mut a = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let mut b = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let ra = a.process(&event()).unwrap();
    let rb = b.process(&event()).unwrap();
    for (x, y) in ra.iter().zip(rb.iter()) {
        assert_eq!(x.record.scalars, y.record.scalars);
        assert_eq!(x.record.arrays, y.record.arrays);
    }
}

#[test]
fn no_state_leaks_between_events() {
    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    proc.process(&event()).unwrap();

    let mut small = event();
    small.jets.truncate(1);
    let records = proc.process(&small).unwrap();
    let r = &records[0].record;

    // slots beyond the second event's jet count are back at the sentinel
    assert_eq!(r.arrays["jetsAK4_Pt"][1], SENTINEL);
    assert_eq!(r.arrays["jetsAK4_CorrPt"][1], SENTINEL);
    assert_eq!(r.scalars["Event_nJetsCut30"], 1.0);
}

#[test]
fn resolution_variations_need_a_gen_match() {
    let mut ev = event();
    // matched jets smear, unmatched jets do not
    ev.jets[0].gen_pt = 110.0;

    let mut proc = EventProcessor::new(AnalysisConfig::default(), calib()).unwrap();
    let records = proc.process(&ev).unwrap();
    let nominal = &records[0].record;
    let jer_up = &records[3].record;

    // nominal resolution scale is zero in this table, so nominal is unmoved
    assert_relative_eq!(nominal.arrays["jetsAK4_CorrPt"][0], 120.0, epsilon = 1e-9);
    // jer up adds 0.1 * (pt - gen_pt) = 1.0
    assert_relative_eq!(jer_up.arrays["jetsAK4_CorrPt"][0], 121.0, epsilon = 1e-9);
    // the unmatched jet stays put under every resolution variation
    assert_relative_eq!(jer_up.arrays["jetsAK4_CorrPt"][1], 80.0, epsilon = 1e-9);
}
