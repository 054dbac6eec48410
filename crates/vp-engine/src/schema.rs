//! Store layout: every collection, per-instance variable and per-event
//! scalar the pass reads or writes, declared once and resolved to handles.
//!
//! Input fields copied from the event record are `Preserve` so they survive
//! across variations; everything derived is `PerVariation` and comes back
//! from each reset as the sentinel (arrays) or zero (scalars).

use vp_core::Result;
use vp_store::{ArrayHandle, ObjectHandle, ResetPolicy, ScalarHandle, Schema};

use crate::config::AnalysisConfig;

const JETS: &str = "jetsAK4";
const FATJETS: &str = "jetsAK8";
const SUBJETS: &str = "subjetsAK8";
const MUONS: &str = "muons";
const ELECTRONS: &str = "electrons";
const PHOTONS: &str = "photons";
const TOP_HAD: &str = "resolvedTopHad";
const TOP_SEMILEP: &str = "resolvedTopSemiLep";

/// Per-jet handles.
#[derive(Debug, Clone)]
pub struct JetHandles {
    pub obj: ObjectHandle,
    // stored inputs
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub phi: ArrayHandle,
    pub e: ArrayHandle,
    pub csv: ArrayHandle,
    pub flavour: ArrayHandle,
    // derived
    pub corr_pt: ArrayHandle,
    pub corr_eta: ArrayHandle,
    pub corr_phi: ArrayHandle,
    pub corr_e: ArrayHandle,
    pub no_corr_pt: ArrayHandle,
    pub no_corr_e: ArrayHandle,
    pub passes_id: ArrayHandle,
    pub passes_dr: ArrayHandle,
    pub min_dr: ArrayHandle,
    pub is_tight: ArrayHandle,
    /// One tagged flag per configured working point.
    pub tagged: Vec<ArrayHandle>,
}

/// Per-large-radius-jet handles.
#[derive(Debug, Clone)]
pub struct FatJetHandles {
    pub obj: ObjectHandle,
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub phi: ArrayHandle,
    pub e: ArrayHandle,
    pub corr_pt: ArrayHandle,
    pub corr_eta: ArrayHandle,
    pub corr_phi: ArrayHandle,
    pub corr_e: ArrayHandle,
    pub corr_soft_drop_mass: ArrayHandle,
    pub corr_pruned_mass: ArrayHandle,
    pub corr_pruned_mass_res_up: ArrayHandle,
    pub corr_pruned_mass_res_down: ArrayHandle,
    pub corr_pruned_mass_scale_up: ArrayHandle,
    pub corr_pruned_mass_scale_down: ArrayHandle,
    pub tau32: ArrayHandle,
    pub tau21: ArrayHandle,
    pub is_top_tag: ArrayHandle,
    pub is_w_tag: ArrayHandle,
    pub top_pt: ArrayHandle,
    pub top_mass: ArrayHandle,
    pub top_w_mass: ArrayHandle,
    pub n_subjets: ArrayHandle,
    pub n_tagged_subjets: ArrayHandle,
}

/// Per-subjet handles.
#[derive(Debug, Clone)]
pub struct SubjetHandles {
    pub obj: ObjectHandle,
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub phi: ArrayHandle,
    pub e: ArrayHandle,
    pub csv: ArrayHandle,
    pub flavour: ArrayHandle,
}

/// Per-photon handles.
#[derive(Debug, Clone)]
pub struct PhotonHandles {
    pub obj: ObjectHandle,
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub is_loose: ArrayHandle,
    pub is_medium: ArrayHandle,
    pub is_tight: ArrayHandle,
}

/// Resolved hadronic-top candidate handles.
#[derive(Debug, Clone)]
pub struct TopHadHandles {
    pub obj: ObjectHandle,
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub phi: ArrayHandle,
    pub e: ArrayHandle,
    pub mass: ArrayHandle,
    pub w_mass: ArrayHandle,
    pub mass_drop: ArrayHandle,
    pub delta_r_jets: ArrayHandle,
    pub index_b: ArrayHandle,
    pub index_j1: ArrayHandle,
    pub index_j2: ArrayHandle,
}

/// Resolved semileptonic-top candidate handles.
#[derive(Debug, Clone)]
pub struct TopSemiLepHandles {
    pub obj: ObjectHandle,
    pub pt: ArrayHandle,
    pub eta: ArrayHandle,
    pub phi: ArrayHandle,
    pub e: ArrayHandle,
    pub mass: ArrayHandle,
    pub mt: ArrayHandle,
    pub lb_met_phi: ArrayHandle,
    pub lepton_met_phi: ArrayHandle,
    pub b_met_phi: ArrayHandle,
    pub top_met_phi: ArrayHandle,
    pub lepton_b_phi: ArrayHandle,
    pub index_b: ArrayHandle,
    pub index_lepton: ArrayHandle,
    pub lepton_flavour: ArrayHandle,
}

/// Leading/subleading lepton scalar handles.
#[derive(Debug, Clone)]
pub struct LeptonScalarHandles {
    pub pt: ScalarHandle,
    pub eta: ScalarHandle,
    pub phi: ScalarHandle,
    pub e: ScalarHandle,
    pub flavour: ScalarHandle,
    pub charge: ScalarHandle,
}

/// Every handle the processor touches, resolved at startup.
#[derive(Debug, Clone)]
pub struct Handles {
    pub jets: JetHandles,
    pub fatjets: FatJetHandles,
    pub subjets: SubjetHandles,
    pub photons: PhotonHandles,
    pub muons: ObjectHandle,
    pub electrons: ObjectHandle,
    pub top_had: TopHadHandles,
    pub top_semilep: TopSemiLepHandles,

    // event identity and once-per-event values (preserved)
    pub run: ScalarHandle,
    pub lumi: ScalarHandle,
    pub event: ScalarHandle,
    pub rho: ScalarHandle,
    pub n_good_pv: ScalarHandle,
    pub gen_weight: ScalarHandle,
    pub top_pt_weight: ScalarHandle,
    pub w_qcd_weight: ScalarHandle,
    pub w_ew_weight: ScalarHandle,
    pub z_qcd_weight: ScalarHandle,
    pub z_ew_weight: ScalarHandle,

    // per-variation event scalars
    pub event_flavour: ScalarHandle,
    pub n_muons: ScalarHandle,
    pub n_loose_muons: ScalarHandle,
    pub n_electrons: ScalarHandle,
    pub n_veto_electrons: ScalarHandle,
    pub lepton1: LeptonScalarHandles,
    pub lepton2: LeptonScalarHandles,
    pub ht: ScalarHandle,
    /// Jet count per scan threshold, parallel to `jet_scan_cuts`.
    pub n_jets_cut: Vec<ScalarHandle>,
    /// Tag count per working point, parallel to `working_points`.
    pub n_tagged: Vec<ScalarHandle>,
    pub met_corr_pt: ScalarHandle,
    pub met_corr_phi: ScalarHandle,
    pub met_base_pt: ScalarHandle,
    pub met_base_phi: ScalarHandle,
    pub met_t1_pt: ScalarHandle,
    pub met_t1_phi: ScalarHandle,
    pub passes_preselection: ScalarHandle,
    pub mt: ScalarHandle,
    pub mt2w: ScalarHandle,
    pub category: ScalarHandle,
    pub n_top_tags: ScalarHandle,
    pub n_w_tags: ScalarHandle,
    /// Tag weights indexed `[wp][bucket][nuisance]`.
    pub tag_weights: Vec<Vec<Vec<ScalarHandle>>>,
    /// Subjet tag weights indexed `[wp][bucket][nuisance]`.
    pub subjet_tag_weights: Vec<Vec<Vec<ScalarHandle>>>,
}

fn bucket_tag(min: usize, max: usize) -> String {
    if min == max {
        format!("{min}Tag")
    } else {
        format!("{min}to{max}Tag")
    }
}

fn declare_lepton_scalars(schema: &mut Schema, which: &str) -> Result<LeptonScalarHandles> {
    let p = ResetPolicy::PerVariation;
    Ok(LeptonScalarHandles {
        pt: schema.declare_scalar(&format!("Event_{which}_Pt"), p)?,
        eta: schema.declare_scalar(&format!("Event_{which}_Eta"), p)?,
        phi: schema.declare_scalar(&format!("Event_{which}_Phi"), p)?,
        e: schema.declare_scalar(&format!("Event_{which}_E"), p)?,
        flavour: schema.declare_scalar(&format!("Event_{which}_Flavour"), p)?,
        charge: schema.declare_scalar(&format!("Event_{which}_Charge"), p)?,
    })
}

fn declare_tag_weights(
    schema: &mut Schema,
    config: &AnalysisConfig,
    wps: &[crate::config::WorkingPoint],
    family: &str,
) -> Result<Vec<Vec<Vec<ScalarHandle>>>> {
    use vp_calib::TagNuisance;
    let mut per_wp = Vec::with_capacity(wps.len());
    for wp in wps {
        let mut per_bucket = Vec::with_capacity(config.tag_buckets.len());
        for bucket in &config.tag_buckets {
            let tag = bucket_tag(bucket.min_tags(), bucket.max_tags());
            let mut per_nuisance = Vec::with_capacity(TagNuisance::ALL.len());
            for nuisance in TagNuisance::ALL {
                let name = format!(
                    "Event_{family}Weight_{}_{tag}_{}",
                    wp.name,
                    nuisance.name()
                );
                per_nuisance.push(schema.declare_scalar(&name, ResetPolicy::PerVariation)?);
            }
            per_bucket.push(per_nuisance);
        }
        per_wp.push(per_bucket);
    }
    Ok(per_wp)
}

/// Declare the full layout for a configuration.
pub fn build(config: &AnalysisConfig) -> Result<(Schema, Handles)> {
    let mut schema = Schema::new();
    let keep = ResetPolicy::Preserve;
    let var = ResetPolicy::PerVariation;
    let caps = &config.capacities;

    let jets_obj = schema.declare_object(JETS, None, caps.jets)?;
    let jets = JetHandles {
        obj: jets_obj,
        pt: schema.declare_array(jets_obj, "Pt", keep)?,
        eta: schema.declare_array(jets_obj, "Eta", keep)?,
        phi: schema.declare_array(jets_obj, "Phi", keep)?,
        e: schema.declare_array(jets_obj, "E", keep)?,
        csv: schema.declare_array(jets_obj, "CSV", keep)?,
        flavour: schema.declare_array(jets_obj, "PartonFlavour", keep)?,
        corr_pt: schema.declare_array(jets_obj, "CorrPt", var)?,
        corr_eta: schema.declare_array(jets_obj, "CorrEta", var)?,
        corr_phi: schema.declare_array(jets_obj, "CorrPhi", var)?,
        corr_e: schema.declare_array(jets_obj, "CorrE", var)?,
        no_corr_pt: schema.declare_array(jets_obj, "NoCorrPt", var)?,
        no_corr_e: schema.declare_array(jets_obj, "NoCorrE", var)?,
        passes_id: schema.declare_array(jets_obj, "PassesID", var)?,
        passes_dr: schema.declare_array(jets_obj, "PassesDR", var)?,
        min_dr: schema.declare_array(jets_obj, "MinDR", var)?,
        is_tight: schema.declare_array(jets_obj, "IsTight", var)?,
        tagged: config
            .working_points
            .iter()
            .map(|wp| schema.declare_array(jets_obj, &format!("IsTagged_{}", wp.name), var))
            .collect::<Result<_>>()?,
    };

    let fat_obj = schema.declare_object(FATJETS, None, caps.large_radius_jets)?;
    let fatjets = FatJetHandles {
        obj: fat_obj,
        pt: schema.declare_array(fat_obj, "Pt", keep)?,
        eta: schema.declare_array(fat_obj, "Eta", keep)?,
        phi: schema.declare_array(fat_obj, "Phi", keep)?,
        e: schema.declare_array(fat_obj, "E", keep)?,
        corr_pt: schema.declare_array(fat_obj, "CorrPt", var)?,
        corr_eta: schema.declare_array(fat_obj, "CorrEta", var)?,
        corr_phi: schema.declare_array(fat_obj, "CorrPhi", var)?,
        corr_e: schema.declare_array(fat_obj, "CorrE", var)?,
        corr_soft_drop_mass: schema.declare_array(fat_obj, "CorrSoftDropMass", var)?,
        corr_pruned_mass: schema.declare_array(fat_obj, "CorrPrunedMass", var)?,
        corr_pruned_mass_res_up: schema.declare_array(fat_obj, "CorrPrunedMassResUp", var)?,
        corr_pruned_mass_res_down: schema.declare_array(fat_obj, "CorrPrunedMassResDown", var)?,
        corr_pruned_mass_scale_up: schema.declare_array(fat_obj, "CorrPrunedMassScaleUp", var)?,
        corr_pruned_mass_scale_down: schema.declare_array(fat_obj, "CorrPrunedMassScaleDown", var)?,
        tau32: schema.declare_array(fat_obj, "Tau3OverTau2", var)?,
        tau21: schema.declare_array(fat_obj, "Tau2OverTau1", var)?,
        is_top_tag: schema.declare_array(fat_obj, "IsTopTag", var)?,
        is_w_tag: schema.declare_array(fat_obj, "IsWTag", var)?,
        top_pt: schema.declare_array(fat_obj, "TopPt", var)?,
        top_mass: schema.declare_array(fat_obj, "TopMass", var)?,
        top_w_mass: schema.declare_array(fat_obj, "TopWMass", var)?,
        n_subjets: schema.declare_array(fat_obj, "NSubjets", var)?,
        n_tagged_subjets: schema.declare_array(fat_obj, "NTaggedSubjets", var)?,
    };

    let subj_obj = schema.declare_object(SUBJETS, None, caps.subjets)?;
    let subjets = SubjetHandles {
        obj: subj_obj,
        pt: schema.declare_array(subj_obj, "Pt", keep)?,
        eta: schema.declare_array(subj_obj, "Eta", keep)?,
        phi: schema.declare_array(subj_obj, "Phi", keep)?,
        e: schema.declare_array(subj_obj, "E", keep)?,
        csv: schema.declare_array(subj_obj, "CSV", keep)?,
        flavour: schema.declare_array(subj_obj, "PartonFlavour", keep)?,
    };

    let pho_obj = schema.declare_object(PHOTONS, None, caps.photons)?;
    let photons = PhotonHandles {
        obj: pho_obj,
        pt: schema.declare_array(pho_obj, "Pt", keep)?,
        eta: schema.declare_array(pho_obj, "Eta", keep)?,
        is_loose: schema.declare_array(pho_obj, "IsLoose", var)?,
        is_medium: schema.declare_array(pho_obj, "IsMedium", var)?,
        is_tight: schema.declare_array(pho_obj, "IsTight", var)?,
    };

    let muons = schema.declare_object(MUONS, None, caps.muons)?;
    let electrons = schema.declare_object(ELECTRONS, None, caps.electrons)?;

    let th_obj = schema.declare_object(TOP_HAD, None, caps.resolved_tops)?;
    let top_had = TopHadHandles {
        obj: th_obj,
        pt: schema.declare_array(th_obj, "Pt", var)?,
        eta: schema.declare_array(th_obj, "Eta", var)?,
        phi: schema.declare_array(th_obj, "Phi", var)?,
        e: schema.declare_array(th_obj, "E", var)?,
        mass: schema.declare_array(th_obj, "Mass", var)?,
        w_mass: schema.declare_array(th_obj, "WMass", var)?,
        mass_drop: schema.declare_array(th_obj, "MassDrop", var)?,
        delta_r_jets: schema.declare_array(th_obj, "DeltaRJets", var)?,
        index_b: schema.declare_array(th_obj, "IndexB", var)?,
        index_j1: schema.declare_array(th_obj, "IndexJ1", var)?,
        index_j2: schema.declare_array(th_obj, "IndexJ2", var)?,
    };

    let ts_obj = schema.declare_object(TOP_SEMILEP, None, caps.resolved_tops)?;
    let top_semilep = TopSemiLepHandles {
        obj: ts_obj,
        pt: schema.declare_array(ts_obj, "Pt", var)?,
        eta: schema.declare_array(ts_obj, "Eta", var)?,
        phi: schema.declare_array(ts_obj, "Phi", var)?,
        e: schema.declare_array(ts_obj, "E", var)?,
        mass: schema.declare_array(ts_obj, "Mass", var)?,
        mt: schema.declare_array(ts_obj, "MT", var)?,
        lb_met_phi: schema.declare_array(ts_obj, "LBMPhi", var)?,
        lepton_met_phi: schema.declare_array(ts_obj, "LMPhi", var)?,
        b_met_phi: schema.declare_array(ts_obj, "BMPhi", var)?,
        top_met_phi: schema.declare_array(ts_obj, "TMPhi", var)?,
        lepton_b_phi: schema.declare_array(ts_obj, "LBPhi", var)?,
        index_b: schema.declare_array(ts_obj, "IndexB", var)?,
        index_lepton: schema.declare_array(ts_obj, "IndexL", var)?,
        lepton_flavour: schema.declare_array(ts_obj, "LeptonFlavour", var)?,
    };

    let handles = Handles {
        jets,
        fatjets,
        subjets,
        photons,
        muons,
        electrons,
        top_had,
        top_semilep,
        run: schema.declare_scalar("Event_RunNumber", keep)?,
        lumi: schema.declare_scalar("Event_LumiBlock", keep)?,
        event: schema.declare_scalar("Event_EventNumber", keep)?,
        rho: schema.declare_scalar("Event_Rho", keep)?,
        n_good_pv: schema.declare_scalar("Event_nGoodPV", keep)?,
        gen_weight: schema.declare_scalar("Event_GenWeight", keep)?,
        top_pt_weight: schema.declare_scalar("Event_T_Weight", keep)?,
        w_qcd_weight: schema.declare_scalar("Event_W_QCD_Weight", keep)?,
        w_ew_weight: schema.declare_scalar("Event_W_EW_Weight", keep)?,
        z_qcd_weight: schema.declare_scalar("Event_Z_QCD_Weight", keep)?,
        z_ew_weight: schema.declare_scalar("Event_Z_EW_Weight", keep)?,
        event_flavour: schema.declare_scalar("Event_eventFlavour", var)?,
        n_muons: schema.declare_scalar("Event_nMediumMuons", var)?,
        n_loose_muons: schema.declare_scalar("Event_nLooseMuons", var)?,
        n_electrons: schema.declare_scalar("Event_nTightElectrons", var)?,
        n_veto_electrons: schema.declare_scalar("Event_nVetoElectrons", var)?,
        lepton1: declare_lepton_scalars(&mut schema, "Lepton1")?,
        lepton2: declare_lepton_scalars(&mut schema, "Lepton2")?,
        ht: schema.declare_scalar("Event_Ht", var)?,
        n_jets_cut: config
            .jet_scan_cuts
            .iter()
            .map(|cut| schema.declare_scalar(&format!("Event_nJetsCut{}", *cut as i64), var))
            .collect::<Result<_>>()?,
        n_tagged: config
            .working_points
            .iter()
            .map(|wp| schema.declare_scalar(&format!("Event_nTaggedJets_{}", wp.name), var))
            .collect::<Result<_>>()?,
        met_corr_pt: schema.declare_scalar("Event_MetCorrPt", var)?,
        met_corr_phi: schema.declare_scalar("Event_MetCorrPhi", var)?,
        met_base_pt: schema.declare_scalar("Event_MetCorrBasePt", var)?,
        met_base_phi: schema.declare_scalar("Event_MetCorrBasePhi", var)?,
        met_t1_pt: schema.declare_scalar("Event_MetCorrT1Pt", var)?,
        met_t1_phi: schema.declare_scalar("Event_MetCorrT1Phi", var)?,
        passes_preselection: schema.declare_scalar("Event_passesPreselection", var)?,
        mt: schema.declare_scalar("Event_mt", var)?,
        mt2w: schema.declare_scalar("Event_Mt2w", var)?,
        category: schema.declare_scalar("Event_category", var)?,
        n_top_tags: schema.declare_scalar("Event_nTopTagJets", var)?,
        n_w_tags: schema.declare_scalar("Event_nWTagJets", var)?,
        tag_weights: declare_tag_weights(&mut schema, config, &config.working_points, "b")?,
        subjet_tag_weights: declare_tag_weights(
            &mut schema,
            config,
            &config.subjet_working_points,
            "subjB",
        )?,
    };

    Ok((schema, handles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_builds() {
        let config = AnalysisConfig::default();
        let (schema, handles) = build(&config).unwrap();
        assert_eq!(handles.tag_weights.len(), 3);
        assert_eq!(handles.tag_weights[0].len(), 3);
        assert_eq!(handles.tag_weights[0][0].len(), 5);
        assert_eq!(schema.capacity(handles.jets.obj), 20);
        // composed names resolve back to the same handles
        assert_eq!(
            schema.resolve_array("jetsAK4", None, "CorrPt").unwrap(),
            handles.jets.corr_pt
        );
        assert_eq!(schema.resolve_scalar("Event_Ht").unwrap(), handles.ht);
        assert_eq!(
            schema.resolve_scalar("Event_bWeight_medium_1Tag_central").unwrap(),
            handles.tag_weights[1][1][0]
        );
    }

    #[test]
    fn weight_names_compose() {
        let config = AnalysisConfig::default();
        let (schema, handles) = build(&config).unwrap();
        // wp index 1 = medium, bucket index 1 = exactly 1 tag, nuisance 0 = central
        assert_eq!(
            schema.scalar_name(handles.tag_weights[1][1][0]),
            "Event_bWeight_medium_1Tag_central"
        );
        assert_eq!(
            schema.scalar_name(handles.subjet_tag_weights[0][2][3]),
            "Event_subjBWeight_medium_2Tag_tag_up"
        );
    }
}
