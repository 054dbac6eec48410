//! The per-event orchestrator: runs every configured variation over one
//! event, filling the store and snapshotting one record per variation.
//!
//! The baseline copy of the input collections happens once per event; each
//! variation starts from a reset store, reruns the correction and selection
//! chain, and ends with a snapshot. Nothing derived survives from one
//! variation to the next.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use vp_btag::{JetTagInfo, TagWeighter};
use vp_calib::{CalibrationSet, FlavorClass, TagNuisance};
use vp_core::{FourVec, Result, Variation};
use vp_jet::{
    CorrectedFatJet, EventConditions, FatJetCorrector, FatJetInput as FatJetCorrectionInput,
    JetCorrector, JetInput as JetCorrectionInput,
};
use vp_store::{Record, Schema, Store};

use crate::config::AnalysisConfig;
use crate::gen;
use crate::input::EventInput;
use crate::kinematics;
use crate::schema;
use crate::schema::Handles;
use crate::selection::{self, SelectedLepton};
use crate::tops::{self, TopInputJet};

/// Relative size of the unclustered-energy shift.
const UNCLUSTERED_SHIFT_FRACTION: f64 = 0.1;

/// One output row: the variation it belongs to plus the full snapshot.
/// Serializes flat, with the snapshot's fields lifted to the top level.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VariationRecord {
    pub variation: Variation,
    #[serde(flatten)]
    pub record: Record,
}

/// Everything the jet loop accumulates for the rest of the variation.
#[derive(Debug, Default)]
struct JetPass {
    ht: f64,
    /// Per-threshold jet counts, parallel to `jet_scan_cuts`.
    n_cut: Vec<usize>,
    /// Observed tag counts per working point.
    n_tagged: Vec<usize>,
    /// Reweighting inputs indexed `[working point][nuisance]`.
    tag_lists: Vec<Vec<Vec<JetTagInfo>>>,
    /// Corrected four-vectors of every non-empty jet slot, for W pairing.
    all_corrected: Vec<FourVec>,
    /// Per-slot trijet inputs for the resolved hadronic combinatorics.
    top_jets: Vec<TopInputJet>,
    /// Analysis jets (first threshold): store index and four-vector.
    analysis_jets: Vec<(usize, FourVec)>,
    /// Medium-tagged analysis jets inside the tag acceptance.
    bjets: Vec<(usize, FourVec)>,
    // missing-energy accumulators
    full_px: f64,
    full_py: f64,
    base_px: f64,
    base_py: f64,
    t1_px: f64,
    t1_py: f64,
    // unclustered sum: raw jet pt at the stored direction
    uncl_px: f64,
    uncl_py: f64,
}

/// Nuisances act on one flavor family: the mistag pair moves light jets
/// only, the tag pair moves heavy jets only; everything else falls back to
/// the central scale factor.
fn applied_nuisance(class: FlavorClass, nuisance: TagNuisance) -> TagNuisance {
    match (class, nuisance) {
        (FlavorClass::Light, TagNuisance::TagUp | TagNuisance::TagDown) => TagNuisance::Central,
        (FlavorClass::B | FlavorClass::C, TagNuisance::MistagUp | TagNuisance::MistagDown) => {
            TagNuisance::Central
        }
        _ => nuisance,
    }
}

fn cap9(n: usize) -> f64 {
    n.min(9) as f64
}

/// Runs the full variation loop for one event at a time.
pub struct EventProcessor {
    config: AnalysisConfig,
    calib: CalibrationSet,
    schema: Schema,
    handles: Handles,
    store: Store,
}

impl EventProcessor {
    pub fn new(config: AnalysisConfig, calib: CalibrationSet) -> Result<Self> {
        config.validate()?;
        calib.validate()?;
        let (schema, handles) = schema::build(&config)?;
        let store = Store::new(&schema);
        Ok(Self { config, calib, schema, handles, store })
    }

    /// The resolved store layout, for record consumers.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mass-smearing seed for one (event, variation) pair. Derived rather
    /// than sequential so record content does not depend on event order.
    fn smear_seed(&self, event: &EventInput, variation_index: usize) -> u64 {
        self.config
            .seed
            .wrapping_add(event.event.wrapping_mul(0x9e37_79b9_7f4a_7c15))
            .wrapping_add(variation_index as u64)
    }

    /// Process one event: one record per configured variation, in order.
    pub fn process(&mut self, event: &EventInput) -> Result<Vec<VariationRecord>> {
        self.store.reset_event();
        self.populate_baseline(event)?;
        let variations = self.config.variations.clone();
        let mut out = Vec::with_capacity(variations.len());
        for (vi, variation) in variations.iter().enumerate() {
            self.store.reset_variation(&self.schema);
            self.run_variation(event, *variation, vi)?;
            out.push(VariationRecord {
                variation: *variation,
                record: self.store.snapshot(&self.schema),
            });
        }
        debug!(
            event = event.event,
            variations = out.len(),
            "event processed"
        );
        Ok(out)
    }

    /// Copy the input collections and once-per-event values into the
    /// preserved part of the store.
    fn populate_baseline(&mut self, event: &EventInput) -> Result<()> {
        let h = &self.handles;
        let caps = &self.config.capacities;

        self.store.set_scalar(h.run, event.run as f64);
        self.store.set_scalar(h.lumi, event.lumi as f64);
        self.store.set_scalar(h.event, event.event as f64);
        self.store.set_scalar(h.rho, event.rho);
        self.store.set_scalar(h.n_good_pv, event.good_vertices() as f64);
        self.store.set_scalar(h.gen_weight, event.gen_weight);

        let summary = gen::summarize(&event.partons);
        self.store
            .set_scalar(h.top_pt_weight, gen::top_pt_weight(summary.top_pt, summary.antitop_pt));
        let boson = |pt: f64, f: fn(f64) -> f64| if pt >= 0.0 { f(pt) } else { 1.0 };
        self.store.set_scalar(h.w_qcd_weight, boson(summary.w_pt, gen::w_qcd_weight));
        self.store.set_scalar(h.w_ew_weight, boson(summary.w_pt, gen::w_ew_weight));
        self.store.set_scalar(h.z_qcd_weight, boson(summary.z_pt, gen::z_qcd_weight));
        self.store.set_scalar(h.z_ew_weight, boson(summary.z_pt, gen::z_ew_weight));

        for (j, jet) in event.jets.iter().take(caps.jets).enumerate() {
            self.store.set(h.jets.pt, j, jet.pt)?;
            self.store.set(h.jets.eta, j, jet.eta)?;
            self.store.set(h.jets.phi, j, jet.phi)?;
            self.store.set(h.jets.e, j, jet.energy)?;
            self.store.set(h.jets.csv, j, jet.csv)?;
            self.store.set(h.jets.flavour, j, jet.parton_flavour)?;
        }
        for (t, fat) in event.large_radius_jets.iter().take(caps.large_radius_jets).enumerate() {
            self.store.set(h.fatjets.pt, t, fat.pt)?;
            self.store.set(h.fatjets.eta, t, fat.eta)?;
            self.store.set(h.fatjets.phi, t, fat.phi)?;
            self.store.set(h.fatjets.e, t, fat.energy)?;
        }
        for (s, sub) in event.subjets.iter().take(caps.subjets).enumerate() {
            self.store.set(h.subjets.pt, s, sub.pt)?;
            self.store.set(h.subjets.eta, s, sub.eta)?;
            self.store.set(h.subjets.phi, s, sub.phi)?;
            self.store.set(h.subjets.e, s, sub.energy)?;
            self.store.set(h.subjets.csv, s, sub.csv)?;
            self.store.set(h.subjets.flavour, s, sub.parton_flavour)?;
        }
        for (p, pho) in event.photons.iter().take(caps.photons).enumerate() {
            self.store.set(h.photons.pt, p, pho.pt)?;
            self.store.set(h.photons.eta, p, pho.eta)?;
        }
        Ok(())
    }

    /// Index of the working point feeding the b-jet lists (resolved tops,
    /// transverse masses, category code).
    fn b_list_wp(&self) -> usize {
        self.config
            .working_points
            .iter()
            .position(|wp| wp.name == "medium")
            .unwrap_or(0)
    }

    fn run_variation(&mut self, event: &EventInput, variation: Variation, vi: usize) -> Result<()> {
        let caps = self.config.capacities.clone();
        let n_jets = event.jets.len().min(caps.jets);
        let n_fat = event.large_radius_jets.len().min(caps.large_radius_jets);
        let n_subjets = event.subjets.len().min(caps.subjets);
        let n_photons = event.photons.len().min(caps.photons);

        self.store.set_size(self.handles.jets.obj, n_jets);
        self.store.set_size(self.handles.fatjets.obj, n_fat);
        self.store.set_size(self.handles.subjets.obj, n_subjets);
        self.store.set_size(self.handles.photons.obj, n_photons);
        self.store
            .set_size(self.handles.muons, event.muons.len().min(caps.muons));
        self.store
            .set_size(self.handles.electrons, event.electrons.len().min(caps.electrons));

        let conditions = EventConditions { rho: event.rho, npv: event.good_vertices() };

        // photons
        for p in 0..n_photons {
            let (loose, medium, tight) = selection::photon_flags(&event.photons[p], event.rho);
            self.store.set(self.handles.photons.is_loose, p, loose as u8 as f64)?;
            self.store.set(self.handles.photons.is_medium, p, medium as u8 as f64)?;
            self.store.set(self.handles.photons.is_tight, p, tight as u8 as f64)?;
        }

        // leptons
        let muon_sel = selection::select_muons(&event.muons, &self.config.selection);
        let electron_sel = selection::select_electrons(
            &event.electrons,
            &muon_sel.loose_for_cleaning,
            &self.config.selection,
        );
        let mut leptons: Vec<SelectedLepton> = muon_sel.selected.clone();
        leptons.extend(electron_sel.selected.iter().copied());

        self.store.set_scalar(self.handles.n_muons, muon_sel.selected.len() as f64);
        self.store.set_scalar(self.handles.n_loose_muons, muon_sel.n_loose as f64);
        self.store
            .set_scalar(self.handles.n_electrons, electron_sel.selected.len() as f64);
        self.store
            .set_scalar(self.handles.n_veto_electrons, electron_sel.n_veto as f64);

        let (first, second) = selection::leading_pair(&leptons);
        let lepton_scalars = [
            (first, self.handles.lepton1.clone()),
            (second, self.handles.lepton2.clone()),
        ];
        for (idx, handles) in &lepton_scalars {
            if let Some(i) = idx {
                let l = &leptons[*i];
                self.store.set_scalar(handles.pt, l.p4.pt());
                self.store.set_scalar(handles.eta, l.p4.eta());
                self.store.set_scalar(handles.phi, l.p4.phi());
                self.store.set_scalar(handles.e, l.p4.energy());
                self.store.set_scalar(handles.flavour, l.flavour);
                self.store.set_scalar(handles.charge, l.charge);
            }
        }

        // generator flavour content (jet parton flavours, all slots)
        let mut nb = 0usize;
        let mut nc = 0usize;
        for jet in event.jets.iter().take(n_jets) {
            match (jet.parton_flavour as i32).abs() {
                5 => nb += 1,
                4 => nc += 1,
                _ => {}
            }
        }
        self.store.set_scalar(
            self.handles.event_flavour,
            gen::event_flavour(self.config.classify_event_flavour, nb, nc),
        );

        let pass = self.correct_jets(event, variation, conditions, &muon_sel, &electron_sel)?;

        let fat = self.correct_fatjets(event, variation, conditions, vi, n_fat)?;

        // missing energy, three stages, unclustered shift on the full one
        let (met_corr_pt, met_corr_phi, full_px, full_py) =
            self.finish_met(event, variation, &pass)?;

        // preselection: any of the three sums above threshold keeps the
        // variation; failure zeroes the derived event scalars and leaves
        // the per-instance fields standing
        if self.config.do_preselection {
            let pre = &self.config.preselection;
            let mut lep_px = full_px;
            let mut lep_py = full_py;
            for (idx, _) in &lepton_scalars {
                if let Some(i) = idx {
                    lep_px += leptons[*i].p4.px();
                    lep_py += leptons[*i].p4.py();
                }
            }
            let met_lep = lep_px.hypot(lep_py);
            let passes = met_corr_pt > pre.met_min
                || pass.ht > pre.ht_min
                || met_lep > pre.lepton_met_min;
            if !passes {
                self.store.reset_variation_scalars(&self.schema);
                return Ok(());
            }
        }
        self.store.set_scalar(self.handles.passes_preselection, 1.0);

        // transverse masses in the single-lepton channel
        let single_lepton = (muon_sel.selected.len() == 1 && electron_sel.selected.is_empty())
            || (electron_sel.selected.len() == 1 && muon_sel.selected.is_empty());
        if single_lepton && !pass.bjets.is_empty() {
            let lepton = leptons[0];
            self.store.set_scalar(
                self.handles.mt,
                kinematics::transverse_mass(
                    lepton.p4.pt(),
                    lepton.p4.phi(),
                    met_corr_pt,
                    met_corr_phi,
                ),
            );
            let b_p4: Vec<FourVec> = pass.bjets.iter().map(|(_, p4)| *p4).collect();
            self.store.set_scalar(
                self.handles.mt2w,
                kinematics::mt2w_proxy(lepton.p4, &b_p4, full_px, full_py),
            );
        }

        let subjet_pass = self.process_subjets(event, n_subjets, n_fat)?;

        // boosted top and W tagging
        let mut n_top_tags = 0usize;
        let mut n_w_tags = 0usize;
        for (t, cfj) in fat.iter().enumerate() {
            if cfj.pt <= 0.0 {
                continue;
            }
            let input = &event.large_radius_jets[t];
            let tau32 = if input.tau2 > 0.0 { input.tau3 / input.tau2 } else { f64::MAX };
            let tau21 = if input.tau1 > 0.0 { input.tau2 / input.tau1 } else { f64::MAX };
            self.store.set(self.handles.fatjets.tau32, t, tau32.min(1e6))?;
            self.store.set(self.handles.fatjets.tau21, t, tau21.min(1e6))?;

            let tag = tops::boosted_tag(
                cfj.p4,
                cfj.soft_drop_mass,
                cfj.pruned_mass,
                tau32,
                tau21,
                &pass.all_corrected,
            );
            self.store.set(self.handles.fatjets.is_top_tag, t, tag.is_top as u8 as f64)?;
            self.store.set(self.handles.fatjets.is_w_tag, t, tag.is_w as u8 as f64)?;
            if tag.is_top || tag.is_w {
                self.store.set(self.handles.fatjets.top_pt, t, tag.top_p4.pt())?;
                self.store.set(self.handles.fatjets.top_mass, t, tag.top_p4.mass())?;
                if tag.is_w {
                    self.store.set(self.handles.fatjets.top_w_mass, t, cfj.pruned_mass)?;
                    n_w_tags += 1;
                }
                if tag.is_top {
                    n_top_tags += 1;
                }
            }
        }
        self.store.set_scalar(self.handles.n_top_tags, n_top_tags as f64);
        self.store.set_scalar(self.handles.n_w_tags, n_w_tags as f64);

        // event category code
        let category = 100_000.0 * cap9(muon_sel.selected.len())
            + 10_000.0 * cap9(electron_sel.selected.len())
            + 1_000.0 * cap9(pass.analysis_jets.len())
            + 100.0 * cap9(pass.bjets.len())
            + 10.0 * cap9(n_w_tags)
            + cap9(n_top_tags);
        self.store.set_scalar(self.handles.category, category);

        // resolved tops
        if self.config.do_resolved_top_semilep
            && single_lepton
            && !pass.bjets.is_empty()
            && !pass.analysis_jets.is_empty()
        {
            let cands = tops::resolved_semileptonic_tops(
                &leptons,
                &pass.bjets,
                full_px,
                full_py,
                met_corr_phi,
                caps.resolved_tops,
            );
            let h = self.handles.top_semilep.clone();
            self.store.set_size(h.obj, cands.len());
            for (i, c) in cands.iter().enumerate() {
                self.store.set(h.pt, i, c.p4.pt())?;
                self.store.set(h.eta, i, c.p4.eta())?;
                self.store.set(h.phi, i, c.p4.phi())?;
                self.store.set(h.e, i, c.p4.energy())?;
                self.store.set(h.mass, i, c.p4.mass())?;
                self.store.set(h.mt, i, c.mt)?;
                self.store.set(h.lb_met_phi, i, c.lb_met_phi)?;
                self.store.set(h.lepton_met_phi, i, c.lepton_met_phi)?;
                self.store.set(h.b_met_phi, i, c.b_met_phi)?;
                self.store.set(h.top_met_phi, i, c.top_met_phi)?;
                self.store.set(h.lepton_b_phi, i, c.lepton_b_phi)?;
                self.store.set(h.index_b, i, c.index_b as f64)?;
                self.store.set(h.index_lepton, i, c.index_lepton as f64)?;
                self.store.set(h.lepton_flavour, i, c.lepton_flavour)?;
            }
        }

        if self.config.do_resolved_top_had
            && pass.analysis_jets.len() > 2
            && !pass.bjets.is_empty()
        {
            let cands = tops::resolved_hadronic_tops(
                &pass.top_jets,
                self.config.max_leading_jets,
                caps.resolved_tops,
            );
            let h = self.handles.top_had.clone();
            self.store.set_size(h.obj, cands.len());
            for (i, c) in cands.iter().enumerate() {
                self.store.set(h.pt, i, c.p4.pt())?;
                self.store.set(h.eta, i, c.p4.eta())?;
                self.store.set(h.phi, i, c.p4.phi())?;
                self.store.set(h.e, i, c.p4.energy())?;
                self.store.set(h.mass, i, c.p4.mass())?;
                self.store.set(h.w_mass, i, c.w_mass)?;
                self.store.set(h.mass_drop, i, c.mass_drop)?;
                self.store.set(h.delta_r_jets, i, c.delta_r_jets)?;
                self.store.set(h.index_b, i, c.index_b as f64)?;
                self.store.set(h.index_j1, i, c.index_j1 as f64)?;
                self.store.set(h.index_j2, i, c.index_j2 as f64)?;
            }
        }

        // tag weights: every (working point, bucket, nuisance) triple
        for (wi, _) in self.config.working_points.iter().enumerate() {
            for (bi, bucket) in self.config.tag_buckets.iter().enumerate() {
                let weighter = TagWeighter::new(*bucket);
                for (ni, _) in TagNuisance::ALL.iter().enumerate() {
                    let w = weighter.weight(&pass.tag_lists[wi][ni], pass.n_tagged[wi])?;
                    self.store.set_scalar(self.handles.tag_weights[wi][bi][ni], w);
                }
            }
        }
        for (wi, _) in self.config.subjet_working_points.iter().enumerate() {
            for (bi, bucket) in self.config.tag_buckets.iter().enumerate() {
                let weighter = TagWeighter::new(*bucket);
                for (ni, _) in TagNuisance::ALL.iter().enumerate() {
                    let w = weighter
                        .weight(&subjet_pass.tag_lists[wi][ni], subjet_pass.n_tagged[wi])?;
                    self.store
                        .set_scalar(self.handles.subjet_tag_weights[wi][bi][ni], w);
                }
            }
        }

        Ok(())
    }

    /// The standard-radius jet loop: correction, identification, cleaning,
    /// threshold scan, tag bookkeeping, missing-energy accumulation.
    fn correct_jets(
        &mut self,
        event: &EventInput,
        variation: Variation,
        conditions: EventConditions,
        muon_sel: &selection::MuonSelection,
        electron_sel: &selection::ElectronSelection,
    ) -> Result<JetPass> {
        let cuts = self.config.selection.clone();
        let scan_cuts = self.config.jet_scan_cuts.clone();
        let working_points = self.config.working_points.clone();
        let b_wp = self.b_list_wp();
        let n_jets = event.jets.len().min(self.config.capacities.jets);

        let mut corrector = JetCorrector::new(&self.calib, conditions, variation);
        if !self.config.recalibrate_jets {
            corrector = corrector.retain_stored_calibration();
        }

        let mut pass = JetPass {
            n_cut: vec![0; scan_cuts.len()],
            n_tagged: vec![0; working_points.len()],
            tag_lists: vec![vec![Vec::new(); TagNuisance::ALL.len()]; working_points.len()],
            ..JetPass::default()
        };

        for j in 0..n_jets {
            let input = &event.jets[j];

            // muons built from the same constituents, subtracted before the
            // muon-free recalibration
            let shared_muons: Vec<FourVec> = event
                .muons
                .iter()
                .filter(|m| {
                    m.subtractable()
                        && m.keys.first().map_or(false, |k| input.keys.contains(k))
                })
                .map(|m| m.p4())
                .collect();

            let cj = corrector.correct(
                &JetCorrectionInput {
                    pt: input.pt,
                    eta: input.eta,
                    phi: input.phi,
                    energy: input.energy,
                    gen_pt: input.gen_pt,
                    jec_factor: input.jec_factor,
                    area: input.area,
                    charged_em_frac: input.charged_em_frac,
                    neutral_em_frac: input.neutral_em_frac,
                },
                &shared_muons,
            )?;

            if input.pt > 0.0 {
                let raw_pt = input.pt * input.jec_factor;
                pass.uncl_px += raw_pt * input.phi.cos();
                pass.uncl_py += raw_pt * input.phi.sin();
            }

            pass.full_px += cj.met_shift.px;
            pass.full_py += cj.met_shift.py;
            pass.base_px += cj.base_met_shift.px;
            pass.base_py += cj.base_met_shift.py;
            pass.t1_px += cj.type1_met_shift.px;
            pass.t1_py += cj.type1_met_shift.py;

            let h = self.handles.jets.clone();
            self.store.set(h.no_corr_pt, j, cj.raw_pt)?;
            self.store.set(h.no_corr_e, j, cj.raw_energy)?;
            self.store.set(h.corr_pt, j, cj.pt)?;
            self.store.set(h.corr_e, j, cj.energy)?;
            self.store.set(h.corr_eta, j, cj.eta)?;
            self.store.set(h.corr_phi, j, cj.phi)?;

            let live = input.pt > 0.0;
            let class = FlavorClass::from_pdg(input.parton_flavour as i32);
            let mut is_tagged = vec![false; working_points.len()];
            for (wi, wp) in working_points.iter().enumerate() {
                is_tagged[wi] = input.csv > wp.threshold;
                self.store.set(h.tagged[wi], j, is_tagged[wi] as u8 as f64)?;
            }

            let passes_id = live && selection::jet_passes_id(input, cj.eta);
            self.store.set(h.passes_id, j, passes_id as u8 as f64)?;

            // cross-clean distance against the selected leptons; the flag is
            // recorded but only enforced on request
            let mut min_dr = f64::INFINITY;
            let mut passes_dr = true;
            if live {
                for el in &electron_sel.selected {
                    let dr = el.p4.delta_r(&cj.p4);
                    min_dr = min_dr.min(dr);
                    if dr < cuts.jet_electron_dr_min {
                        passes_dr = false;
                    }
                }
                for mu in &muon_sel.selected {
                    let dr = mu.p4.delta_r(&cj.p4);
                    min_dr = min_dr.min(dr);
                    if dr < cuts.jet_muon_dr_min {
                        passes_dr = false;
                    }
                }
            }
            if min_dr.is_finite() {
                self.store.set(h.min_dr, j, min_dr)?;
            }
            self.store.set(h.passes_dr, j, passes_dr as u8 as f64)?;
            let passes_dr = passes_dr || !cuts.clean_jets_against_leptons;

            if live && cj.pt > 0.0 {
                pass.all_corrected.push(cj.p4);
            }

            if passes_id
                && passes_dr
                && cj.pt > cuts.ht_jet_pt_min
                && cj.eta.abs() < cuts.ht_jet_abs_eta_max
            {
                pass.ht += cj.pt;
            }

            let mut is_tight = false;
            let mut is_b = false;
            for (ci, cut) in scan_cuts.iter().enumerate() {
                let passes_cut = cj.pt > *cut && cj.eta.abs() < cuts.scan_abs_eta_max;
                if !(passes_id && passes_dr && passes_cut) {
                    continue;
                }
                pass.n_cut[ci] += 1;
                if ci > 0 {
                    continue;
                }

                is_tight = true;
                pass.analysis_jets.push((j, cj.p4));
                is_b = is_tagged[b_wp] && cj.eta.abs() < cuts.tag_abs_eta_max;
                if is_b {
                    pass.bjets.push((j, cj.p4));
                }

                if cj.eta.abs() >= cuts.tag_abs_eta_max {
                    continue;
                }
                for (wi, wp) in working_points.iter().enumerate() {
                    if is_tagged[wi] {
                        pass.n_tagged[wi] += 1;
                    }
                    let eff =
                        self.calib.tag_efficiency.efficiency(&wp.name, class, cj.pt, cj.eta)?;
                    for (ni, nuisance) in TagNuisance::ALL.iter().enumerate() {
                        let sf = self.calib.tag_scale_factors.scale_factor(
                            &wp.name,
                            class,
                            applied_nuisance(class, *nuisance),
                            cj.pt,
                        )?;
                        pass.tag_lists[wi][ni].push(JetTagInfo { eff, sf });
                    }
                }
            }
            self.store.set(h.is_tight, j, is_tight as u8 as f64)?;

            pass.top_jets.push(TopInputJet {
                p4: if live && cj.pt > 0.0 { cj.p4 } else { FourVec::zero() },
                is_tight,
                is_b_tagged: is_b,
            });
        }

        self.store.set_scalar(self.handles.ht, pass.ht);
        for (ci, n) in pass.n_cut.iter().enumerate() {
            self.store.set_scalar(self.handles.n_jets_cut[ci], *n as f64);
        }
        for (wi, n) in pass.n_tagged.iter().enumerate() {
            self.store.set_scalar(self.handles.n_tagged[wi], *n as f64);
        }
        Ok(pass)
    }

    /// The large-radius jet loop: kinematic correction plus the groomed-mass
    /// variants. Returns the corrected jets for the boosted-tag stage.
    fn correct_fatjets(
        &mut self,
        event: &EventInput,
        variation: Variation,
        conditions: EventConditions,
        vi: usize,
        n_fat: usize,
    ) -> Result<Vec<CorrectedFatJet>> {
        let rng = StdRng::seed_from_u64(self.smear_seed(event, vi));
        let mut corrector = FatJetCorrector::new(&self.calib, conditions, variation, rng);
        let mut out = Vec::with_capacity(n_fat);
        for t in 0..n_fat {
            let input = &event.large_radius_jets[t];
            let cfj = corrector.correct(&FatJetCorrectionInput {
                pt: input.pt,
                eta: input.eta,
                phi: input.phi,
                energy: input.energy,
                gen_pt: input.gen_pt,
                jec_factor: input.jec_factor,
                area: input.area,
                pruned_mass: input.pruned_mass,
                soft_drop_mass: input.soft_drop_mass,
            })?;

            let h = self.handles.fatjets.clone();
            self.store.set(h.corr_pt, t, cfj.pt)?;
            self.store.set(h.corr_e, t, cfj.energy)?;
            self.store.set(h.corr_eta, t, cfj.eta)?;
            self.store.set(h.corr_phi, t, cfj.phi)?;
            self.store.set(h.corr_soft_drop_mass, t, cfj.soft_drop_mass)?;
            self.store.set(h.corr_pruned_mass, t, cfj.pruned_mass)?;
            self.store.set(h.corr_pruned_mass_res_up, t, cfj.pruned_mass_res_up)?;
            self.store.set(h.corr_pruned_mass_res_down, t, cfj.pruned_mass_res_down)?;
            self.store.set(h.corr_pruned_mass_scale_up, t, cfj.pruned_mass_scale_up)?;
            self.store.set(h.corr_pruned_mass_scale_down, t, cfj.pruned_mass_scale_down)?;
            out.push(cfj);
        }
        Ok(out)
    }

    /// Finish the three missing-energy stages from the accumulated shifts
    /// and write their scalars. Returns the fully corrected stage.
    fn finish_met(
        &mut self,
        event: &EventInput,
        variation: Variation,
        pass: &JetPass,
    ) -> Result<(f64, f64, f64, f64)> {
        let met = &event.met;
        let mut full_dx = pass.full_px;
        let mut full_dy = pass.full_py;

        let shift = variation.unclustered_shift();
        if shift != 0.0 {
            let uncl_x = met.uncor_pt * met.uncor_phi.cos() + pass.uncl_px;
            let uncl_y = met.uncor_pt * met.uncor_phi.sin() + pass.uncl_py;
            full_dx -= shift * uncl_x * UNCLUSTERED_SHIFT_FRACTION;
            full_dy -= shift * uncl_y * UNCLUSTERED_SHIFT_FRACTION;
        }

        let full_px = met.pt * met.phi.cos() + full_dx;
        let full_py = met.pt * met.phi.sin() + full_dy;
        let base_px = met.pt * met.phi.cos() + pass.base_px;
        let base_py = met.pt * met.phi.sin() + pass.base_py;
        let t1_px = met.uncor_pt * met.uncor_phi.cos() + pass.t1_px;
        let t1_py = met.uncor_pt * met.uncor_phi.sin() + pass.t1_py;

        let met_corr_pt = full_px.hypot(full_py);
        let met_corr_phi = kinematics::quadrant_phi(full_px, full_py);
        self.store.set_scalar(self.handles.met_corr_pt, met_corr_pt);
        self.store.set_scalar(self.handles.met_corr_phi, met_corr_phi);
        self.store.set_scalar(self.handles.met_base_pt, base_px.hypot(base_py));
        self.store
            .set_scalar(self.handles.met_base_phi, kinematics::quadrant_phi(base_px, base_py));
        self.store.set_scalar(self.handles.met_t1_pt, t1_px.hypot(t1_py));
        self.store
            .set_scalar(self.handles.met_t1_phi, kinematics::quadrant_phi(t1_px, t1_py));

        Ok((met_corr_pt, met_corr_phi, full_px, full_py))
    }

    /// Subjet bookkeeping: tag counts, reweighting inputs, and the
    /// nearest-parent map feeding per-parent subjet counts.
    fn process_subjets(
        &mut self,
        event: &EventInput,
        n_subjets: usize,
        n_fat: usize,
    ) -> Result<SubjetPass> {
        let cuts = self.config.selection.clone();
        let working_points = self.config.subjet_working_points.clone();
        let b_wp = working_points
            .iter()
            .position(|wp| wp.name == "medium")
            .unwrap_or(0);

        let mut pass = SubjetPass {
            n_tagged: vec![0; working_points.len()],
            tag_lists: vec![vec![Vec::new(); TagNuisance::ALL.len()]; working_points.len()],
        };

        let h = self.handles.fatjets.clone();
        for t in 0..n_fat {
            self.store.set(h.n_subjets, t, 0.0)?;
            self.store.set(h.n_tagged_subjets, t, 0.0)?;
        }

        for s in 0..n_subjets {
            let sub = &event.subjets[s];
            let class = FlavorClass::from_pdg(sub.parton_flavour as i32);
            let in_acceptance = sub.eta.abs() < cuts.tag_abs_eta_max;

            let mut is_medium = false;
            for (wi, wp) in working_points.iter().enumerate() {
                let tagged = sub.csv > wp.threshold && in_acceptance;
                if tagged {
                    pass.n_tagged[wi] += 1;
                }
                if wi == b_wp {
                    is_medium = tagged;
                }
                if !in_acceptance {
                    continue;
                }
                let eff = self
                    .calib
                    .subjet_tag_efficiency
                    .efficiency(&wp.name, class, sub.pt, sub.eta)?;
                for (ni, nuisance) in TagNuisance::ALL.iter().enumerate() {
                    let sf = self.calib.subjet_tag_scale_factors.scale_factor(
                        &wp.name,
                        class,
                        applied_nuisance(class, *nuisance),
                        sub.pt,
                    )?;
                    pass.tag_lists[wi][ni].push(JetTagInfo { eff, sf });
                }
            }

            // nearest stored large-radius jet adopts this subjet
            let sub_p4 = sub.p4();
            let mut best: Option<(usize, f64)> = None;
            for (t, fat) in event.large_radius_jets.iter().take(n_fat).enumerate() {
                if fat.pt <= 0.0 {
                    continue;
                }
                let dr = sub_p4
                    .delta_r(&FourVec::from_ptetaphie(fat.pt, fat.eta, fat.phi, fat.energy));
                if best.map_or(true, |(_, d)| dr < d) {
                    best = Some((t, dr));
                }
            }
            if let Some((t, _)) = best {
                let n = self.store.get(h.n_subjets, t)?;
                self.store.set(h.n_subjets, t, n + 1.0)?;
                if is_medium {
                    let n = self.store.get(h.n_tagged_subjets, t)?;
                    self.store.set(h.n_tagged_subjets, t, n + 1.0)?;
                }
            }
        }
        Ok(pass)
    }
}

/// Subjet-loop products mirroring the standard-jet bookkeeping.
#[derive(Debug, Default)]
struct SubjetPass {
    n_tagged: Vec<usize>,
    tag_lists: Vec<Vec<Vec<JetTagInfo>>>,
}
