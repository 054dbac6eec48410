//! Large-radius jet corrections: substructure masses and their dedicated
//! resolution and scale variations.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use vp_calib::CalibrationSet;
use vp_core::{Error, FourVec, Result, Variation, SENTINEL};

use crate::corrector::EventConditions;

/// One stored large-radius jet.
#[derive(Debug, Clone, Copy)]
pub struct FatJetInput {
    /// Stored (already calibrated) transverse momentum.
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    /// Stored energy.
    pub energy: f64,
    /// Matched generator-jet pt, or a non-positive value when unmatched.
    pub gen_pt: f64,
    /// Factor that multiplies the stored four-vector back to raw.
    pub jec_factor: f64,
    /// Catchment area.
    pub area: f64,
    /// Stored groomed (pruned) mass.
    pub pruned_mass: f64,
    /// Stored soft-drop mass.
    pub soft_drop_mass: f64,
}

/// Corrected large-radius jet: kinematics plus every groomed-mass variant
/// the downstream tagging cuts consult.
#[derive(Debug, Clone)]
pub struct CorrectedFatJet {
    /// Recalibrated, smeared and scale-shifted four-vector.
    pub p4: FourVec,
    /// Final corrected pt. Sentinel-valued when the stored jet was empty.
    pub pt: f64,
    /// Final corrected energy.
    pub energy: f64,
    /// Eta and phi after recalibration.
    pub eta: f64,
    pub phi: f64,
    /// Energy resolution smearing factor.
    pub smear: f64,
    /// Soft-drop mass after the pileup-free recalibration.
    pub soft_drop_mass: f64,
    /// Pruned mass after recalibration and nominal mass smearing.
    pub pruned_mass: f64,
    /// Pruned mass with the mass-resolution smearing shifted up/down.
    pub pruned_mass_res_up: f64,
    pub pruned_mass_res_down: f64,
    /// Pruned mass with the mass scale shifted up/down.
    pub pruned_mass_scale_up: f64,
    pub pruned_mass_scale_down: f64,
}

impl CorrectedFatJet {
    fn empty() -> Self {
        Self {
            p4: FourVec::zero(),
            pt: SENTINEL,
            energy: SENTINEL,
            eta: SENTINEL,
            phi: SENTINEL,
            smear: SENTINEL,
            soft_drop_mass: SENTINEL,
            pruned_mass: SENTINEL,
            pruned_mass_res_up: SENTINEL,
            pruned_mass_res_down: SENTINEL,
            pruned_mass_scale_up: SENTINEL,
            pruned_mass_scale_down: SENTINEL,
        }
    }
}

/// Correction chain for large-radius jets. Mass smearing is stochastic, so
/// the corrector owns a caller-seeded generator.
#[derive(Debug)]
pub struct FatJetCorrector<'a, R: Rng> {
    calib: &'a CalibrationSet,
    conditions: EventConditions,
    variation: Variation,
    rng: R,
}

impl<'a, R: Rng> FatJetCorrector<'a, R> {
    pub fn new(
        calib: &'a CalibrationSet,
        conditions: EventConditions,
        variation: Variation,
        rng: R,
    ) -> Self {
        Self { calib, conditions, variation, rng }
    }

    /// Stochastic mass smearing factor: a Gaussian of width set by the
    /// tabulated mass resolution, scaled by how far the data/simulation
    /// resolution ratio sits from unity. Floored at zero.
    fn mass_smear_factor(&mut self, pt: f64, eta: f64, shift: f64) -> Result<f64> {
        let sigma = self.calib.mass_resolution.sigma(pt, eta.abs(), self.conditions.rho)?;
        let width = self.calib.mass_resolution.width_factor(shift);
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| Error::Computation(format!("mass smearing width: {e}")))?;
        let draw: f64 = normal.sample(&mut self.rng);
        Ok((1.0 + draw * width).max(0.0))
    }

    /// Correct one large-radius jet.
    pub fn correct(&mut self, jet: &FatJetInput) -> Result<CorrectedFatJet> {
        if jet.pt <= 0.0 {
            return Ok(CorrectedFatJet::empty());
        }
        let EventConditions { rho, npv } = self.conditions;

        let raw = FourVec::from_ptetaphie(jet.pt, jet.eta, jet.phi, jet.energy) * jet.jec_factor;
        let recorr = self
            .calib
            .large_radius_energy
            .correction(raw.pt(), raw.eta(), jet.area, rho, npv)?;
        let corr = raw * recorr;
        let (pt, eta, phi) = (corr.pt(), corr.eta(), corr.phi());

        // groomed masses are calibrated without the pileup-offset term
        let recorr_no_l1 = self
            .calib
            .large_radius_energy
            .response_correction(raw.pt(), raw.eta(), npv)?;
        let soft_drop_mass = recorr_no_l1 * jet.soft_drop_mass;
        let pruned_base = recorr_no_l1 * jet.pruned_mass;

        let mass_smear = self.mass_smear_factor(pt, eta, 0.0)?;
        let mass_smear_down = self.mass_smear_factor(pt, eta, -1.0)?;
        let mass_smear_up = self.mass_smear_factor(pt, eta, 1.0)?;

        let pruned_mass = pruned_base * mass_smear;
        let jms = self.calib.mass_scale_uncertainty;

        let smear = {
            if jet.gen_pt <= 0.0 {
                1.0
            } else {
                let scale = self
                    .calib
                    .resolution
                    .scale(eta.abs(), self.variation.resolution_shift())?;
                ((pt + (pt - jet.gen_pt) * scale) / pt).max(0.0)
            }
        };
        let unc = {
            let sign = self.variation.scale_shift();
            if sign == 0.0 {
                0.0
            } else {
                sign * self.calib.scale_uncertainty.relative(pt * smear, eta)?
            }
        };

        Ok(CorrectedFatJet {
            p4: corr * (smear * (1.0 + unc)),
            pt: pt * smear * (1.0 + unc),
            energy: corr.energy() * smear * (1.0 + unc),
            eta,
            phi,
            smear,
            soft_drop_mass,
            pruned_mass,
            pruned_mass_res_up: pruned_base * mass_smear_up,
            pruned_mass_res_down: pruned_base * mass_smear_down,
            pruned_mass_scale_up: pruned_mass * (1.0 + jms),
            pruned_mass_scale_down: pruned_mass * (1.0 - jms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vp_calib::{
        JecTable, MassResolutionBin, MassResolutionTable, ResolutionBin, ResolutionTable,
        ResponseBin, TagEfficiencyTable, TagScaleFactorTable, UncertaintyGrid, UncertaintyRow,
    };

    fn calib(mass_sf: f64) -> CalibrationSet {
        CalibrationSet {
            version: "test".into(),
            jet_energy: identity_jec(),
            large_radius_energy: identity_jec(),
            resolution: ResolutionTable {
                bins: vec![ResolutionBin {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    nominal: 0.1,
                    shift: 0.02,
                }],
            },
            scale_uncertainty: UncertaintyGrid {
                pt_nodes: vec![10.0, 2000.0],
                rows: vec![UncertaintyRow {
                    abs_eta_min: 0.0,
                    abs_eta_max: 5.0,
                    values: vec![0.04, 0.04],
                }],
            },
            mass_resolution: MassResolutionTable {
                sf: mass_sf,
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

    fn identity_jec() -> JecTable {
        JecTable {
            offset_coeff: 0.0,
            npv_coeff: 0.0,
            response: vec![ResponseBin {
                abs_eta_min: 0.0,
                abs_eta_max: 5.0,
                p0: 1.0,
                p1: 0.0,
                p2: 0.0,
            }],
        }
    }

    fn fatjet() -> FatJetInput {
        FatJetInput {
            pt: 400.0,
            eta: 0.8,
            phi: -1.0,
            energy: 520.0,
            gen_pt: -1.0,
            jec_factor: 1.0,
            area: 2.0,
            pruned_mass: 80.0,
            soft_drop_mass: 110.0,
        }
    }

    fn conditions() -> EventConditions {
        EventConditions { rho: 20.0, npv: 15 }
    }

    #[test]
    fn empty_fatjet_yields_sentinels() {
        let c = calib(1.23);
        let mut corr =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(7));
        let mut j = fatjet();
        j.pt = 0.0;
        let out = corr.correct(&j).unwrap();
        assert_eq!(out.pt, SENTINEL);
        assert_eq!(out.pruned_mass, SENTINEL);
    }

    #[test]
    fn unit_resolution_ratio_disables_mass_smearing() {
        // sf = 1 makes the nominal width factor zero, so the nominal
        // smeared mass is deterministic
        let c = calib(1.0);
        let mut corr =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(7));
        let out = corr.correct(&fatjet()).unwrap();
        assert_relative_eq!(out.pruned_mass, 80.0, epsilon = 1e-9);
        assert_relative_eq!(out.soft_drop_mass, 110.0, epsilon = 1e-9);
    }

    #[test]
    fn mass_scale_variants_bracket_nominal() {
        let c = calib(1.0);
        let mut corr =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(7));
        let out = corr.correct(&fatjet()).unwrap();
        assert_relative_eq!(out.pruned_mass_scale_up, out.pruned_mass * 1.023, epsilon = 1e-12);
        assert_relative_eq!(out.pruned_mass_scale_down, out.pruned_mass * 0.977, epsilon = 1e-12);
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let c = calib(1.23);
        let mut a =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(42));
        let mut b =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(42));
        let ja = a.correct(&fatjet()).unwrap();
        let jb = b.correct(&fatjet()).unwrap();
        assert_eq!(ja.pruned_mass, jb.pruned_mass);
        assert_eq!(ja.pruned_mass_res_up, jb.pruned_mass_res_up);
    }

    #[test]
    fn smeared_mass_never_negative() {
        let c = calib(5.0); // huge width to stress the floor
        let mut corr =
            FatJetCorrector::new(&c, conditions(), Variation::Nominal, StdRng::seed_from_u64(1));
        for _ in 0..200 {
            let out = corr.correct(&fatjet()).unwrap();
            assert!(out.pruned_mass >= 0.0);
            assert!(out.pruned_mass_res_up >= 0.0);
            assert!(out.pruned_mass_res_down >= 0.0);
        }
    }

    #[test]
    fn scale_variation_shifts_pt() {
        let c = calib(1.0);
        let mut corr =
            FatJetCorrector::new(&c, conditions(), Variation::JesUp, StdRng::seed_from_u64(7));
        let out = corr.correct(&fatjet()).unwrap();
        assert_relative_eq!(out.pt, 400.0 * 1.04, epsilon = 1e-9);
    }
}
