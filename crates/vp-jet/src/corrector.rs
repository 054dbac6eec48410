//! Standard-radius jet corrections and their missing-energy bookkeeping.

use vp_calib::CalibrationSet;
use vp_core::{FourVec, Result, Variation, SENTINEL};

/// Jets below this corrected pt are excluded from the type-1 and base
/// missing-energy sums.
const MET_JET_PT_MIN: f64 = 15.0;
/// Jets dominated by electromagnetic energy are excluded from the type-1
/// and base missing-energy sums.
const MET_EM_FRAC_MAX: f64 = 0.9;
/// Forward boundary of the reduced-acceptance missing-energy sum.
const NO_HF_ABS_ETA: f64 = 3.0;

/// Per-event pileup conditions shared by every jet correction.
#[derive(Debug, Clone, Copy)]
pub struct EventConditions {
    /// Median pileup energy density.
    pub rho: f64,
    /// Number of good primary vertices.
    pub npv: usize,
}

/// One stored jet as read from the input record.
#[derive(Debug, Clone, Copy)]
pub struct JetInput {
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
    /// Charged electromagnetic energy fraction.
    pub charged_em_frac: f64,
    /// Neutral electromagnetic energy fraction.
    pub neutral_em_frac: f64,
}

/// A (px, py) contribution to one of the missing-energy accumulators.
/// Contributions are additive; the engine starts each accumulator from the
/// stored missing-energy vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetShift {
    pub px: f64,
    pub py: f64,
}

impl MetShift {
    fn subtract(phi: f64, dpt: f64) -> Self {
        Self { px: -phi.cos() * dpt, py: -phi.sin() * dpt }
    }
}

/// The fully corrected jet plus everything the event loop needs from it.
#[derive(Debug, Clone)]
pub struct CorrectedJet {
    /// Recalibrated, smeared and scale-shifted four-vector.
    pub p4: FourVec,
    /// Final corrected pt. Sentinel-valued when the stored jet was empty.
    pub pt: f64,
    /// Final corrected energy.
    pub energy: f64,
    /// Eta and phi after recalibration (smearing leaves direction alone).
    pub eta: f64,
    pub phi: f64,
    /// Resolution smearing factor.
    pub smear: f64,
    /// Signed relative scale shift applied (zero off the scale variations).
    pub uncertainty: f64,
    /// Raw pt after undoing the stored calibration.
    pub raw_pt: f64,
    /// Raw energy after undoing the stored calibration.
    pub raw_energy: f64,
    /// Contribution to the fully corrected missing-energy sum.
    pub met_shift: MetShift,
    /// Contribution to the base (unsmeared) missing-energy sum.
    pub base_met_shift: MetShift,
    /// Contribution to the type-1 missing-energy sum.
    pub type1_met_shift: MetShift,
    /// Contribution to the reduced-acceptance (|eta| < 3) sum.
    pub no_hf_met_shift: MetShift,
}

impl CorrectedJet {
    fn empty() -> Self {
        Self {
            p4: FourVec::from_ptetaphie(0.0, 0.0, 0.0, 0.0),
            pt: SENTINEL,
            energy: SENTINEL,
            eta: SENTINEL,
            phi: SENTINEL,
            smear: SENTINEL,
            uncertainty: 0.0,
            raw_pt: 0.0,
            raw_energy: 0.0,
            met_shift: MetShift::default(),
            base_met_shift: MetShift::default(),
            type1_met_shift: MetShift::default(),
            no_hf_met_shift: MetShift::default(),
        }
    }
}

/// Applies the full correction chain for one systematic variation.
#[derive(Debug, Clone, Copy)]
pub struct JetCorrector<'a> {
    calib: &'a CalibrationSet,
    conditions: EventConditions,
    variation: Variation,
    recalibrate: bool,
}

impl<'a> JetCorrector<'a> {
    pub fn new(calib: &'a CalibrationSet, conditions: EventConditions, variation: Variation) -> Self {
        Self { calib, conditions, variation, recalibrate: true }
    }

    /// Keep the stored calibration instead of re-evaluating the correction
    /// tables. Smearing and scale shifts still apply; the recalibration-led
    /// base and type-1 missing-energy terms stay empty.
    pub fn retain_stored_calibration(mut self) -> Self {
        self.recalibrate = false;
        self
    }

    /// Resolution smearing factor toward data: scales the gen-level pt
    /// difference and never flips the jet. Unmatched jets are left exactly
    /// alone.
    pub fn smear_factor(&self, pt: f64, gen_pt: f64, eta: f64) -> Result<f64> {
        if gen_pt <= 0.0 {
            return Ok(1.0);
        }
        let scale = self
            .calib
            .resolution
            .scale(eta.abs(), self.variation.resolution_shift())?;
        Ok(((pt + (pt - gen_pt) * scale) / pt).max(0.0))
    }

    /// Signed relative scale shift: the tabulated uncertainty with the
    /// variation's sign, zero for every non-scale variation.
    pub fn scale_shift(&self, pt: f64, eta: f64) -> Result<f64> {
        let sign = self.variation.scale_shift();
        if sign == 0.0 {
            return Ok(0.0);
        }
        Ok(sign * self.calib.scale_uncertainty.relative(pt, eta)?)
    }

    /// Correct one jet. `shared_muons` holds the four-vectors of muons
    /// reconstructed from the same constituents as this jet; they are
    /// subtracted before the muon-free corrections feeding the type-1
    /// missing-energy sum.
    pub fn correct(&self, jet: &JetInput, shared_muons: &[FourVec]) -> Result<CorrectedJet> {
        if jet.pt <= 0.0 {
            return Ok(CorrectedJet::empty());
        }
        let EventConditions { rho, npv } = self.conditions;
        let stored_pt = jet.pt;

        let stored = FourVec::from_ptetaphie(jet.pt, jet.eta, jet.phi, jet.energy);
        let raw = stored * jet.jec_factor;
        let mut raw_no_mu = raw;
        for mu in shared_muons {
            raw_no_mu = raw_no_mu - *mu;
        }

        let corr = if self.recalibrate {
            let recorr = self
                .calib
                .jet_energy
                .correction(raw.pt(), raw.eta(), jet.area, rho, npv)?;
            raw * recorr
        } else {
            stored
        };
        let (pt, eta, phi) = (corr.pt(), corr.eta(), corr.phi());

        let em_frac = jet.charged_em_frac + jet.neutral_em_frac;
        let (corr_no_mu, type1_term) = if self.recalibrate {
            let recorr_no_mu = self
                .calib
                .jet_energy
                .correction(raw_no_mu.pt(), raw_no_mu.eta(), jet.area, rho, npv)?;
            let corr_no_mu = raw_no_mu * recorr_no_mu;
            let l1_corr =
                raw_no_mu * self.calib.jet_energy.l1_correction(raw_no_mu.pt(), jet.area, rho);
            let term = if pt > MET_JET_PT_MIN && em_frac < MET_EM_FRAC_MAX {
                Some(corr_no_mu - l1_corr)
            } else {
                None
            };
            (corr_no_mu, term)
        } else {
            (raw_no_mu * (1.0 / jet.jec_factor), None)
        };

        let smear = self.smear_factor(pt, jet.gen_pt, eta)?;
        let unc = self.scale_shift(pt * smear, eta)?;
        let unc_nosmear = self.scale_shift(pt, eta)?;

        let pt_final = pt * smear * (1.0 + unc);
        let energy_final = corr.energy() * smear * (1.0 + unc);
        let p4 = corr * (smear * (1.0 + unc));

        // unsmeared variants anchoring the base and type-1 sums
        let pt_smear_zero = pt * (1.0 + unc);
        let pt_smear_zero_no_mu = corr_no_mu.pt() * (1.0 + unc);

        let met_shift = MetShift::subtract(phi, pt * unc_nosmear);

        let base_met_shift = if self.recalibrate
            && pt_smear_zero_no_mu > MET_JET_PT_MIN
            && em_frac < MET_EM_FRAC_MAX
        {
            MetShift::subtract(phi, pt_smear_zero - stored_pt)
        } else {
            MetShift::default()
        };

        let type1_met_shift = if self.recalibrate
            && pt_smear_zero_no_mu > MET_JET_PT_MIN
            && corr_no_mu.pt() > 0.0
        {
            let t1 = type1_term.unwrap_or_else(FourVec::zero);
            MetShift {
                px: -(t1.px() + phi.cos() * (pt_final - pt_smear_zero)),
                py: -(t1.py() + phi.sin() * (pt_final - pt_smear_zero)),
            }
        } else {
            MetShift::default()
        };

        let no_hf_met_shift = if eta.abs() < NO_HF_ABS_ETA {
            MetShift::subtract(phi, pt_final - stored_pt)
        } else {
            MetShift::default()
        };

        Ok(CorrectedJet {
            p4,
            pt: pt_final,
            energy: energy_final,
            eta,
            phi,
            smear,
            uncertainty: unc,
            raw_pt: raw.pt(),
            raw_energy: raw.energy(),
            met_shift,
            base_met_shift,
            type1_met_shift,
            no_hf_met_shift,
        })
    }
}
