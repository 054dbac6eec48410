//! Exact tag-assignment enumeration.

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

use crate::bucket::TagCountBucket;

/// Hard upper bound on the number of jets per weight evaluation. The
/// enumeration visits 2^n assignments, so the bound keeps a single event
/// from stalling the whole pass; selections feeding more jets than this are
/// misconfigured upstream.
pub const MAX_JETS: usize = 20;

/// Per-jet tagging inputs: the simulation tag efficiency and the
/// data/simulation scale factor, both already resolved at the jet's
/// kinematics and flavor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JetTagInfo {
    /// Simulation tag efficiency in [0, 1].
    pub eff: f64,
    /// Data/simulation scale factor.
    pub sf: f64,
}

impl JetTagInfo {
    /// Probability of this jet being tagged in data.
    fn data_eff(&self) -> f64 {
        self.eff * self.sf
    }
}

/// Tag-multiplicity reweighter for one bucket.
#[derive(Debug, Clone, Copy)]
pub struct TagWeighter {
    bucket: TagCountBucket,
}

impl TagWeighter {
    pub fn new(bucket: TagCountBucket) -> Self {
        Self { bucket }
    }

    /// Event weight correcting the probability of landing in the bucket
    /// from simulation to data.
    ///
    /// Enumerates every tagged/untagged assignment of the jets; an
    /// assignment with k tagged jets contributes
    /// `prod(eff_tagged) * prod(1 - eff_untagged)` to the simulation
    /// probability and the same with `eff * sf` to the data probability,
    /// but only when k falls in the bucket. The weight is the ratio of the
    /// two sums.
    ///
    /// Returns 0 when the observed count is outside the bucket (the event
    /// does not populate this bucket at all) and 0 when the simulation
    /// probability vanishes. With no jets the weight is 1 when the bucket
    /// admits zero tags.
    pub fn weight(&self, jets: &[JetTagInfo], observed_tags: usize) -> Result<f64> {
        if jets.len() > MAX_JETS {
            return Err(Error::Computation(format!(
                "{} jets in tag weight, enumeration bound is {MAX_JETS}",
                jets.len()
            )));
        }
        if !self.bucket.contains(observed_tags) {
            return Ok(0.0);
        }

        let mut p_mc = 0.0;
        let mut p_data = 0.0;
        for assignment in 0u32..(1u32 << jets.len()) {
            let mut mc = 1.0;
            let mut data = 1.0;
            let mut tagged = 0usize;
            for (j, jet) in jets.iter().enumerate() {
                if assignment >> j & 1 == 1 {
                    tagged += 1;
                    mc *= jet.eff;
                    data *= jet.data_eff();
                } else {
                    mc *= 1.0 - jet.eff;
                    data *= 1.0 - jet.data_eff();
                }
            }
            if self.bucket.contains(tagged) {
                p_mc += mc;
                p_data += data;
            }
        }

        if p_mc == 0.0 {
            return Ok(0.0);
        }
        Ok(p_data / p_mc)
    }

    /// Like [`weight`](Self::weight), but with a second, looser working
    /// point acting as a veto: a jet counted as untagged must also fail the
    /// veto working point. `tag_jets` and `veto_jets` must describe the
    /// same jets at the two working points, in the same order.
    pub fn weight_with_veto(
        &self,
        tag_jets: &[JetTagInfo],
        veto_jets: &[JetTagInfo],
        observed_tags: usize,
    ) -> Result<f64> {
        if tag_jets.len() != veto_jets.len() {
            return Err(Error::Computation(format!(
                "tag list has {} jets, veto list has {}",
                tag_jets.len(),
                veto_jets.len()
            )));
        }
        if tag_jets.len() > MAX_JETS {
            return Err(Error::Computation(format!(
                "{} jets in tag weight, enumeration bound is {MAX_JETS}",
                tag_jets.len()
            )));
        }
        if !self.bucket.contains(observed_tags) {
            return Ok(0.0);
        }

        let mut p_mc = 0.0;
        let mut p_data = 0.0;
        for assignment in 0u32..(1u32 << tag_jets.len()) {
            let mut mc = 1.0;
            let mut data = 1.0;
            let mut tagged = 0usize;
            for j in 0..tag_jets.len() {
                if assignment >> j & 1 == 1 {
                    tagged += 1;
                    mc *= tag_jets[j].eff;
                    data *= tag_jets[j].data_eff();
                } else {
                    mc *= 1.0 - veto_jets[j].eff;
                    data *= 1.0 - veto_jets[j].data_eff();
                }
            }
            if self.bucket.contains(tagged) {
                p_mc += mc;
                p_data += data;
            }
        }

        if p_mc == 0.0 {
            return Ok(0.0);
        }
        Ok(p_data / p_mc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weighter(min: usize, max: usize) -> TagWeighter {
        TagWeighter::new(TagCountBucket::new(min, max).unwrap())
    }

    #[test]
    fn single_jet_exact_one_tag() {
        // p_mc = eff, p_data = eff * sf, weight = sf
        let jets = [JetTagInfo { eff: 0.8, sf: 1.1 }];
        let w = weighter(1, 1).weight(&jets, 1).unwrap();
        assert_relative_eq!(w, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn two_jets_hand_computed() {
        let jets = [JetTagInfo { eff: 0.6, sf: 0.9 }, JetTagInfo { eff: 0.3, sf: 1.2 }];
        // exactly one tag: eff1*(1-eff2) + (1-eff1)*eff2
        let p_mc = 0.6 * 0.7 + 0.4 * 0.3;
        let d1 = 0.6 * 0.9;
        let d2 = 0.3 * 1.2;
        let p_data = d1 * (1.0 - d2) + (1.0 - d1) * d2;
        let w = weighter(1, 1).weight(&jets, 1).unwrap();
        assert_relative_eq!(w, p_data / p_mc, epsilon = 1e-12);
    }

    #[test]
    fn unit_scale_factors_give_unit_weight() {
        let jets = [
            JetTagInfo { eff: 0.7, sf: 1.0 },
            JetTagInfo { eff: 0.2, sf: 1.0 },
            JetTagInfo { eff: 0.5, sf: 1.0 },
        ];
        for (min, max) in [(0, 0), (1, 1), (2, 2), (0, 1), (1, 3)] {
            let w = weighter(min, max).weight(&jets, min).unwrap();
            assert_relative_eq!(w, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn observed_count_outside_bucket_is_zero() {
        let jets = [JetTagInfo { eff: 0.8, sf: 1.1 }];
        assert_eq!(weighter(1, 1).weight(&jets, 0).unwrap(), 0.0);
        assert_eq!(weighter(0, 0).weight(&jets, 1).unwrap(), 0.0);
    }

    #[test]
    fn empty_jet_list() {
        // the empty assignment has zero tags with probability 1
        assert_relative_eq!(weighter(0, 0).weight(&[], 0).unwrap(), 1.0);
        assert_eq!(weighter(1, 1).weight(&[], 1).unwrap(), 0.0);
    }

    #[test]
    fn vanishing_simulation_probability_is_zero() {
        // a jet with eff = 1 can never be untagged in simulation
        let jets = [JetTagInfo { eff: 1.0, sf: 0.9 }];
        assert_eq!(weighter(0, 0).weight(&jets, 0).unwrap(), 0.0);
    }

    #[test]
    fn assignment_probabilities_normalize() {
        // an all-inclusive bucket sums every assignment, so p_mc = 1 and
        // the weight reduces to the total data-side probability
        let jets = [
            JetTagInfo { eff: 0.25, sf: 1.3 },
            JetTagInfo { eff: 0.6, sf: 0.8 },
            JetTagInfo { eff: 0.9, sf: 1.05 },
        ];
        let all = weighter(0, jets.len());
        let w = all.weight(&jets, 0).unwrap();
        assert_relative_eq!(w, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn too_many_jets_rejected() {
        let jets = vec![JetTagInfo { eff: 0.5, sf: 1.0 }; MAX_JETS + 1];
        assert!(weighter(0, 1).weight(&jets, 0).is_err());
    }

    #[test]
    fn veto_variant_matches_plain_when_lists_agree() {
        let jets = [JetTagInfo { eff: 0.6, sf: 0.9 }, JetTagInfo { eff: 0.3, sf: 1.2 }];
        let w = weighter(1, 1);
        let plain = w.weight(&jets, 1).unwrap();
        let veto = w.weight_with_veto(&jets, &jets, 1).unwrap();
        assert_relative_eq!(plain, veto, epsilon = 1e-12);
    }

    #[test]
    fn veto_variant_uses_looser_untag_probability() {
        let tight = [JetTagInfo { eff: 0.4, sf: 1.0 }];
        let loose = [JetTagInfo { eff: 0.8, sf: 1.1 }];
        let w = weighter(1, 1).weight_with_veto(&tight, &loose, 1).unwrap();
        // only the tagged assignment lands in the bucket; both sides use
        // the tight efficiency there, so sf cancels to 1.0
        assert_relative_eq!(w, 1.0, epsilon = 1e-12);

        let w0 = weighter(0, 0).weight_with_veto(&tight, &loose, 0).unwrap();
        assert_relative_eq!(w0, (1.0 - 0.8 * 1.1) / (1.0 - 0.8), epsilon = 1e-12);
    }

    #[test]
    fn mismatched_veto_list_rejected() {
        let tight = [JetTagInfo { eff: 0.4, sf: 1.0 }];
        assert!(weighter(0, 1).weight_with_veto(&tight, &[], 0).is_err());
    }
}
