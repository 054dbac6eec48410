//! # vp-btag
//!
//! Event weights that correct the simulated tag-multiplicity spectrum to
//! data. Each selected jet carries a simulation tag efficiency and a
//! data/simulation scale factor; the weight is the ratio of the data and
//! simulation probabilities of landing in a tag-count bucket, computed by
//! exact enumeration over all tagged/untagged assignments.

#![warn(clippy::all)]

mod bucket;
mod weight;

pub use bucket::TagCountBucket;
pub use weight::{JetTagInfo, TagWeighter, MAX_JETS};
