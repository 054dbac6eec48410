//! Flat analysis record: the unit of output for one (event, variation) pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// All declared scalar and fixed-array fields, materialized by
/// [`crate::Store::snapshot`]. The field set is fixed at startup and
/// identical across all variations' records; on-disk layout belongs to the
/// persistence collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Per-event scalar fields by name.
    pub scalars: BTreeMap<String, f64>,
    /// Per-instance array fields by composed name, sentinel-padded.
    pub arrays: BTreeMap<String, Vec<f64>>,
}
