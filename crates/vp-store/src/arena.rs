//! Per-event arena: contiguous buffers addressed by (handle, slot).

use vp_core::{Error, Result, SENTINEL};

use crate::record::Record;
use crate::schema::{ArrayHandle, ObjectHandle, ResetPolicy, ScalarHandle, Schema};

/// Mutable per-event state: one fixed-capacity `f64` buffer per declared
/// array, one `f64` per declared scalar, one live count per declared object.
///
/// All slots start at the sentinel; scalars start at 0.0.
#[derive(Debug)]
pub struct Store {
    arrays: Vec<Vec<f64>>,
    scalars: Vec<f64>,
    sizes: Vec<usize>,
}

impl Store {
    /// Allocate the arena for a finalized schema.
    pub fn new(schema: &Schema) -> Self {
        let arrays = schema
            .arrays
            .iter()
            .map(|a| vec![SENTINEL; schema.capacity(a.object)])
            .collect();
        Self {
            arrays,
            scalars: vec![0.0; schema.scalars.len()],
            sizes: vec![0; schema.objects.len()],
        }
    }

    /// Write one slot of a per-instance array. An out-of-capacity index is a
    /// configuration error, not a per-event condition.
    pub fn set(&mut self, array: ArrayHandle, index: usize, value: f64) -> Result<()> {
        let buf = &mut self.arrays[array.0];
        if index >= buf.len() {
            return Err(Error::Validation(format!(
                "index {index} outside capacity {} for array handle {}",
                buf.len(),
                array.0
            )));
        }
        buf[index] = value;
        Ok(())
    }

    /// Read one slot of a per-instance array.
    pub fn get(&self, array: ArrayHandle, index: usize) -> Result<f64> {
        let buf = &self.arrays[array.0];
        buf.get(index).copied().ok_or_else(|| {
            Error::Validation(format!(
                "index {index} outside capacity {} for array handle {}",
                buf.len(),
                array.0
            ))
        })
    }

    /// Full slice of an array, sentinel-padded to capacity.
    pub fn slice(&self, array: ArrayHandle) -> &[f64] {
        &self.arrays[array.0]
    }

    /// Write a per-event scalar.
    pub fn set_scalar(&mut self, scalar: ScalarHandle, value: f64) {
        self.scalars[scalar.0] = value;
    }

    /// Read a per-event scalar.
    pub fn scalar(&self, scalar: ScalarHandle) -> f64 {
        self.scalars[scalar.0]
    }

    /// Add to a per-event scalar (counter/accumulator update).
    pub fn add_scalar(&mut self, scalar: ScalarHandle, delta: f64) {
        self.scalars[scalar.0] += delta;
    }

    /// Set the live instance count of an object collection.
    pub fn set_size(&mut self, object: ObjectHandle, size: usize) {
        self.sizes[object.0] = size;
    }

    /// Live instance count of an object collection.
    pub fn size(&self, object: ObjectHandle) -> usize {
        self.sizes[object.0]
    }

    /// Clear every per-variation field: derived arrays back to the sentinel,
    /// derived scalars to 0.0, live counts to zero. Fields declared
    /// [`ResetPolicy::Preserve`] are untouched.
    ///
    /// Any residual read of a previous variation's derived value is a defect;
    /// this runs eagerly at the start of each variation's iteration.
    pub fn reset_variation(&mut self, schema: &Schema) {
        for (decl, buf) in schema.arrays.iter().zip(self.arrays.iter_mut()) {
            if decl.reset == ResetPolicy::PerVariation {
                buf.fill(SENTINEL);
            }
        }
        for (decl, v) in schema.scalars.iter().zip(self.scalars.iter_mut()) {
            if decl.reset == ResetPolicy::PerVariation {
                *v = 0.0;
            }
        }
        for s in self.sizes.iter_mut() {
            *s = 0;
        }
    }

    /// Zero every per-variation scalar, leaving arrays and counts alone.
    /// Used when a variation fails the event preselection: derived event
    /// sums are cleared but the per-instance fields already written stand.
    pub fn reset_variation_scalars(&mut self, schema: &Schema) {
        for (decl, v) in schema.scalars.iter().zip(self.scalars.iter_mut()) {
            if decl.reset == ResetPolicy::PerVariation {
                *v = 0.0;
            }
        }
    }

    /// Clear everything, preserved fields included. Runs once per event,
    /// before the preserved inputs of the next event are copied in.
    pub fn reset_event(&mut self) {
        for buf in self.arrays.iter_mut() {
            buf.fill(SENTINEL);
        }
        self.scalars.fill(0.0);
        self.sizes.fill(0);
    }

    /// Materialize the flat record for the current (event, variation) pair.
    pub fn snapshot(&self, schema: &Schema) -> Record {
        let mut record = Record::default();
        for (decl, v) in schema.scalars.iter().zip(self.scalars.iter()) {
            record.scalars.insert(decl.name.clone(), *v);
        }
        for (decl, buf) in schema.arrays.iter().zip(self.arrays.iter()) {
            record.arrays.insert(decl.name.clone(), buf.clone());
        }
        record
    }
}
