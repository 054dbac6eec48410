//! # vp-engine
//!
//! The systematic-variation reprocessing pass: read one event, rerun the
//! correction and selection chain once per configured variation, and emit
//! one flat record per (event, variation) pair.
//!
//! The store layout is declared once from the configuration; per-variation
//! fields are reset between iterations so no derived value can leak from
//! one variation into the next.

#![warn(clippy::all)]

pub mod config;
pub mod gen;
pub mod input;
pub mod kinematics;
pub mod processor;
pub mod schema;
pub mod selection;
pub mod tops;

pub use config::AnalysisConfig;
pub use input::EventInput;
pub use processor::{EventProcessor, VariationRecord};
