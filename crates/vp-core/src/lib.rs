//! # vp-core
//!
//! Shared types for VarPass: error type, systematic-variation tags,
//! four-vector math, and the missing-data sentinel.

#![warn(clippy::all)]

pub mod error;
pub mod fourvec;
pub mod variation;

pub use error::{Error, Result};
pub use fourvec::{delta_phi, FourVec};
pub use variation::Variation;

/// Value stored in slots that carry no live data ("not applicable").
///
/// Consumers must never interpret it as a physical value.
pub const SENTINEL: f64 = -9999.0;
