//! # vp-store
//!
//! The named variable store: a schema registry resolved once at startup into
//! integer handles, and a per-event arena of fixed-capacity `f64` buffers and
//! scalars addressed by those handles.
//!
//! Keys are composed from (object label, optional category, variable name) at
//! declaration time only; the per-event hot path works purely on handles.
//! The store holds state for the *current* event of a single-threaded pass
//! and has no history and no concurrency guard.

#![warn(clippy::all)]

mod arena;
mod record;
mod schema;

pub use arena::Store;
pub use record::Record;
pub use schema::{ArrayHandle, ObjectHandle, ResetPolicy, ScalarHandle, Schema};
