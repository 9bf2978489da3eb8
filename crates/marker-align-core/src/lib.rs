//! Core geometry primitives for `marker-align`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt3`, `Mat3`, ...),
//! - the similarity transform model (`rotate -> scale -> translate`),
//! - name-keyed marker sets and the marker correspondence matcher,
//! - the shared [`AlignError`] type.
//!
//! Transform pipeline:
//! `p' = scale * R(azimuth, elevation, roll) * p + factor * translation`

/// Error type shared by the alignment crates.
pub mod error;
/// Name-keyed marker sets and correspondence matching.
pub mod markers;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Euler-angle similarity transform.
pub mod transform;

pub use error::*;
pub use markers::*;
pub use math::*;
pub use transform::*;
