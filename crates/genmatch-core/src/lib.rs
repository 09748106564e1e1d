//! # genmatch-core
//!
//! This is an internal crate used by `genmatch`.
#![warn(clippy::perf, clippy::style)]
// #![warn(missing_docs)]

use thiserror::Error;

/// [`Particle`]s, [`Event`]s and [`Dataset`]s which feed the matcher.
pub mod data;
/// The greedy deferred-acceptance matcher which pairs generator-level particles with
/// reconstructed ones.
pub mod matching;
/// Kinematic acceptance and leading-object selections applied before or alongside matching.
pub mod selection;
/// Utility functions, most importantly the angular distance metric.
pub mod utils;

pub use crate::data::{Dataset, Event, EventKey, EventKeyIndex, Particle, Particles};
pub use crate::matching::{match_particles, MatchOptions, MatchSummary, Matcher, Matching};
pub use crate::selection::{
    leading_two, leading_two_isolated, IsolationCuts, KinematicCuts, Leading, ObjectKind,
};
pub use crate::utils::angles::{delta_eta, delta_phi, delta_r, try_delta_phi, try_delta_r};

/// The mathematical constant $`\pi`$.
pub const PI: f64 = std::f64::consts::PI;

/// Sentinel used by [`Matching::to_indices`] for generator-level particles without a partner.
pub const UNMATCHED: i64 = -1;

pub type GenMatchResult<T> = Result<T, GenMatchError>;

/// The error type used by all `genmatch` internal methods
#[derive(Error, Debug)]
pub enum GenMatchError {
    /// An error which occurs when the parallel columns describing one particle collection do not
    /// have the same length.
    #[error("Column \"{field}\" has {found} entries but {expected} were expected!")]
    ShapeMismatch {
        /// Name of the offending column
        field: String,
        /// Length of the reference (`pt`) column
        expected: usize,
        /// Length of the offending column
        found: usize,
    },
    /// An internal invariant failure: an azimuthal difference which is still outside of
    /// $`(-\pi, \pi]`$ after wrapping. This usually points at angles given in the wrong units
    /// upstream.
    #[error("Azimuthal difference {dphi} (from phi1 = {phi1}, phi2 = {phi2}) is outside of (-pi, pi] after wrapping!")]
    PhiWrap {
        /// First azimuthal angle
        phi1: f64,
        /// Second azimuthal angle
        phi2: f64,
        /// The wrapped difference which failed the range check
        dphi: f64,
    },
    /// An error which occurs when an [`Event`] is requested from a [`Dataset`] which does not
    /// contain it.
    #[error("Event index {index} is out of range for a dataset with {n_events} events!")]
    EventIndex {
        /// The requested index
        index: usize,
        /// Number of events in the dataset
        n_events: usize,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}

impl Clone for GenMatchError {
    // Error types are rarely cloneable, but batch results over a Dataset are collected into
    // cloneable containers
    fn clone(&self) -> Self {
        let err_string = self.to_string();
        GenMatchError::Custom(err_string)
    }
}
