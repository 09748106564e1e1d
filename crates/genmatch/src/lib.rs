//! `genmatch` is a library for matching generator-level ("GEN") particles to reconstructed
//! ("RECO") particles in particle physics analyses. Given the two collections of an event, it
//! pairs each truth particle with at most one reconstructed particle nearby in
//! $`(\eta, \phi)`$, resolving conflicts with the transverse-momentum difference. The matched
//! pairs are what efficiency, purity and resolution studies are built from.
//!
//! # Table of Contents
//! - [Key Features](#key-features)
//! - [Quick Start](#quick-start)
//!   - [Matching One Event](#matching-one-event)
//!   - [Matching a Dataset](#matching-a-dataset)
//! - [The Algorithm](#the-algorithm)
//! - [Logging](#logging)
//!
//! # Key Features
//! * A wrapped angular distance metric ([`delta_phi`], [`delta_eta`], [`delta_r`]) which refuses
//!   to silently hide angles in the wrong units.
//! * A deterministic one-to-one [`Matcher`] with documented tie-breaking.
//! * Kinematic acceptance ([`KinematicCuts`]) and leading-object selections with isolation from
//!   a reference object ([`leading_two_isolated`]).
//! * Efficient parallelism over events using [`rayon`](https://github.com/rayon-rs/rayon).
//!
//! # Quick Start
//! ## Matching One Event
//! Particle collections usually come out of a table with one column per quantity, so they can
//! be built straight from those columns. Mismatched columns are rejected instead of being
//! truncated:
//!
//! ```rust
//! use genmatch::{match_particles, KinematicCuts, MatchOptions, Particles, GenMatchResult};
//!
//! fn main() -> GenMatchResult<()> {
//!     let gen = Particles::from_columns(
//!         [52.1, 44.8],
//!         [0.31, -1.02],
//!         [1.27, -2.95],
//!         None,
//!     )?;
//!     let reco = Particles::from_columns(
//!         [49.6, 43.9, 12.2],
//!         [0.29, -1.05, 0.33],
//!         [1.31, 3.11, 1.22],
//!         None,
//!     )?
//!     .apply_cuts(&KinematicCuts::default().min_pt(20.0));
//!
//!     let options = MatchOptions::default().threshold(0.3).count_gen_inside(true);
//!     let matching = match_particles(&gen, &reco, &options)?;
//!     assert_eq!(matching.to_indices(), vec![0, 1]);
//!     assert_eq!(matching.gen_inside_counts(), Some(&[1, 1, 0][..]));
//!
//!     let summary = matching.summary(&gen, &reco);
//!     assert_eq!(summary.efficiency(), Some(1.0));
//!     Ok(())
//! }
//! ```
//!
//! ## Matching a Dataset
//! Every event is matched independently, so a [`Dataset`] can hand its events out to a thread
//! pool (with the default `rayon` feature). The results come back in event order:
//!
//! ```rust
//! use genmatch::{test_event, Dataset, MatchOptions, MatchSummary};
//!
//! let dataset = Dataset::new(vec![test_event(); 4]);
//! let results = dataset.match_events(&MatchOptions::default()).unwrap();
//! let total: MatchSummary = dataset
//!     .events()
//!     .iter()
//!     .zip(&results)
//!     .map(|(event, matching)| matching.summary(&event.gen, &event.reco))
//!     .sum();
//! assert_eq!(total.n_matched, 8);
//! ```
//!
//! # The Algorithm
//! Each valid GEN particle lists all valid RECO particles with
//! ```math
//! \Delta R = \sqrt{\Delta\phi^2 + \Delta\eta^2} < R_{\text{max}}
//! ```
//! ordered by $`\Delta R`$, and proposes to the nearest one. A RECO particle with several
//! proposers keeps the one with the smallest $`|p_{T,\text{gen}} - p_{T,\text{reco}}|`$; every
//! other proposer moves on to its next candidate, or stays unmatched if it has none left. This
//! repeats until no RECO particle has more than one proposer. See [`Matcher`] for the exact
//! tie-breaking rules.
//!
//! This is a greedy matching and not a globally optimal assignment (such as the one with the
//! smallest total $`\Delta R`$).
//!
//! # Logging
//! `genmatch` emits records through the [`log`](https://docs.rs/log) facade and never installs
//! a logger itself. Azimuthal differences which cannot be wrapped into $`(-\pi, \pi]`$ are
//! reported at the `error` level (or returned as [`GenMatchError::PhiWrap`] with
//! [`MatchOptions::strict`]), a non-positive threshold at the `warn` level, a summary of every
//! call at the `debug` level and every resolved conflict at the `trace` level.
#![warn(clippy::perf, clippy::style, missing_docs)]

/// [`Particle`]s, [`Event`]s and [`Dataset`]s which feed the matcher.
pub mod data {
    pub use genmatch_core::data::*;
}
/// The greedy deferred-acceptance matcher.
pub mod matching {
    pub use genmatch_core::matching::*;
}
/// Kinematic acceptance and leading-object selections.
pub mod selection {
    pub use genmatch_core::selection::*;
}
/// Utility functions, most importantly the angular distance metric.
pub mod utils {
    pub use genmatch_core::utils::*;
}

pub use genmatch_core::data::{
    test_event, Dataset, Event, EventKey, EventKeyIndex, Particle, Particles,
};
pub use genmatch_core::matching::{
    match_particles, MatchOptions, MatchSummary, Matcher, Matching, DEFAULT_THRESHOLD,
};
pub use genmatch_core::selection::{
    leading_two, leading_two_isolated, IsolationCuts, KinematicCuts, Leading, ObjectKind,
};
pub use genmatch_core::utils::angles::{delta_eta, delta_phi, delta_r, try_delta_phi, try_delta_r};
pub use genmatch_core::{GenMatchError, GenMatchResult, PI, UNMATCHED};
pub use serde::{Deserialize, Serialize};
