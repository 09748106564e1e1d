use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    data::{Particle, Particles},
    utils::{
        angles::{delta_r, try_delta_r},
        ratio,
    },
    GenMatchResult, UNMATCHED,
};

/// The default matching cone, $`\Delta R < 0.4`$.
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Options which control a [`Matcher`].
///
/// # See Also
/// [`match_particles`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Maximum (exclusive) angular separation $`\Delta R`$ for a pair to be considered.
    pub threshold: f64,
    /// Whether to record, for each reconstructed particle, how many valid generator-level
    /// particles lie inside the threshold.
    pub count_gen_inside: bool,
    /// Whether an azimuthal difference outside of $`(-\pi, \pi]`$ after wrapping aborts the
    /// call with [`GenMatchError::PhiWrap`](crate::GenMatchError::PhiWrap) instead of only being
    /// logged.
    pub strict: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            count_gen_inside: false,
            strict: false,
        }
    }
}

impl MatchOptions {
    /// Create a new [`Default`] set of [`MatchOptions`].
    pub fn new() -> Self {
        Self::default()
    }
    /// Set the maximum (exclusive) $`\Delta R`$; defaults to [`DEFAULT_THRESHOLD`].
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
    /// Record the number of valid generator-level particles inside the threshold of each
    /// reconstructed particle.
    pub fn count_gen_inside(mut self, count_gen_inside: bool) -> Self {
        self.count_gen_inside = count_gen_inside;
        self
    }
    /// Turn azimuthal wrapping defects into errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A reconstructed particle inside the threshold of some generator-level particle.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    reco: usize,
    distance: f64,
    delta_pt: f64,
}

/// The remaining candidates of one generator-level particle, nearest first. Candidates are only
/// ever removed from the front.
#[derive(Clone, Debug, Default)]
struct CandidatePool(VecDeque<Candidate>);

impl CandidatePool {
    fn new(mut candidates: Vec<Candidate>) -> Self {
        // exact distance ties go to the lower reconstructed index
        candidates.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.reco.cmp(&b.reco))
        });
        Self(candidates.into())
    }
    fn len(&self) -> usize {
        self.0.len()
    }
    fn nearest(&self) -> Option<&Candidate> {
        self.0.front()
    }
    fn reject_nearest(&mut self) -> Option<Candidate> {
        self.0.pop_front()
    }
}

/// The result of matching one set of generator-level particles to one set of reconstructed
/// particles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    assignment: Vec<Option<usize>>,
    gen_inside: Option<Vec<usize>>,
    n_passes: usize,
}

impl Matching {
    /// The reconstructed index bound to each generator-level particle, by generator-level index.
    pub fn assignment(&self) -> &[Option<usize>] {
        &self.assignment
    }
    /// The assignment with unmatched entries replaced by [`UNMATCHED`] (`-1`).
    pub fn to_indices(&self) -> Vec<i64> {
        self.assignment
            .iter()
            .map(|a| a.map_or(UNMATCHED, |j| j as i64))
            .collect()
    }
    /// The reconstructed partner of the generator-level particle at `gen_index`, if any.
    pub fn reco_for(&self, gen_index: usize) -> Option<usize> {
        self.assignment.get(gen_index).copied().flatten()
    }
    /// The generator-level partner of the reconstructed particle at `reco_index`, if any.
    pub fn gen_for(&self, reco_index: usize) -> Option<usize> {
        self.assignment
            .iter()
            .position(|a| *a == Some(reco_index))
    }
    /// Matched `(gen, reco)` index pairs in generator-level order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.assignment
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|j| (i, j)))
    }
    /// The number of matched pairs.
    pub fn n_matched(&self) -> usize {
        self.assignment.iter().filter(|a| a.is_some()).count()
    }
    /// For each reconstructed particle, the number of valid generator-level particles inside the
    /// threshold before any conflicts were resolved. Only present when requested with
    /// [`MatchOptions::count_gen_inside`].
    pub fn gen_inside_counts(&self) -> Option<&[usize]> {
        self.gen_inside.as_deref()
    }
    /// The number of conflict-resolution passes which were needed to reach a stable state
    /// (including the final pass which found no conflict).
    pub fn n_passes(&self) -> usize {
        self.n_passes
    }
    /// Count valid particles and matches for efficiency and purity calculations.
    pub fn summary(&self, gen: &Particles, reco: &Particles) -> MatchSummary {
        MatchSummary {
            n_gen_valid: gen.n_valid(),
            n_reco_valid: reco.n_valid(),
            n_matched: self.n_matched(),
        }
    }
}

/// Counts which summarize a [`Matching`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Number of valid generator-level particles.
    pub n_gen_valid: usize,
    /// Number of valid reconstructed particles.
    pub n_reco_valid: usize,
    /// Number of matched pairs.
    pub n_matched: usize,
}

impl MatchSummary {
    /// The fraction of valid generator-level particles which were matched.
    pub fn efficiency(&self) -> Option<f64> {
        ratio(self.n_matched, self.n_gen_valid)
    }
    /// The fraction of valid reconstructed particles which were matched.
    pub fn purity(&self) -> Option<f64> {
        ratio(self.n_matched, self.n_reco_valid)
    }
}

impl std::ops::Add for MatchSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            n_gen_valid: self.n_gen_valid + rhs.n_gen_valid,
            n_reco_valid: self.n_reco_valid + rhs.n_reco_valid,
            n_matched: self.n_matched + rhs.n_matched,
        }
    }
}

impl std::iter::Sum for MatchSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |a, b| a + b)
    }
}

/// A greedy deferred-acceptance matcher between generator-level and reconstructed particles.
///
/// Every valid generator-level particle lists the valid reconstructed particles within
/// [`MatchOptions::threshold`] (nearest first) and proposes to the nearest one. Whenever a
/// reconstructed particle receives more than one proposal, the proposer with the smallest
/// $`|p_{T,\text{gen}} - p_{T,\text{reco}}|`$ is kept and every other proposer moves on to its
/// next candidate. This is repeated until no reconstructed particle has more than one proposer.
///
/// The result is a one-to-one (partial) matching, not the assignment with minimal total
/// distance.
///
/// # Notes
///
/// Ties are broken deterministically: among candidates at exactly the same $`\Delta R`$, the
/// lower reconstructed index is nearer, and among proposers with exactly the same momentum
/// difference, the lower generator-level index wins. Reconstructed particles are visited in
/// ascending index order during each pass.
///
/// A summary of each call is logged at the `debug` level and every resolved conflict at the
/// `trace` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct Matcher {
    options: MatchOptions,
}

impl Matcher {
    /// Create a new [`Matcher`] with the given options.
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    /// The options of this [`Matcher`].
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    fn distance(&self, gen: &Particle, reco: &Particle) -> GenMatchResult<f64> {
        if self.options.strict {
            try_delta_r(gen.eta, gen.phi, reco.eta, reco.phi)
        } else {
            Ok(delta_r(gen.eta, gen.phi, reco.eta, reco.phi))
        }
    }

    /// Match `gen` to `reco`.
    ///
    /// # Errors
    ///
    /// Returns [`GenMatchError::PhiWrap`](crate::GenMatchError::PhiWrap) if the options are
    /// strict and some pair of valid particles has an azimuthal difference which cannot be
    /// wrapped into $`(-\pi, \pi]`$.
    pub fn run(&self, gen: &Particles, reco: &Particles) -> GenMatchResult<Matching> {
        let threshold = self.options.threshold;
        let mut assignment = vec![None; gen.len()];
        let mut gen_inside = self
            .options
            .count_gen_inside
            .then(|| vec![0usize; reco.len()]);

        if threshold.is_nan() || threshold <= 0.0 {
            log::warn!(
                "matching threshold {} is not positive, no particle will be matched",
                threshold
            );
            return Ok(Matching {
                assignment,
                gen_inside,
                n_passes: 0,
            });
        }

        let mut pools = vec![CandidatePool::default(); gen.len()];
        let mut proposers = vec![BTreeSet::<usize>::new(); reco.len()];
        let mut n_pairs = 0usize;
        for (i, g) in gen.iter().enumerate().filter(|(_, g)| g.valid) {
            let mut candidates = Vec::new();
            for (j, r) in reco.iter().enumerate().filter(|(_, r)| r.valid) {
                let distance = self.distance(g, r)?;
                if distance < threshold {
                    if let Some(counts) = gen_inside.as_mut() {
                        counts[j] += 1;
                    }
                    candidates.push(Candidate {
                        reco: j,
                        distance,
                        delta_pt: g.delta_pt(r),
                    });
                }
            }
            let pool = CandidatePool::new(candidates);
            n_pairs += pool.len();
            if let Some(nearest) = pool.nearest() {
                proposers[nearest.reco].insert(i);
            }
            pools[i] = pool;
        }

        // Every pass which finds a conflict rejects at least one candidate, so there can be no
        // more than n_pairs + 1 passes.
        let mut n_rejected = 0usize;
        let mut n_passes = 0usize;
        loop {
            n_passes += 1;
            let mut n_conflicts = 0usize;
            for j in 0..reco.len() {
                if proposers[j].len() < 2 {
                    continue;
                }
                n_conflicts += 1;
                let competing = std::mem::take(&mut proposers[j]);
                // every proposer of j has j at the front of its pool
                let delta_pt =
                    |i: usize| pools[i].nearest().map_or(f64::INFINITY, |c| c.delta_pt);
                let Some(winner) = competing.iter().copied().min_by(|&a, &b| {
                    delta_pt(a)
                        .total_cmp(&delta_pt(b))
                        .then_with(|| a.cmp(&b))
                }) else {
                    continue;
                };
                log::trace!(
                    "reco {}: {} proposers, gen {} wins with |dpt| = {}",
                    j,
                    competing.len(),
                    winner,
                    delta_pt(winner)
                );
                for loser in competing.into_iter().filter(|&i| i != winner) {
                    let rejected = pools[loser].reject_nearest();
                    debug_assert_eq!(rejected.map(|c| c.reco), Some(j));
                    n_rejected += 1;
                    match pools[loser].nearest() {
                        Some(next) => {
                            log::trace!(
                                "gen {} moves on from reco {} to reco {}",
                                loser,
                                j,
                                next.reco
                            );
                            proposers[next.reco].insert(loser);
                        }
                        None => log::trace!("gen {} has no candidates left", loser),
                    }
                }
                proposers[j].insert(winner);
            }
            assert!(
                n_rejected <= n_pairs,
                "rejected {} candidates out of {} pairs",
                n_rejected,
                n_pairs
            );
            if n_conflicts == 0 {
                break;
            }
        }

        for (j, set) in proposers.iter().enumerate() {
            debug_assert!(set.len() <= 1);
            if let Some(&i) = set.first() {
                assignment[i] = Some(j);
            }
        }
        let matching = Matching {
            assignment,
            gen_inside,
            n_passes,
        };
        log::debug!(
            "matched {} of {} valid gen particles to {} valid reco particles ({} candidate pairs, {} passes)",
            matching.n_matched(),
            gen.n_valid(),
            reco.n_valid(),
            n_pairs,
            n_passes
        );
        Ok(matching)
    }
}

/// Match generator-level particles to reconstructed particles with a [`Matcher`] built from
/// `options`.
///
/// # Examples
///
/// ```
/// use genmatch_core::{match_particles, MatchOptions, Particle, Particles};
///
/// let gen = Particles::from(vec![Particle::new(50.0, 0.1, 0.0)]);
/// let reco = Particles::from(vec![
///     Particle::new(20.0, 1.5, 2.0),
///     Particle::new(48.0, 0.12, 0.05),
/// ]);
/// let matching = match_particles(&gen, &reco, &MatchOptions::default()).unwrap();
/// assert_eq!(matching.to_indices(), vec![1]);
/// ```
pub fn match_particles(
    gen: &Particles,
    reco: &Particles,
    options: &MatchOptions,
) -> GenMatchResult<Matching> {
    Matcher::new(*options).run(gen, reco)
}
