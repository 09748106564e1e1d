#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Display,
    ops::{Deref, Index},
};

use crate::{
    matching::{MatchOptions, Matching},
    selection::KinematicCuts,
    utils::angles::{delta_eta, delta_phi, delta_r},
    GenMatchError, GenMatchResult,
};

/// An [`Event`] that can be used to test the matcher. It contains two generator-level photons
/// and three reconstructed candidates, one of which failed the upstream selection.
pub fn test_event() -> Event {
    Event {
        gen: Particles::from(vec![
            Particle::new(52.1, 0.31, 1.27),
            Particle::new(44.8, -1.02, -2.95),
        ]),
        reco: Particles::from(vec![
            Particle::new(49.6, 0.29, 1.31),
            Particle::new(43.9, -1.05, 3.11),
            Particle::new(12.2, 0.33, 1.22).with_valid(false),
        ]),
    }
}

/// A single physics object as seen by the matcher: its transverse momentum, direction and
/// whether it takes part in matching at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// The transverse momentum $`p_T`$.
    pub pt: f64,
    /// The pseudorapidity $`\eta`$.
    pub eta: f64,
    /// The azimuthal angle $`\phi`$ in radians (any range).
    pub phi: f64,
    /// Whether the particle passed the upstream selection. Invalid particles are never matched.
    pub valid: bool,
}

impl Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[pt = {}, eta = {}, phi = {}{}]",
            self.pt,
            self.eta,
            self.phi,
            if self.valid { "" } else { ", invalid" }
        )
    }
}

impl Particle {
    /// Create a new valid [`Particle`].
    pub fn new(pt: f64, eta: f64, phi: f64) -> Self {
        Self {
            pt,
            eta,
            phi,
            valid: true,
        }
    }
    /// Set the validity flag of the [`Particle`].
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }
    /// The wrapped azimuthal difference to `other` (see [`delta_phi`]).
    pub fn delta_phi(&self, other: &Particle) -> f64 {
        delta_phi(self.phi, other.phi)
    }
    /// The pseudorapidity difference to `other`.
    pub fn delta_eta(&self, other: &Particle) -> f64 {
        delta_eta(self.eta, other.eta)
    }
    /// The angular separation $`\Delta R`$ to `other` (see [`delta_r`]).
    pub fn delta_r(&self, other: &Particle) -> f64 {
        delta_r(self.eta, self.phi, other.eta, other.phi)
    }
    /// The absolute transverse-momentum difference to `other`.
    pub fn delta_pt(&self, other: &Particle) -> f64 {
        (self.pt - other.pt).abs()
    }
}

/// An ordered collection of [`Particle`]s of one kind (generator-level or reconstructed) in a
/// single event. Indices into this collection are what a [`Matching`] refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Particles(Vec<Particle>);

impl From<Vec<Particle>> for Particles {
    fn from(value: Vec<Particle>) -> Self {
        Self(value)
    }
}

impl FromIterator<Particle> for Particles {
    fn from_iter<T: IntoIterator<Item = Particle>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for Particles {
    type Target = [Particle];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Index<usize> for Particles {
    type Output = Particle;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Particles {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Particles {
    /// Create an empty collection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a collection from the parallel columns a tabular data source provides.
    ///
    /// If `valid` is [`None`], every particle is considered valid.
    ///
    /// # Errors
    ///
    /// Returns [`GenMatchError::ShapeMismatch`] if any column does not have the same length as
    /// `pt`. Columns are never silently truncated.
    pub fn from_columns<P, E, F>(
        pt: P,
        eta: E,
        phi: F,
        valid: Option<&[bool]>,
    ) -> GenMatchResult<Self>
    where
        P: AsRef<[f64]>,
        E: AsRef<[f64]>,
        F: AsRef<[f64]>,
    {
        let (pt, eta, phi) = (pt.as_ref(), eta.as_ref(), phi.as_ref());
        let expected = pt.len();
        let lengths = [
            ("eta", eta.len()),
            ("phi", phi.len()),
            ("valid", valid.map_or(expected, |v| v.len())),
        ];
        for (field, found) in lengths {
            if found != expected {
                return Err(GenMatchError::ShapeMismatch {
                    field: field.to_string(),
                    expected,
                    found,
                });
            }
        }
        Ok((0..expected)
            .map(|i| Particle {
                pt: pt[i],
                eta: eta[i],
                phi: phi[i],
                valid: valid.map_or(true, |v| v[i]),
            })
            .collect())
    }

    /// The number of particles, valid or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the collection holds no particles.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of valid particles.
    pub fn n_valid(&self) -> usize {
        self.0.iter().filter(|p| p.valid).count()
    }

    /// Append a particle to the collection.
    pub fn push(&mut self, particle: Particle) {
        self.0.push(particle);
    }

    /// Return a copy of the collection in which every particle failing `cuts` is marked invalid.
    /// Particles which were already invalid stay invalid.
    pub fn apply_cuts(&self, cuts: &KinematicCuts) -> Self {
        self.0
            .iter()
            .map(|p| p.with_valid(p.valid && cuts.passes(p)))
            .collect()
    }
}

/// The generator-level and reconstructed particles recorded for one collision event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Generator-level ("truth") particles.
    pub gen: Particles,
    /// Reconstructed particles.
    pub reco: Particles,
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event:")?;
        writeln!(f, "  gen:")?;
        for (i, p) in self.gen.iter().enumerate() {
            writeln!(f, "    gen[{i}]: {p}")?;
        }
        writeln!(f, "  reco:")?;
        for (i, p) in self.reco.iter().enumerate() {
            writeln!(f, "    reco[{i}]: {p}")?;
        }
        Ok(())
    }
}

impl Event {
    /// Create a new [`Event`] from its two particle collections.
    pub fn new(gen: Particles, reco: Particles) -> Self {
        Self { gen, reco }
    }

    /// Match the generator-level particles of this event to its reconstructed particles.
    pub fn match_particles(&self, options: &MatchOptions) -> GenMatchResult<Matching> {
        crate::matching::match_particles(&self.gen, &self.reco, options)
    }
}

/// An ordered list of [`Event`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    events: Vec<Event>,
}

impl From<Vec<Event>> for Dataset {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl Dataset {
    /// Create a new [`Dataset`] from a list of [`Event`]s.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// The number of [`Event`]s in the [`Dataset`].
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// All [`Event`]s in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get the [`Event`] at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`GenMatchError::EventIndex`] if the index is out of range.
    pub fn event(&self, index: usize) -> GenMatchResult<&Event> {
        self.events.get(index).ok_or(GenMatchError::EventIndex {
            index,
            n_events: self.events.len(),
        })
    }

    /// Append an [`Event`] to the [`Dataset`].
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Run the matcher on every [`Event`] independently, returning the results in event order.
    ///
    /// # Notes
    ///
    /// Each event is matched by its own call, so with the `rayon` feature enabled the events
    /// are distributed over the current thread pool. The matcher itself stays single-threaded
    /// and the result does not depend on the number of threads.
    ///
    /// # Errors
    ///
    /// Returns the error of the lowest-index failing event, e.g. a
    /// [`GenMatchError::PhiWrap`] when `options` is strict.
    pub fn match_events(&self, options: &MatchOptions) -> GenMatchResult<Vec<Matching>> {
        // collecting into a Result in parallel keeps whichever error a worker hits first
        #[cfg(feature = "rayon")]
        return self
            .events
            .par_iter()
            .map(|event| event.match_particles(options))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        #[cfg(not(feature = "rayon"))]
        return self
            .events
            .iter()
            .map(|event| event.match_particles(options))
            .collect();
    }
}

/// The identifier of a collision event, shared by every tree or file which describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Run number
    pub run: u32,
    /// Luminosity block
    pub lumi: u32,
    /// Event number within the run
    pub event: u64,
}

impl EventKey {
    /// Create a new [`EventKey`].
    pub fn new(run: u32, lumi: u32, event: u64) -> Self {
        Self { run, lumi, event }
    }
}

impl Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {}, lumi {}, event {}", self.run, self.lumi, self.event)
    }
}

/// A lookup from [`EventKey`]s to entry numbers, used to line up the events of two sources
/// (for instance generator-level and reconstructed trees written in different orders) before
/// their particles are matched.
///
/// The first entry registered for a key is kept. Later duplicates are rejected and logged at
/// the `warn` level.
#[derive(Debug, Clone, Default)]
pub struct EventKeyIndex {
    entries: HashMap<EventKey, usize>,
}

impl EventKeyIndex {
    /// Create an empty [`EventKeyIndex`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `key`. Returns `false` (and leaves the index unchanged) if the key
    /// was already registered.
    pub fn add_event(&mut self, key: EventKey, entry: usize) -> bool {
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                log::warn!(
                    "duplicate event ({}) at entry {}, keeping entry {}",
                    key,
                    entry,
                    existing.get()
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// The entry registered under `key`, if any.
    pub fn entry(&self, key: &EventKey) -> Option<usize> {
        self.entries.get(key).copied()
    }

    /// Like [`EventKeyIndex::entry`], with [`UNMATCHED`](crate::UNMATCHED) (`-1`) for a missing
    /// key.
    pub fn entry_or_unmatched(&self, key: &EventKey) -> i64 {
        self.entry(key).map_or(crate::UNMATCHED, |e| e as i64)
    }

    /// Look up every key of another source in order.
    pub fn align<'a, I>(&self, keys: I) -> Vec<Option<usize>>
    where
        I: IntoIterator<Item = &'a EventKey>,
    {
        keys.into_iter().map(|key| self.entry(key)).collect()
    }

    /// The number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<EventKey> for EventKeyIndex {
    /// Register each key under its position in the iterator.
    fn from_iter<T: IntoIterator<Item = EventKey>>(iter: T) -> Self {
        let mut index = Self::new();
        for (entry, key) in iter.into_iter().enumerate() {
            index.add_event(key, entry);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_particle_differences() {
        let a = Particle::new(50.0, 0.5, 3.0);
        let b = Particle::new(44.0, 0.2, -3.0);
        assert_relative_eq!(a.delta_phi(&b), 6.0 - 2.0 * crate::PI);
        assert_relative_eq!(a.delta_eta(&b), 0.3);
        assert_relative_eq!(a.delta_pt(&b), 6.0);
        assert_relative_eq!(b.delta_pt(&a), 6.0);
        assert_relative_eq!(
            a.delta_r(&b),
            ((6.0 - 2.0 * crate::PI).powi(2) + 0.09_f64).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_from_columns() {
        let particles = Particles::from_columns(
            vec![10.0_f64, 20.0],
            vec![0.1_f64, -0.2],
            vec![1.0_f64, -1.0],
            Some(&[true, false][..]),
        )
        .unwrap();
        assert_eq!(particles.len(), 2);
        assert_eq!(particles.n_valid(), 1);
        assert_eq!(particles[1], Particle::new(20.0, -0.2, -1.0).with_valid(false));

        let all_valid =
            Particles::from_columns(vec![1.0_f64], vec![0.0_f64], vec![0.0_f64], None).unwrap();
        assert!(all_valid[0].valid);
    }

    #[test]
    fn test_from_columns_shape_mismatch() {
        let err = Particles::from_columns(
            vec![10.0_f64, 20.0],
            vec![0.1_f64],
            vec![1.0_f64, -1.0],
            None,
        )
        .unwrap_err();
        match err {
            GenMatchError::ShapeMismatch {
                field,
                expected,
                found,
            } => {
                assert_eq!(field, "eta");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let err = Particles::from_columns(
            vec![10.0_f64],
            vec![0.1_f64],
            vec![1.0_f64],
            Some(&[true, true][..]),
        )
        .unwrap_err();
        assert!(matches!(err, GenMatchError::ShapeMismatch { ref field, .. } if field == "valid"));
    }

    #[test]
    fn test_from_columns_empty() {
        let particles =
            Particles::from_columns(Vec::<f64>::new(), Vec::<f64>::new(), Vec::<f64>::new(), None)
                .unwrap();
        assert!(particles.is_empty());
        assert_eq!(particles, Particles::empty());
    }

    #[test]
    fn test_apply_cuts() {
        let particles = Particles::from(vec![
            Particle::new(45.0, 0.2, 0.0),
            Particle::new(35.0, 0.2, 0.0),
            Particle::new(45.0, 2.0, 0.0),
            Particle::new(60.0, -0.3, 0.0).with_valid(false),
        ]);
        let cut = particles.apply_cuts(&KinematicCuts::photon());
        let flags: Vec<bool> = cut.iter().map(|p| p.valid).collect();
        assert_eq!(flags, vec![true, false, false, false]);
        // the input is left untouched
        assert_eq!(particles.n_valid(), 3);
    }

    #[test]
    fn test_event_display() {
        let event = test_event();
        let text = event.to_string();
        assert!(text.starts_with("Event:\n  gen:\n    gen[0]: [pt = 52.1"));
        assert!(text.contains("reco[2]: [pt = 12.2, eta = 0.33, phi = 1.22, invalid]"));
    }

    #[test]
    fn test_dataset_access() {
        let mut dataset = Dataset::new(vec![test_event()]);
        dataset.push(Event::default());
        assert_eq!(dataset.n_events(), 2);
        assert_eq!(dataset.event(0).unwrap(), &test_event());
        assert!(dataset.event(1).unwrap().gen.is_empty());
        assert!(matches!(
            dataset.event(2),
            Err(GenMatchError::EventIndex {
                index: 2,
                n_events: 2
            })
        ));
    }

    #[test]
    fn test_dataset_match_events() {
        let dataset = Dataset::from(vec![test_event(), Event::default(), test_event()]);
        let results = dataset.match_events(&MatchOptions::default()).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].assignment(), &[Some(0), Some(1)]);
        assert!(results[1].assignment().is_empty());
        assert_eq!(results[0], results[2]);
    }

    #[test]
    fn test_dataset_match_events_strict_error() {
        let mut broken = test_event();
        broken.reco.push(Particle::new(50.0, 0.3, 40.0));
        let dataset = Dataset::from(vec![test_event(), broken]);
        assert!(dataset.match_events(&MatchOptions::default()).is_ok());
        assert!(matches!(
            dataset.match_events(&MatchOptions::default().strict(true)),
            Err(GenMatchError::PhiWrap { .. })
        ));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_dataset_match_events_reports_earliest_error() {
        let heavy = Event::new(
            (0..50)
                .map(|i| Particle::new(50.0 + i as f64, 0.01 * i as f64, 0.02 * i as f64))
                .collect(),
            (0..50)
                .map(|i| Particle::new(49.0 + i as f64, 0.01 * i as f64, 0.02 * i as f64 + 0.01))
                .collect(),
        );
        let mut events = vec![Event::default(); 4096];
        for event in events.iter_mut().take(200) {
            *event = heavy.clone();
        }
        events[200].reco.push(Particle::new(50.0, 0.3, 40.0));
        events[2048].reco.push(Particle::new(50.0, 0.3, 99.0));
        events[200].gen.push(Particle::new(50.0, 0.3, 0.0));
        events[2048].gen.push(Particle::new(50.0, 0.3, 0.0));
        let dataset = Dataset::new(events);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(8)
            .build()
            .unwrap();
        for _ in 0..10 {
            let result = pool.install(|| dataset.match_events(&MatchOptions::new().strict(true)));
            match result {
                Err(GenMatchError::PhiWrap { phi2, .. }) => assert_relative_eq!(phi2, 40.0),
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_event_key_index_lookup() {
        let keys = vec![
            EventKey::new(1, 10, 1001),
            EventKey::new(1, 10, 1002),
            EventKey::new(2, 3, 1001),
        ];
        let index: EventKeyIndex = keys.iter().copied().collect();
        assert_eq!(index.len(), 3);
        assert_eq!(index.entry(&EventKey::new(1, 10, 1002)), Some(1));
        assert_eq!(index.entry(&EventKey::new(2, 3, 1001)), Some(2));
        assert_eq!(index.entry_or_unmatched(&EventKey::new(2, 3, 1001)), 2);
        // same event number in another run or lumi block is a different event
        assert_eq!(index.entry(&EventKey::new(2, 10, 1001)), None);
        assert_eq!(index.entry(&EventKey::new(1, 11, 1001)), None);
        assert_eq!(
            index.entry_or_unmatched(&EventKey::new(9, 9, 9)),
            crate::UNMATCHED
        );
        assert!(EventKeyIndex::new().is_empty());
    }

    #[test]
    fn test_event_key_index_duplicates() {
        let mut index = EventKeyIndex::new();
        assert!(index.add_event(EventKey::new(1, 1, 7), 4));
        assert!(!index.add_event(EventKey::new(1, 1, 7), 9));
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(&EventKey::new(1, 1, 7)), Some(4));
    }

    #[test]
    fn test_event_key_index_align() {
        let reco_keys = [
            EventKey::new(1, 1, 3),
            EventKey::new(1, 1, 1),
            EventKey::new(1, 2, 5),
        ];
        let gen_keys = [
            EventKey::new(1, 1, 1),
            EventKey::new(1, 2, 5),
            EventKey::new(1, 2, 6),
            EventKey::new(1, 1, 3),
        ];
        let index: EventKeyIndex = reco_keys.iter().copied().collect();
        assert_eq!(
            index.align(&gen_keys),
            vec![Some(1), Some(2), None, Some(0)]
        );
        assert_eq!(EventKey::new(1, 2, 5).to_string(), "run 1, lumi 2, event 5");
    }
}
