use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data::{Particle, Particles},
    GenMatchError, PI,
};

/// The kinds of physics objects with standard acceptance cuts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Photons, restricted to the barrel calorimeter.
    Photon,
    /// Jets.
    Jet,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Photon => write!(f, "Photon"),
            ObjectKind::Jet => write!(f, "Jet"),
        }
    }
}

impl FromStr for ObjectKind {
    type Err = GenMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "photon" | "photons" | "gamma" | "pho" => Ok(Self::Photon),
            "jet" | "jets" => Ok(Self::Jet),
            _ => Err(GenMatchError::ParseError {
                name: s.to_string(),
                object: "ObjectKind".to_string(),
            }),
        }
    }
}

/// Acceptance cuts on transverse momentum and pseudorapidity.
///
/// A particle passes if $`p_T > `$ `min_pt` and $`|\eta| < `$ `max_abs_eta`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KinematicCuts {
    /// Lower (exclusive) bound on $`p_T`$.
    pub min_pt: f64,
    /// Upper (exclusive) bound on $`|\eta|`$.
    pub max_abs_eta: f64,
}

impl Default for KinematicCuts {
    fn default() -> Self {
        Self {
            min_pt: f64::NEG_INFINITY,
            max_abs_eta: f64::INFINITY,
        }
    }
}

impl KinematicCuts {
    /// Standard photon acceptance, $`p_T > 40`$ and $`|\eta| < 1.44`$.
    pub fn photon() -> Self {
        Self {
            min_pt: 40.0,
            max_abs_eta: 1.44,
        }
    }
    /// Standard jet acceptance, $`p_T > 30`$ and $`|\eta| < 3`$.
    pub fn jet() -> Self {
        Self {
            min_pt: 30.0,
            max_abs_eta: 3.0,
        }
    }
    /// Standard acceptance for the given kind of object.
    pub fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Photon => Self::photon(),
            ObjectKind::Jet => Self::jet(),
        }
    }
    /// Override the lower bound on $`p_T`$.
    pub fn min_pt(mut self, min_pt: f64) -> Self {
        self.min_pt = min_pt;
        self
    }
    /// Override the upper bound on $`|\eta|`$.
    pub fn max_abs_eta(mut self, max_abs_eta: f64) -> Self {
        self.max_abs_eta = max_abs_eta;
        self
    }
    /// Check the cuts (the validity flag is not considered).
    pub fn passes(&self, particle: &Particle) -> bool {
        particle.pt > self.min_pt && particle.eta.abs() < self.max_abs_eta
    }
}

/// Separation a particle must have from a reference object, e.g. a jet recoiling against the
/// leading photon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsolationCuts {
    /// Lower (inclusive) bound on $`\Delta R`$ to the reference.
    pub min_delta_r: f64,
    /// Lower (inclusive) bound on $`|\Delta\phi|`$ to the reference.
    pub min_abs_delta_phi: f64,
}

impl Default for IsolationCuts {
    fn default() -> Self {
        Self {
            min_delta_r: 0.4,
            min_abs_delta_phi: PI * 7.0 / 8.0,
        }
    }
}

impl IsolationCuts {
    /// Override the lower bound on $`\Delta R`$.
    pub fn min_delta_r(mut self, min_delta_r: f64) -> Self {
        self.min_delta_r = min_delta_r;
        self
    }
    /// Override the lower bound on $`|\Delta\phi|`$.
    pub fn min_abs_delta_phi(mut self, min_abs_delta_phi: f64) -> Self {
        self.min_abs_delta_phi = min_abs_delta_phi;
        self
    }
    /// Check `particle` against `reference`.
    pub fn passes(&self, particle: &Particle, reference: &Particle) -> bool {
        particle.delta_phi(reference).abs() >= self.min_abs_delta_phi
            && particle.delta_r(reference) >= self.min_delta_r
    }
}

/// Indices of the highest and second-highest $`p_T`$ particles of a selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leading {
    /// Index of the highest-$`p_T`$ particle.
    pub leading: Option<usize>,
    /// Index of the second-highest-$`p_T`$ particle.
    pub subleading: Option<usize>,
}

impl Leading {
    fn from_filtered<'a, I>(particles: I) -> Self
    where
        I: Iterator<Item = (usize, &'a Particle)>,
    {
        let mut best: Option<(usize, f64)> = None;
        let mut second: Option<(usize, f64)> = None;
        for (i, p) in particles {
            // strict comparisons, the first particle wins a pt tie
            if best.map_or(true, |(_, pt)| p.pt > pt) {
                second = best;
                best = Some((i, p.pt));
            } else if second.map_or(true, |(_, pt)| p.pt > pt) {
                second = Some((i, p.pt));
            }
        }
        Self {
            leading: best.map(|(i, _)| i),
            subleading: second.map(|(i, _)| i),
        }
    }
}

/// Find the two valid particles with the highest $`p_T`$.
pub fn leading_two(particles: &Particles) -> Leading {
    Leading::from_filtered(particles.iter().enumerate().filter(|(_, p)| p.valid))
}

/// Find the two valid particles with the highest $`p_T`$ among those passing `isolation`
/// with respect to `reference`.
pub fn leading_two_isolated(
    particles: &Particles,
    reference: &Particle,
    isolation: &IsolationCuts,
) -> Leading {
    Leading::from_filtered(
        particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.valid && isolation.passes(p, reference)),
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_object_kind_parsing() {
        assert_eq!("photon".parse::<ObjectKind>().unwrap(), ObjectKind::Photon);
        assert_eq!("Gamma".parse::<ObjectKind>().unwrap(), ObjectKind::Photon);
        assert_eq!("JETS".parse::<ObjectKind>().unwrap(), ObjectKind::Jet);
        let err = "muon".parse::<ObjectKind>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to parse string: \"muon\" does not correspond to a valid \"ObjectKind\"!"
        );
        assert_eq!(ObjectKind::Jet.to_string(), "Jet");
    }

    #[test]
    fn test_kinematic_cuts() {
        let photon = KinematicCuts::photon();
        assert!(photon.passes(&Particle::new(40.5, 1.2, 0.0)));
        assert!(!photon.passes(&Particle::new(40.0, 0.0, 0.0)));
        assert!(!photon.passes(&Particle::new(80.0, -1.44, 0.0)));
        assert!(photon.passes(&Particle::new(80.0, -1.4, 0.0).with_valid(false)));
        let jet = KinematicCuts::for_kind(ObjectKind::Jet);
        assert_eq!(jet, KinematicCuts::jet());
        assert!(jet.passes(&Particle::new(31.0, -2.9, 0.0)));
        let loose = KinematicCuts::default().max_abs_eta(2.0);
        assert!(loose.passes(&Particle::new(0.0, 1.9, 0.0)));
        assert!(!loose.min_pt(5.0).passes(&Particle::new(0.0, 1.9, 0.0)));
    }

    #[test]
    fn test_isolation_defaults() {
        let cuts = IsolationCuts::default();
        assert_relative_eq!(cuts.min_delta_r, 0.4);
        assert_relative_eq!(cuts.min_abs_delta_phi, 7.0 * PI / 8.0);
    }

    #[test]
    fn test_isolation_cuts() {
        let photon = Particle::new(60.0, 0.0, 0.0);
        let cuts = IsolationCuts::default();
        // back-to-back across the phi boundary
        assert!(cuts.passes(&Particle::new(40.0, 0.5, 3.0), &photon));
        assert!(cuts.passes(&Particle::new(40.0, 0.5, -3.0), &photon));
        assert!(!cuts.passes(&Particle::new(40.0, 0.5, 1.5), &photon));
        let relaxed = cuts.min_abs_delta_phi(0.0);
        assert!(relaxed.passes(&Particle::new(40.0, 0.5, 0.0), &photon));
        assert!(!relaxed.passes(&Particle::new(40.0, 0.1, 0.1), &photon));
        assert!(!relaxed
            .min_delta_r(1.0)
            .passes(&Particle::new(40.0, 0.5, 0.0), &photon));
    }

    #[test]
    fn test_leading_two() {
        let particles = Particles::from(vec![
            Particle::new(35.0, 0.0, 0.0),
            Particle::new(90.0, 0.0, 0.0).with_valid(false),
            Particle::new(55.0, 0.0, 0.0),
            Particle::new(20.0, 0.0, 0.0),
            Particle::new(40.0, 0.0, 0.0),
        ]);
        assert_eq!(
            leading_two(&particles),
            Leading {
                leading: Some(2),
                subleading: Some(4)
            }
        );
    }

    #[test]
    fn test_leading_two_ties_and_small_inputs() {
        let particles = Particles::from(vec![
            Particle::new(50.0, 0.0, 0.0),
            Particle::new(50.0, 1.0, 0.0),
            Particle::new(50.0, 2.0, 0.0),
        ]);
        assert_eq!(
            leading_two(&particles),
            Leading {
                leading: Some(0),
                subleading: Some(1)
            }
        );
        let single = Particles::from(vec![Particle::new(5.0, 0.0, 0.0)]);
        assert_eq!(
            leading_two(&single),
            Leading {
                leading: Some(0),
                subleading: None
            }
        );
        assert_eq!(leading_two(&Particles::empty()), Leading::default());
    }

    #[test]
    fn test_leading_two_isolated() {
        let photon = Particle::new(80.0, 0.2, 0.0);
        let jets = Particles::from(vec![
            Particle::new(120.0, 0.25, 0.05),
            Particle::new(70.0, -0.4, 3.0),
            Particle::new(45.0, 1.1, -2.9),
            Particle::new(100.0, 0.0, 1.6),
        ]);
        let leading = leading_two_isolated(&jets, &photon, &IsolationCuts::default());
        assert_eq!(
            leading,
            Leading {
                leading: Some(1),
                subleading: Some(2)
            }
        );
        let cuts = KinematicCuts::jet().min_pt(50.0);
        let leading =
            leading_two_isolated(&jets.apply_cuts(&cuts), &photon, &IsolationCuts::default());
        assert_eq!(leading.leading, Some(1));
        assert_eq!(leading.subleading, None);
    }
}
