use crate::{GenMatchError, GenMatchResult, PI};

const TWO_PI: f64 = 2.0 * PI;

#[inline]
fn wrap(dphi: f64) -> f64 {
    if dphi > PI {
        dphi - TWO_PI
    } else if dphi <= -PI {
        dphi + TWO_PI
    } else {
        dphi
    }
}

/// The azimuthal difference $`\phi_1 - \phi_2`$ wrapped once into $`(-\pi, \pi]`$.
///
/// Angles are not required to be normalized by the caller. A single wrap is applied, so inputs
/// which are each within one turn always land inside the range. If the result is still outside
/// of $`(-\pi, \pi]`$, the inputs were not angles in radians and the problem is logged at the
/// error level rather than silently clamped.
///
/// # See Also
/// [`try_delta_phi`]
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let dphi = wrap(phi1 - phi2);
    if dphi.abs() > PI {
        log::error!(
            "delta_phi({}, {}) = {} is outside of (-pi, pi] after wrapping",
            phi1,
            phi2,
            dphi
        );
    }
    dphi
}

/// The strict version of [`delta_phi`], which returns [`GenMatchError::PhiWrap`] instead of
/// logging when the wrapped difference is outside of $`(-\pi, \pi]`$.
pub fn try_delta_phi(phi1: f64, phi2: f64) -> GenMatchResult<f64> {
    let dphi = wrap(phi1 - phi2);
    if dphi.abs() > PI {
        return Err(GenMatchError::PhiWrap { phi1, phi2, dphi });
    }
    Ok(dphi)
}

/// The pseudorapidity difference $`\eta_1 - \eta_2`$ (no wrapping).
#[inline]
pub fn delta_eta(eta1: f64, eta2: f64) -> f64 {
    eta1 - eta2
}

/// The angular separation
/// ```math
/// \Delta R = \sqrt{\Delta\phi^2 + \Delta\eta^2}
/// ```
/// between the directions $`(\eta_1, \phi_1)`$ and $`(\eta_2, \phi_2)`$, using the wrapped
/// [`delta_phi`].
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    delta_phi(phi1, phi2).hypot(delta_eta(eta1, eta2))
}

/// The strict version of [`delta_r`] built on [`try_delta_phi`].
pub fn try_delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> GenMatchResult<f64> {
    Ok(try_delta_phi(phi1, phi2)?.hypot(delta_eta(eta1, eta2)))
}
