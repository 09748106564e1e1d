/// The angular distance metric: wrapped $`\Delta\phi`$, $`\Delta\eta`$ and $`\Delta R`$.
pub mod angles;

/// Returns the ratio `numerator / denominator`, or [`None`] for an empty denominator.
pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(3, 0), None);
        assert_relative_eq!(ratio(1, 4).unwrap(), 0.25);
        assert_relative_eq!(ratio(0, 7).unwrap(), 0.0);
    }
}
