//! Normal distribution fit of raster values
//!
//! Fits a normal distribution to the non-NaN cells of a raster by
//! moments, and derives a central confidence interval from its inverse CDF.

use statrs::distribution::{ContinuousCDF, Normal};
use fvc_core::raster::Raster;
use fvc_core::{Error, Result};

/// Moment estimates of a normal distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalFit {
    /// Arithmetic mean of the sample
    pub mean: f64,
    /// Population standard deviation (divisor `n`)
    pub std_dev: f64,
    /// Number of values the fit was computed from
    pub count: usize,
}

/// Central confidence interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Probability mass the interval covers
    pub confidence: f64,
}

impl NormalFit {
    /// Fit every non-NaN value of the iterator.
    ///
    /// Returns `None` when no value qualifies. A sample whose values are all
    /// identical has a standard deviation of exactly zero.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let values = values.into_iter().filter(|v| !v.is_nan());

        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values.clone() {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }

        if min == max {
            return Some(Self {
                mean: min,
                std_dev: 0.0,
                count,
            });
        }

        let mean = sum / count as f64;
        let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }

    /// Whether both moments are finite
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.std_dev.is_finite()
    }

    /// Fit the non-NaN cells of a raster
    pub fn from_raster(raster: &Raster<f64>) -> Option<Self> {
        Self::from_values(raster.data().iter().copied())
    }

    /// Central interval holding `confidence` of the fitted distribution:
    /// `[ppf((1 - c) / 2), ppf((1 + c) / 2)]`.
    ///
    /// A zero standard deviation gives the degenerate interval
    /// `[mean, mean]`. A fit with an infinite or NaN moment (the sample held
    /// an infinity) gives NaN bounds, which no value compares against.
    ///
    /// # Errors
    /// `InvalidParameter` unless `0 < confidence < 1`.
    pub fn interval(&self, confidence: f64) -> Result<ConfidenceInterval> {
        validate_confidence(confidence)?;

        if !self.is_finite() {
            return Ok(ConfidenceInterval {
                lower: f64::NAN,
                upper: f64::NAN,
                confidence,
            });
        }

        if self.std_dev == 0.0 {
            return Ok(ConfidenceInterval {
                lower: self.mean,
                upper: self.mean,
                confidence,
            });
        }

        let dist = Normal::new(self.mean, self.std_dev)
            .map_err(|e| Error::Algorithm(format!("Invalid normal params: {e}")))?;

        Ok(ConfidenceInterval {
            lower: dist.inverse_cdf((1.0 - confidence) / 2.0),
            upper: dist.inverse_cdf((1.0 + confidence) / 2.0),
            confidence,
        })
    }
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether the interval collapsed to a single point
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0
    }

    /// False when the bounds are NaN
    pub fn is_defined(&self) -> bool {
        !(self.lower.is_nan() || self.upper.is_nan())
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

pub(crate) fn validate_confidence(confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(Error::InvalidParameter {
            name: "confidence",
            value: confidence.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_population_moments() {
        let fit = NormalFit::from_values(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(fit.count, 8);
        assert_relative_eq!(fit.mean, 5.0, epsilon = 1e-12);
        assert_relative_eq!(fit.std_dev, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_excluded() {
        let fit = NormalFit::from_values(vec![f64::NAN, 1.0, 3.0, f64::NAN]).unwrap();
        assert_eq!(fit.count, 2);
        assert_relative_eq!(fit.mean, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.std_dev, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_nan_has_no_fit() {
        assert!(NormalFit::from_values(vec![f64::NAN; 4]).is_none());
        assert!(NormalFit::from_values(Vec::new()).is_none());
    }

    #[test]
    fn test_constant_values_have_zero_spread() {
        let third = 1.0 / 3.0;
        let fit = NormalFit::from_raster(&Raster::filled(7, 3, third)).unwrap();
        assert_eq!(fit.std_dev, 0.0);
        assert_eq!(fit.mean, third);

        let ci = fit.interval(0.95).unwrap();
        assert_eq!(ci.lower, third);
        assert_eq!(ci.upper, third);
        assert!(ci.is_degenerate());
    }

    #[test]
    fn test_interval_95() {
        let fit = NormalFit {
            mean: 0.4,
            std_dev: 0.1,
            count: 100,
        };
        let ci = fit.interval(0.95).unwrap();

        assert_relative_eq!(ci.lower, 0.4 - 1.959964 * 0.1, epsilon = 1e-6);
        assert_relative_eq!(ci.upper, 0.4 + 1.959964 * 0.1, epsilon = 1e-6);
        assert_relative_eq!((ci.lower + ci.upper) / 2.0, 0.4, epsilon = 1e-9);
        assert!(ci.contains(0.4));
        assert!(!ci.contains(0.7));
    }

    #[test]
    fn test_interval_widens_with_confidence() {
        let fit = NormalFit {
            mean: 0.0,
            std_dev: 1.0,
            count: 10,
        };
        let narrow = fit.interval(0.5).unwrap();
        let wide = fit.interval(0.99).unwrap();
        assert!(wide.width() > narrow.width());
        assert_relative_eq!(wide.upper, 2.575829, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_confidence() {
        let fit = NormalFit {
            mean: 0.0,
            std_dev: 1.0,
            count: 10,
        };
        for c in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                fit.interval(c),
                Err(Error::InvalidParameter { name: "confidence", .. })
            ));
        }
    }

    #[test]
    fn test_infinite_value_gives_undefined_interval() {
        let fit = NormalFit::from_values(vec![0.2, 0.4, f64::NAN, 0.6, f64::INFINITY]).unwrap();
        assert_eq!(fit.count, 4);
        assert!(!fit.is_finite());

        let ci = fit.interval(0.95).unwrap();
        assert!(!ci.is_defined());
        assert!(!ci.is_degenerate());
        assert!(!ci.contains(0.4));

        let all_inf = NormalFit::from_values(vec![f64::NEG_INFINITY; 3]).unwrap();
        assert!(!all_inf.interval(0.95).unwrap().is_defined());
    }
}
