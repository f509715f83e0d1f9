//! Fractional vegetation cover from a vegetation index
//!
//! The index is fitted with a normal distribution and rescaled against a
//! central confidence interval of that fit:
//!
//! ```text
//! v <  lower          -> 0
//! lower <= v <= upper -> (v - lower) / (upper - lower)
//! v >  upper          -> v            (left as the raw index)
//! NaN                 -> NaN
//! ```
//!
//! Values above the interval are not clamped to 1. When the interval has
//! zero width, values on it map to 0. An index holding an infinity has no
//! finite fit; its interval bounds are NaN and every value passes through.

use ndarray::Array2;
use crate::maybe_rayon::*;
use crate::statistics::normal::validate_confidence;
use crate::statistics::{ConfidenceInterval, NormalFit};
use fvc_core::raster::Raster;
use fvc_core::{Algorithm, Error, Result};
use tracing::warn;

/// Parameters for vegetation cover
#[derive(Debug, Clone, Copy)]
pub struct CoverParams {
    /// Probability mass of the central interval (default 0.95)
    pub confidence: f64,
}

impl Default for CoverParams {
    fn default() -> Self {
        Self { confidence: 0.95 }
    }
}

/// Vegetation cover algorithm
#[derive(Debug, Clone, Default)]
pub struct VegetationCover;

impl Algorithm for VegetationCover {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = CoverParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "VegetationCover"
    }

    fn description(&self) -> &'static str {
        "Rescale a vegetation index against a normal confidence interval of its own values"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        vegetation_cover(&input, params).map(|(cover, _)| cover)
    }
}

/// How index cells fell relative to the interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverSummary {
    /// Cells below `lower`, set to 0
    pub below: usize,
    /// Cells within `[lower, upper]`, rescaled
    pub inside: usize,
    /// Cells above `upper`, kept as raw index values
    pub above: usize,
    /// NaN cells, passed through
    pub nodata: usize,
}

impl CoverSummary {
    /// Classify every cell of `index` against `interval`
    pub fn tally(index: &Raster<f64>, interval: &ConfidenceInterval) -> Self {
        index
            .data()
            .iter()
            .fold(Self::default(), |mut acc, &v| {
                if v.is_nan() {
                    acc.nodata += 1;
                } else if v < interval.lower {
                    acc.below += 1;
                } else if v <= interval.upper {
                    acc.inside += 1;
                } else {
                    acc.above += 1;
                }
                acc
            })
    }

    /// Number of non-NaN cells
    pub fn valid(&self) -> usize {
        self.below + self.inside + self.above
    }
}

/// Rescale a single index value against `interval`
#[inline]
pub fn cover_value(v: f64, interval: &ConfidenceInterval) -> f64 {
    if v < interval.lower {
        0.0
    } else if v <= interval.upper {
        let width = interval.upper - interval.lower;
        if width > 0.0 {
            (v - interval.lower) / width
        } else {
            0.0
        }
    } else {
        // NaN fails both comparisons and lands here unchanged
        v
    }
}

/// Rescale every cell of `index` against a known interval
pub fn rescale_to_interval(index: &Raster<f64>, interval: &ConfidenceInterval) -> Result<Raster<f64>> {
    let (rows, cols) = index.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = unsafe { index.get_unchecked(row, col) };
                *out = cover_value(v, interval);
            }
            row_data
        })
        .collect();

    let mut output = index.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Fit the index, build the interval and rescale.
///
/// Returns the cover raster together with the fit and interval used, or
/// `None` for both when the index has no non-NaN cell. In that case the
/// output is a copy of the index.
///
/// # Errors
/// `InvalidParameter` when `params.confidence` is outside (0, 1).
pub fn vegetation_cover(
    index: &Raster<f64>,
    params: CoverParams,
) -> Result<(Raster<f64>, Option<(NormalFit, ConfidenceInterval)>)> {
    validate_confidence(params.confidence)?;

    let Some(fit) = NormalFit::from_raster(index) else {
        warn!("Index has no valid cells, cover left undefined");
        let mut output = index.clone();
        output.set_nodata(Some(f64::NAN));
        return Ok((output, None));
    };

    let interval = fit.interval(params.confidence)?;
    if !interval.is_defined() {
        warn!(
            "Index fit is not finite (mean {}, std {}), values are left unchanged",
            fit.mean, fit.std_dev
        );
    } else if interval.is_degenerate() {
        warn!(
            "Index has zero spread (all {} cells equal {}), interval collapses to a point",
            fit.count, fit.mean
        );
    }

    let cover = rescale_to_interval(index, &interval)?;
    Ok((cover, Some((fit, interval))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fvc_core::GeoTransform;

    fn interval(lower: f64, upper: f64) -> ConfidenceInterval {
        ConfidenceInterval {
            lower,
            upper,
            confidence: 0.95,
        }
    }

    fn make_index(values: &[f64], cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values.to_vec(), values.len() / cols, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_cover_value_rule() {
        let ci = interval(0.2, 0.6);
        assert_eq!(cover_value(0.1, &ci), 0.0);
        assert_relative_eq!(cover_value(0.4, &ci), 0.5, epsilon = 1e-12);
        assert_eq!(cover_value(0.2, &ci), 0.0);
        assert_relative_eq!(cover_value(0.6, &ci), 1.0, epsilon = 1e-12);
        assert_eq!(cover_value(0.8, &ci), 0.8);
        assert!(cover_value(f64::NAN, &ci).is_nan());
    }

    #[test]
    fn test_degenerate_interval_maps_point_to_zero() {
        let ci = interval(0.5, 0.5);
        assert_eq!(cover_value(0.5, &ci), 0.0);
        assert_eq!(cover_value(0.4, &ci), 0.0);
        assert_eq!(cover_value(0.7, &ci), 0.7);
    }

    #[test]
    fn test_rescale_keeps_georeference() {
        let index = make_index(&[0.1, 0.4, 0.8, f64::NAN], 2);
        let cover = rescale_to_interval(&index, &interval(0.2, 0.6)).unwrap();

        assert_eq!(cover.transform(), index.transform());
        assert_eq!(cover.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(cover.get(0, 1).unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(cover.get(1, 0).unwrap(), 0.8);
        assert!(cover.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_vegetation_cover_rescales_inside_values() {
        let values: Vec<f64> = (0..100).map(|i| 0.2 + 0.004 * i as f64).collect();
        let index = make_index(&values, 10);

        let (cover, fitted) = vegetation_cover(&index, CoverParams::default()).unwrap();
        let (fit, ci) = fitted.unwrap();
        assert_eq!(fit.count, 100);

        for (&v, &c) in index.data().iter().zip(cover.data().iter()) {
            if v < ci.lower {
                assert_eq!(c, 0.0);
            } else if v <= ci.upper {
                assert!((0.0..=1.0).contains(&c));
            } else {
                assert_eq!(c, v);
            }
        }

        let summary = CoverSummary::tally(&index, &ci);
        assert_eq!(summary.valid(), 100);
        assert_eq!(summary.nodata, 0);
        assert!(summary.inside > 90);
    }

    #[test]
    fn test_cover_non_decreasing_inside_interval() {
        // Unsorted, uneven spread with repeats
        let values: Vec<f64> = (0..120)
            .map(|i| {
                let t = ((i * 37) % 120) as f64 / 120.0;
                0.1 + 0.6 * t * t
            })
            .collect();
        let index = make_index(&values, 12);
        let (cover, fitted) = vegetation_cover(&index, CoverParams { confidence: 0.8 }).unwrap();
        let (_, ci) = fitted.unwrap();

        let mut pairs: Vec<(f64, f64)> = index
            .data()
            .iter()
            .zip(cover.data().iter())
            .filter(|&(&v, _)| ci.contains(v))
            .map(|(&v, &c)| (v, c))
            .collect();
        assert!(pairs.len() > 50);
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        for w in pairs.windows(2) {
            assert!(w[1].1 >= w[0].1, "{:?} then {:?}", w[0], w[1]);
        }
        assert!(pairs.iter().all(|&(_, c)| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn test_infinite_index_passes_through() {
        let index = make_index(&[0.2, 0.4, 0.6, f64::INFINITY, -0.3, f64::NAN], 3);
        let (cover, fitted) = vegetation_cover(&index, CoverParams::default()).unwrap();

        let (fit, ci) = fitted.unwrap();
        assert_eq!(fit.count, 5);
        assert!(!ci.is_defined());
        for (&v, &c) in index.data().iter().zip(cover.data().iter()) {
            if v.is_nan() {
                assert!(c.is_nan());
            } else {
                assert_eq!(c, v);
            }
        }
        assert_eq!(cover.transform(), index.transform());
    }

    #[test]
    fn test_outlier_above_is_kept_raw() {
        let mut values = vec![0.3; 20];
        values.extend_from_slice(&[0.31, 0.29, 0.95]);
        values.push(f64::NAN);
        let index = make_index(&values, 4);

        let (cover, fitted) = vegetation_cover(&index, CoverParams::default()).unwrap();
        let (_, ci) = fitted.unwrap();
        assert!(0.95 > ci.upper);
        assert_eq!(cover.get(5, 2).unwrap(), 0.95);
        assert!(cover.get(5, 3).unwrap().is_nan());

        let summary = CoverSummary::tally(&index, &ci);
        assert_eq!(summary.nodata, 1);
        assert_eq!(summary.above, 1);
    }

    #[test]
    fn test_all_nan_index_passes_through() {
        let index = make_index(&[f64::NAN; 6], 3);
        let (cover, fitted) = vegetation_cover(&index, CoverParams::default()).unwrap();
        assert!(fitted.is_none());
        assert!(cover.data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_constant_index() {
        let index = make_index(&[1.0 / 3.0; 4], 2);
        let cover = VegetationCover.execute_default(index).unwrap();
        assert!(cover.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let index = make_index(&[0.1, 0.2], 2);
        assert!(matches!(
            vegetation_cover(&index, CoverParams { confidence: 1.0 }),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
