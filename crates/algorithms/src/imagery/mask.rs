//! Multiplicative land mask

use ndarray::{Axis, Zip};
use fvc_core::raster::{Raster, RasterElement, RasterStack};
use fvc_core::{Algorithm, Error, Result};

/// Mask application algorithm
#[derive(Debug, Clone, Default)]
pub struct ApplyMask;

impl Algorithm for ApplyMask {
    type Input = (RasterStack<f64>, Raster<f64>);
    type Output = RasterStack<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "ApplyMask"
    }

    fn description(&self) -> &'static str {
        "Multiply every band of an image by a single-band mask"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        let (stack, mask) = input;
        apply_mask(&stack, &mask)
    }
}

/// Multiply every band of `stack` element-wise by `mask`.
///
/// With a 0/1 mask, pixels outside the mask become 0 and pixels inside
/// are unchanged. The result keeps the stack's georeference and nodata.
///
/// # Errors
/// `SizeMismatch` when the mask grid differs from the band grid.
pub fn apply_mask<M: RasterElement>(
    stack: &RasterStack<f64>,
    mask: &Raster<M>,
) -> Result<RasterStack<f64>> {
    if stack.shape() != mask.shape() {
        return Err(Error::SizeMismatch {
            er: stack.height(),
            ec: stack.width(),
            ar: mask.rows(),
            ac: mask.cols(),
        });
    }

    let weights = mask.data().mapv(|m| m.to_f64().unwrap_or(0.0));

    let mut output = stack.clone();
    for mut band in output.data_mut().axis_iter_mut(Axis(0)) {
        Zip::from(&mut band)
            .and(&weights)
            .for_each(|v, &w| *v *= w);
    }

    Ok(output)
}
