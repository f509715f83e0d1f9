//! End-to-end vegetation cover pipeline
//!
//! 1. Read the vector mask layer and the multi-band template image.
//! 2. Burn the layer onto the image grid and round-trip the mask through a
//!    scratch GeoTIFF next to the output.
//! 3. Mask every band, compute NDVI, fit and rescale it.
//! 4. Write the cover raster with the template's georeference.
//!
//! The scratch mask is deleted whether or not the run succeeds.

use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::imagery::{apply_mask, ndvi_from_stack, vegetation_cover, CoverParams, CoverSummary};
use crate::statistics::normal::validate_confidence;
use crate::statistics::{ConfidenceInterval, NormalFit};
use crate::vector::{rasterize, GridSpec, RasterizeParams};
use fvc_core::io::{read_geotiff, read_raster, read_vector, write_geotiff, GeoTiffOptions};
use fvc_core::raster::{Raster, RasterElement, RasterStack};
use fvc_core::{Error, Result};

/// Configuration for [`run_pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 0-based band index of the near-infrared band
    pub nir_band: usize,
    /// 0-based band index of the red band
    pub red_band: usize,
    pub cover: CoverParams,
    pub rasterize: RasterizeParams,
    /// Options for the written cover raster
    pub output: GeoTiffOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nir_band: 3,
            red_band: 2,
            cover: CoverParams::default(),
            rasterize: RasterizeParams::default(),
            output: GeoTiffOptions::default(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        validate_confidence(self.cover.confidence)?;
        if self.nir_band == self.red_band {
            return Err(Error::InvalidParameter {
                name: "red_band",
                value: self.red_band.to_string(),
                reason: "NIR and red bands must differ".to_string(),
            });
        }
        Ok(())
    }

    fn check_bands(&self, band_count: usize) -> Result<()> {
        for (name, index) in [("nir_band", self.nir_band), ("red_band", self.red_band)] {
            if index >= band_count {
                return Err(Error::InvalidParameter {
                    name,
                    value: index.to_string(),
                    reason: format!("image has {} bands", band_count),
                });
            }
        }
        Ok(())
    }
}

/// What a pipeline run computed
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    /// Cells inside the vector mask
    pub mask_cells: usize,
    /// Normal fit of the index, `None` when no index cell was defined
    pub fit: Option<NormalFit>,
    pub interval: Option<ConfidenceInterval>,
    pub summary: CoverSummary,
}

/// Mask an image, compute NDVI and rescale it to vegetation cover.
///
/// Cells outside the mask end up with both bands at 0, so their index is
/// NaN and they take no part in the fit.
pub fn compute_cover<M: RasterElement>(
    image: &RasterStack<f64>,
    mask: &Raster<M>,
    config: &PipelineConfig,
) -> Result<(Raster<f64>, PipelineReport)> {
    config.validate()?;
    config.check_bands(image.band_count())?;

    let masked = apply_mask(image, mask)?;
    let index = ndvi_from_stack(&masked, config.nir_band, config.red_band)?;
    let (cover, fitted) = vegetation_cover(&index, config.cover)?;

    let summary = match &fitted {
        Some((_, interval)) => CoverSummary::tally(&index, interval),
        None => CoverSummary {
            nodata: index.len(),
            ..Default::default()
        },
    };

    let mask_cells = mask
        .data()
        .iter()
        .filter(|&&v| v.to_f64().is_some_and(|m| m != 0.0))
        .count();

    let report = PipelineReport {
        width: image.width(),
        height: image.height(),
        bands: image.band_count(),
        mask_cells,
        fit: fitted.map(|(fit, _)| fit),
        interval: fitted.map(|(_, interval)| interval),
        summary,
    };
    Ok((cover, report))
}

/// Run the whole pipeline from files to a written cover raster
///
/// # Arguments
/// * `vector_path` - Polygon layer delimiting the land area
/// * `template_path` - Multi-band image supplying bands and georeference
/// * `output_path` - Single-band cover raster to create (overwritten)
pub fn run_pipeline<V, T, O>(
    vector_path: V,
    template_path: T,
    output_path: O,
    config: &PipelineConfig,
) -> Result<PipelineReport>
where
    V: AsRef<Path>,
    T: AsRef<Path>,
    O: AsRef<Path>,
{
    let (vector_path, template_path, output_path) =
        (vector_path.as_ref(), template_path.as_ref(), output_path.as_ref());
    config.validate()?;

    let layer = read_vector(vector_path)?;
    info!("Read {} features from {}", layer.len(), vector_path.display());

    let image: RasterStack<f64> = read_raster(template_path)?;
    info!(
        "Read {} bands of {}x{} from {}",
        image.band_count(),
        image.width(),
        image.height(),
        template_path.display()
    );
    config.check_bands(image.band_count())?;

    let burned = rasterize(&layer, &GridSpec::of_stack(&image), config.rasterize)?;

    let scratch = scratch_file(output_path)?;
    debug!("Mask scratch file: {}", scratch.path().display());
    write_geotiff(&burned, scratch.path(), None)?;
    let mask: Raster<f64> = read_geotiff(scratch.path(), Some(1))?;
    scratch.close()?;

    let (cover, report) = compute_cover(&image, &mask, config)?;
    match (&report.fit, &report.interval) {
        (Some(fit), Some(interval)) => info!(
            "Index mean {:.6}, std {:.6} over {} cells; {:.0}% interval [{:.6}, {:.6}]",
            fit.mean,
            fit.std_dev,
            fit.count,
            interval.confidence * 100.0,
            interval.lower,
            interval.upper
        ),
        _ => info!("No defined index cells inside the mask"),
    }

    write_geotiff(&cover, output_path, Some(config.output.clone()))?;
    info!("Wrote cover raster to {}", output_path.display());

    Ok(report)
}

/// Scratch GeoTIFF in the directory of `output_path`
fn scratch_file(output_path: &Path) -> Result<NamedTempFile> {
    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Builder::new()
        .prefix("mask")
        .suffix(".tif")
        .tempfile_in(&dir)
        .map_err(|e| Error::DatasetCreate {
            path: dir,
            reason: e.to_string(),
        })
}
