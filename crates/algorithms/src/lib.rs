//! # fvc Algorithms
//!
//! Processing stages for fractional vegetation cover.
//!
//! ## Available Algorithm Categories
//!
//! - **vector**: Burn polygon masks onto a raster grid
//! - **imagery**: Mask application, normalized difference / NDVI, cover rescaling
//! - **statistics**: Normal fit of index values and confidence intervals
//! - **pipeline**: End-to-end vector + image to cover raster

pub mod imagery;
pub mod pipeline;
pub mod statistics;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        apply_mask, cover_value, ndvi, normalized_difference, rescale_to_interval,
        vegetation_cover, ApplyMask, CoverParams, CoverSummary, VegetationCover,
    };
    pub use crate::pipeline::{run_pipeline, PipelineConfig, PipelineReport};
    pub use crate::statistics::{ConfidenceInterval, NormalFit};
    pub use crate::vector::{rasterize, GridSpec, Rasterize, RasterizeParams};
    pub use fvc_core::prelude::*;
}
