//! Imagery analysis algorithms
//!
//! Algorithms for remote sensing and spectral analysis:
//! - Mask: multiply every band by a 0/1 land mask
//! - Normalized difference: generic two-band index and NDVI
//! - Cover: fitted-normal rescaling of an index to vegetation cover

mod cover;
mod indices;
mod mask;

pub use cover::{
    cover_value, rescale_to_interval, vegetation_cover, CoverParams, CoverSummary,
    VegetationCover,
};
pub use indices::{ndvi, ndvi_from_stack, normalized_difference};
pub use mask::{apply_mask, ApplyMask};
