//! Vector to raster conversion
//!
//! - Rasterize: burn polygon masks onto a template grid

mod rasterize;

pub use rasterize::{rasterize, GridSpec, Rasterize, RasterizeParams};
