//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod stack;

pub use element::{PixelEncoding, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use stack::RasterStack;
