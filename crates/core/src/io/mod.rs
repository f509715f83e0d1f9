//! I/O operations for reading and writing geospatial data
//!
//! Raster and vector access are stateless: every call opens, reads or
//! writes, and closes its dataset.

#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson;
mod native;

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement, RasterStack};
use std::path::Path;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_raster, read_vector, write_raster, GeoTiffOptions};

#[cfg(not(feature = "gdal"))]
pub use self::geojson::read_vector;
#[cfg(not(feature = "gdal"))]
pub use native::{read_raster, write_raster, GeoTiffOptions};

// Buffer-based I/O (always available, no filesystem dependency)
pub use self::geojson::parse_geojson;
pub use native::{read_raster_from_buffer, write_raster_to_buffer};

/// Sample types the active I/O backend can read and write.
#[cfg(feature = "gdal")]
pub trait Sample: RasterElement + gdal::raster::GdalType {}
#[cfg(feature = "gdal")]
impl<T: RasterElement + gdal::raster::GdalType> Sample for T {}

/// Sample types the active I/O backend can read and write.
#[cfg(not(feature = "gdal"))]
pub trait Sample: RasterElement {}
#[cfg(not(feature = "gdal"))]
impl<T: RasterElement> Sample for T {}

/// Read a single band (1-indexed, default 1) of a raster file
///
/// Band 0 is rejected with `InvalidParameter`.
///
/// # Example
/// ```ignore
/// let red: Raster<f64> = read_geotiff("scene.tif", Some(3))?;
/// ```
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: Sample,
    P: AsRef<Path>,
{
    let band = band.unwrap_or(1);
    if band == 0 {
        return Err(Error::InvalidParameter {
            name: "band",
            value: "0".to_string(),
            reason: "bands are numbered from 1".to_string(),
        });
    }
    let stack = read_raster::<T, _>(path)?;
    stack.band(band - 1)
}

/// Write a single-band raster; encoding follows `T::ENCODING`
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: Sample,
    P: AsRef<Path>,
{
    let stack = RasterStack::from(raster.clone());
    write_raster(&stack, path, options)
}
