//! Multi-band raster stack

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// A stack of co-registered bands sharing one georeference.
///
/// Data is laid out band × row × column, so every band has the same
/// row and column count by construction.
#[derive(Debug, Clone)]
pub struct RasterStack<T: RasterElement> {
    data: Array3<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> RasterStack<T> {
    /// Wrap a (bands, rows, cols) array
    pub fn from_array(data: Array3<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Build a stack from band-sequential samples
    pub fn from_vec(data: Vec<T>, bands: usize, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != bands * rows * cols || bands == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array3::from_shape_vec((bands, rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Stack single-band rasters in order.
    ///
    /// Metadata is taken from the first band; every band must share its shape.
    pub fn from_bands(bands: Vec<Raster<T>>) -> Result<Self> {
        let first = bands.first().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "0".to_string(),
            reason: "a stack needs at least one band".to_string(),
        })?;

        let (rows, cols) = first.shape();
        let transform = *first.transform();
        let crs = first.crs().cloned();
        let nodata = first.nodata();

        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (i, band) in bands.iter().enumerate() {
            let (r, c) = band.shape();
            if (r, c) != (rows, cols) {
                return Err(Error::SizeMismatch { er: rows, ec: cols, ar: r, ac: c });
            }
            data.index_axis_mut(Axis(0), i).assign(band.data());
        }

        Ok(Self {
            data,
            transform,
            crs,
            nodata,
        })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.data.dim().0
    }

    /// Number of rows (raster height)
    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    /// Number of columns (raster width)
    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    /// Dimensions of one band as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Borrow band `index` (0-based)
    pub fn band_view(&self, index: usize) -> Result<ArrayView2<'_, T>> {
        if index >= self.band_count() {
            return Err(Error::InvalidParameter {
                name: "band",
                value: index.to_string(),
                reason: format!("stack has {} bands", self.band_count()),
            });
        }
        Ok(self.data.index_axis(Axis(0), index))
    }

    /// Copy band `index` (0-based) out as a georeferenced raster
    pub fn band(&self, index: usize) -> Result<Raster<T>> {
        let view = self.band_view(index)?;
        let mut raster = Raster::from_array(view.to_owned());
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(self.nodata);
        Ok(raster)
    }

    /// Iterate over all bands in order
    pub fn bands(&self) -> impl Iterator<Item = ArrayView2<'_, T>> {
        self.data.outer_iter()
    }

    /// Get a reference to the underlying (bands, rows, cols) array
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }
}

impl<T: RasterElement> From<Raster<T>> for RasterStack<T> {
    fn from(raster: Raster<T>) -> Self {
        let transform = *raster.transform();
        let crs = raster.crs().cloned();
        let nodata = raster.nodata();
        let data: Array2<T> = raster.into_array();
        let data = data.insert_axis(Axis(0));

        Self {
            data,
            transform,
            crs,
            nodata,
        }
    }
}
