//! Raster and vector access through GDAL/OGR
//!
//! Accepts any raster format GDAL can open and any vector format OGR can
//! open (Shapefile, GeoPackage, GeoJSON, ...). Output is always GeoTIFF.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::Sample;
use crate::raster::{GeoTransform, PixelEncoding, RasterStack};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{FieldValue, LayerAccess};
use gdal::{Dataset, DriverManager};
use ndarray::Array3;
use std::path::Path;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "DEFLATE", "LZW", "ZSTD", "NONE"
    pub compression: String,
    /// Tile size for tiled TIFFs (0 for strips)
    pub tile_size: usize,
    /// BigTIFF for files > 4GB
    pub bigtiff: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "DEFLATE".to_string(),
            tile_size: 256,
            bigtiff: false,
        }
    }
}

/// Read every band of a raster dataset
pub fn read_raster<T, P>(path: P) -> Result<RasterStack<T>>
where
    T: Sample,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let dataset = Dataset::open(path).map_err(|e| Error::open(path, e))?;

    let (cols, rows) = dataset.raster_size();
    let bands = dataset.raster_count();
    if bands == 0 {
        return Err(Error::open(path, "dataset has no raster bands"));
    }

    let mut data = Vec::with_capacity(bands * rows * cols);
    let mut nodata = None;
    for index in 1..=bands {
        let band = dataset.rasterband(index).map_err(|e| Error::open(path, e))?;
        let buffer = band
            .read_as::<T>((0, 0), (cols, rows), (cols, rows), None)
            .map_err(|e| Error::open(path, e))?;
        data.extend_from_slice(buffer.data());

        if index == 1 {
            nodata = band.no_data_value().and_then(num_traits::cast);
        }
    }

    let array = Array3::from_shape_vec((bands, rows, cols), data)
        .map_err(|e| Error::open(path, e))?;
    let mut stack = RasterStack::from_array(array);
    stack.set_nodata(nodata);

    if let Ok(gt) = dataset.geo_transform() {
        stack.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        let crs = match srs.auth_code() {
            Ok(code) => Some(CRS::from_epsg(code as u32)),
            Err(_) => srs.to_wkt().ok().map(CRS::from_wkt),
        };
        stack.set_crs(crs);
    }

    Ok(stack)
}

/// Write every band of a stack to a GeoTIFF file.
///
/// The band type follows `T::ENCODING`.
pub fn write_raster<T, P>(
    stack: &RasterStack<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: Sample,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match T::ENCODING {
        PixelEncoding::Byte => write_as::<T, u8>(stack, path, options, 0),
        PixelEncoding::UInt16 => write_as::<T, u16>(stack, path, options, 0),
        PixelEncoding::Float32 => write_as::<T, f32>(stack, path, options, f32::NAN),
    }
}

fn write_as<T, U>(
    stack: &RasterStack<T>,
    path: &Path,
    options: Option<GeoTiffOptions>,
    fallback: U,
) -> Result<()>
where
    T: Sample,
    U: GdalType + num_traits::NumCast + Copy,
{
    let opts = options.unwrap_or_default();
    let create = |e: gdal::errors::GdalError| Error::create(path, e);

    let driver = DriverManager::get_driver_by_name("GTiff").map_err(create)?;

    let mut create_options = CslStringList::new();
    create_options
        .set_name_value("COMPRESS", &opts.compression)
        .map_err(create)?;
    if opts.tile_size > 0 {
        create_options.set_name_value("TILED", "YES").map_err(create)?;
        create_options
            .set_name_value("BLOCKXSIZE", &opts.tile_size.to_string())
            .map_err(create)?;
        create_options
            .set_name_value("BLOCKYSIZE", &opts.tile_size.to_string())
            .map_err(create)?;
    }
    if opts.bigtiff {
        create_options.set_name_value("BIGTIFF", "YES").map_err(create)?;
    }

    let (rows, cols) = stack.shape();
    let mut dataset = driver
        .create_with_band_type_with_options::<U, _>(
            path,
            cols,
            rows,
            stack.band_count(),
            &create_options,
        )
        .map_err(create)?;

    dataset
        .set_geo_transform(&stack.transform().to_gdal())
        .map_err(create)?;

    if let Some(crs) = stack.crs() {
        let srs = match crs.epsg() {
            Some(epsg) => SpatialRef::from_epsg(epsg),
            None => SpatialRef::from_definition(&crs.definition()),
        }
        .map_err(create)?;
        dataset.set_spatial_ref(&srs).map_err(create)?;
    }

    for (i, band_data) in stack.bands().enumerate() {
        let mut band = dataset.rasterband(i + 1).map_err(create)?;

        if let Some(nd) = stack.nodata().and_then(|v| v.to_f64()) {
            band.set_no_data_value(Some(nd)).map_err(create)?;
        }

        let samples: Vec<U> = band_data
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or(fallback))
            .collect();
        let mut buffer = Buffer::new((cols, rows), samples);
        band.write((0, 0), (cols, rows), &mut buffer).map_err(create)?;
    }

    Ok(())
}

/// Read every feature of the first layer of a vector dataset
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let dataset = Dataset::open(path).map_err(|e| Error::vector(path, e))?;
    let mut layer = dataset.layer(0).map_err(|e| Error::vector(path, e))?;

    let crs = layer.spatial_ref().and_then(|srs| match srs.auth_code() {
        Ok(code) => Some(CRS::from_epsg(code as u32)),
        Err(_) => srs.to_wkt().ok().map(CRS::from_wkt),
    });

    let mut collection = FeatureCollection::new();
    for feature in layer.features() {
        let mut out = match feature.geometry() {
            Some(geom) => Feature::new(geom.to_geo().map_err(|e| Error::vector(path, e))?),
            None => Feature {
                geometry: None,
                properties: Default::default(),
            },
        };

        for (name, value) in feature.fields() {
            let value = match value {
                Some(FieldValue::IntegerValue(v)) => AttributeValue::Int(v as i64),
                Some(FieldValue::Integer64Value(v)) => AttributeValue::Int(v),
                Some(FieldValue::RealValue(v)) => AttributeValue::Float(v),
                Some(FieldValue::StringValue(v)) => AttributeValue::String(v),
                Some(other) => AttributeValue::String(format!("{:?}", other)),
                None => AttributeValue::Null,
            };
            out.set_property(name, value);
        }

        collection.push(out);
    }
    collection.crs = crs;

    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_read_roundtrip() {
        let data = Array3::from_shape_fn((4, 20, 30), |(b, r, c)| (b * 1000 + r * 30 + c) as f32);
        let mut stack = RasterStack::from_array(data);
        stack.set_transform(GeoTransform::new(0.0, 100.0, 1.0, -1.0));
        stack.set_crs(Some(CRS::from_epsg(4326)));

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_raster(&stack, tmp.path(), None).unwrap();

        let loaded: RasterStack<f32> = read_raster(tmp.path()).unwrap();
        assert_eq!(loaded.band_count(), 4);
        assert_eq!(loaded.shape(), stack.shape());
        assert_eq!(loaded.data()[[3, 19, 29]], stack.data()[[3, 19, 29]]);
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn test_missing_inputs() {
        assert!(matches!(
            read_raster::<f64, _>("/nonexistent/scene.tif"),
            Err(Error::DatasetOpen { .. })
        ));
        assert!(matches!(
            read_vector("/nonexistent/coast.shp"),
            Err(Error::VectorOpen { .. })
        ));
    }
}
