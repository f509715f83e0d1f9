//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Multi-band rasters are written one page per
//! band; on read, interleaved samples are split into bands and every
//! further page of the same size is appended as another band.
//! For other formats, enable the `gdal` feature.
//!
//! Only part of a CRS survives a round trip here. An EPSG code is stored
//! as a GeoKey; anything else is stored as its text definition in the
//! citation key. A file from another writer whose user-defined CRS is
//! described by GeoKey parameters plus a bare name citation reads back as
//! that name only, and writing it again drops the projection parameters.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelEncoding, RasterElement, RasterStack};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray16, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MEMORY_SOURCE: &str = "<memory>";

// GeoKey identifiers
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression (ignored in native mode, data is stored uncompressed)
    pub compression: String,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "NONE".to_string(),
        }
    }
}

/// Read every band of a GeoTIFF file
pub fn read_raster<T, P>(path: P) -> Result<RasterStack<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::open(path, e))?;
    decode_stack(file).map_err(|reason| Error::open(path, reason))
}

/// Read every band of a GeoTIFF held in memory
pub fn read_raster_from_buffer<T>(data: &[u8]) -> Result<RasterStack<T>>
where
    T: RasterElement,
{
    decode_stack(Cursor::new(data)).map_err(|reason| Error::open(MEMORY_SOURCE, reason))
}

fn decode_stack<T, R>(reader: R) -> std::result::Result<RasterStack<T>, String>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| format!("TIFF decode error: {}", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| format!("Cannot read dimensions: {}", e))?;
    let rows = height as usize;
    let cols = width as usize;
    let pixels = rows * cols;
    if pixels == 0 {
        return Err(format!("Empty image ({}x{})", cols, rows));
    }

    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let mut samples: Vec<T> = Vec::new();
    let mut band_count = 0;

    loop {
        let (w, h) = decoder
            .dimensions()
            .map_err(|e| format!("Cannot read dimensions: {}", e))?;

        // Pages of another size are overviews or masks, not bands
        if (w, h) == (width, height) {
            let page = decoder
                .read_image()
                .map_err(|e| format!("Cannot read image data: {}", e))?;
            let page = convert_samples::<T>(page)?;

            let per_pixel = page.len() / pixels;
            if per_pixel == 0 || per_pixel * pixels != page.len() {
                return Err(format!(
                    "Sample count {} does not fit a {}x{} grid",
                    page.len(),
                    cols,
                    rows
                ));
            }

            for s in 0..per_pixel {
                samples.extend(page.iter().skip(s).step_by(per_pixel).copied());
            }
            band_count += per_pixel;
        }

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| format!("Cannot advance to next page: {}", e))?;
    }

    let mut stack =
        RasterStack::from_vec(samples, band_count, rows, cols).map_err(|e| e.to_string())?;

    if let Some(transform) = transform {
        stack.set_transform(transform);
    }
    stack.set_crs(crs);
    stack.set_nodata(nodata.and_then(num_traits::cast));

    Ok(stack)
}

fn convert_samples<T: RasterElement>(result: DecodingResult) -> std::result::Result<Vec<T>, String> {
    fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    }

    let data = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => return Err("Unsupported TIFF pixel format".to_string()),
    };
    Ok(data)
}

/// GeoTransform from ModelTransformation, or ModelPixelScale + ModelTiepoint
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            // Row-major 4x4: x = m0*col + m1*row + m3, y = m4*col + m5*row + m7
            return Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    None
}

/// CRS from the GeoKey directory: an EPSG type key wins over a citation
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let ascii = decoder.get_tag_ascii_string(Tag::GeoAsciiParamsTag).ok();

    let mut citation = None;
    for entry in keys[4..].chunks_exact(4).take(keys[3] as usize) {
        let (id, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match id {
            PROJECTED_CS_TYPE | GEOGRAPHIC_TYPE
                if location == 0 && value != 0 && value != USER_DEFINED =>
            {
                return Some(CRS::from_epsg(value as u32));
            }
            GT_CITATION if location == Tag::GeoAsciiParamsTag.to_u16() => {
                citation = ascii.as_deref().and_then(|s| {
                    let start = value as usize;
                    let end = (start + count as usize).min(s.len());
                    s.get(start..end).map(str::to_string)
                });
            }
            _ => {}
        }
    }

    citation.and_then(|c| CRS::parse(&c))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
}

/// Write every band of a stack to a GeoTIFF file.
///
/// Sample encoding follows `T::ENCODING`.
pub fn write_raster<T, P>(
    stack: &RasterStack<T>,
    path: P,
    _options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::create(path, e))?;
    let mut writer = BufWriter::new(file);
    encode_stack(stack, &mut writer).map_err(|reason| Error::create(path, reason))?;
    writer.flush().map_err(|e| Error::create(path, e))
}

/// Write every band of a stack to an in-memory GeoTIFF buffer
pub fn write_raster_to_buffer<T>(
    stack: &RasterStack<T>,
    _options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_stack(stack, Cursor::new(&mut buf)).map_err(|reason| Error::create(MEMORY_SOURCE, reason))?;
    Ok(buf)
}

fn encode_stack<T, W>(stack: &RasterStack<T>, writer: W) -> std::result::Result<(), String>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(|e| format!("TIFF encoder error: {}", e))?;
    let tags = GeoTags::new(stack)?;
    let size = (stack.width() as u32, stack.height() as u32);
    let gt = stack.transform();

    for band in stack.bands() {
        match T::ENCODING {
            PixelEncoding::Byte => {
                let data: Vec<u8> = band
                    .iter()
                    .map(|&v| num_traits::cast(v).unwrap_or(0))
                    .collect();
                write_page::<Gray8, _>(&mut encoder, size, gt, &tags, &data)?;
            }
            PixelEncoding::UInt16 => {
                let data: Vec<u16> = band
                    .iter()
                    .map(|&v| num_traits::cast(v).unwrap_or(0))
                    .collect();
                write_page::<Gray16, _>(&mut encoder, size, gt, &tags, &data)?;
            }
            PixelEncoding::Float32 => {
                let data: Vec<f32> = band
                    .iter()
                    .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                    .collect();
                write_page::<Gray32Float, _>(&mut encoder, size, gt, &tags, &data)?;
            }
        }
    }

    Ok(())
}

/// GeoTIFF tag payloads shared by every page of one file
struct GeoTags {
    geokeys: Vec<u16>,
    ascii: Option<String>,
    nodata: Option<String>,
}

impl GeoTags {
    fn new<T: RasterElement>(stack: &RasterStack<T>) -> std::result::Result<Self, String> {
        let geographic = stack.crs().map(CRS::is_geographic).unwrap_or(false);
        let mut keys: Vec<[u16; 4]> = vec![
            [GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }],
            [GT_RASTER_TYPE, 0, 1, 1], // RasterPixelIsArea
        ];

        let mut ascii = None;
        if let Some(crs) = stack.crs() {
            let citation = format!("{}|", crs.definition());
            let length = u16::try_from(citation.len()).map_err(|_| {
                format!(
                    "CRS definition of {} bytes does not fit a GeoTIFF citation",
                    citation.len()
                )
            })?;
            keys.push([GT_CITATION, Tag::GeoAsciiParamsTag.to_u16(), length, 0]);
            ascii = Some(citation);

            if let Some(code) = crs.epsg().and_then(|c| u16::try_from(c).ok()) {
                let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
                keys.push([key, 0, 1, code]);
            }
        }

        let mut geokeys = vec![1, 1, 0, keys.len() as u16];
        geokeys.extend(keys.iter().flatten());

        let nodata = stack
            .nodata()
            .and_then(|nd| nd.to_f64())
            .map(|nd| nd.to_string());

        Ok(Self {
            geokeys,
            ascii,
            nodata,
        })
    }
}

fn write_page<C, W>(
    encoder: &mut TiffEncoder<W>,
    (width, height): (u32, u32),
    gt: &GeoTransform,
    tags: &GeoTags,
    data: &[C::Inner],
) -> std::result::Result<(), String>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut image = encoder
        .new_image::<C>(width, height)
        .map_err(|e| format!("Cannot create TIFF image: {}", e))?;

    let dir = image.encoder();

    if gt.is_rotated() {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])
            .map_err(|e| format!("Cannot write transformation tag: {}", e))?;
    } else {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(|e| format!("Cannot write scale tag: {}", e))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(|e| format!("Cannot write tiepoint tag: {}", e))?;
    }

    dir.write_tag(Tag::GeoKeyDirectoryTag, tags.geokeys.as_slice())
        .map_err(|e| format!("Cannot write geokey tag: {}", e))?;

    if let Some(ascii) = &tags.ascii {
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())
            .map_err(|e| format!("Cannot write geo ascii tag: {}", e))?;
    }

    if let Some(nodata) = &tags.nodata {
        dir.write_tag(Tag::GdalNodata, nodata.as_str())
            .map_err(|e| format!("Cannot write nodata tag: {}", e))?;
    }

    image
        .write_data(data)
        .map_err(|e| format!("Cannot write image data: {}", e))
}
