//! GeoJSON vector reading (without GDAL dependency)
//!
//! Lightweight serde models covering what a mask layer needs: a
//! FeatureCollection, a single Feature, or a bare geometry. The legacy
//! `crs` member is honoured when present.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

const MEMORY_SOURCE: &str = "<memory>";

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryModel {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeometryModel> },
}

#[derive(Debug, Deserialize)]
struct FeatureModel {
    geometry: Option<GeometryModel>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionModel {
    features: Vec<FeatureModel>,
    #[serde(default)]
    crs: Option<CrsModel>,
}

/// Legacy (2008) GeoJSON named CRS member
#[derive(Debug, Deserialize)]
struct CrsModel {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

/// Read a GeoJSON file into a feature collection
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::vector(path, e))?;
    decode(&text).map_err(|reason| Error::vector(path, reason))
}

/// Parse GeoJSON text into a feature collection
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    decode(text).map_err(|reason| Error::vector(MEMORY_SOURCE, reason))
}

fn decode(text: &str) -> std::result::Result<FeatureCollection, String> {
    let doc: Value = serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {}", e))?;
    let kind = doc
        .get("type")
        .and_then(Value::as_str)
        .ok_or("GeoJSON object has no \"type\" member")?
        .to_string();

    match kind.as_str() {
        "FeatureCollection" => {
            let model: FeatureCollectionModel =
                serde_json::from_value(doc).map_err(|e| format!("Invalid FeatureCollection: {}", e))?;
            let mut layer = model
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<std::result::Result<FeatureCollection, String>>()?;
            layer.crs = model.crs.and_then(|c| crs_from_name(&c.properties.name));
            Ok(layer)
        }
        "Feature" => {
            let model: FeatureModel =
                serde_json::from_value(doc).map_err(|e| format!("Invalid Feature: {}", e))?;
            Ok(std::iter::once(convert_feature(model)?).collect())
        }
        _ => {
            let model: GeometryModel =
                serde_json::from_value(doc).map_err(|e| format!("Invalid geometry: {}", e))?;
            Ok(std::iter::once(Feature::new(convert_geometry(model)?)).collect())
        }
    }
}

fn convert_feature(model: FeatureModel) -> std::result::Result<Feature, String> {
    let mut feature = Feature {
        geometry: model.geometry.map(convert_geometry).transpose()?,
        properties: Default::default(),
    };
    for (key, value) in model.properties.unwrap_or_default() {
        feature.set_property(key, convert_attribute(value));
    }
    Ok(feature)
}

fn convert_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

/// `urn:ogc:def:crs:EPSG::32651`, `EPSG:4326` or `urn:ogc:def:crs:OGC:1.3:CRS84`
fn crs_from_name(name: &str) -> Option<CRS> {
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    if name.contains("EPSG") {
        if let Some(code) = name.rsplit(':').next().and_then(|c| c.parse::<u32>().ok()) {
            return Some(CRS::from_epsg(code));
        }
    }
    CRS::parse(name)
}

fn coord(position: &[f64]) -> std::result::Result<Coord<f64>, String> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(format!("Position needs at least 2 values, got {}", position.len())),
    }
}

fn line(positions: &[Position]) -> std::result::Result<LineString<f64>, String> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> std::result::Result<Polygon<f64>, String> {
    let mut rings = rings.iter().map(|r| line(r));
    let exterior = rings.next().transpose()?.unwrap_or_else(|| LineString::new(vec![]));
    let interiors = rings.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn convert_geometry(model: GeometryModel) -> std::result::Result<Geometry<f64>, String> {
    let geometry = match model {
        GeometryModel::Point { coordinates } => Geometry::Point(Point(coord(&coordinates)?)),
        GeometryModel::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
            coordinates
                .iter()
                .map(|p| coord(p).map(Point))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeometryModel::LineString { coordinates } => Geometry::LineString(line(&coordinates)?),
        GeometryModel::MultiLineString { coordinates } => Geometry::MultiLineString(
            MultiLineString::new(
                coordinates
                    .iter()
                    .map(|l| line(l))
                    .collect::<std::result::Result<_, _>>()?,
            ),
        ),
        GeometryModel::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
        GeometryModel::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
            coordinates
                .iter()
                .map(|p| polygon(p))
                .collect::<std::result::Result<_, _>>()?,
        )),
        GeometryModel::GeometryCollection { geometries } => {
            Geometry::GeometryCollection(GeometryCollection::new_from(
                geometries
                    .into_iter()
                    .map(convert_geometry)
                    .collect::<std::result::Result<_, _>>()?,
            ))
        }
    };
    Ok(geometry)
}
