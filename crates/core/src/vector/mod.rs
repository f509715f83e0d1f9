//! Vector features used as raster masks
//!
//! Only geometry is consumed downstream; attributes are carried so a
//! loaded layer is not lossy, but nothing reads them.

use geo_types::{Geometry, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crs::CRS;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }
}

/// Collection of features forming one vector layer
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Spatial reference declared by the source, if any
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Every polygon in the layer, with multi-polygons and geometry
    /// collections flattened. Non-areal geometries are skipped.
    pub fn polygons(&self) -> MultiPolygon<f64> {
        let mut out = Vec::new();
        for geom in self.features.iter().filter_map(|f| f.geometry.as_ref()) {
            collect_polygons(geom, &mut out);
        }
        MultiPolygon::new(out)
    }
}

fn collect_polygons(geom: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geom {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
            crs: None,
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, GeometryCollection, Rect};

    #[test]
    fn test_polygons_flattens_areal_geometries() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let rect = Rect::new((2.0, 2.0), (3.0, 3.0));
        let nested = GeometryCollection::new_from(vec![
            Geometry::Polygon(square.clone()),
            Geometry::Point(point!(x: 5.0, y: 5.0)),
        ]);

        let layer: FeatureCollection = vec![
            Feature::new(Geometry::Polygon(square)),
            Feature::new(Geometry::Rect(rect)),
            Feature::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)])),
            Feature::new(Geometry::GeometryCollection(nested)),
        ]
        .into_iter()
        .collect();

        assert_eq!(layer.len(), 4);
        assert_eq!(layer.polygons().0.len(), 3);
    }

    #[test]
    fn test_empty_layer() {
        let layer = FeatureCollection::new();
        assert!(layer.is_empty());
        assert!(layer.polygons().0.is_empty());
    }
}
