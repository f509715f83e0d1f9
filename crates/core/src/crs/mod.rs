//! Coordinate Reference System handling
//!
//! The pipeline treats a spatial reference as an opaque identifier: it is
//! read from the template raster and copied onto every derived grid. No
//! reprojection is ever performed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse a free-form definition: `EPSG:<code>`, a PROJ string or WKT.
    ///
    /// Returns `None` for an empty definition.
    pub fn parse(definition: &str) -> Option<Self> {
        let def = definition.trim().trim_end_matches('|').trim();
        if def.is_empty() {
            return None;
        }

        if let Some(code) = def
            .strip_prefix("EPSG:")
            .or_else(|| def.strip_prefix("epsg:"))
        {
            if let Ok(code) = code.trim().parse::<u32>() {
                return Some(Self::from_epsg(code));
            }
        }

        if def.starts_with("+proj") || def.starts_with("+init") {
            return Some(Self::from_proj(def));
        }

        Some(Self::from_wkt(def))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether coordinates are angular (latitude/longitude).
    ///
    /// EPSG codes in the 4000 block are geographic 2D systems.
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return (4000..5000).contains(&code);
        }
        if let Some(wkt) = &self.wkt {
            let head = wkt.trim_start();
            return head.starts_with("GEOGCS") || head.starts_with("GEOGCRS");
        }
        if let Some(proj) = &self.proj {
            return proj.contains("+proj=longlat") || proj.contains("+proj=latlong");
        }
        false
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison only; no authority lookup is performed
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Full, untruncated definition suitable for round-tripping through
    /// [`CRS::parse`].
    pub fn definition(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        self.wkt.clone().unwrap_or_default()
    }

    /// Get a short string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(32651)));
    }

    #[test]
    fn test_parse_definitions() {
        assert_eq!(CRS::parse("EPSG:32651"), Some(CRS::from_epsg(32651)));
        assert_eq!(CRS::parse("EPSG:4490|"), Some(CRS::from_epsg(4490)));
        assert_eq!(
            CRS::parse("+proj=utm +zone=51 +datum=WGS84"),
            Some(CRS::from_proj("+proj=utm +zone=51 +datum=WGS84"))
        );
        assert!(CRS::parse("  ").is_none());

        let wkt = r#"PROJCS["WGS 84 / UTM zone 51N",GEOGCS["WGS 84"]]"#;
        let crs = CRS::parse(wkt).unwrap();
        assert_eq!(crs.wkt(), Some(wkt));
        assert!(!crs.is_geographic());
    }

    #[test]
    fn test_definition_roundtrip() {
        let wkt = "GEOGCS[\"China Geodetic Coordinate System 2000\"]".repeat(3);
        let crs = CRS::from_wkt(wkt.clone());
        assert_eq!(crs.definition(), wkt);
        assert_eq!(CRS::parse(&crs.definition()), Some(crs));
    }
}
