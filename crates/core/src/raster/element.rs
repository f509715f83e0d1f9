//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::{self, Debug};

/// On-disk sample encoding of a written raster.
///
/// Chosen from the element type of the in-memory grid through
/// [`RasterElement::ENCODING`], never from runtime inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    /// Unsigned 8-bit integer
    Byte,
    /// Unsigned 16-bit integer
    UInt16,
    /// IEEE 32-bit float
    Float32,
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelEncoding::Byte => "Byte",
            PixelEncoding::UInt16 => "UInt16",
            PixelEncoding::Float32 => "Float32",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Encoding used when this type is written to disk
    const ENCODING: PixelEncoding;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $enc:expr) => {
        impl RasterElement for $t {
            const ENCODING: PixelEncoding = $enc;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            const ENCODING: PixelEncoding = PixelEncoding::Float32;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(i8, PixelEncoding::Byte);
impl_raster_element_int!(u8, PixelEncoding::Byte);
impl_raster_element_int!(i16, PixelEncoding::UInt16);
impl_raster_element_int!(u16, PixelEncoding::UInt16);
impl_raster_element_int!(i32, PixelEncoding::Float32);
impl_raster_element_int!(u32, PixelEncoding::Float32);
impl_raster_element_int!(i64, PixelEncoding::Float32);
impl_raster_element_int!(u64, PixelEncoding::Float32);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_by_element_type() {
        assert_eq!(u8::ENCODING, PixelEncoding::Byte);
        assert_eq!(i8::ENCODING, PixelEncoding::Byte);
        assert_eq!(u16::ENCODING, PixelEncoding::UInt16);
        assert_eq!(i16::ENCODING, PixelEncoding::UInt16);
        assert_eq!(i32::ENCODING, PixelEncoding::Float32);
        assert_eq!(f64::ENCODING, PixelEncoding::Float32);
    }

    #[test]
    fn test_float_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(0.0_f64.is_nodata(Some(0.0)));
        assert!(!1.0_f64.is_nodata(Some(0.0)));
        assert!(!0u8.is_nodata(None));
    }
}
