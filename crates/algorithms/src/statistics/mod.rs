//! Statistical analysis algorithms for raster data
//!
//! - **normal**: Normal fit of cell values and central confidence intervals

pub mod normal;

pub use normal::{ConfidenceInterval, NormalFit};
