//! Polygon rasterization
//!
//! Burns the polygons of a vector layer onto a grid defined by a template
//! georeference. Cells covered by a polygon receive the burn value, every
//! other cell is 0 (which is also the nodata value of the result).
//!
//! Two coverage rules are available:
//! - **all touched** (default): a cell is burned when its footprint shares
//!   area with a polygon. Footprints that only meet a polygon along an edge
//!   or at a vertex are not burned.
//! - **center**: a cell is burned when its center lies inside a polygon.
//!
//! Coordinates are used as-is; the layer is never reprojected.

use std::ops::Range;

use geo::{Coord, Polygon};
use ndarray::Array2;
use tracing::{debug, warn};

use crate::maybe_rayon::*;
use fvc_core::raster::{GeoTransform, Raster, RasterElement, RasterStack};
use fvc_core::vector::FeatureCollection;
use fvc_core::{Algorithm, Error, Result, CRS};

/// Parameters for rasterization
#[derive(Debug, Clone, Copy)]
pub struct RasterizeParams {
    /// Value written into covered cells (must be non-zero)
    pub burn_value: u8,
    /// Burn every cell a polygon touches instead of only cells whose
    /// center is covered
    pub all_touched: bool,
}

impl Default for RasterizeParams {
    fn default() -> Self {
        Self {
            burn_value: 1,
            all_touched: true,
        }
    }
}

/// Target grid: georeference, size and spatial reference
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub crs: Option<CRS>,
}

impl GridSpec {
    pub fn new(transform: GeoTransform, width: usize, height: usize) -> Self {
        Self {
            transform,
            width,
            height,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    /// Grid of an existing multi-band image
    pub fn of_stack<T: RasterElement>(stack: &RasterStack<T>) -> Self {
        Self::new(*stack.transform(), stack.width(), stack.height()).with_crs(stack.crs().cloned())
    }
}

/// Rasterize algorithm
#[derive(Debug, Clone, Default)]
pub struct Rasterize;

impl Algorithm for Rasterize {
    type Input = (FeatureCollection, GridSpec);
    type Output = Raster<u8>;
    type Params = RasterizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rasterize"
    }

    fn description(&self) -> &'static str {
        "Burn polygon features onto a template grid as a binary mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (layer, grid) = input;
        rasterize(&layer, &grid, params)
    }
}

/// Polygon edge in pixel space, oriented so that `y0 < y1`
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    /// Horizontal edges bound no area between two rows and are dropped
    fn new((xa, ya): (f64, f64), (xb, yb): (f64, f64)) -> Option<Self> {
        if ya < yb {
            Some(Self { x0: xa, y0: ya, x1: xb, y1: yb })
        } else if yb < ya {
            Some(Self { x0: xb, y0: yb, x1: xa, y1: ya })
        } else {
            None
        }
    }

    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }

    fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

/// Edges of one polygon (all rings) bucketed by the grid rows they cross
struct Target {
    edges: Vec<Edge>,
    first_row: usize,
    by_row: Vec<Vec<usize>>,
}

impl Target {
    fn new(polygon: &Polygon<f64>, gt: &GeoTransform, rows: usize) -> Option<Self> {
        let to_pixel = |c: Coord<f64>| gt.geo_to_pixel(c.x, c.y);
        let edges: Vec<Edge> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .flat_map(|ring| ring.lines())
            .filter_map(|line| Edge::new(to_pixel(line.start), to_pixel(line.end)))
            .collect();
        if !edges.iter().all(Edge::is_finite) {
            return None;
        }

        let span = |e: &Edge| (clamp_index(e.y0.floor(), rows), clamp_index(e.y1.ceil(), rows));
        let first_row = edges.iter().map(|e| span(e).0).min()?;
        let end_row = edges.iter().map(|e| span(e).1).max()?;
        if first_row >= end_row {
            return None;
        }

        let mut by_row = vec![Vec::new(); end_row - first_row];
        for (i, edge) in edges.iter().enumerate() {
            let (r0, r1) = span(edge);
            for row in r0..r1 {
                by_row[row - first_row].push(i);
            }
        }
        Some(Self {
            edges,
            first_row,
            by_row,
        })
    }

    fn row_edges(&self, row: usize) -> Vec<Edge> {
        row.checked_sub(self.first_row)
            .and_then(|i| self.by_row.get(i))
            .map(|ids| ids.iter().map(|&i| self.edges[i]).collect())
            .unwrap_or_default()
    }
}

/// Burn every polygon of `layer` onto `grid`.
///
/// The result has the grid's georeference and CRS and nodata 0. Features
/// without areal geometry are ignored.
///
/// Polygons are filled row by row in pixel space with the even-odd rule,
/// so holes and rotated grids need no special handling.
///
/// # Errors
/// `InvalidDimensions` for an empty grid, `InvalidParameter` for a zero
/// burn value.
pub fn rasterize(
    layer: &FeatureCollection,
    grid: &GridSpec,
    params: RasterizeParams,
) -> Result<Raster<u8>> {
    let (rows, cols) = (grid.height, grid.width);
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    if params.burn_value == 0 {
        return Err(Error::InvalidParameter {
            name: "burn_value",
            value: "0".to_string(),
            reason: "0 is the background value".to_string(),
        });
    }

    if let (Some(layer_crs), Some(grid_crs)) = (layer.crs.as_ref(), grid.crs.as_ref()) {
        if !layer_crs.is_equivalent(grid_crs) {
            warn!(
                "Vector CRS {} differs from raster CRS {}; coordinates are used as-is",
                layer_crs, grid_crs
            );
        }
    }

    let gt = grid.transform;
    let targets: Vec<Target> = layer
        .polygons()
        .iter()
        .filter_map(|polygon| Target::new(polygon, &gt, rows))
        .collect();

    debug!(
        "Rasterizing {} polygons onto {}x{} grid (all_touched={})",
        targets.len(),
        cols,
        rows,
        params.all_touched
    );
    if targets.is_empty() {
        warn!("No polygon overlaps the raster grid; mask is empty");
    }

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];
            for target in &targets {
                let edges = target.row_edges(row);
                if edges.is_empty() {
                    continue;
                }
                let spans = if params.all_touched {
                    touched_spans(&edges, row, cols)
                } else {
                    center_spans(&edges, row, cols)
                };
                for cells in spans {
                    row_data[cells].fill(params.burn_value);
                }
            }
            row_data
        })
        .collect();

    let mut output = Raster::from_array(
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
    );
    output.set_transform(gt);
    output.set_crs(grid.crs.clone());
    output.set_nodata(Some(0));
    Ok(output)
}

fn clamp_index(v: f64, hi: usize) -> usize {
    v.max(0.0).min(hi as f64) as usize
}

/// Columns whose centers lie strictly inside the polygon on this row
fn center_spans(edges: &[Edge], row: usize, cols: usize) -> Vec<Range<usize>> {
    let y = row as f64 + 0.5;
    let mut xs: Vec<f64> = edges
        .iter()
        .filter(|e| e.y0 <= y && y < e.y1)
        .map(|e| e.x_at(y))
        .collect();
    xs.sort_by(f64::total_cmp);

    xs.chunks_exact(2)
        .map(|pair| {
            let start = clamp_index((pair[0] - 0.5).floor() + 1.0, cols);
            let end = clamp_index((pair[1] - 0.5).ceil(), cols);
            start..end.max(start)
        })
        .collect()
}

/// Columns whose footprints share area with the polygon on this row.
///
/// The row strip is cut at every vertex inside it. Between two cuts the
/// left-to-right order of the edges is fixed and each interior span moves
/// linearly, so its reach over the slab is given by the slab ends.
fn touched_spans(edges: &[Edge], row: usize, cols: usize) -> Vec<Range<usize>> {
    let (top, bottom) = (row as f64, row as f64 + 1.0);

    let mut cuts: Vec<f64> = edges
        .iter()
        .flat_map(|e| [e.y0, e.y1])
        .filter(|&y| y > top && y < bottom)
        .chain([top, bottom])
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let mut spans = Vec::new();
    let mut active: Vec<(f64, Edge)> = Vec::with_capacity(edges.len());
    for slab in cuts.windows(2) {
        let (ya, yb) = (slab[0], slab[1]);
        let mid = 0.5 * (ya + yb);

        active.clear();
        active.extend(
            edges
                .iter()
                .filter(|e| e.y0 <= ya && e.y1 >= yb)
                .map(|e| (e.x_at(mid), *e)),
        );
        active.sort_by(|a, b| a.0.total_cmp(&b.0));

        for pair in active.chunks_exact(2) {
            let (left, right) = (pair[0].1, pair[1].1);
            let lo = left.x_at(ya).min(left.x_at(yb));
            let hi = right.x_at(ya).max(right.x_at(yb));
            let start = clamp_index(lo.floor(), cols);
            let end = clamp_index(hi.ceil(), cols);
            spans.push(start..end.max(start));
        }
    }
    spans
}
