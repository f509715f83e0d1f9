//! End-to-end runs of the vegetation cover pipeline on small synthetic
//! scenes written to a temporary directory.
//!
//! Every scene is a 4-band UInt16 GeoTIFF (band order blue, green, red,
//! NIR) on a 30 m UTM grid, paired with a GeoJSON land polygon.

use approx::assert_relative_eq;
use fvc_algorithms::pipeline::{run_pipeline, PipelineConfig};
use fvc_algorithms::statistics::NormalFit;
use fvc_core::io::{read_geotiff, read_raster, write_raster};
use fvc_core::raster::{GeoTransform, Raster, RasterStack};
use fvc_core::{Error, CRS};
use ndarray::Array3;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 3_000_000.0;
const CELL: f64 = 30.0;

fn scene_transform() -> GeoTransform {
    GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL, -CELL)
}

/// Write a 4-band scene where red and NIR come from closures of (row, col)
fn write_scene(
    dir: &Path,
    rows: usize,
    cols: usize,
    red: impl Fn(usize, usize) -> u16,
    nir: impl Fn(usize, usize) -> u16,
) -> PathBuf {
    let data = Array3::from_shape_fn((4, rows, cols), |(b, r, c)| match b {
        2 => red(r, c),
        3 => nir(r, c),
        _ => 80,
    });
    let mut stack = RasterStack::from_array(data);
    stack.set_transform(scene_transform());
    stack.set_crs(Some(CRS::from_epsg(32651)));

    let path = dir.join("scene.tif");
    write_raster(&stack, &path, None).unwrap();
    path
}

/// Write a GeoJSON polygon covering the cell window [c0, c1) x [r0, r1)
fn write_land(dir: &Path, r0: usize, r1: usize, c0: usize, c1: usize) -> PathBuf {
    let x0 = ORIGIN_X + c0 as f64 * CELL;
    let x1 = ORIGIN_X + c1 as f64 * CELL;
    let y0 = ORIGIN_Y - r1 as f64 * CELL;
    let y1 = ORIGIN_Y - r0 as f64 * CELL;

    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [{{
            "type": "Feature", "properties": {{"name": "land"}},
            "geometry": {{"type": "Polygon", "coordinates": [[
                [{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]
            ]]}}
        }}]}}"#
    );

    let path = dir.join("land.geojson");
    std::fs::write(&path, text).unwrap();
    path
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn uniform_scene_collapses_to_zero() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    let scene = write_scene(inputs.path(), 2, 2, |_, _| 100, |_, _| 200);
    let land = write_land(inputs.path(), 0, 2, 0, 2);
    let output = outputs.path().join("fvc.tif");

    let report = run_pipeline(&land, &scene, &output, &PipelineConfig::default()).unwrap();

    assert_eq!((report.width, report.height, report.bands), (2, 2, 4));
    assert_eq!(report.mask_cells, 4);
    let fit = report.fit.unwrap();
    assert_relative_eq!(fit.mean, 1.0 / 3.0, epsilon = 1e-10);
    assert_eq!(fit.std_dev, 0.0);

    let cover: Raster<f64> = read_geotiff(&output, None).unwrap();
    assert_eq!(cover.shape(), (2, 2));
    assert!(cover.data().iter().all(|&v| v == 0.0));
    assert_eq!(*cover.transform(), scene_transform());
    assert_eq!(cover.crs().and_then(CRS::epsg), Some(32651));
}

#[test]
fn mixed_scene_follows_cover_rule() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    let (rows, cols) = (6, 8);
    let red = |r: usize, c: usize| (300 + 40 * r + 15 * c) as u16;
    let nir = |r: usize, c: usize| (900 + 120 * c + 35 * r * r) as u16;
    let scene = write_scene(inputs.path(), rows, cols, red, nir);
    // Land covers the first five columns
    let land = write_land(inputs.path(), 0, rows, 0, 5);
    let output = outputs.path().join("fvc.tif");

    let report = run_pipeline(&land, &scene, &output, &PipelineConfig::default()).unwrap();
    assert_eq!(report.mask_cells, rows * 5);

    // Expected index and fit computed independently of the pipeline
    let ndvi = |r: usize, c: usize| {
        let (n, d) = (nir(r, c) as f64, red(r, c) as f64);
        (n - d) / (n + d)
    };
    let land_values: Vec<f64> = (0..rows)
        .flat_map(|r| (0..5).map(move |c| (r, c)))
        .map(|(r, c)| ndvi(r, c))
        .collect();
    let fit = NormalFit::from_values(land_values.clone()).unwrap();
    let ci = fit.interval(0.95).unwrap();

    let reported = report.fit.unwrap();
    assert_relative_eq!(reported.mean, fit.mean, epsilon = 1e-12);
    assert_relative_eq!(reported.std_dev, fit.std_dev, epsilon = 1e-12);
    assert_relative_eq!(
        ci.width(),
        2.0 * 1.959964 * fit.std_dev,
        epsilon = 1e-6
    );
    assert_eq!(report.summary.valid(), rows * 5);
    assert_eq!(report.summary.nodata, rows * 3);

    let cover: Raster<f64> = read_geotiff(&output, Some(1)).unwrap();
    for r in 0..rows {
        for c in 0..cols {
            let got = cover.get(r, c).unwrap();
            if c >= 5 {
                assert!(got.is_nan(), "({r}, {c}) outside land should be NaN, got {got}");
                continue;
            }
            let v = ndvi(r, c);
            let expected = if v < ci.lower {
                0.0
            } else if v <= ci.upper {
                (v - ci.lower) / (ci.upper - ci.lower)
            } else {
                v
            };
            // Output is stored as Float32
            assert_relative_eq!(got, expected, epsilon = 1e-6);
        }
    }
}

#[test]
fn scratch_mask_is_removed() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    let scene = write_scene(inputs.path(), 3, 3, |_, c| 100 + c as u16, |r, _| 400 + r as u16);
    let land = write_land(inputs.path(), 0, 3, 0, 3);
    let output = outputs.path().join("fvc.tif");

    run_pipeline(&land, &scene, &output, &PipelineConfig::default()).unwrap();
    assert_eq!(entries(outputs.path()), vec!["fvc.tif".to_string()]);
}

#[test]
fn scratch_mask_is_removed_on_failure() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    let scene = write_scene(inputs.path(), 3, 3, |_, _| 100, |_, _| 300);
    let land = write_land(inputs.path(), 0, 3, 0, 3);
    // A directory where the output file should be makes the final write fail
    let output = outputs.path().join("fvc.tif");
    std::fs::create_dir(&output).unwrap();

    assert!(run_pipeline(&land, &scene, &output, &PipelineConfig::default()).is_err());
    assert_eq!(entries(outputs.path()), vec!["fvc.tif".to_string()]);
}

#[test]
fn land_outside_scene_gives_undefined_cover() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    let scene = write_scene(inputs.path(), 3, 4, |_, _| 100, |_, _| 300);
    // Window far to the east of the scene
    let land = write_land(inputs.path(), 0, 3, 100, 104);
    let output = outputs.path().join("fvc.tif");

    let report = run_pipeline(&land, &scene, &output, &PipelineConfig::default()).unwrap();
    assert_eq!(report.mask_cells, 0);
    assert!(report.fit.is_none());

    let cover: Raster<f64> = read_geotiff(&output, None).unwrap();
    assert!(cover.data().iter().all(|v| v.is_nan()));
}

#[test]
fn custom_band_order() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();

    // NIR stored in band 0 here, red in band 1
    let data = Array3::from_shape_fn((2, 2, 3), |(b, _, c)| if b == 0 { 500 + c as u16 * 100 } else { 100u16 });
    let mut stack = RasterStack::from_array(data);
    stack.set_transform(scene_transform());
    let scene = inputs.path().join("two_band.tif");
    write_raster(&stack, &scene, None).unwrap();
    let land = write_land(inputs.path(), 0, 2, 0, 3);
    let output = outputs.path().join("fvc.tif");

    let default_err = run_pipeline(&land, &scene, &output, &PipelineConfig::default());
    assert!(matches!(default_err, Err(Error::InvalidParameter { name: "nir_band", .. })));

    let config = PipelineConfig {
        nir_band: 0,
        red_band: 1,
        ..Default::default()
    };
    let report = run_pipeline(&land, &scene, &output, &config).unwrap();
    assert_eq!(report.bands, 2);
    assert_eq!(report.summary.valid(), 6);

    let written: RasterStack<f64> = read_raster(&output).unwrap();
    assert_eq!(written.band_count(), 1);
}

#[test]
fn missing_inputs_are_reported() {
    let inputs = TempDir::new().unwrap();
    let outputs = TempDir::new().unwrap();
    let scene = write_scene(inputs.path(), 2, 2, |_, _| 100, |_, _| 200);
    let land = write_land(inputs.path(), 0, 2, 0, 2);
    let output = outputs.path().join("fvc.tif");

    assert!(matches!(
        run_pipeline(inputs.path().join("nope.geojson"), &scene, &output, &PipelineConfig::default()),
        Err(Error::VectorOpen { .. })
    ));
    assert!(matches!(
        run_pipeline(&land, inputs.path().join("nope.tif"), &output, &PipelineConfig::default()),
        Err(Error::DatasetOpen { .. })
    ));
    assert!(entries(outputs.path()).is_empty());
}
