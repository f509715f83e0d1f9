//! fvc CLI - fractional vegetation cover from a multi-band image and a land mask

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fvc_algorithms::imagery::CoverParams;
use fvc_algorithms::pipeline::{run_pipeline, PipelineConfig, PipelineReport};
use fvc_algorithms::statistics::NormalFit;
use fvc_algorithms::vector::{rasterize, GridSpec, RasterizeParams};
use fvc_core::io::{read_raster, read_vector, write_geotiff, GeoTiffOptions};
use fvc_core::{RasterElement, RasterStack};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fvc")]
#[command(author, version, about = "Fractional vegetation cover from a multi-band image and a land mask", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute fractional vegetation cover inside a land mask
    Cover {
        /// Polygon layer delimiting the land area
        vector: PathBuf,
        /// Multi-band image (grid, georeference and bands)
        template: PathBuf,
        /// Output cover raster
        output: PathBuf,
        /// 0-based index of the near-infrared band
        #[arg(long, default_value_t = 3)]
        nir_band: usize,
        /// 0-based index of the red band
        #[arg(long, default_value_t = 2)]
        red_band: usize,
        /// Probability mass of the fitted-normal interval
        #[arg(long, default_value_t = 0.95)]
        confidence: f64,
        /// Burn only cells whose center lies inside a polygon
        #[arg(long)]
        center_only: bool,
        /// Output compression (DEFLATE, LZW, ZSTD, NONE)
        #[arg(long)]
        compress: Option<String>,
    },
    /// Burn a polygon layer onto the grid of a raster
    Mask {
        /// Polygon layer
        vector: PathBuf,
        /// Raster supplying the grid
        template: PathBuf,
        /// Output mask raster (Byte)
        output: PathBuf,
        /// Value written into covered cells
        #[arg(long, default_value_t = 1)]
        burn_value: u8,
        /// Burn only cells whose center lies inside a polygon
        #[arg(long)]
        center_only: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_stack(path: &PathBuf) -> Result<RasterStack<f64>> {
    let pb = spinner("Reading raster...");
    let stack: RasterStack<f64> = read_raster(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} x {}, {} bands",
        stack.width(),
        stack.height(),
        stack.band_count()
    );
    Ok(stack)
}

fn rasterize_params(center_only: bool, burn_value: u8) -> RasterizeParams {
    RasterizeParams {
        burn_value,
        all_touched: !center_only,
    }
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_report(report: &PipelineReport) {
    println!(
        "  Grid: {} x {}, {} bands, {} cells in mask",
        report.width, report.height, report.bands, report.mask_cells
    );
    match (&report.fit, &report.interval) {
        (Some(fit), Some(interval)) => {
            println!("  Index mean: {:.6}  std: {:.6}  (n = {})", fit.mean, fit.std_dev, fit.count);
            println!(
                "  {:.0}% interval: [{:.6}, {:.6}]",
                interval.confidence * 100.0,
                interval.lower,
                interval.upper
            );
            let s = &report.summary;
            println!(
                "  Cells below: {}  inside: {}  above: {}  undefined: {}",
                s.below, s.inside, s.above, s.nodata
            );
        }
        _ => println!("  No defined index cells: cover is undefined everywhere"),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Cover {
            vector,
            template,
            output,
            nir_band,
            red_band,
            confidence,
            center_only,
            compress,
        } => {
            let mut output_options = GeoTiffOptions::default();
            if let Some(compression) = compress {
                output_options.compression = compression.to_uppercase();
            }
            let config = PipelineConfig {
                nir_band,
                red_band,
                cover: CoverParams { confidence },
                rasterize: rasterize_params(center_only, 1),
                output: output_options,
            };

            let start = Instant::now();
            let pb = spinner("Computing vegetation cover...");
            let report = run_pipeline(&vector, &template, &output, &config);
            pb.finish_and_clear();
            let report = report.context("Vegetation cover failed")?;
            let elapsed = start.elapsed();

            done("Vegetation cover", &output, elapsed);
            print_report(&report);
        }

        Commands::Mask {
            vector,
            template,
            output,
            burn_value,
            center_only,
        } => {
            let layer = read_vector(&vector)
                .with_context(|| format!("Failed to read vector {}", vector.display()))?;
            let stack = read_stack(&template)?;

            let start = Instant::now();
            let mask = rasterize(
                &layer,
                &GridSpec::of_stack(&stack),
                rasterize_params(center_only, burn_value),
            )
            .context("Rasterization failed")?;
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...");
            write_geotiff(&mask, &output, Some(GeoTiffOptions::default()))
                .context("Failed to write output")?;
            pb.finish_and_clear();

            done("Mask", &output, elapsed);
            let burned = mask.data().iter().filter(|&&v| v != 0).count();
            println!("  Burned cells: {} of {}", burned, mask.len());
        }

        Commands::Info { input } => {
            let stack = read_stack(&input)?;
            let (min_x, min_y, max_x, max_y) =
                stack.transform().bounds(stack.width(), stack.height());

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} x {} bands",
                stack.width(),
                stack.height(),
                stack.band_count()
            );
            println!("GeoTransform: {:?}", stack.transform().to_gdal());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                min_x, min_y, max_x, max_y
            );
            if let Some(crs) = stack.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = stack.nodata() {
                println!("NoData: {}", nodata);
            }

            println!("\nBands:");
            let nodata = stack.nodata();
            for (i, band) in stack.bands().enumerate() {
                let values = band
                    .iter()
                    .copied()
                    .filter(move |v| !v.is_nodata(nodata));
                match NormalFit::from_values(values.clone()) {
                    Some(fit) => {
                        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                            if v.is_nan() {
                                (lo, hi)
                            } else {
                                (lo.min(v), hi.max(v))
                            }
                        });
                        println!(
                            "  {}: min {:.4}  max {:.4}  mean {:.4}  std {:.4}  valid {}",
                            i, min, max, fit.mean, fit.std_dev, fit.count
                        );
                    }
                    None => println!("  {}: no valid cells", i),
                }
            }
        }
    }

    Ok(())
}
