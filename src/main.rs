use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::ImageFormat;
use slide_normalize::batch::{self, BatchReport};
use slide_normalize::config::{PadConfig, RescaleConfig, RescaleManifest, TiledConfig};
use slide_normalize::{NormalizeError, ResampleFilter, Size};
use tile_scale::TiledRescalePipeline;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Normalize whole-slide scans for tiling pipelines:
/// - pad images to a multiple of the tile size
/// - rescale them to a common physical pixel size, chunk by chunk
#[derive(Parser, Debug)]
#[command(name = "slidenorm")]
#[command(about = "Pad and rescale gigapixel slide images for tiling")]
#[command(long_about = "Pad and rescale gigapixel slide images for tiling.
Logging verbosity follows RUST_LOG (default: info).")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pad one image so both sides are multiples of the tile size
    Pad {
        input: PathBuf,

        /// Output path (default: <stem>_adjusted.png next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        margin: MarginArgs,
    },

    /// Pad every image of a directory into <output_dir>/<stem>_adjusted.png
    PadDir {
        input_dir: PathBuf,
        output_dir: PathBuf,

        #[command(flatten)]
        margin: MarginArgs,

        /// Pause between images, e.g. 500ms, 2s
        #[arg(long, default_value = "0s")]
        throttle: String,
    },

    /// Rescale one image to a target physical pixel size and align it to the tile size
    Tile {
        input: PathBuf,
        output: PathBuf,

        /// Physical width of the scan (e.g. µm)
        #[arg(long)]
        physical_width: f64,

        /// Physical height of the scan
        #[arg(long)]
        physical_height: f64,

        /// Physical size of one output pixel
        #[arg(long, default_value_t = 1.0)]
        target_pixel_size: f64,

        #[arg(long, default_value_t = 1024)]
        chunk_width: u32,

        #[arg(long, default_value_t = 1024)]
        chunk_height: u32,

        /// Output sides are rounded up to a multiple of this
        #[arg(long, default_value_t = 256)]
        tile_alignment: usize,

        /// Canvas and margin fill value
        #[arg(long, default_value_t = 255)]
        background: u8,

        /// Worker threads (default: available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,

        #[arg(long, value_enum, default_value_t = ResampleFilter::Lanczos3)]
        filter: ResampleFilter,

        /// Output format: tiff, png, jpeg (default: tiff)
        #[arg(long, default_value = "tiff")]
        format: String,

        /// Print the chunk plan and output size without processing
        #[arg(long)]
        dry_run: bool,
    },

    /// Rescale the images of a directory by a JSON manifest of raw/target sizes
    Rescale {
        directory: PathBuf,
        manifest: PathBuf,

        /// Write <stem>-scaled.png here instead of next to the inputs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = ResampleFilter::Lanczos3)]
        filter: ResampleFilter,

        /// Keep an alpha channel instead of dropping it
        #[arg(long)]
        keep_alpha: bool,
    },
}

#[derive(Args, Debug)]
struct MarginArgs {
    /// Tile size both sides are padded to a multiple of
    #[arg(short, long, default_value_t = 256)]
    multiple: usize,

    /// Margin fill value
    #[arg(long, default_value_t = 255, conflicts_with = "edge")]
    fill: u8,

    /// Replicate edge pixels into the margin instead of filling it
    #[arg(long)]
    edge: bool,
}

impl MarginArgs {
    fn to_config(&self) -> PadConfig {
        PadConfig::new(self.multiple, (!self.edge).then_some(self.fill))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            if let Some(hint) = e
                .downcast_ref::<NormalizeError>()
                .and_then(NormalizeError::recovery_suggestion)
            {
                info!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every file succeeded.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Pad {
            input,
            output,
            margin,
        } => {
            let config = margin.to_config();
            config.validate()?;
            let output = output.unwrap_or_else(|| {
                let dir = input.parent().map(PathBuf::from).unwrap_or_default();
                batch::derived_output(&dir, &input, batch::PAD_SUFFIX)
            });
            let size = batch::pad_image(&input, &output, &config)?;
            info!("Saved {}x{} to {}", size.w, size.h, output.display());
            Ok(true)
        }
        Command::PadDir {
            input_dir,
            output_dir,
            margin,
            throttle,
        } => {
            let config = PadConfig {
                throttle: parse_duration(&throttle)?,
                ..margin.to_config()
            };
            let report = batch::pad_directory(&input_dir, &output_dir, &config)?;
            Ok(summarize(&report))
        }
        Command::Tile {
            input,
            output,
            physical_width,
            physical_height,
            target_pixel_size,
            chunk_width,
            chunk_height,
            tile_alignment,
            background,
            workers,
            filter,
            format,
            dry_run,
        } => {
            let config = TiledConfig {
                physical_width,
                physical_height,
                target_pixel_size,
                chunk_width,
                chunk_height,
                tile_alignment,
                background,
                workers,
                filter,
            };
            config.validate()?;
            if dry_run {
                return print_plan(&input, &config).map(|_| true);
            }
            let format = parse_format(&format)?;
            let size = batch::tile_image(&input, &output, format, &config)?;
            info!("Saved {}x{} to {}", size.w, size.h, output.display());
            Ok(true)
        }
        Command::Rescale {
            directory,
            manifest,
            output_dir,
            filter,
            keep_alpha,
        } => {
            let manifest = RescaleManifest::load(&manifest)?;
            info!("Loaded {} manifest entries", manifest.len());
            let config = RescaleConfig {
                filter,
                drop_alpha: !keep_alpha,
                ..RescaleConfig::default()
            };
            let report =
                batch::rescale_directory(&directory, &manifest, output_dir.as_deref(), &config)?;
            Ok(summarize(&report))
        }
    }
}

/// Plan a tiled run from the image header alone.
fn print_plan(input: &std::path::Path, config: &TiledConfig) -> Result<()> {
    let (w, h) = image::image_dimensions(input)
        .with_context(|| format!("reading dimensions of {}", input.display()))?;
    let pipeline = TiledRescalePipeline::new(config.to_tiled_cfg());
    let plan = pipeline.plan(Size::new(w, h), config.physical(), config.target_pixel_size)?;
    println!("source:   {}x{}", w, h);
    println!(
        "scale:    {:.4} x {:.4}",
        plan.layout.scale.x, plan.layout.scale.y
    );
    println!(
        "chunks:   {} ({} cols x {} rows)",
        plan.grid.len(),
        plan.grid.cols,
        plan.grid.rows
    );
    println!("canvas:   {}x{}", plan.layout.canvas.w, plan.layout.canvas.h);
    println!("aligned:  {}x{}", plan.aligned.w, plan.aligned.h);
    Ok(())
}

fn summarize(report: &BatchReport) -> bool {
    for (path, reason) in &report.failed {
        warn!("Failed: {} ({})", path.display(), reason);
    }
    info!(
        "Done: {} processed, {} skipped, {} failed",
        report.processed.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report.is_success()
}

/// Parse a pause like "500ms", "2s", "1m" or bare seconds
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let split = duration
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("Invalid duration format: {}", duration))?;
    let (num_str, unit) = duration.split_at(split);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(Duration::from_secs(num)),
        "m" => Ok(Duration::from_secs(num * 60)),
        _ => Err(anyhow::anyhow!(
            "Invalid duration unit: {}. Use 'ms', 's' or 'm'",
            unit
        )),
    }
}

/// Parse an output format name or extension
fn parse_format(format: &str) -> Result<ImageFormat> {
    ImageFormat::from_extension(format.to_lowercase()).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid output format: {}. Use: tiff, png, jpeg",
            format
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("3h").is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("tiff").unwrap(), ImageFormat::Tiff);
        assert_eq!(parse_format("TIF").unwrap(), ImageFormat::Tiff);
        assert_eq!(parse_format("png").unwrap(), ImageFormat::Png);
        assert!(parse_format("mp4").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "slidenorm", "tile", "in.svs.tif", "out.tif",
            "--physical-width", "2000", "--physical-height", "1000",
            "--filter", "catmull-rom", "-w", "4",
        ])
        .unwrap();
        match cli.command {
            Command::Tile { filter, workers, format, .. } => {
                assert_eq!(filter, ResampleFilter::CatmullRom);
                assert_eq!(workers, Some(4));
                assert_eq!(format, "tiff");
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["slidenorm", "pad-dir", "in", "out", "--edge", "-m", "128"]).unwrap();
        match cli.command {
            Command::PadDir { margin, .. } => {
                let config = margin.to_config();
                assert_eq!(config.multiple, 128);
                assert_eq!(config.fill, None);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["slidenorm", "pad", "a.png", "--edge", "--fill", "0"]).is_err());
    }
}
