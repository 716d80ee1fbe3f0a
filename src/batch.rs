//! # Batch Drivers
//!
//! Single-image operations and the directory loops built on them:
//!
//! - [`pad_image`] / [`pad_directory`]: grow both sides to a tile multiple
//! - [`rescale_image`] / [`rescale_directory`]: manifest-driven single-pass rescale
//! - [`tile_image`]: physical-size driven tiled rescale plus alignment
//!
//! Directory loops walk files in sorted order, log `[i/n]` progress and keep
//! going past per-image failures. Errors [`classify::is_fatal`] deems fatal
//! abort the run. The outcome of every file lands in a [`BatchReport`].

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use image::ImageFormat;
use tile_scale::plan::Size;
use tile_scale::{align_to_multiple, rescale_whole, FirResampler, TiledRescalePipeline};
use tracing::{error, info, warn};

use crate::config::{ManifestEntry, PadConfig, RescaleConfig, RescaleManifest, TiledConfig};
use crate::error::{classify, NormalizeError, NormalizeResult};
use crate::raster::{self, DecodeOptions};

/// Suffix appended to the stem of padded images.
pub const PAD_SUFFIX: &str = "_adjusted";
/// Suffix appended to the stem of manifest-rescaled images.
pub const RESCALE_SUFFIX: &str = "-scaled";

/// Per-file outcome of a directory run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Output paths written.
    pub processed: Vec<PathBuf>,
    /// Inputs left untouched, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Inputs that failed, with the error message.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, input: &Path, result: NormalizeResult<PathBuf>) -> NormalizeResult<()> {
        match result {
            Ok(output) => {
                info!("Saved to {}", output.display());
                self.processed.push(output);
                Ok(())
            }
            Err(e) if classify::is_fatal(&e) => Err(e),
            Err(e) => {
                error!("Error processing {}: {}", input.display(), e);
                self.failed.push((input.to_path_buf(), e.to_string()));
                Ok(())
            }
        }
    }
}

/// Image files of `dir` with one of `extensions`, sorted by path.
pub fn list_images(dir: &Path, extensions: &[String]) -> NormalizeResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| NormalizeError::io_at("read directory", dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| NormalizeError::io_at("read directory entry", dir, e))?
            .path();
        if path.is_file() && raster::has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<dir>/<stem><suffix>.png`
pub fn derived_output(dir: &Path, input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{}{}.png", stem, suffix))
}

/// Pad one image to a multiple of `cfg.multiple` and write it to `output`.
/// The output format follows the extension of `output`, PNG if it has none.
pub fn pad_image(input: &Path, output: &Path, cfg: &PadConfig) -> NormalizeResult<Size> {
    let buffer = raster::decode(input)?;
    let (rows, cols, _) = buffer.dim();
    let padded = align_to_multiple(&buffer, cfg.multiple, cfg.fill)?;
    let (out_rows, out_cols, _) = padded.dim();
    info!(
        "Pad {}: {}x{} -> {}x{}",
        input.display(),
        cols,
        rows,
        out_cols,
        out_rows
    );
    let format = raster::format_for_path(output).unwrap_or(ImageFormat::Png);
    raster::encode(padded.view(), output, format)?;
    Ok(Size::new(out_cols as u32, out_rows as u32))
}

/// Pad every image of `input_dir` into `output_dir` as `<stem>_adjusted.png`.
pub fn pad_directory(
    input_dir: &Path,
    output_dir: &Path,
    cfg: &PadConfig,
) -> NormalizeResult<BatchReport> {
    cfg.validate()?;
    let files = list_images(input_dir, &cfg.extensions)?;
    if files.is_empty() {
        warn!("No images found in {}", input_dir.display());
    }
    fs::create_dir_all(output_dir)
        .map_err(|e| NormalizeError::io_at("create output directory", output_dir, e))?;

    let mut report = BatchReport::default();
    let n = files.len();
    for (i, input) in files.iter().enumerate() {
        info!("[{}/{}] Processing {}", i + 1, n, input.display());
        let output = derived_output(output_dir, input, PAD_SUFFIX);
        let result = pad_image(input, &output, cfg).map(|_| output);
        report.record(input, result)?;
        if !cfg.throttle.is_zero() && i + 1 < n {
            thread::sleep(cfg.throttle);
        }
    }
    info!(
        "Padded {} of {} images ({} failed)",
        report.processed.len(),
        n,
        report.failed.len()
    );
    Ok(report)
}

/// Rescale one image by the manifest entry's `target / raw` factors.
pub fn rescale_image(
    input: &Path,
    output: &Path,
    entry: &ManifestEntry,
    cfg: &RescaleConfig,
) -> NormalizeResult<Size> {
    let scale = entry.scale()?;
    let buffer = raster::decode_with(
        input,
        DecodeOptions {
            drop_alpha: cfg.drop_alpha,
        },
    )?;
    let resampler = FirResampler::new(cfg.filter);
    let scaled = rescale_whole(buffer.view(), scale, &resampler)?;
    let (rows, cols, _) = scaled.dim();
    let format = raster::format_for_path(output).unwrap_or(ImageFormat::Png);
    raster::encode(scaled.view(), output, format)?;
    Ok(Size::new(cols as u32, rows as u32))
}

/// Rescale every image of `dir` listed in `manifest` (keyed by file stem)
/// and write `<stem>-scaled.png` into `output_dir`, or next to the input.
pub fn rescale_directory(
    dir: &Path,
    manifest: &RescaleManifest,
    output_dir: Option<&Path>,
    cfg: &RescaleConfig,
) -> NormalizeResult<BatchReport> {
    cfg.validate()?;
    let files = list_images(dir, &cfg.extensions)?;
    if files.is_empty() {
        return Err(NormalizeError::no_images(dir)
            .with_operation("rescale")
            .with_metadata("extensions", cfg.extensions.join(","))
            .with_recovery_suggestion(format!(
                "check the directory path; accepted extensions are {}",
                cfg.extensions.join(", ")
            )));
    }
    let output_dir = output_dir.unwrap_or(dir);

    let mut report = BatchReport::default();
    let n = files.len();
    for (i, input) in files.iter().enumerate() {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(entry) = manifest.get(&stem) else {
            warn!("[{}/{}] No manifest entry for {}, skipping", i + 1, n, stem);
            report
                .skipped
                .push((input.clone(), "no manifest entry".to_string()));
            continue;
        };
        info!("[{}/{}] Processing {}", i + 1, n, input.display());
        let output = derived_output(output_dir, input, RESCALE_SUFFIX);
        let result = rescale_image(input, &output, entry, cfg).map(|_| output);
        report.record(input, result)?;
    }
    info!(
        "Rescaled {} of {} images ({} skipped, {} failed)",
        report.processed.len(),
        n,
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Run one image through the tiled rescale pipeline and write the aligned
/// result to `output` in `format`.
pub fn tile_image(
    input: &Path,
    output: &Path,
    format: ImageFormat,
    cfg: &TiledConfig,
) -> NormalizeResult<Size> {
    cfg.validate()?;
    let mut pipeline = TiledRescalePipeline::new(cfg.to_tiled_cfg());
    if let Some(workers) = cfg.workers {
        pipeline = pipeline.with_workers(workers)?;
    }
    let buffer = raster::decode(input)?;
    let out = pipeline
        .run(buffer.view(), cfg.physical(), cfg.target_pixel_size)
        .map_err(|e| NormalizeError::from(e).with_context(input.display().to_string()))?;
    drop(buffer);
    let (rows, cols, _) = out.dim();
    raster::encode(out.view(), output, format)?;
    Ok(Size::new(cols as u32, rows as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn derived_output_names() {
        let out = derived_output(Path::new("/out"), Path::new("/in/slide 01.tif"), PAD_SUFFIX);
        assert_eq!(out, PathBuf::from("/out/slide 01_adjusted.png"));
        let out = derived_output(Path::new("/in"), Path::new("/in/s.JPG"), RESCALE_SUFFIX);
        assert_eq!(out, PathBuf::from("/in/s-scaled.png"));
    }

    #[test]
    fn report_counts_and_fatal_errors_abort() {
        let mut report = BatchReport::default();
        report
            .record(Path::new("a.png"), Ok(PathBuf::from("a_adjusted.png")))
            .unwrap();
        let per_image = NormalizeError::io("read", std::io::Error::from(std::io::ErrorKind::NotFound));
        report.record(Path::new("b.png"), Err(per_image)).unwrap();
        assert_eq!(report.total(), 2);
        assert!(!report.is_success());

        let fatal = NormalizeError::config("multiple", "0", "must be greater than 0");
        assert!(report.record(Path::new("c.png"), Err(fatal)).is_err());
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn pad_image_writes_aligned_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let src = Array3::from_elem((100, 300, 3), 10u8);
        raster::encode(src.view(), &input, ImageFormat::Png).unwrap();

        let output = dir.path().join("out.png");
        let size = pad_image(&input, &output, &PadConfig::default()).unwrap();
        assert_eq!(size, Size::new(512, 256));

        let padded = raster::decode(&output).unwrap();
        assert_eq!(padded.dim(), (256, 512, 3));
        assert_eq!(padded[[99, 299, 0]], 10);
        assert_eq!(padded[[100, 0, 0]], 255);
        assert_eq!(padded[[0, 300, 2]], 255);
    }

    #[test]
    fn list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.tif", "notes.txt", "c.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();
        let files = list_images(dir.path(), &PadConfig::default().extensions).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.tif", "b.PNG", "c.jpeg"]);
    }
}
