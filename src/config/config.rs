//! # Configuration Module
//!
//! Configuration structures and validation for the normalization tools. They
//! are the common interface between the `slidenorm` CLI and the library, and
//! convert into the core crate's [`TiledCfg`](tile_scale::TiledCfg).
//!
//! ## Tiled Rescale Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `physical_width` | `f64` | required | Scan width in physical units (µm) |
//! | `physical_height` | `f64` | required | Scan height in physical units (µm) |
//! | `target_pixel_size` | `f64` | `1.0` | Physical size of one output pixel |
//! | `chunk_width` | `u32` | `1024` | Nominal chunk width in source pixels |
//! | `chunk_height` | `u32` | `1024` | Nominal chunk height in source pixels |
//! | `tile_alignment` | `usize` | `256` | Output sides are multiples of this |
//! | `background` | `u8` | `255` | Canvas and margin fill value |
//! | `workers` | `Option<usize>` | `None` | Dedicated pool size, global pool if unset |
//! | `filter` | `ResampleFilter` | `lanczos3` | Resampling kernel |
//!
//! ## Examples
//!
//! ```rust
//! use slide_normalize::config::config::{PadConfig, TiledConfig};
//!
//! let tiled = TiledConfig::new(40_000.0, 20_000.0, 0.5);
//! assert!(tiled.validate().is_ok());
//!
//! let pad = PadConfig::default();
//! assert_eq!(pad.multiple, 256);
//! ```

use std::time::Duration;

use tile_scale::plan::{PhysicalSize, Size};
use tile_scale::{ResampleFilter, TiledCfg};

use crate::error::{NormalizeError, NormalizeResult};

/// Extensions accepted by the directory drivers, compared case-insensitively.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// Parameters of a physical-size driven tiled rescale.
///
/// # Examples
///
/// ```rust
/// use slide_normalize::config::config::TiledConfig;
///
/// let config = TiledConfig {
///     chunk_width: 2048,
///     chunk_height: 2048,
///     workers: Some(8),
///     ..TiledConfig::new(40_000.0, 20_000.0, 0.25)
/// };
/// assert_eq!(config.to_tiled_cfg().chunk.w, 2048);
/// ```
#[derive(Clone, Debug)]
pub struct TiledConfig {
    /// Physical width of the scan.
    pub physical_width: f64,

    /// Physical height of the scan.
    pub physical_height: f64,

    /// Physical size of one output pixel, in the unit of the physical extent.
    ///
    /// Each axis is scaled by `physical / pixels / target_pixel_size`, so the
    /// two axes may scale differently.
    pub target_pixel_size: f64,

    /// Nominal chunk width. Edge chunks are clipped, never padded.
    pub chunk_width: u32,

    /// Nominal chunk height.
    pub chunk_height: u32,

    /// Final canvas sides are rounded up to a multiple of this.
    pub tile_alignment: usize,

    /// Neutral background value for the canvas and the alignment margin.
    pub background: u8,

    /// Size of a dedicated worker pool. `None` shares the global rayon pool.
    pub workers: Option<usize>,

    pub filter: ResampleFilter,
}

impl Default for TiledConfig {
    /// Unit physical size and unit target pixel size: rescale is a no-op and
    /// only chunking and alignment apply.
    fn default() -> Self {
        let core = TiledCfg::default();
        Self {
            physical_width: 1.0,
            physical_height: 1.0,
            target_pixel_size: 1.0,
            chunk_width: core.chunk.w,
            chunk_height: core.chunk.h,
            tile_alignment: core.tile_alignment,
            background: core.background,
            workers: None,
            filter: core.filter,
        }
    }
}

impl TiledConfig {
    /// Configuration for a scan of the given physical extent, every other
    /// field at its default.
    pub fn new(physical_width: f64, physical_height: f64, target_pixel_size: f64) -> Self {
        Self {
            physical_width,
            physical_height,
            target_pixel_size,
            ..Self::default()
        }
    }

    /// Validates the configuration parameters.
    ///
    /// Scale factors themselves depend on the decoded image size and are
    /// checked again by the pipeline.
    pub fn validate(&self) -> NormalizeResult<()> {
        let positive = |field: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(NormalizeError::config(
                    field,
                    value.to_string(),
                    "must be finite and greater than 0",
                ))
            }
        };
        positive("physical_width", self.physical_width)?;
        positive("physical_height", self.physical_height)?;
        positive("target_pixel_size", self.target_pixel_size)?;

        if self.chunk_width == 0 || self.chunk_height == 0 {
            return Err(NormalizeError::config(
                "chunk",
                format!("{}x{}", self.chunk_width, self.chunk_height),
                "both chunk sides must be greater than 0",
            ));
        }
        if self.tile_alignment == 0 {
            return Err(NormalizeError::config(
                "tile_alignment",
                "0",
                "must be greater than 0",
            ));
        }
        if self.workers == Some(0) {
            return Err(NormalizeError::config(
                "workers",
                "0",
                "must be greater than 0 when set",
            ));
        }
        Ok(())
    }

    pub fn physical(&self) -> PhysicalSize {
        PhysicalSize {
            width: self.physical_width,
            height: self.physical_height,
        }
    }

    /// Convert to the core pipeline configuration.
    pub fn to_tiled_cfg(&self) -> TiledCfg {
        TiledCfg {
            chunk: Size::new(self.chunk_width, self.chunk_height),
            tile_alignment: self.tile_alignment,
            background: self.background,
            filter: self.filter,
        }
    }
}

/// Parameters of the pad-to-multiple operation.
#[derive(Clone, Debug)]
pub struct PadConfig {
    /// Both spatial sides are grown to a multiple of this.
    pub multiple: usize,

    /// Constant fill for the margin. `None` replicates the edge pixels.
    pub fill: Option<u8>,

    /// Lower-case file extensions picked up by the directory driver.
    pub extensions: Vec<String>,

    /// Pause between consecutive images of a directory run.
    pub throttle: Duration,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            multiple: 256,
            fill: Some(255),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            throttle: Duration::ZERO,
        }
    }
}

impl PadConfig {
    pub fn new(multiple: usize, fill: Option<u8>) -> Self {
        Self {
            multiple,
            fill,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> NormalizeResult<()> {
        if self.multiple == 0 {
            return Err(NormalizeError::config(
                "multiple",
                "0",
                "must be greater than 0",
            ));
        }
        validate_extensions(&self.extensions)
    }
}

/// Parameters of the manifest-driven rescale.
#[derive(Clone, Debug)]
pub struct RescaleConfig {
    pub filter: ResampleFilter,

    /// Discard an alpha channel before rescaling.
    pub drop_alpha: bool,

    /// Lower-case file extensions picked up by the directory driver.
    pub extensions: Vec<String>,
}

impl Default for RescaleConfig {
    fn default() -> Self {
        Self {
            filter: ResampleFilter::default(),
            drop_alpha: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl RescaleConfig {
    pub fn validate(&self) -> NormalizeResult<()> {
        validate_extensions(&self.extensions)
    }
}

fn validate_extensions(extensions: &[String]) -> NormalizeResult<()> {
    if extensions.is_empty() {
        return Err(NormalizeError::config(
            "extensions",
            "[]",
            "at least one extension is required",
        ));
    }
    if let Some(bad) = extensions
        .iter()
        .find(|e| e.is_empty() || e.starts_with('.'))
    {
        return Err(NormalizeError::config(
            "extensions",
            bad.clone(),
            "extensions are given without a leading dot",
        ));
    }
    Ok(())
}
