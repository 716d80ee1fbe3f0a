//! # Slide Normalize Library
//!
//! File-level tooling around the `tile_scale` core: prepares whole-slide
//! scans so every side is a multiple of a tile size and every pixel covers
//! the same physical area.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `raster`: decode image files into `(rows, cols, channels)` arrays and back
//! - `config`: run configurations, validation and the JSON rescale manifest
//! - `batch`: single-image operations and the directory drivers built on them
//! - `error`: application errors with context and batch classification
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use slide_normalize::batch::pad_directory;
//! use slide_normalize::config::PadConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let report = pad_directory(Path::new("slides"), Path::new("padded"), &PadConfig::default())?;
//! println!("{} padded, {} failed", report.processed.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod raster;

/// Re-export error types for convenience
pub use error::{NormalizeError, NormalizeResult};

/// Re-export the core types callers need alongside the drivers
pub use tile_scale::{PhysicalSize, ResampleFilter, Size, TileError};

pub use batch::{BatchReport, pad_directory, pad_image, rescale_directory, tile_image};
pub use config::{PadConfig, RescaleConfig, RescaleManifest, TiledConfig};
