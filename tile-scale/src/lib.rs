// SPDX-License-Identifier: MIT
//! # tile-scale: Dimension Normalization for Gigapixel Rasters
//!
//! This crate prepares whole-slide scans for downstream tiling pipelines that
//! need every image side to be an exact multiple of a tile size and every
//! pixel to cover the same physical area.
//!
//! ## Architecture Overview
//!
//! The crate is built around two components:
//! 1. **ExtentPadCrop** ([`extent`]): map any rectangular request, even one
//!    reaching outside the buffer, onto an N-D array by cropping and padding
//! 2. **TiledRescalePipeline** ([`tiled`]): rescale an image chunk by chunk on
//!    a worker pool, reassemble it, then align it through ExtentPadCrop
//!
//! ## Key Components
//!
//! - [`extent`]: `resolve` and `align_to_multiple`
//! - [`plan`]: scale factors, chunk grid partition and canvas layout
//! - [`resample`]: per-chunk resample primitive on fast_image_resize
//! - [`tiled`]: the fan-out / fan-in pipeline and a single-pass variant
//! - [`error`]: the error taxonomy shared by all of the above
//!
//! ## Buffer Layout
//!
//! Rasters are `ndarray::Array3<u8>` shaped `(rows, cols, channels)`. The
//! channel axis is never resampled and never part of a scale factor.
//!
//! ## Usage Example
//!
//! ```rust
//! use ndarray::Array3;
//! use tile_scale::plan::{PhysicalSize, Size};
//! use tile_scale::tiled::{TiledCfg, TiledRescalePipeline};
//!
//! let slide = Array3::<u8>::from_elem((1000, 2000, 3), 128);
//! let pipeline = TiledRescalePipeline::new(TiledCfg {
//!     chunk: Size { w: 1024, h: 1024 },
//!     tile_alignment: 256,
//!     ..TiledCfg::default()
//! });
//! let physical = PhysicalSize { width: 2000.0, height: 1000.0 };
//! let out = pipeline.run(slide.view(), physical, 1.0)?;
//! assert_eq!(out.dim(), (1024, 2048, 3));
//! # Ok::<(), tile_scale::error::TileError>(())
//! ```

pub mod error;
pub mod extent;
pub mod plan;
pub mod resample;
pub mod tiled;

pub use error::{TileError, TileResult};
pub use extent::{align_to_multiple, resolve, PadMode};
pub use plan::{GridCoord, PhysicalSize, ScaleFactors, Size};
pub use resample::{FirResampler, Resample, ResampleFilter};
pub use tiled::{rescale_whole, TiledCfg, TiledRescalePipeline};
