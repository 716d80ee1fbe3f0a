//! # Configuration Module
//!
//! Run configurations for the normalization tools and the JSON manifest read
//! by the manifest-driven rescale.

pub mod config;
pub mod manifest;

pub use config::{PadConfig, RescaleConfig, TiledConfig, DEFAULT_EXTENSIONS};
pub use manifest::{ManifestEntry, RescaleManifest};
