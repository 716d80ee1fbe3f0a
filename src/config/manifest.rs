//! Rescale manifest: a JSON object mapping image ids (file stems) to their
//! raw and target pixel sizes.
//!
//! ```json
//! {
//!   "slide_001": { "width_raw": 4000, "height_raw": 3000,
//!                  "width_target": 2000, "height_target": 1500 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tile_scale::ScaleFactors;

use crate::error::{NormalizeError, NormalizeResult};

/// Raw and target pixel dimensions of one image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub width_raw: f64,
    pub height_raw: f64,
    pub width_target: f64,
    pub height_target: f64,
}

impl ManifestEntry {
    /// `target / raw` per axis.
    pub fn scale(&self) -> NormalizeResult<ScaleFactors> {
        Ok(ScaleFactors::from_pixel_targets(
            (self.width_raw, self.height_raw),
            (self.width_target, self.height_target),
        )?)
    }

    fn invalid_field(&self) -> Option<(&'static str, f64)> {
        [
            ("width_raw", self.width_raw),
            ("height_raw", self.height_raw),
            ("width_target", self.width_target),
            ("height_target", self.height_target),
        ]
        .into_iter()
        .find(|(_, v)| !(v.is_finite() && *v > 0.0))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RescaleManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl RescaleManifest {
    /// Read and validate a manifest file.
    pub fn load(path: &Path) -> NormalizeResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| NormalizeError::io_at("read manifest", path, e))?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|e| NormalizeError::manifest(Some(path), e))?;
        manifest
            .validate()
            .map_err(|e| e.with_metadata("manifest", path.display().to_string()))?;
        Ok(manifest)
    }

    pub fn from_json_str(text: &str) -> NormalizeResult<Self> {
        let manifest: Self = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every dimension of every entry must be finite and positive.
    pub fn validate(&self) -> NormalizeResult<()> {
        for (id, entry) in &self.entries {
            if let Some((field, value)) = entry.invalid_field() {
                return Err(NormalizeError::config(
                    format!("{}.{}", id, field),
                    value.to_string(),
                    "must be finite and greater than 0",
                ));
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
