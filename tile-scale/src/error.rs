// SPDX-License-Identifier: MIT
//! Error type shared by the crop/pad primitive and the tiled rescale pipeline.
//!
//! Everything except [`TileError::ChunkRescaleFailed`] and
//! [`TileError::Resample`] is raised while validating the request, before any
//! buffer is allocated or any chunk is dispatched.

use std::fmt;

use crate::plan::GridCoord;
use crate::resample::ResampleError;

#[derive(Debug)]
pub enum TileError {
    /// Malformed crop/pad request (axis count mismatch, `upper < lower`, zero multiple).
    InvalidExtent { reason: String },
    /// Constant padding requested without a fill value.
    InvalidMode,
    /// A derived scale factor is zero, negative or not finite.
    InvalidScale { scale_x: f64, scale_y: f64 },
    /// Nominal chunk size has a zero side.
    InvalidChunkSize { w: u32, h: u32 },
    /// Input has a zero-length spatial axis.
    EmptySource { shape: Vec<usize> },
    /// A resized or aligned side does not fit in a `u32`.
    Oversize { axis: &'static str, len: u64 },
    /// One chunk's resample failed or returned the wrong size.
    ChunkRescaleFailed {
        coord: GridCoord,
        source: ResampleError,
    },
    /// Single-pass (non-tiled) resample failed.
    Resample(ResampleError),
    /// The dedicated worker pool could not be built.
    WorkerPool(rayon::ThreadPoolBuildError),
}

pub type TileResult<T> = Result<T, TileError>;

impl TileError {
    pub(crate) fn invalid_extent(reason: impl Into<String>) -> Self {
        Self::InvalidExtent {
            reason: reason.into(),
        }
    }

    /// Short, stable name of the variant for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidExtent { .. } => "invalid_extent",
            Self::InvalidMode => "invalid_mode",
            Self::InvalidScale { .. } => "invalid_scale",
            Self::InvalidChunkSize { .. } => "invalid_chunk_size",
            Self::EmptySource { .. } => "empty_source",
            Self::Oversize { .. } => "oversize",
            Self::ChunkRescaleFailed { .. } => "chunk_rescale_failed",
            Self::Resample(_) => "resample",
            Self::WorkerPool(_) => "worker_pool",
        }
    }
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::InvalidExtent { reason } => write!(f, "Invalid extent: {}", reason),
            TileError::InvalidMode => {
                write!(f, "Constant padding requires a constant value")
            }
            TileError::InvalidScale { scale_x, scale_y } => write!(
                f,
                "Invalid scale factors ({}, {}): both must be finite and > 0",
                scale_x, scale_y
            ),
            TileError::InvalidChunkSize { w, h } => {
                write!(f, "Invalid chunk size {}x{}: both sides must be > 0", w, h)
            }
            TileError::EmptySource { shape } => {
                write!(f, "Source image is empty (shape {:?})", shape)
            }
            TileError::Oversize { axis, len } => {
                write!(f, "Resized {} of {} pixels exceeds u32::MAX", axis, len)
            }
            TileError::ChunkRescaleFailed { coord, source } => write!(
                f,
                "Rescale of chunk (row {}, col {}) failed: {}",
                coord.row, coord.col, source
            ),
            TileError::Resample(e) => write!(f, "Rescale failed: {}", e),
            TileError::WorkerPool(e) => write!(f, "Worker pool error: {}", e),
        }
    }
}

impl std::error::Error for TileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileError::ChunkRescaleFailed { source, .. } => Some(source),
            TileError::Resample(e) => Some(e),
            TileError::WorkerPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for TileError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn chunk_failure_names_coordinate_and_keeps_source() {
        let err = TileError::ChunkRescaleFailed {
            coord: GridCoord { row: 2, col: 5 },
            source: ResampleError::UnsupportedChannels(7),
        };
        assert_eq!(err.kind(), "chunk_rescale_failed");
        assert!(err.to_string().contains("row 2, col 5"));
        assert!(err.source().is_some());
    }

    #[test]
    fn validation_errors_have_no_source() {
        let err = TileError::InvalidScale {
            scale_x: 0.0,
            scale_y: 1.0,
        };
        assert!(err.source().is_none());
        assert_eq!(TileError::InvalidMode.kind(), "invalid_mode");
    }

    #[test]
    fn oversize_names_axis_and_length() {
        let err = TileError::Oversize {
            axis: "width",
            len: 10_000_000_000,
        };
        assert_eq!(err.kind(), "oversize");
        assert!(err.to_string().contains("width of 10000000000"));
    }
}
