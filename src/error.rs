//! # Error Handling
//!
//! Application-level errors for the normalization tools. Every variant carries
//! an [`ErrorContext`] so batch reports and logs can say which file and which
//! step failed.
//!
//! ## Classification
//!
//! Batch drivers keep going past per-image failures (decode, encode, a failed
//! chunk) and stop on anything that would fail every image the same way
//! (bad configuration, unreadable input directory). [`classify::is_fatal`]
//! draws that line.
//!
//! ## Usage
//!
//! ```rust
//! use slide_normalize::error::{NormalizeError, classify};
//!
//! let error = NormalizeError::config("multiple", "0", "must be greater than 0")
//!     .with_context("parsing pad-dir arguments");
//! assert!(classify::is_fatal(&error));
//! ```

use std::{collections::BTreeMap, error::Error as StdError, fmt, path::Path};

use tile_scale::TileError;

/// Metadata about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional free-form context
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Additional metadata as key-value pairs
    pub metadata: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the normalization library
#[derive(Debug)]
pub enum NormalizeError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Raster could not be read
    Decode {
        path: String,
        source: image::ImageError,
        context: ErrorContext,
    },
    /// Raster could not be written
    Encode {
        path: String,
        source: image::ImageError,
        context: ErrorContext,
    },
    /// Buffer layout the encoder cannot represent
    Layout {
        shape: Vec<usize>,
        reason: String,
        context: ErrorContext,
    },
    /// Rescale manifest could not be parsed
    Manifest {
        path: Option<String>,
        source: serde_json::Error,
        context: ErrorContext,
    },
    /// A directory had no image matching the accepted extensions
    NoImages {
        directory: String,
        context: ErrorContext,
    },
    /// Crop/pad or rescale failure from the core
    Processing {
        operation: String,
        source: TileError,
        context: ErrorContext,
    },
}

impl NormalizeError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn decode(path: &Path, source: image::ImageError) -> Self {
        Self::Decode {
            path: path.display().to_string(),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn encode(path: &Path, source: image::ImageError) -> Self {
        Self::Encode {
            path: path.display().to_string(),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn layout(shape: &[usize], reason: impl Into<String>) -> Self {
        Self::Layout {
            shape: shape.to_vec(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn manifest(path: Option<&Path>, source: serde_json::Error) -> Self {
        Self::Manifest {
            path: path.map(|p| p.display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn no_images(directory: &Path) -> Self {
        Self::NoImages {
            directory: directory.display().to_string(),
            context: ErrorContext::new(),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, source: TileError) -> Self {
        Self::Processing {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Layout { context, .. } => context,
            Self::Manifest { context, .. } => context,
            Self::NoImages { context, .. } => context,
            Self::Processing { context, .. } => context,
        }
    }

    /// Get mutable reference to error context
    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Layout { context, .. } => context,
            Self::Manifest { context, .. } => context,
            Self::NoImages { context, .. } => context,
            Self::Processing { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Layout { .. } => "layout",
            Self::Manifest { .. } => "manifest",
            Self::NoImages { .. } => "no_images",
            Self::Processing { .. } => "processing",
        }
    }

    pub fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            NormalizeError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            NormalizeError::Decode { path, source, .. } => {
                write!(f, "Failed to decode '{}': {}", path, source)
            }
            NormalizeError::Encode { path, source, .. } => {
                write!(f, "Failed to encode '{}': {}", path, source)
            }
            NormalizeError::Layout { shape, reason, .. } => {
                write!(f, "Unsupported buffer layout {:?}: {}", shape, reason)
            }
            NormalizeError::Manifest { path, source, .. } => {
                if let Some(path) = path {
                    write!(f, "Invalid rescale manifest '{}': {}", path, source)
                } else {
                    write!(f, "Invalid rescale manifest: {}", source)
                }
            }
            NormalizeError::NoImages { directory, .. } => {
                write!(f, "No images found in '{}'", directory)
            }
            NormalizeError::Processing {
                operation, source, ..
            } => {
                write!(f, "Processing failed during {}: {}", operation, source)
            }
        }
    }
}

impl StdError for NormalizeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::Encode { source, .. } => Some(source),
            Self::Manifest { source, .. } => Some(source),
            Self::Processing { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors that would fail every remaining image of a batch the same way.
    pub fn is_fatal(error: &NormalizeError) -> bool {
        match error {
            NormalizeError::Config { .. }
            | NormalizeError::Manifest { .. }
            | NormalizeError::NoImages { .. } => true,
            NormalizeError::Processing { source, .. } => matches!(
                source,
                TileError::InvalidMode
                    | TileError::InvalidChunkSize { .. }
                    | TileError::WorkerPool(_)
            ),
            _ => false,
        }
    }

    /// Errors caused by one particular input file.
    pub fn is_per_image(error: &NormalizeError) -> bool {
        !is_fatal(error)
    }
}

/// Error conversion implementations
impl From<std::io::Error> for NormalizeError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for NormalizeError {
    fn from(error: serde_json::Error) -> Self {
        Self::manifest(None, error)
    }
}

impl From<TileError> for NormalizeError {
    fn from(error: TileError) -> Self {
        let operation = error.kind();
        Self::processing(operation, error)
    }
}
