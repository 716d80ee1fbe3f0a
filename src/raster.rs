//! Raster decode/encode between image files and `(rows, cols, channels)` u8 arrays.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader};
use ndarray::{Array3, ArrayView3};
use tracing::debug;

use crate::error::{NormalizeError, NormalizeResult};

#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    /// Keep only the colour channels of gray+alpha and RGBA images.
    pub drop_alpha: bool,
}

/// Decode an image file with default options.
pub fn decode(path: &Path) -> NormalizeResult<Array3<u8>> {
    decode_with(path, DecodeOptions::default())
}

/// Decode an image file into a `(rows, cols, channels)` array.
///
/// Decoder size limits are lifted: whole-slide scans routinely exceed the
/// `image` crate's default allocation cap.
pub fn decode_with(path: &Path, opts: DecodeOptions) -> NormalizeResult<Array3<u8>> {
    let mut reader = ImageReader::open(path)
        .map_err(|e| NormalizeError::io_at("open image", path, e))?
        .with_guessed_format()
        .map_err(|e| NormalizeError::io_at("probe image format", path, e))?;
    reader.no_limits();
    let img = reader
        .decode()
        .map_err(|e| NormalizeError::decode(path, e))?;
    debug!(
        "Decoded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );
    from_dynamic(img, opts).map_err(|e| e.with_metadata("path", path.display().to_string()))
}

/// Convert a decoded image, narrowing deeper sample types to 8 bits.
pub fn from_dynamic(img: DynamicImage, opts: DecodeOptions) -> NormalizeResult<Array3<u8>> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let has_alpha = img.color().has_alpha() && !opts.drop_alpha;
    let is_gray = matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    );
    let (channels, raw) = match (is_gray, has_alpha) {
        (true, false) => (1, img.into_luma8().into_raw()),
        (true, true) => (2, img.into_luma_alpha8().into_raw()),
        (false, false) => (3, img.into_rgb8().into_raw()),
        (false, true) => (4, img.into_rgba8().into_raw()),
    };
    Array3::from_shape_vec((h, w, channels), raw)
        .map_err(|e| NormalizeError::layout(&[h, w, channels], e.to_string()))
}

/// Wrap a `(rows, cols, channels)` array as an 8-bit image.
pub fn to_dynamic(buffer: ArrayView3<'_, u8>) -> NormalizeResult<DynamicImage> {
    let (rows, cols, channels) = buffer.dim();
    let (w, h) = match (u32::try_from(cols), u32::try_from(rows)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(NormalizeError::layout(
                buffer.shape(),
                "sides must fit in u32",
            ));
        }
    };
    let raw: Vec<u8> = match buffer.as_slice() {
        Some(s) => s.to_vec(),
        None => buffer.iter().copied().collect(),
    };
    let short = || NormalizeError::layout(&[rows, cols, channels], "buffer shorter than its shape");
    let img = match channels {
        1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, raw).ok_or_else(short)?),
        2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, raw).ok_or_else(short)?),
        3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, raw).ok_or_else(short)?),
        4 => DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, raw).ok_or_else(short)?),
        n => {
            return Err(NormalizeError::layout(
                buffer.shape(),
                format!("{} channels cannot be encoded", n),
            ));
        }
    };
    Ok(img)
}

/// Write `buffer` to `path` in `format`, creating parent directories.
pub fn encode(buffer: ArrayView3<'_, u8>, path: &Path, format: ImageFormat) -> NormalizeResult<()> {
    let img = to_dynamic(buffer)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| NormalizeError::io_at("create output directory", parent, e))?;
    }
    img.save_with_format(path, format)
        .map_err(|e| NormalizeError::encode(path, e))?;
    debug!("Encoded {} ({:?})", path.display(), format);
    Ok(())
}

/// Output format implied by a path's extension.
pub fn format_for_path(path: &Path) -> Option<ImageFormat> {
    ImageFormat::from_path(path).ok()
}

/// Whether `path` has one of `extensions` (lower-case, no dot), ignoring case.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| *x == e))
}
