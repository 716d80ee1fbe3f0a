// SPDX-License-Identifier: MIT
// CPU resampler built on fast_image_resize (SIMD-accelerated).
// u8 raster (rows, cols, channels) in -> u8 raster out, channel axis untouched.

use fast_image_resize as fir;
use fir::images::Image;
use fir::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use ndarray::{Array3, ArrayView3};

use crate::plan::Size;

#[derive(Debug)]
pub enum ResampleError {
    UnsupportedChannels(usize),
    ZeroTarget,
    SizeMismatch { expected: Size, actual: Size },
    MissingResult,
    Backend(String),
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
    Shape(ndarray::ShapeError),
}

impl From<fir::ResizeError> for ResampleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ResampleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }
impl From<ndarray::ShapeError> for ResampleError { fn from(e: ndarray::ShapeError) -> Self { Self::Shape(e) } }

impl std::fmt::Display for ResampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResampleError::UnsupportedChannels(n) => write!(f, "Unsupported channel count: {}", n),
            ResampleError::ZeroTarget => write!(f, "Target size has a zero side"),
            ResampleError::SizeMismatch { expected, actual } => write!(
                f,
                "Resampled to {}x{} but {}x{} was planned",
                actual.w, actual.h, expected.w, expected.h
            ),
            ResampleError::MissingResult => write!(f, "No result was collected for this chunk"),
            ResampleError::Backend(msg) => write!(f, "Resampler error: {}", msg),
            ResampleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ResampleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
            ResampleError::Shape(e) => write!(f, "Array shape error: {}", e),
        }
    }
}

impl std::error::Error for ResampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResampleError::Fir(e) => Some(e),
            ResampleError::ImageBuf(e) => Some(e),
            ResampleError::Shape(e) => Some(e),
            _ => None,
        }
    }
}

/// Resample an array to new per-axis dimensions, preserving value range.
///
/// Implementations must be pure: the tiled pipeline calls them concurrently
/// from worker threads, each with its own chunk view.
pub trait Resample: Send + Sync {
    fn resample(&self, src: ArrayView3<'_, u8>, out: Size) -> Result<Array3<u8>, ResampleError>;
}

/// Resampling filter used for every chunk of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResampleFilter {
    Nearest,
    Box,
    Bilinear,
    CatmullRom,
    Mitchell,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    pub fn to_alg(self) -> ResizeAlg {
        match self {
            ResampleFilter::Nearest => ResizeAlg::Nearest,
            ResampleFilter::Box => ResizeAlg::Convolution(FilterType::Box),
            ResampleFilter::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            ResampleFilter::CatmullRom => ResizeAlg::Convolution(FilterType::CatmullRom),
            ResampleFilter::Mitchell => ResizeAlg::Convolution(FilterType::Mitchell),
            ResampleFilter::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// fast_image_resize backed [`Resample`]. A fresh `Resizer` is used per call,
/// so one instance can be shared by every worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirResampler {
    pub filter: ResampleFilter,
}

impl FirResampler {
    pub fn new(filter: ResampleFilter) -> Self { Self { filter } }
}

impl Resample for FirResampler {
    fn resample(&self, src: ArrayView3<'_, u8>, out: Size) -> Result<Array3<u8>, ResampleError> {
        let (rows, cols, channels) = src.dim();
        let pixel_type = pixel_type_for(channels)?;
        if out.is_empty() {
            return Err(ResampleError::ZeroTarget);
        }

        // --- Build source image (tightly packed) ---
        let packed = compact_rows(src);
        if out.w as usize == cols && out.h as usize == rows {
            return Ok(Array3::from_shape_vec((rows, cols, channels), packed)?);
        }
        let src_image = Image::from_vec_u8(cols as u32, rows as u32, packed, pixel_type)?;

        // --- Resize ---
        let mut dst_image = Image::new(out.w, out.h, pixel_type);
        let opts = ResizeOptions::new()
            .resize_alg(self.filter.to_alg())
            // Channels are independent samples here, never premultiplied.
            .use_alpha(false);
        Resizer::new().resize(&src_image, &mut dst_image, &opts)?;

        Ok(Array3::from_shape_vec(
            (out.h as usize, out.w as usize, channels),
            dst_image.into_vec(),
        )?)
    }
}

fn pixel_type_for(channels: usize) -> Result<PixelType, ResampleError> {
    match channels {
        1 => Ok(PixelType::U8),
        2 => Ok(PixelType::U8x2),
        3 => Ok(PixelType::U8x3),
        4 => Ok(PixelType::U8x4),
        n => Err(ResampleError::UnsupportedChannels(n)),
    }
}

/// Copy a (possibly strided) view into a tightly packed row-major buffer.
#[inline]
fn compact_rows(src: ArrayView3<'_, u8>) -> Vec<u8> {
    if let Some(s) = src.as_slice() {
        return s.to_vec();
    }
    let mut buf = Vec::with_capacity(src.len());
    for row in src.outer_iter() {
        match row.as_slice() {
            Some(s) => buf.extend_from_slice(s),
            None => buf.extend(row.iter().copied()),
        }
    }
    buf
}
