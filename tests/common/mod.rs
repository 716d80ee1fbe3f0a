//! Common test utilities and helpers for the slide_normalize tests
//!
//! Synthetic slides written to temporary directories, plus assertions on
//! decoded rasters.
#![allow(dead_code)]

/// Synthetic slide images
pub mod test_images {
    use std::path::{Path, PathBuf};

    use image::ImageFormat;
    use ndarray::Array3;
    use slide_normalize::raster;

    /// Solid image of `value` in every sample
    pub fn solid(rows: usize, cols: usize, channels: usize, value: u8) -> Array3<u8> {
        Array3::from_elem((rows, cols, channels), value)
    }

    /// Smooth gradient, distinct per channel
    pub fn gradient(rows: usize, cols: usize, channels: usize) -> Array3<u8> {
        Array3::from_shape_fn((rows, cols, channels), |(r, c, ch)| {
            ((r * 255 / rows.max(1) + c * 255 / cols.max(1) + ch * 40) % 256) as u8
        })
    }

    /// Checkerboard with `cell`-pixel squares of 0 and 255
    pub fn checkerboard(rows: usize, cols: usize, channels: usize, cell: usize) -> Array3<u8> {
        Array3::from_shape_fn((rows, cols, channels), |(r, c, _)| {
            if (r / cell + c / cell) % 2 == 0 { 0 } else { 255 }
        })
    }

    /// Write `buffer` as PNG to `dir/name` and return the path
    pub fn write_png(dir: &Path, name: &str, buffer: &Array3<u8>) -> PathBuf {
        let path = dir.join(name);
        raster::encode(buffer.view(), &path, ImageFormat::Png).expect("write test image");
        path
    }
}

/// Custom assertions for testing
pub mod assertions {
    use ndarray::{Array3, s};

    /// Assert that a raster has the expected (rows, cols, channels)
    pub fn assert_dims(buffer: &Array3<u8>, expected: (usize, usize, usize)) {
        assert_eq!(
            buffer.dim(),
            expected,
            "Raster size mismatch: expected {:?}, got {:?}",
            expected,
            buffer.dim()
        );
    }

    /// Assert that every sample outside the `rows x cols` content region equals `value`
    pub fn assert_margin_is(buffer: &Array3<u8>, rows: usize, cols: usize, value: u8) {
        let below = buffer.slice(s![rows.., .., ..]);
        let right = buffer.slice(s![..rows, cols.., ..]);
        assert!(
            below.iter().chain(right.iter()).all(|&v| v == value),
            "Margin outside {}x{} is not uniformly {}",
            cols,
            rows,
            value
        );
    }

    /// Assert that every sample is within `tolerance` of `value`
    pub fn assert_near_constant(buffer: &Array3<u8>, value: u8, tolerance: u8) {
        if let Some(bad) = buffer.iter().find(|v| v.abs_diff(value) > tolerance) {
            panic!("Sample {} is not within {} of {}", bad, tolerance, value);
        }
    }
}
