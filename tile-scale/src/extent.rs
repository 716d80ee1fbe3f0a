// SPDX-License-Identifier: MIT
//! # Extent-based crop / pad
//!
//! Maps an arbitrary rectangular request onto an N-dimensional buffer. Each
//! axis of the request is a half-open range `[lower, upper)` that may start
//! before `0` or end past the buffer; those parts are synthesized as padding.
//!
//! ## Algorithm
//!
//! 1. Per axis: `pad_before = max(0, -lower)`, `pad_after = max(0, upper - len)`
//! 2. If any amount is nonzero, pad *every* axis (zero amounts are no-ops)
//! 3. Shift the request by `pad_before` so it addresses the padded buffer
//! 4. Take exactly `[lower, upper)` on every axis
//!
//! Requests that stay inside the buffer never allocate a padded copy; the
//! result equals direct indexing.
//!
//! ## Margin alignment
//!
//! [`align_to_multiple`] grows the first two axes (rows, columns) to the next
//! multiple of a tile size and leaves any channel axis untouched. It never
//! trims and is idempotent.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension, RemoveAxis, Slice};

use crate::error::{TileError, TileResult};

/// How samples outside the buffer are synthesized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Replicate the nearest boundary sample outward.
    Edge,
    /// Fill with a single caller-supplied value.
    Constant,
}

/// Per-axis `(pad_before, pad_after)` needed to satisfy `extent` for a buffer of `shape`.
///
/// Both amounts are computed independently and are never negative, so an
/// extent fully inside the buffer yields all zeros.
pub fn padding_for(shape: &[usize], extent: &[(isize, isize)]) -> Vec<(usize, usize)> {
    shape
        .iter()
        .zip(extent)
        .map(|(&len, &(lower, upper))| {
            let before = (-lower).max(0) as usize;
            let after = (upper - len as isize).max(0) as usize;
            (before, after)
        })
        .collect()
}

fn validate_extent(shape: &[usize], extent: &[(isize, isize)]) -> TileResult<()> {
    if extent.len() != shape.len() {
        return Err(TileError::invalid_extent(format!(
            "extent has {} axes but buffer has {}",
            extent.len(),
            shape.len()
        )));
    }
    for (axis, &(lower, upper)) in extent.iter().enumerate() {
        if upper < lower {
            return Err(TileError::invalid_extent(format!(
                "axis {}: upper {} < lower {}",
                axis, upper, lower
            )));
        }
    }
    Ok(())
}

/// Crop and/or pad `buffer` so it covers exactly `extent`.
///
/// `extent` holds one `(lower, upper)` pair per axis of `buffer`.
/// `constant_value` is required when `mode` is [`PadMode::Constant`] and
/// ignored for [`PadMode::Edge`].
///
/// The result has `upper - lower` samples along every axis. `buffer` is
/// never modified.
pub fn resolve<A, S, D>(
    buffer: &ArrayBase<S, D>,
    extent: &[(isize, isize)],
    mode: PadMode,
    constant_value: Option<A>,
) -> TileResult<Array<A, D>>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    validate_extent(buffer.shape(), extent)?;
    let fill = match (mode, constant_value) {
        (PadMode::Constant, None) => return Err(TileError::InvalidMode),
        (PadMode::Constant, Some(v)) => Some(v),
        (PadMode::Edge, _) => None,
    };

    let pads = padding_for(buffer.shape(), extent);
    if pads.iter().all(|&(before, after)| before == 0 && after == 0) {
        let view = buffer.slice_each_axis(|ax| {
            let (lower, upper) = extent[ax.axis.index()];
            Slice::from(lower..upper)
        });
        return Ok(view.to_owned());
    }

    let padded = pad(buffer, &pads, fill)?;

    // Shifted request in padded coordinates; all bounds are now >= 0.
    let shifted: Vec<(usize, usize)> = extent
        .iter()
        .zip(&pads)
        .map(|(&(lower, upper), &(before, _))| {
            let shift = before as isize;
            ((lower + shift) as usize, (upper + shift) as usize)
        })
        .collect();

    let covers_all = shifted
        .iter()
        .enumerate()
        .all(|(i, &(lo, hi))| lo == 0 && hi == padded.len_of(Axis(i)));
    if covers_all {
        return Ok(padded);
    }

    let view = padded.slice_each_axis(|ax| {
        let (lo, hi) = shifted[ax.axis.index()];
        Slice::from(lo..hi)
    });
    Ok(view.to_owned())
}

/// Pad every axis by its `(before, after)` amount. `fill == None` means edge mode.
fn pad<A, S, D>(
    buffer: &ArrayBase<S, D>,
    pads: &[(usize, usize)],
    fill: Option<A>,
) -> TileResult<Array<A, D>>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    let init = match (&fill, buffer.first()) {
        (Some(v), _) => v.clone(),
        (None, Some(first)) => first.clone(),
        // Nothing to replicate from.
        (None, None) => {
            return Err(TileError::EmptySource {
                shape: buffer.shape().to_vec(),
            })
        }
    };

    let mut shape = buffer.raw_dim();
    for (i, &(before, after)) in pads.iter().enumerate() {
        shape[i] += before + after;
    }
    let mut padded = Array::from_elem(shape, init);

    padded
        .slice_each_axis_mut(|ax| {
            let i = ax.axis.index();
            let before = pads[i].0;
            Slice::from(before..before + buffer.len_of(ax.axis))
        })
        .assign(buffer);

    if fill.is_none() {
        // Axis by axis over the full padded extent, so corners pick up the
        // already replicated values of earlier axes.
        for (i, &(before, after)) in pads.iter().enumerate() {
            let axis = Axis(i);
            let len = padded.len_of(axis);
            if before > 0 {
                let edge = padded.index_axis(axis, before).to_owned();
                for k in 0..before {
                    padded.index_axis_mut(axis, k).assign(&edge);
                }
            }
            if after > 0 {
                let edge = padded.index_axis(axis, len - after - 1).to_owned();
                for k in len - after..len {
                    padded.index_axis_mut(axis, k).assign(&edge);
                }
            }
        }
    }

    Ok(padded)
}

/// Grow the first two axes to the smallest multiple of `multiple` that is
/// `>=` their current length.
///
/// The lower bound stays at `0`, so content keeps its coordinates. With
/// `fill` the margin is constant-padded, otherwise edge-replicated.
pub fn align_to_multiple<A, S, D>(
    buffer: &ArrayBase<S, D>,
    multiple: usize,
    fill: Option<A>,
) -> TileResult<Array<A, D>>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    if multiple == 0 {
        return Err(TileError::invalid_extent("alignment multiple must be > 0"));
    }
    let extent: Vec<(isize, isize)> = buffer
        .shape()
        .iter()
        .enumerate()
        .map(|(axis, &len)| {
            let upper = if axis < 2 {
                len + aligned_complement(len, multiple)
            } else {
                len
            };
            (0, upper as isize)
        })
        .collect();
    let mode = if fill.is_some() {
        PadMode::Constant
    } else {
        PadMode::Edge
    };
    resolve(buffer, &extent, mode, fill)
}

/// Samples to add so `len` becomes a multiple of `multiple`.
#[inline]
pub fn aligned_complement(len: usize, multiple: usize) -> usize {
    (multiple - len % multiple) % multiple
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array2, Array3};

    fn ramp(rows: usize, cols: usize) -> Array2<u16> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * 100 + c) as u16)
    }

    #[test]
    fn inside_extent_equals_direct_indexing() {
        let img = ramp(6, 7);
        let out = resolve(&img, &[(1, 4), (2, 7)], PadMode::Edge, None).unwrap();
        assert_eq!(out, img.slice(s![1..4, 2..7]));

        // Constant value is irrelevant when nothing is padded.
        let out = resolve(&img, &[(0, 6), (0, 0)], PadMode::Constant, Some(9)).unwrap();
        assert_eq!(out.dim(), (6, 0));
    }

    #[test]
    fn edge_padding_replicates_rows() {
        // 3x3 ones with a distinct middle row so replication is observable.
        let img = array![[1u8, 1, 1], [2, 2, 2], [3, 3, 3]];
        let out = resolve(&img, &[(-1, 4), (0, 3)], PadMode::Edge, None).unwrap();
        assert_eq!(out.dim(), (5, 3));
        assert_eq!(out.row(0), img.row(0));
        assert_eq!(out.row(4), img.row(2));
        assert_eq!(out.slice(s![1..4, ..]), img);
    }

    #[test]
    fn edge_padding_of_all_ones_stays_ones() {
        let img = Array2::<u8>::ones((3, 3));
        let out = resolve(&img, &[(-1, 4), (0, 3)], PadMode::Edge, None).unwrap();
        assert_eq!(out, Array2::<u8>::ones((5, 3)));
    }

    #[test]
    fn constant_padding_fills_columns() {
        let img = array![[5u8, 6], [7, 8]];
        let out = resolve(&img, &[(0, 2), (0, 5)], PadMode::Constant, Some(0)).unwrap();
        assert_eq!(out.dim(), (2, 5));
        assert_eq!(out.slice(s![.., 0..2]), img);
        assert!(out.slice(s![.., 2..5]).iter().all(|&v| v == 0));
    }

    #[test]
    fn edge_corners_take_corner_sample() {
        let img = ramp(2, 3);
        let out = resolve(&img, &[(-2, 4), (-1, 5)], PadMode::Edge, None).unwrap();
        assert_eq!(out.dim(), (6, 6));
        for r in 0..6 {
            for c in 0..6 {
                let sr = (r as isize - 2).clamp(0, 1) as usize;
                let sc = (c as isize - 1).clamp(0, 2) as usize;
                assert_eq!(out[[r, c]], img[[sr, sc]], "at ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn constant_padding_on_every_side() {
        let img = ramp(3, 3);
        let out = resolve(&img, &[(-2, 5), (-1, 4)], PadMode::Constant, Some(7)).unwrap();
        assert_eq!(out.dim(), (7, 5));
        for ((r, c), &v) in out.indexed_iter() {
            let inside = (2..5).contains(&r) && (1..4).contains(&c);
            if inside {
                assert_eq!(v, img[[r - 2, c - 1]]);
            } else {
                assert_eq!(v, 7);
            }
        }
    }

    #[test]
    fn request_fully_outside_buffer() {
        let img = ramp(2, 2);
        let out = resolve(&img, &[(4, 6), (0, 2)], PadMode::Edge, None).unwrap();
        assert_eq!(out.row(0), img.row(1));
        assert_eq!(out.row(1), img.row(1));

        let out = resolve(&img, &[(-5, -3), (0, 2)], PadMode::Constant, Some(1)).unwrap();
        assert!(out.iter().all(|&v| v == 1));
    }

    #[test]
    fn channel_axis_is_padded_like_any_other_axis_when_requested() {
        let img = Array3::<u8>::from_elem((2, 2, 3), 4);
        let out = resolve(&img, &[(0, 2), (0, 2), (0, 4)], PadMode::Constant, Some(0)).unwrap();
        assert_eq!(out.dim(), (2, 2, 4));
        assert!(out.slice(s![.., .., 3]).iter().all(|&v| v == 0));
    }

    #[test]
    fn crop_then_pad_mixes_per_side() {
        let img = ramp(4, 4);
        let out = resolve(&img, &[(2, 6), (-1, 2)], PadMode::Edge, None).unwrap();
        assert_eq!(out.dim(), (4, 3));
        assert_eq!(out[[0, 0]], img[[2, 0]]);
        assert_eq!(out[[3, 2]], img[[3, 1]]);
    }

    #[test]
    fn rejects_inverted_extent() {
        let img = ramp(2, 2);
        let err = resolve(&img, &[(1, 0), (0, 2)], PadMode::Edge, None).unwrap_err();
        assert!(matches!(err, TileError::InvalidExtent { .. }));
    }

    #[test]
    fn rejects_axis_count_mismatch() {
        let img = ramp(2, 2);
        let err = resolve(&img, &[(0, 2)], PadMode::Edge, None).unwrap_err();
        assert!(matches!(err, TileError::InvalidExtent { .. }));
    }

    #[test]
    fn constant_mode_without_value_is_invalid() {
        let img = ramp(2, 2);
        let err = resolve::<u16, _, _>(&img, &[(0, 3), (0, 2)], PadMode::Constant, None)
            .unwrap_err();
        assert!(matches!(err, TileError::InvalidMode));
    }

    #[test]
    fn edge_padding_an_empty_buffer_fails() {
        let img = Array2::<u8>::zeros((0, 3));
        let err = resolve(&img, &[(0, 2), (0, 3)], PadMode::Edge, None).unwrap_err();
        assert!(matches!(err, TileError::EmptySource { .. }));
    }

    #[test]
    fn input_is_untouched() {
        let img = ramp(3, 3);
        let before = img.clone();
        let _ = resolve(&img, &[(-3, 6), (-3, 6)], PadMode::Constant, Some(0)).unwrap();
        assert_eq!(img, before);
    }

    #[test]
    fn align_pads_rgb_to_tile_multiple() {
        let img = Array3::<u8>::from_elem((300, 300, 3), 10);
        let out = align_to_multiple(&img, 256, Some(255)).unwrap();
        assert_eq!(out.dim(), (512, 512, 3));
        assert_eq!(out.slice(s![0..300, 0..300, ..]), img);
        assert!(out.slice(s![300.., .., ..]).iter().all(|&v| v == 255));
        assert!(out.slice(s![..300, 300.., ..]).iter().all(|&v| v == 255));
    }

    #[test]
    fn align_keeps_exact_multiples_and_is_idempotent() {
        let img = ramp(512, 256);
        let out = align_to_multiple(&img, 256, None).unwrap();
        assert_eq!(out, img);

        let odd = ramp(37, 70);
        let once = align_to_multiple(&odd, 16, None).unwrap();
        let twice = align_to_multiple(&once, 16, None).unwrap();
        assert_eq!(once.dim(), (48, 80));
        assert_eq!(once, twice);
        assert_eq!(once[[47, 79]], odd[[36, 69]]);
    }

    #[test]
    fn align_sizes_are_smallest_multiple() {
        for len in 1..70usize {
            for m in 1..20usize {
                let up = len + aligned_complement(len, m);
                assert_eq!(up % m, 0);
                assert!(up >= len && up < len + m);
            }
        }
    }

    #[test]
    fn align_rejects_zero_multiple() {
        let img = ramp(3, 3);
        assert!(matches!(
            align_to_multiple(&img, 0, Some(0)).unwrap_err(),
            TileError::InvalidExtent { .. }
        ));
    }

    #[test]
    fn padding_amounts_are_never_negative() {
        assert_eq!(padding_for(&[5, 5], &[(1, 4), (0, 5)]), vec![(0, 0), (0, 0)]);
        assert_eq!(padding_for(&[5, 5], &[(-2, 9), (3, 3)]), vec![(2, 4), (0, 0)]);
    }
}
