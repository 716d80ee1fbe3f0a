// SPDX-License-Identifier: MIT
//! # Scale Factors and Chunk Grid Planning
//!
//! Everything the tiled pipeline decides before touching a pixel lives here:
//!
//! 1. **ScaleFactors**: per-axis factors derived from physical dimensions
//!    (or from raw/target pixel sizes for the single-pass variant)
//! 2. **ChunkGrid**: row-major partition of the source into nominal chunks,
//!    clipped at the far edges
//! 3. **Layout**: resized size of every grid column/row and the canvas they
//!    add up to
//!
//! ## Rounding
//!
//! A chunk spanning `w x h` source pixels is resized to
//! `(round(w * sx), round(h * sy))`, clamped to at least 1 pixel. The resized
//! size depends only on the source span, so every chunk of a grid column
//! shares one width and every chunk of a grid row shares one height. The
//! canvas is the sum of the row-0 widths by the sum of the column-0 heights.

use crate::error::{TileError, TileResult};

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Physical extent of a scan, in the same unit as the target pixel size
/// (typically micrometres).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalSize {
    pub width: f64,
    pub height: f64,
}

/// Anisotropic scale pair applied independently to columns (`x`) and rows (`y`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// Build and validate a scale pair.
    pub fn new(x: f64, y: f64) -> TileResult<Self> {
        let ok = |s: f64| s.is_finite() && s > 0.0;
        if ok(x) && ok(y) {
            Ok(Self { x, y })
        } else {
            Err(TileError::InvalidScale {
                scale_x: x,
                scale_y: y,
            })
        }
    }

    /// `scale = physical / pixels / target_pixel_size` per axis.
    pub fn from_physical(
        source: Size,
        physical: PhysicalSize,
        target_pixel_size: f64,
    ) -> TileResult<Self> {
        if source.is_empty() {
            return Err(TileError::EmptySource {
                shape: vec![source.h as usize, source.w as usize],
            });
        }
        Self::new(
            physical.width / f64::from(source.w) / target_pixel_size,
            physical.height / f64::from(source.h) / target_pixel_size,
        )
    }

    /// `scale = target / raw` per axis, as used by the manifest-driven rescale.
    pub fn from_pixel_targets(raw: (f64, f64), target: (f64, f64)) -> TileResult<Self> {
        Self::new(target.0 / raw.0, target.1 / raw.1)
    }

    pub fn is_identity(self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }

    /// Resized size of a `span`: rounded per axis, never below 1 pixel.
    ///
    /// Fails with [`TileError::Oversize`] when a side does not fit in `u32`.
    pub fn apply(self, span: Size) -> TileResult<Size> {
        Ok(Size {
            w: scaled_len(span.w, self.x, "width")?,
            h: scaled_len(span.h, self.y, "height")?,
        })
    }
}

#[inline]
fn scaled_len(len: u32, scale: f64, axis: &'static str) -> TileResult<u32> {
    let scaled = (f64::from(len) * scale).round().max(1.0);
    if scaled > f64::from(u32::MAX) {
        // Float to int casts saturate, so the report is capped at u64::MAX.
        return Err(TileError::Oversize {
            axis,
            len: scaled as u64,
        });
    }
    Ok(scaled as u32)
}

/// Sum of resized spans, checked against `u32`.
pub(crate) fn checked_total(spans: &[u32], axis: &'static str) -> TileResult<u32> {
    let total: u64 = spans.iter().map(|&s| u64::from(s)).sum();
    u32::try_from(total).map_err(|_| TileError::Oversize { axis, len: total })
}

/// Position of a chunk in the grid, in units of the nominal chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub row: u32,
    pub col: u32,
}

/// Rectangle in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
}

/// A source sub-region scheduled for one rescale work unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub coord: GridCoord,
    pub rect: Rect,
}

/// Row-major chunk partition of a source image.
#[derive(Clone, Debug)]
pub struct ChunkGrid {
    pub source: Size,
    pub nominal: Size,
    pub cols: u32,
    pub rows: u32,
    pub chunks: Vec<Chunk>,
}

/// Partition `source` into `nominal`-sized chunks.
///
/// The last chunk of every row and column is clipped to the source bound,
/// never padded. Chunks are stored row-major (left-to-right, top-to-bottom).
pub fn partition(source: Size, nominal: Size) -> TileResult<ChunkGrid> {
    if nominal.is_empty() {
        return Err(TileError::InvalidChunkSize {
            w: nominal.w,
            h: nominal.h,
        });
    }
    if source.is_empty() {
        return Err(TileError::EmptySource {
            shape: vec![source.h as usize, source.w as usize],
        });
    }

    let cols = source.w.div_ceil(nominal.w);
    let rows = source.h.div_ceil(nominal.h);
    let mut chunks = Vec::with_capacity((cols as usize) * (rows as usize));
    for row in 0..rows {
        let y = row * nominal.h;
        let h = nominal.h.min(source.h - y);
        for col in 0..cols {
            let x = col * nominal.w;
            let w = nominal.w.min(source.w - x);
            chunks.push(Chunk {
                coord: GridCoord { row, col },
                rect: Rect { x, y, w, h },
            });
        }
    }

    Ok(ChunkGrid {
        source,
        nominal,
        cols,
        rows,
        chunks,
    })
}

impl ChunkGrid {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk at `coord`, if it lies inside the grid.
    pub fn get(&self, coord: GridCoord) -> Option<&Chunk> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        self.chunks
            .get((coord.row * self.cols + coord.col) as usize)
    }

    /// Resized column widths (from grid row 0) and row heights (from grid column 0).
    pub fn layout(&self, scale: ScaleFactors) -> TileResult<Layout> {
        let col_widths = self.chunks[..self.cols as usize]
            .iter()
            .map(|c| scale.apply(c.rect.size()).map(|s| s.w))
            .collect::<TileResult<Vec<u32>>>()?;
        let row_heights = self
            .chunks
            .iter()
            .step_by(self.cols as usize)
            .map(|c| scale.apply(c.rect.size()).map(|s| s.h))
            .collect::<TileResult<Vec<u32>>>()?;
        let canvas = Size {
            w: checked_total(&col_widths, "width")?,
            h: checked_total(&row_heights, "height")?,
        };
        Ok(Layout {
            scale,
            col_widths,
            row_heights,
            canvas,
        })
    }
}

/// Resized geometry of a chunk grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub scale: ScaleFactors,
    pub col_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
    /// Reassembled canvas size before tile alignment.
    pub canvas: Size,
}

impl Layout {
    /// Size every chunk at `coord` must have after resampling.
    pub fn planned(&self, coord: GridCoord) -> Size {
        Size {
            w: self.col_widths[coord.col as usize],
            h: self.row_heights[coord.row as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_scale_matches_pixel_ratio() {
        let s = ScaleFactors::from_physical(
            Size::new(2000, 1000),
            PhysicalSize {
                width: 2000.0,
                height: 1000.0,
            },
            1.0,
        )
        .unwrap();
        assert!(s.is_identity());

        // 0.25 um/px scan resampled to 0.5 um/px halves both axes.
        let s = ScaleFactors::from_physical(
            Size::new(4000, 8000),
            PhysicalSize {
                width: 1000.0,
                height: 2000.0,
            },
            0.5,
        )
        .unwrap();
        assert_eq!(s, ScaleFactors { x: 0.5, y: 0.5 });
    }

    #[test]
    fn anisotropic_scale_is_per_axis() {
        let s = ScaleFactors::from_physical(
            Size::new(100, 100),
            PhysicalSize {
                width: 200.0,
                height: 50.0,
            },
            1.0,
        )
        .unwrap();
        assert_eq!(s.apply(Size::new(10, 10)).unwrap(), Size::new(20, 5));
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let err = ScaleFactors::from_physical(
            Size::new(10, 10),
            PhysicalSize {
                width: 0.0,
                height: 10.0,
            },
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, TileError::InvalidScale { .. }));
        assert!(ScaleFactors::new(f64::NAN, 1.0).is_err());
        assert!(ScaleFactors::new(1.0, f64::INFINITY).is_err());
        assert!(ScaleFactors::from_pixel_targets((0.0, 1.0), (5.0, 1.0)).is_err());
    }

    #[test]
    fn empty_source_is_rejected_before_scaling() {
        let err = ScaleFactors::from_physical(
            Size::new(0, 10),
            PhysicalSize {
                width: 1.0,
                height: 1.0,
            },
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, TileError::EmptySource { .. }));
    }

    #[test]
    fn apply_rounds_and_never_collapses() {
        let s = ScaleFactors::new(0.5, 0.001).unwrap();
        assert_eq!(s.apply(Size::new(3, 10)).unwrap(), Size::new(2, 1));
    }

    #[test]
    fn partition_clips_last_row_and_column() {
        let grid = partition(Size::new(2000, 1000), Size::new(1024, 1024)).unwrap();
        assert_eq!((grid.cols, grid.rows), (2, 1));
        assert_eq!(grid.chunks[0].rect, Rect { x: 0, y: 0, w: 1024, h: 1000 });
        assert_eq!(grid.chunks[1].rect, Rect { x: 1024, y: 0, w: 976, h: 1000 });
        assert_eq!(grid.chunks[1].coord, GridCoord { row: 0, col: 1 });
    }

    #[test]
    fn partition_covers_every_pixel_exactly_once() {
        for &(w, h) in &[(1u32, 1u32), (7, 3), (64, 64), (65, 130), (300, 17)] {
            for &(cw, ch) in &[(1u32, 1u32), (8, 8), (64, 16), (500, 500), (3, 7)] {
                let grid = partition(Size::new(w, h), Size::new(cw, ch)).unwrap();
                let mut hits = vec![0u8; (w * h) as usize];
                for c in &grid.chunks {
                    assert!(c.rect.w >= 1 && c.rect.h >= 1);
                    for y in c.rect.y..c.rect.y + c.rect.h {
                        for x in c.rect.x..c.rect.x + c.rect.w {
                            hits[(y * w + x) as usize] += 1;
                        }
                    }
                }
                assert!(hits.iter().all(|&n| n == 1), "{}x{} by {}x{}", w, h, cw, ch);
            }
        }
    }

    #[test]
    fn partition_is_row_major() {
        let grid = partition(Size::new(30, 20), Size::new(10, 10)).unwrap();
        let coords: Vec<(u32, u32)> = grid.chunks.iter().map(|c| (c.coord.row, c.coord.col)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(grid.get(GridCoord { row: 1, col: 2 }).unwrap().rect.x, 20);
        assert!(grid.get(GridCoord { row: 2, col: 0 }).is_none());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(
            partition(Size::new(10, 10), Size::new(0, 4)).unwrap_err(),
            TileError::InvalidChunkSize { w: 0, h: 4 }
        ));
    }

    #[test]
    fn layout_sums_first_row_and_column() {
        let grid = partition(Size::new(25, 15), Size::new(10, 10)).unwrap();
        let layout = grid.layout(ScaleFactors::new(0.5, 2.0).unwrap()).unwrap();
        assert_eq!(layout.col_widths, vec![5, 5, 3]); // 5 * 0.5 = 2.5 rounds to 3
        assert_eq!(layout.row_heights, vec![20, 10]);
        assert_eq!(layout.canvas, Size::new(13, 30));
        assert_eq!(layout.planned(GridCoord { row: 1, col: 2 }), Size::new(3, 10));
    }

    #[test]
    fn planned_size_matches_every_chunk_span() {
        let grid = partition(Size::new(1001, 777), Size::new(256, 200)).unwrap();
        let scale = ScaleFactors::new(0.37, 1.61).unwrap();
        let layout = grid.layout(scale).unwrap();
        for c in &grid.chunks {
            assert_eq!(layout.planned(c.coord), scale.apply(c.rect.size()).unwrap());
        }
    }

    #[test]
    fn resized_side_beyond_u32_is_rejected() {
        let s = ScaleFactors::new(1e10, 1.0).unwrap();
        assert!(matches!(
            s.apply(Size::new(10, 10)).unwrap_err(),
            TileError::Oversize { axis: "width", .. }
        ));
    }

    #[test]
    fn canvas_sum_beyond_u32_is_rejected() {
        // Each column fits on its own, the two together do not.
        let grid = partition(Size::new(20, 10), Size::new(10, 10)).unwrap();
        let scale = ScaleFactors::new(3e8, 1.0).unwrap();
        match grid.layout(scale).unwrap_err() {
            TileError::Oversize { axis, len } => {
                assert_eq!(axis, "width");
                assert_eq!(len, 6_000_000_000);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
