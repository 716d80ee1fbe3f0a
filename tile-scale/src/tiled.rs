// SPDX-License-Identifier: MIT
//! # Tiled Parallel Rescale
//!
//! Rescales gigapixel rasters without handing the whole image to the
//! resampler at once:
//!
//! 1. **Scale derivation**: per-axis factors from physical dimensions
//! 2. **Partition**: nominal chunks, clipped (not padded) at the far edges
//! 3. **Rescale**: one independent work unit per chunk on the worker pool
//! 4. **Reassembly**: results keyed by grid coordinate are pasted row-major
//!    into a freshly allocated canvas
//! 5. **Alignment**: the canvas is grown to a multiple of the tile size
//!
//! ## Concurrency
//!
//! Workers share the source through an immutable view and return only their
//! grid coordinate and resized pixels. Fan-in collects every result before
//! the canvas is allocated; placement never depends on completion order.
//! After the first failure no further chunks are started and the partial
//! results are dropped, so callers never observe a partial canvas.
//!
//! ## Seams
//!
//! Every chunk is checked against the size its column and row were planned
//! with. A resampler returning anything else fails the run instead of leaving
//! a one-pixel seam in the canvas.

use std::collections::BTreeMap;

use ndarray::{s, Array3, ArrayView3};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::error::{TileError, TileResult};
use crate::extent::{align_to_multiple, aligned_complement};
use crate::plan::{partition, Chunk, ChunkGrid, GridCoord, Layout, PhysicalSize, ScaleFactors, Size};
use crate::resample::{FirResampler, Resample, ResampleError, ResampleFilter};

/// Configuration for a tiled rescale run.
#[derive(Clone, Copy, Debug)]
pub struct TiledCfg {
    /// Nominal chunk size in source pixels.
    pub chunk: Size,
    /// Final canvas sides are rounded up to a multiple of this.
    pub tile_alignment: usize,
    /// Neutral value for the canvas background and alignment margin.
    pub background: u8,
    pub filter: ResampleFilter,
}

impl Default for TiledCfg {
    fn default() -> Self {
        Self {
            chunk: Size { w: 1024, h: 1024 },
            tile_alignment: 256,
            background: 255, // white slide background
            filter: ResampleFilter::Lanczos3,
        }
    }
}

/// Everything decided before dispatch.
#[derive(Clone, Debug)]
pub struct TiledPlan {
    pub grid: ChunkGrid,
    pub layout: Layout,
    /// Canvas size after tile alignment.
    pub aligned: Size,
}

/// Chunked rescale-and-reassemble pipeline.
pub struct TiledRescalePipeline<R = FirResampler> {
    cfg: TiledCfg,
    resampler: R,
    pool: Option<ThreadPool>,
}

impl TiledRescalePipeline<FirResampler> {
    pub fn new(cfg: TiledCfg) -> Self {
        Self {
            cfg,
            resampler: FirResampler::new(cfg.filter),
            pool: None,
        }
    }
}

impl<R: Resample> TiledRescalePipeline<R> {
    /// Swap the per-chunk resample primitive.
    pub fn with_resampler<R2: Resample>(self, resampler: R2) -> TiledRescalePipeline<R2> {
        TiledRescalePipeline {
            cfg: self.cfg,
            resampler,
            pool: self.pool,
        }
    }

    /// Run chunks on a dedicated pool of `workers` threads instead of the
    /// global rayon pool (which is sized to the available parallelism).
    pub fn with_workers(mut self, workers: usize) -> TileResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tile-rescale-{}", i))
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Validate the request and compute scale, grid and canvas geometry.
    pub fn plan(
        &self,
        source: Size,
        physical: PhysicalSize,
        target_pixel_size: f64,
    ) -> TileResult<TiledPlan> {
        if source.is_empty() {
            return Err(TileError::EmptySource {
                shape: vec![source.h as usize, source.w as usize],
            });
        }
        if self.cfg.tile_alignment == 0 {
            return Err(TileError::invalid_extent("tile alignment must be > 0"));
        }
        let scale = ScaleFactors::from_physical(source, physical, target_pixel_size)?;
        let grid = partition(source, self.cfg.chunk)?;
        let layout = grid.layout(scale)?;
        let align = |len: u32, axis: &'static str| {
            let total =
                u64::from(len) + aligned_complement(len as usize, self.cfg.tile_alignment) as u64;
            u32::try_from(total).map_err(|_| TileError::Oversize { axis, len: total })
        };
        let aligned = Size {
            w: align(layout.canvas.w, "width")?,
            h: align(layout.canvas.h, "height")?,
        };
        Ok(TiledPlan {
            grid,
            layout,
            aligned,
        })
    }

    /// Rescale `source` (rows, cols, channels) to `target_pixel_size` and
    /// align the result to the configured tile size.
    pub fn run(
        &self,
        source: ArrayView3<'_, u8>,
        physical: PhysicalSize,
        target_pixel_size: f64,
    ) -> TileResult<Array3<u8>> {
        let (rows, cols, channels) = source.dim();
        if rows == 0 || cols == 0 || channels == 0 {
            return Err(TileError::EmptySource {
                shape: source.shape().to_vec(),
            });
        }
        let plan = self.plan(Size::new(cols as u32, rows as u32), physical, target_pixel_size)?;
        info!(
            "Tiled rescale {}x{} -> {}x{} (scale {:.4}, {:.4}), {} chunks in {}x{} grid",
            cols,
            rows,
            plan.aligned.w,
            plan.aligned.h,
            plan.layout.scale.x,
            plan.layout.scale.y,
            plan.grid.len(),
            plan.grid.cols,
            plan.grid.rows
        );

        let pieces = self.dispatch(source, &plan.grid, &plan.layout)?;
        let canvas = reassemble(&plan.grid, &plan.layout, pieces, channels, self.cfg.background)?;
        align_to_multiple(&canvas, self.cfg.tile_alignment, Some(self.cfg.background))
    }

    /// Fan out one work unit per chunk and collect results by grid coordinate.
    fn dispatch(
        &self,
        source: ArrayView3<'_, u8>,
        grid: &ChunkGrid,
        layout: &Layout,
    ) -> TileResult<BTreeMap<GridCoord, Array3<u8>>> {
        let resampler = &self.resampler;
        let work = || {
            grid.chunks
                .par_iter()
                .map(|chunk| rescale_chunk(source, chunk, layout.planned(chunk.coord), resampler))
                .collect::<TileResult<BTreeMap<_, _>>>()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

/// One work unit: read the chunk, resample it, check it against its plan.
fn rescale_chunk<R: Resample + ?Sized>(
    source: ArrayView3<'_, u8>,
    chunk: &Chunk,
    planned: Size,
    resampler: &R,
) -> TileResult<(GridCoord, Array3<u8>)> {
    let r = chunk.rect;
    let (x0, y0) = (r.x as usize, r.y as usize);
    let view = source.slice(s![y0..y0 + r.h as usize, x0..x0 + r.w as usize, ..]);
    let fail = |source| TileError::ChunkRescaleFailed {
        coord: chunk.coord,
        source,
    };

    let out = resampler.resample(view, planned).map_err(fail)?;
    let (h, w, c) = out.dim();
    let actual = Size::new(w as u32, h as u32);
    if actual != planned {
        return Err(fail(ResampleError::SizeMismatch {
            expected: planned,
            actual,
        }));
    }
    if c != view.dim().2 {
        return Err(fail(ResampleError::UnsupportedChannels(c)));
    }
    debug!(
        "chunk ({}, {}) {}x{} -> {}x{}",
        chunk.coord.row, chunk.coord.col, r.w, r.h, w, h
    );
    Ok((chunk.coord, out))
}

/// Paste rescaled chunks into a single freshly allocated canvas.
///
/// Raster order: x advances by each chunk's width, y by the height of the
/// row just placed. Each piece is dropped as soon as it has been copied.
fn reassemble(
    grid: &ChunkGrid,
    layout: &Layout,
    mut pieces: BTreeMap<GridCoord, Array3<u8>>,
    channels: usize,
    background: u8,
) -> TileResult<Array3<u8>> {
    let mut canvas = Array3::from_elem(
        (layout.canvas.h as usize, layout.canvas.w as usize, channels),
        background,
    );

    let mut cur_y = 0usize;
    for row in 0..grid.rows {
        let mut cur_x = 0usize;
        let mut row_h = 0usize;
        for col in 0..grid.cols {
            let coord = GridCoord { row, col };
            let piece = pieces.remove(&coord).ok_or(TileError::ChunkRescaleFailed {
                coord,
                source: ResampleError::MissingResult,
            })?;
            let (h, w, _) = piece.dim();
            canvas
                .slice_mut(s![cur_y..cur_y + h, cur_x..cur_x + w, ..])
                .assign(&piece);
            cur_x += w;
            row_h = h;
        }
        cur_y += row_h;
    }
    Ok(canvas)
}

/// Single-pass rescale without chunking, for images small enough to resample whole.
pub fn rescale_whole<R: Resample + ?Sized>(
    source: ArrayView3<'_, u8>,
    scale: ScaleFactors,
    resampler: &R,
) -> TileResult<Array3<u8>> {
    let (rows, cols, channels) = source.dim();
    if rows == 0 || cols == 0 || channels == 0 {
        return Err(TileError::EmptySource {
            shape: source.shape().to_vec(),
        });
    }
    let side = |len: usize, axis: &'static str| {
        u32::try_from(len).map_err(|_| TileError::Oversize {
            axis,
            len: len as u64,
        })
    };
    let out = scale.apply(Size::new(side(cols, "width")?, side(rows, "height")?))?;
    info!(
        "Rescale {}x{} -> {}x{} (scale {:.3}, {:.3})",
        cols, rows, out.w, out.h, scale.x, scale.y
    );
    resampler.resample(source, out).map_err(TileError::Resample)
}
