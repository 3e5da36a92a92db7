//! 平行拼接分鏡圖
//!
//! 依工作數把網格的列切成連續分片，每個分片由獨立工作拼接、編碼並寫入暫存檔；
//! 所有工作結束後才把暫存檔改名發佈，第一張分鏡圖最後發佈

use super::encoder::{JpegCodec, PngCodec, encode_with_fallback};
use crate::cache::remove_tiles;
use crate::error::{LayoutError, PipelineError};
use crate::tools::{Fingerprint, Frame, FrameSequence, GridLayout};
use image::{RgbImage, imageops};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 分配給單一工作的連續影格範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    /// 第一張影格的索引，也是分鏡圖檔名中的數字
    pub start: usize,
    /// 結束索引（不含）
    pub end: usize,
    /// 拼接圖的列數，每個分片相同
    pub rows: usize,
}

impl Shard {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 把網格切成約 `ceil(rows / workers)` 列一組的分片
#[must_use]
pub fn plan_shards(frame_count: usize, layout: &GridLayout, workers: usize) -> Vec<Shard> {
    let shard_rows = layout.rows.div_ceil(workers.max(1)).max(1);
    let shard_size = shard_rows * layout.cols;

    (0..frame_count)
        .step_by(shard_size)
        .map(|start| Shard {
            start,
            end: (start + shard_size).min(frame_count),
            rows: shard_rows,
        })
        .collect()
}

/// 把分片的影格依列優先順序貼到空白畫布上，多出的格子保持空白
pub fn render_shard(
    frames: &[Frame],
    layout: &GridLayout,
    rows: usize,
) -> Result<RgbImage, LayoutError> {
    let invalid = || LayoutError::InvalidDimensions {
        frame_count: frames.len(),
        frame_width: layout.frame_width,
        target_width: 0,
    };

    let width = u32::try_from(layout.cols)
        .ok()
        .and_then(|cols| cols.checked_mul(layout.frame_width))
        .ok_or_else(invalid)?;
    let height = u32::try_from(rows)
        .ok()
        .and_then(|rows| rows.checked_mul(layout.frame_height))
        .ok_or_else(invalid)?;

    let mut canvas = RgbImage::new(width, height);
    for (index, frame) in frames.iter().take(rows * layout.cols).enumerate() {
        let x = (index % layout.cols) as i64 * i64::from(layout.frame_width);
        let y = (index / layout.cols) as i64 * i64::from(layout.frame_height);
        imageops::replace(&mut canvas, frame.image(), x, y);
    }

    Ok(canvas)
}

/// 拼接結果
#[derive(Debug, Clone)]
pub struct Composition {
    pub layout: GridLayout,
    pub shards: Vec<Shard>,
    pub tiles: Vec<PathBuf>,
}

/// 分鏡圖拼接器
pub struct TileCompositor {
    cache_dir: PathBuf,
    quality: u8,
    workers: usize,
    shutdown_signal: Arc<AtomicBool>,
}

impl TileCompositor {
    #[must_use]
    pub fn new(
        cache_dir: &Path,
        quality: u8,
        workers: usize,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            quality,
            workers: workers.max(1),
            shutdown_signal,
        }
    }

    /// 拼接並寫入所有分鏡圖
    ///
    /// 先刪除同指紋的舊分鏡圖，所有分片完成（或失敗）後才回傳
    pub fn compose(
        &self,
        fingerprint: &Fingerprint,
        sequence: &FrameSequence,
        target_width: u32,
    ) -> Result<Composition, PipelineError> {
        let layout = GridLayout::plan(
            sequence.len(),
            sequence.frame_width(),
            sequence.frame_height(),
            target_width,
        )?;
        let shards = plan_shards(sequence.len(), &layout, self.workers);

        info!(
            "拼接 {}: {} 張影格, {}x{} 網格, {} 個分片",
            fingerprint,
            sequence.len(),
            layout.cols,
            layout.rows,
            shards.len()
        );

        let stale = remove_tiles(&self.cache_dir, fingerprint)
            .map_err(|e| PipelineError::io(&self.cache_dir, e))?;
        if stale > 0 {
            debug!("已刪除 {stale} 張舊分鏡圖: {fingerprint}");
        }

        let results: Vec<Result<(Shard, PathBuf), PipelineError>> = shards
            .par_iter()
            .map(|shard| self.compose_shard(fingerprint, sequence, &layout, *shard))
            .collect();

        let mut staged = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(entry) => staged.push(entry),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            discard_staged(&staged);
            return Err(e);
        }

        let tiles = self.publish(fingerprint, staged)?;
        info!("拼接完成 {}: {} 張分鏡圖", fingerprint, tiles.len());

        Ok(Composition {
            layout,
            shards,
            tiles,
        })
    }

    fn compose_shard(
        &self,
        fingerprint: &Fingerprint,
        sequence: &FrameSequence,
        layout: &GridLayout,
        shard: Shard,
    ) -> Result<(Shard, PathBuf), PipelineError> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }

        let frames = &sequence.frames()[shard.start..shard.end];
        let canvas = render_shard(frames, layout, shard.rows)?;
        let bytes = encode_with_fallback(&canvas, &JpegCodec::new(self.quality), &PngCodec)?;

        let staging = self.cache_dir.join(format!(
            "{}.{}.tmp",
            fingerprint.tile_name(shard.start),
            uuid::Uuid::new_v4()
        ));
        fs::write(&staging, &bytes).map_err(|e| PipelineError::io(&staging, e))?;

        debug!(
            "分片 {}..{} 完成: {}x{} ({} bytes)",
            shard.start,
            shard.end,
            canvas.width(),
            canvas.height(),
            bytes.len()
        );

        Ok((shard, staging))
    }

    /// 把暫存檔改名為正式檔名，第一張分鏡圖最後發佈
    fn publish(
        &self,
        fingerprint: &Fingerprint,
        mut staged: Vec<(Shard, PathBuf)>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        staged.sort_by_key(|(shard, _)| std::cmp::Reverse(shard.start));

        let mut tiles = Vec::with_capacity(staged.len());
        for (position, (shard, staging)) in staged.iter().enumerate() {
            let target = fingerprint.tile_path(&self.cache_dir, shard.start);
            if let Err(e) = fs::rename(staging, &target) {
                discard_staged(&staged[position..]);
                return Err(PipelineError::io(&target, e));
            }
            tiles.push(target);
        }

        tiles.reverse();
        Ok(tiles)
    }
}

fn discard_staged(staged: &[(Shard, PathBuf)]) {
    for (_, path) in staged {
        if let Err(e) = fs::remove_file(path) {
            warn!("無法刪除暫存分鏡圖 {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SourceDescriptor;
    use image::Rgb;
    use tempfile::TempDir;

    fn layout(frame_count: usize, frame_width: u32, target_width: u32) -> GridLayout {
        GridLayout::plan(frame_count, frame_width, 4, target_width).unwrap()
    }

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn test_shards_for_37_frames() {
        let layout = layout(37, 256, 2048);
        let shards = plan_shards(37, &layout, 5);

        let starts: Vec<_> = shards.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 8, 16, 24, 32]);
        assert!(shards.iter().all(|s| s.rows == 1));
        assert_eq!(shards.last().unwrap().len(), 37 - 4 * 8);
    }

    #[test]
    fn test_shards_partition_without_gaps() {
        for frame_count in 1..=60 {
            for workers in 1..=9 {
                let layout = layout(frame_count, 100, 350);
                let shards = plan_shards(frame_count, &layout, workers);
                let shard_size = shards[0].rows * layout.cols;

                assert!(shards.len() <= workers);
                let mut expected = 0;
                for shard in &shards {
                    assert_eq!(shard.start, expected);
                    assert!(!shard.is_empty() && shard.len() <= shard_size);
                    expected = shard.end;
                }
                assert_eq!(expected, frame_count);
            }
        }
    }

    #[test]
    fn test_render_places_frames_row_major() {
        let layout = layout(5, 2, 6);
        assert_eq!(layout.cols, 3);
        let frames: Vec<_> = (1..=5).map(|i| solid(2, 4, i * 40)).collect();

        let canvas = render_shard(&frames, &layout, 2).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (6, 8));

        assert_eq!(canvas.get_pixel(0, 0), &Rgb([40, 40, 40]));
        assert_eq!(canvas.get_pixel(5, 3), &Rgb([120, 120, 120]));
        assert_eq!(canvas.get_pixel(0, 4), &Rgb([160, 160, 160]));
        assert_eq!(canvas.get_pixel(3, 7), &Rgb([200, 200, 200]));
        // 最後一格沒有影格，保持空白
        assert_eq!(canvas.get_pixel(5, 7), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_compose_writes_tiles_and_clears_stale() {
        let temp_dir = TempDir::new().unwrap();
        let fp = SourceDescriptor::parse("https://example.com/a.gif")
            .unwrap()
            .fingerprint();
        let stale = fp.tile_path(temp_dir.path(), 999);
        fs::write(&stale, b"old").unwrap();

        let frames: Vec<_> = (0..10u8).map(|i| solid(8, 4, i * 20)).collect();
        let sequence = FrameSequence::new(frames);
        let compositor =
            TileCompositor::new(temp_dir.path(), 90, 3, Arc::new(AtomicBool::new(false)));

        let composition = compositor.compose(&fp, &sequence, 16).unwrap();

        assert_eq!(composition.layout.cols, 2);
        assert_eq!(composition.layout.rows, 5);
        let starts: Vec<_> = composition.shards.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 4, 8]);
        assert_eq!(
            composition.tiles,
            vec![
                fp.tile_path(temp_dir.path(), 0),
                fp.tile_path(temp_dir.path(), 4),
                fp.tile_path(temp_dir.path(), 8),
            ]
        );
        assert!(composition.tiles.iter().all(|p| p.exists()));
        assert!(!stale.exists());

        let leftovers = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_compose_cancelled_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let fp = SourceDescriptor::parse("https://example.com/a.gif")
            .unwrap()
            .fingerprint();
        let sequence = FrameSequence::new((0..4u8).map(|i| solid(4, 4, i)).collect());
        let compositor =
            TileCompositor::new(temp_dir.path(), 80, 2, Arc::new(AtomicBool::new(true)));

        let err = compositor.compose(&fp, &sequence, 8).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_compose_empty_sequence_is_layout_error() {
        let temp_dir = TempDir::new().unwrap();
        let fp = SourceDescriptor::parse("https://example.com/a.gif")
            .unwrap()
            .fingerprint();
        let compositor =
            TileCompositor::new(temp_dir.path(), 80, 2, Arc::new(AtomicBool::new(false)));

        let err = compositor
            .compose(&fp, &FrameSequence::default(), 2048)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Layout(_)));
    }
}
