//! 影格與影格來源
//!
//! GIF 原生解碼與 ffmpeg 串流擷取都輸出同一種 `Frame`，後續拼接不需要區分來源

use crate::error::PipelineError;
use image::{DynamicImage, Rgb, RgbImage, imageops};
use log::warn;
use std::path::Path;

/// 單張解碼後的影格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    #[must_use]
    pub const fn new(image: RgbImage) -> Self {
        Self { image }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// 置中放到指定大小的黑色畫布上，超出部分裁掉
    #[must_use]
    pub fn letterbox(&self, width: u32, height: u32) -> Self {
        let mut canvas = RgbImage::new(width, height);
        let x = (i64::from(width) - i64::from(self.width())) / 2;
        let y = (i64::from(height) - i64::from(self.height())) / 2;
        imageops::replace(&mut canvas, &self.image, x, y);
        Self::new(canvas)
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

/// 依播放順序排列的影格，尺寸以第一張為準
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    frame_width: u32,
    frame_height: u32,
}

impl FrameSequence {
    /// 建立影格序列
    ///
    /// 尺寸與第一張不同的影格會置中補黑邊到相同大小
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self {
        let Some(first) = frames.first() else {
            return Self::default();
        };
        let (frame_width, frame_height) = (first.width(), first.height());

        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(index, frame)| {
                if frame.width() == frame_width && frame.height() == frame_height {
                    frame
                } else {
                    warn!(
                        "影格 {index} 尺寸 {}x{} 與第一張 {frame_width}x{frame_height} 不同，已補黑邊",
                        frame.width(),
                        frame.height()
                    );
                    frame.letterbox(frame_width, frame_height)
                }
            })
            .collect();

        Self {
            frames,
            frame_width,
            frame_height,
        }
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub const fn frame_width(&self) -> u32 {
        self.frame_width
    }

    #[must_use]
    pub const fn frame_height(&self) -> u32 {
        self.frame_height
    }
}

/// 從本地資源檔產生有序、有限的影格序列
pub trait FrameSource: Send + Sync {
    fn extract(&self, resource: &Path) -> Result<FrameSequence, PipelineError>;
}
