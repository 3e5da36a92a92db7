use crate::error::LayoutError;

/// 網格配置：欄數由目標寬度決定，列數由影格數決定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl GridLayout {
    /// 計算網格配置
    ///
    /// `cols = max(1, ceil(target_width / frame_width))`，`rows = ceil(frame_count / cols)`
    pub fn plan(
        frame_count: usize,
        frame_width: u32,
        frame_height: u32,
        target_width: u32,
    ) -> Result<Self, LayoutError> {
        if frame_count == 0 || frame_width == 0 || frame_height == 0 || target_width == 0 {
            return Err(LayoutError::InvalidDimensions {
                frame_count,
                frame_width,
                target_width,
            });
        }

        let cols = (target_width.div_ceil(frame_width) as usize).max(1);
        let rows = frame_count.div_ceil(cols);

        Ok(Self {
            rows,
            cols,
            frame_width,
            frame_height,
        })
    }

    /// 網格可容納的影格數
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.rows * self.cols
    }
}
