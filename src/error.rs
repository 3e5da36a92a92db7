//! 分鏡流程的錯誤型別
//!
//! 每個階段各自有錯誤型別，`PipelineError` 彙整後回報給前端

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 下載遠端資源時的錯誤
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("無效的來源網址: {0}")]
    InvalidLocator(String),

    #[error("HTTP 狀態碼異常: {0}")]
    NonOkStatus(u16),

    #[error("下載逾時: {0}")]
    Timeout(String),

    #[error("HTTP 請求失敗: {0}")]
    Request(String),

    #[error("寫入下載檔案失敗 {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 解碼影格時的錯誤
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("無法解析影像容器: {0}")]
    Malformed(String),

    #[error("影格串流在第 {index} 張影格中途結束")]
    TruncatedFrame { index: usize },

    #[error("影像解碼失敗: {0}")]
    Image(#[from] image::ImageError),
}

/// 外部解碼程序的錯誤
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("無法啟動 {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} 異常結束 ({status}): {stderr}")]
    NonTerminalFailure {
        program: String,
        status: String,
        stderr: String,
    },
}

/// 網格配置的錯誤
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("無效的網格尺寸: 影格數 {frame_count}, 影格寬度 {frame_width}, 目標寬度 {target_width}")]
    InvalidDimensions {
        frame_count: usize,
        frame_width: u32,
        target_width: u32,
    },
}

/// 編碼拼接圖時的錯誤
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{codec} 壓縮失敗: {reason}")]
    CompressionFailed { codec: &'static str, reason: String },
}

/// 整個分鏡流程的錯誤
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("不支援的來源格式: {0}")]
    UnsupportedSource(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("快取檔案操作失敗 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("操作已取消")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
