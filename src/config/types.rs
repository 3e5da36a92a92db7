use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CACHE_DIR: &str = "./cache";
pub const DEFAULT_CACHE_EXPIRE_DAYS: u64 = 3;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_MAX_VIDEO_FRAMES: usize = 1000;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// 分鏡服務設定
///
/// 由 settings.json 載入，缺少的欄位使用預設值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilerSettings {
    /// 下載檔案與分鏡圖的快取資料夾
    pub cache_dir: PathBuf,
    /// 快取保留天數
    pub cache_expire_days: u64,
    /// 下載逾時（秒）
    pub download_timeout_secs: u64,
    /// ffmpeg 執行檔路徑或名稱
    pub ffmpeg_bin: String,
    /// 過期快取清理週期（秒）
    pub sweep_interval_secs: u64,
    /// 影片最多擷取的影格數
    pub max_video_frames: usize,
    /// 是否略過 TLS 憑證驗證
    ///
    /// 預設開啟以相容自簽憑證的來源站，這會降低傳輸安全性
    pub accept_invalid_certs: bool,
    /// 平行拼接的工作數，0 表示依 CPU 數量決定
    pub worker_count: usize,
}

impl Default for TilerSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_expire_days: DEFAULT_CACHE_EXPIRE_DAYS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            ffmpeg_bin: DEFAULT_FFMPEG_BIN.to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_video_frames: DEFAULT_MAX_VIDEO_FRAMES,
            accept_invalid_certs: true,
            worker_count: 0,
        }
    }
}

impl TilerSettings {
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    #[must_use]
    pub const fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_expire_days * SECONDS_PER_DAY)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// 實際使用的平行工作數
    #[must_use]
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            self.worker_count
        } else {
            rayon::current_num_threads().max(1)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: TilerSettings,
}
