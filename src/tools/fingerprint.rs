//! 來源網址指紋
//!
//! 以網址的 host + path 計算 BLAKE3 雜湊，作為下載檔與分鏡圖共用的快取鍵

use crate::error::{FetchError, PipelineError};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

/// 分鏡圖副檔名（沿用 .gif 命名，內容為靜態壓縮圖）
pub const TILE_EXTENSION: &str = "gif";

/// 來源類型，由網址路徑的副檔名決定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Gif,
    Video,
}

impl SourceKind {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Video => "mp4",
        }
    }

    /// 依網址路徑的副檔名判斷，路徑以 `/` 結尾時沒有副檔名
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let (_, ext) = path.rsplit_once('.')?;
        if ext.contains('/') {
            return None;
        }
        if ext.eq_ignore_ascii_case("gif") {
            Some(Self::Gif)
        } else if ext.eq_ignore_ascii_case("mp4") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 經過驗證的來源描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub locator: Url,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    /// 解析來源網址並依副檔名判斷類型
    ///
    /// 不連線，只做格式檢查
    pub fn parse(src: &str) -> Result<Self, PipelineError> {
        let src = src.trim();
        if src.is_empty() {
            return Err(FetchError::InvalidLocator("空白網址".to_string()).into());
        }

        let locator =
            Url::parse(src).map_err(|e| FetchError::InvalidLocator(format!("{src}: {e}")))?;

        if !matches!(locator.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLocator(format!(
                "不支援的協定 {}: {src}",
                locator.scheme()
            ))
            .into());
        }

        let kind = SourceKind::from_path(locator.path())
            .ok_or_else(|| PipelineError::UnsupportedSource(locator.path().to_string()))?;

        Ok(Self { locator, kind })
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.locator, self.kind)
    }
}

/// 快取鍵：64 字元十六進位雜湊加上來源副檔名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    hash: String,
    kind: SourceKind,
}

impl Fingerprint {
    #[must_use]
    pub fn of(locator: &Url, kind: SourceKind) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(locator.host_str().unwrap_or_default().as_bytes());
        // 非預設 port 視為不同來源
        if let Some(port) = locator.port() {
            hasher.update(format!(":{port}").as_bytes());
        }
        hasher.update(locator.path().as_bytes());

        Self {
            hash: hasher.finalize().to_hex().to_string(),
            kind,
        }
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// 下載檔與分鏡圖共用的基本檔名，例如 `<hash>.gif`
    #[must_use]
    pub fn base_name(&self) -> String {
        format!("{}.{}", self.hash, self.kind.extension())
    }

    #[must_use]
    pub fn resource_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.base_name())
    }

    /// 分鏡圖檔名，例如 `<hash>.mp4-40.gif`
    #[must_use]
    pub fn tile_name(&self, start_index: usize) -> String {
        format!("{}-{start_index}.{TILE_EXTENSION}", self.base_name())
    }

    #[must_use]
    pub fn tile_path(&self, cache_dir: &Path, start_index: usize) -> PathBuf {
        cache_dir.join(self.tile_name(start_index))
    }

    /// 第一張分鏡圖，存在即代表快取命中
    #[must_use]
    pub fn sentinel_path(&self, cache_dir: &Path) -> PathBuf {
        self.tile_path(cache_dir, 0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name())
    }
}
