use crate::config::types::{Config, TilerSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 預設設定檔位置（目前工作目錄）
pub const SETTINGS_FILE: &str = "settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_path(Path::new(SETTINGS_FILE))
    }

    /// 從指定的設定檔載入，檔案不存在時使用預設值
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            settings: load_settings(path)?,
        })
    }
}

fn load_settings(path: &Path) -> Result<TilerSettings> {
    if !path.exists() {
        return Ok(TilerSettings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))
}
