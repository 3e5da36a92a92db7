//! 快取分鏡圖列表
//!
//! 不維護索引檔，直接從快取資料夾的檔名解析出分片起始索引

use crate::tools::Fingerprint;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// `<64 hex>.<gif|mp4>-<start>.gif`
static TILE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{64}\.(?:gif|mp4))-(\d+)\.gif$").expect("Invalid regex")
});

/// 已存在的分鏡圖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFile {
    pub path: PathBuf,
    pub file_name: String,
    pub start_index: usize,
    pub modified: Option<SystemTime>,
}

impl TileFile {
    /// 距離最後修改的時間；時間無法取得或在未來時回傳 `None`
    #[must_use]
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        now.duration_since(self.modified?).ok()
    }
}

/// 解析分鏡圖檔名，回傳（基本檔名, 起始索引）
#[must_use]
pub fn parse_tile_name(file_name: &str) -> Option<(&str, usize)> {
    let captures = TILE_NAME_REGEX.captures(file_name)?;
    let base = captures.get(1)?.as_str();
    let start_index = captures.get(2)?.as_str().parse().ok()?;
    Some((base, start_index))
}

/// 列出指紋對應的分鏡圖，依起始索引遞增排序
///
/// 快取資料夾不存在或沒有符合的檔案時回傳空列表；
/// 列表途中被清理掉的檔案視為不存在
pub fn list_tiles(cache_dir: &Path, fingerprint: &Fingerprint) -> io::Result<Vec<TileFile>> {
    if !cache_dir.exists() {
        return Ok(Vec::new());
    }

    let base = fingerprint.base_name();
    let mut tiles: Vec<TileFile> = WalkDir::new(cache_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_str()?.to_string();
            let (tile_base, start_index) = parse_tile_name(&file_name)?;
            if tile_base != base {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok();
            Some(TileFile {
                path: entry.into_path(),
                file_name,
                start_index,
                modified,
            })
        })
        .collect();

    tiles.sort_by_key(|tile| tile.start_index);
    Ok(tiles)
}

/// 刪除指紋對應的所有分鏡圖，回傳刪除數量
pub fn remove_tiles(cache_dir: &Path, fingerprint: &Fingerprint) -> io::Result<usize> {
    let mut removed = 0;
    for tile in list_tiles(cache_dir, fingerprint)? {
        match std::fs::remove_file(&tile.path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
