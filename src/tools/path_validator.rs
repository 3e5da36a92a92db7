use anyhow::{Result, bail};
use std::path::Path;

pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("路徑不存在: {}", path.display());
    }
    if !path.is_dir() {
        bail!("路徑不是資料夾: {}", path.display());
    }
    Ok(())
}

/// 快取資料夾不存在時建立，存在但不是資料夾則回報錯誤
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    validate_directory_exists(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let cache = temp_dir.path().join("a").join("cache");
        ensure_directory_exists(&cache).unwrap();
        assert!(cache.is_dir());
    }

    #[test]
    fn test_file_is_not_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("cache");
        std::fs::write(&file, b"x").unwrap();
        assert!(validate_directory_exists(&file).is_err());
        assert!(ensure_directory_exists(&file).is_err());
    }
}
