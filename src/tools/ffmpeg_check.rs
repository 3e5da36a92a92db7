use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};

/// 確認 ffmpeg 可以執行，回傳版本字串的第一行
pub fn check_ffmpeg(program: &str) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("無法執行 {program}，請確認路徑設定正確"))?;

    if !output.status.success() {
        bail!("{program} -version 執行失敗: {}", output.status);
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}
