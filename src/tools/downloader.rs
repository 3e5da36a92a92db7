//! 遠端資源下載
//!
//! `Fetcher` 抽象 HTTP 取得，方便測試時替換；`acquire` 確保同一路徑只下載一次

use crate::error::FetchError;
use log::{debug, info};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT_ENCODING;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 部分來源站會拒絕沒有瀏覽器 User-Agent 的請求
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.110 Safari/537.36";

/// 取得遠端資源完整內容
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// 使用 reqwest 的 HTTP 下載器
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// 建立下載器
    ///
    /// `accept_invalid_certs` 為 true 時略過 TLS 憑證驗證，
    /// 用於相容自簽或設定錯誤的來源站，會降低傳輸安全性
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::Request(format!("無法建立 HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("下載: {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::NonOkStatus(status.as_u16()));
        }

        let body = response.bytes().map_err(map_reqwest_error)?;
        Ok(body.to_vec())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Request(err.to_string())
    }
}

/// 下載結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Downloaded { bytes: usize },
    AlreadyPresent,
}

/// 下載資源到 `destination`，已存在時直接成功
///
/// 先寫入同目錄的暫存檔再改名，失敗時不會留下不完整的檔案
pub fn acquire(
    fetcher: &dyn Fetcher,
    locator: &Url,
    destination: &Path,
) -> Result<AcquireOutcome, FetchError> {
    if destination.exists() {
        debug!("資源已存在，略過下載: {}", destination.display());
        return Ok(AcquireOutcome::AlreadyPresent);
    }

    let contents = fetcher.fetch(locator)?;
    let staging = staging_path(destination);

    fs::write(&staging, &contents).map_err(|source| FetchError::IoError {
        path: staging.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(&staging, destination) {
        let _ = fs::remove_file(&staging);
        return Err(FetchError::IoError {
            path: destination.to_path_buf(),
            source,
        });
    }

    info!(
        "下載完成: {} -> {} ({} bytes)",
        locator,
        destination.display(),
        contents.len()
    );

    Ok(AcquireOutcome::Downloaded {
        bytes: contents.len(),
    })
}

fn staging_path(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map_or_else(|| "download".to_string(), |n| n.to_string_lossy().to_string());
    destination.with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()))
}
