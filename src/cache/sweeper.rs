//! 過期快取清理
//!
//! 背景執行緒依固定週期掃描快取資料夾，刪除修改時間超過保留期限的檔案。
//! 刪除失敗只記錄，不中斷掃描；掃描途中消失的檔案視為已不存在

use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// 單次清理結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// 過期快取清理器
#[derive(Debug, Clone)]
pub struct CacheSweeper {
    cache_dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl CacheSweeper {
    #[must_use]
    pub fn new(cache_dir: &Path, retention: Duration, interval: Duration) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            retention,
            interval,
        }
    }

    #[must_use]
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// 以 `now` 為基準清理一次
    #[must_use]
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for entry in WalkDir::new(&self.cache_dir).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("略過無法讀取的項目: {e}");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            report.scanned += 1;

            let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            // 修改時間在未來時 duration_since 失敗，視為未過期
            let expired = now
                .duration_since(modified)
                .is_ok_and(|age| age > self.retention);
            if !expired {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("刪除過期快取: {}", entry.path().display());
                    report.removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("無法刪除過期快取 {}: {e}", entry.path().display());
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// 啟動背景清理執行緒
    ///
    /// 每個週期清理一次，直到呼叫 [`SweeperHandle::shutdown`] 或 handle 被丟棄
    pub fn spawn(self) -> io::Result<SweeperHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("cache-sweeper".to_string())
            .spawn(move || {
                info!(
                    "快取清理啟動: {} (保留 {:?}, 週期 {:?})",
                    self.cache_dir.display(),
                    self.retention,
                    self.interval
                );
                loop {
                    match stop_rx.recv_timeout(self.interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let report = self.sweep();
                            debug!(
                                "快取清理完成 - 掃描: {}, 刪除: {}, 失敗: {}",
                                report.scanned, report.removed, report.failed
                            );
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("快取清理停止");
            })?;

        Ok(SweeperHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }
}

/// 背景清理執行緒的控制 handle
pub struct SweeperHandle {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// 通知停止並等待執行緒結束
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("快取清理執行緒異常結束");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
