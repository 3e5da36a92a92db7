use super::compositor::TileCompositor;
use super::request::TileRequest;
use crate::cache::{TileFile, list_tiles};
use crate::config::TilerSettings;
use crate::error::{FetchError, PipelineError};
use crate::tools::{
    AcquireOutcome, FfmpegFrameSource, Fetcher, Fingerprint, FrameSource, GifFrameSource,
    HttpFetcher, SourceDescriptor, SourceKind, acquire,
};
use log::{debug, error, info, warn};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;

/// 分鏡請求的回應
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileResponse {
    /// 依播放順序排列的分鏡圖
    Tiles(Vec<TileFile>),
    /// 處理後仍沒有任何分鏡圖
    NoCache,
    /// 預熱已在背景開始
    Preheating,
}

/// 分鏡服務
///
/// 流程：指紋 → 下載（已存在則略過）→ 擷取影格 → 網格配置 → 平行拼接 → 列出快取
#[derive(Clone)]
pub struct TileService {
    settings: TilerSettings,
    fetcher: Arc<dyn Fetcher>,
    shutdown_signal: Arc<AtomicBool>,
}

impl TileService {
    #[must_use]
    pub fn new(
        settings: TilerSettings,
        fetcher: Arc<dyn Fetcher>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            shutdown_signal,
        }
    }

    /// 使用 HTTP 下載器建立服務
    pub fn with_http(
        settings: TilerSettings,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(settings.download_timeout(), settings.accept_invalid_certs)?;
        Ok(Self::new(settings, Arc::new(fetcher), shutdown_signal))
    }

    #[must_use]
    pub const fn settings(&self) -> &TilerSettings {
        &self.settings
    }

    /// 處理分鏡請求
    ///
    /// 預熱請求立即回傳 `Preheating`，實際處理在背景執行緒完成，錯誤只記錄
    pub fn handle(&self, request: &TileRequest) -> Result<TileResponse, PipelineError> {
        if request.preheat {
            self.spawn_preheat(request.clone())?;
            return Ok(TileResponse::Preheating);
        }

        self.populate(request)?;
        self.lookup(&request.source)
    }

    /// 只查詢快取，不下載也不產生
    pub fn lookup(&self, source: &SourceDescriptor) -> Result<TileResponse, PipelineError> {
        let tiles = list_tiles(&self.settings.cache_dir, &source.fingerprint())
            .map_err(|e| PipelineError::io(&self.settings.cache_dir, e))?;

        if tiles.is_empty() {
            Ok(TileResponse::NoCache)
        } else {
            Ok(TileResponse::Tiles(tiles))
        }
    }

    fn spawn_preheat(&self, request: TileRequest) -> Result<(), PipelineError> {
        let service = self.clone();
        thread::Builder::new()
            .name("preheat".to_string())
            .spawn(move || {
                let locator = request.source.locator.clone();
                match service.populate(&request) {
                    Ok(true) => info!("預熱完成: {locator}"),
                    Ok(false) => debug!("預熱略過，快取已存在: {locator}"),
                    Err(e) => error!("預熱失敗 {locator}: {e}"),
                }
            })
            .map_err(|e| PipelineError::io(&self.settings.cache_dir, e))?;
        Ok(())
    }

    /// 快取未命中或要求重新產生時執行完整流程，回傳是否有重新產生
    pub fn populate(&self, request: &TileRequest) -> Result<bool, PipelineError> {
        let cache_dir = &self.settings.cache_dir;
        let fingerprint = request.source.fingerprint();

        if !request.refresh && fingerprint.sentinel_path(cache_dir).exists() {
            debug!("快取命中: {fingerprint}");
            return Ok(false);
        }

        fs::create_dir_all(cache_dir).map_err(|e| PipelineError::io(cache_dir, e))?;
        let resource = fingerprint.resource_path(cache_dir);
        if request.refresh {
            remove_if_exists(&resource).map_err(|e| PipelineError::io(&resource, e))?;
        }

        match acquire(self.fetcher.as_ref(), &request.source.locator, &resource)? {
            AcquireOutcome::Downloaded { bytes } => {
                debug!("已下載 {bytes} bytes: {fingerprint}");
            }
            AcquireOutcome::AlreadyPresent => {}
        }

        let sequence = match self.frame_source(request).extract(&resource) {
            Ok(sequence) => sequence,
            Err(e) => {
                self.discard_resource(&fingerprint, &e);
                return Err(e);
            }
        };

        let composed = TileCompositor::new(
            cache_dir,
            request.quality,
            self.settings.effective_worker_count(),
            Arc::clone(&self.shutdown_signal),
        )
        .compose(&fingerprint, &sequence, request.width);

        match composed {
            Ok(_) => Ok(true),
            // 沒有影格或尺寸無效，下載檔本身不可用
            Err(e @ PipelineError::Layout(_)) => {
                self.discard_resource(&fingerprint, &e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn frame_source(&self, request: &TileRequest) -> Box<dyn FrameSource> {
        match request.source.kind {
            SourceKind::Gif => Box::new(GifFrameSource),
            SourceKind::Video => Box::new(FfmpegFrameSource::new(
                &self.settings.ffmpeg_bin,
                request.fps,
                self.settings.max_video_frames,
                Arc::clone(&self.shutdown_signal),
            )),
        }
    }

    /// 無法解碼或沒有影格的下載檔刪掉，下次請求會重新下載
    fn discard_resource(&self, fingerprint: &Fingerprint, cause: &PipelineError) {
        if matches!(cause, PipelineError::Cancelled) {
            return;
        }
        let resource = fingerprint.resource_path(&self.settings.cache_dir);
        if let Err(e) = remove_if_exists(&resource) {
            warn!("無法刪除無效的下載檔 {}: {e}", resource.display());
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Rgba, RgbaImage};
    use reqwest::Url;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    impl StaticFetcher {
        fn new(body: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body,
            })
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, _url: &Url) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn gif_bytes(frame_count: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frames = (0..frame_count).map(|i| {
                let shade = u8::try_from(i * 20 % 256).unwrap();
                image::Frame::new(RgbaImage::from_pixel(100, 60, Rgba([shade, 0, 0, 255])))
            });
            encoder.encode_frames(frames).unwrap();
        }
        bytes
    }

    fn service(cache_dir: &Path, fetcher: Arc<StaticFetcher>) -> TileService {
        let settings = TilerSettings {
            worker_count: 2,
            ..TilerSettings::default().with_cache_dir(cache_dir)
        };
        TileService::new(settings, fetcher, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_populate_then_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join("cache");
        let fetcher = StaticFetcher::new(gif_bytes(12));
        let service = service(&cache_dir, Arc::clone(&fetcher));
        let request = TileRequest::new("https://example.com/anim.gif").unwrap();

        assert!(service.populate(&request).unwrap());
        assert!(!service.populate(&request).unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let TileResponse::Tiles(tiles) = service.handle(&request).unwrap() else {
            panic!("expected tiles");
        };
        assert_eq!(tiles[0].start_index, 0);
    }

    #[test]
    fn test_refresh_downloads_again() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new(gif_bytes(3));
        let service = service(temp_dir.path(), Arc::clone(&fetcher));
        let request = TileRequest::new("https://example.com/anim.gif").unwrap();

        service.populate(&request).unwrap();
        assert!(service.populate(&request.clone().with_refresh(true)).unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_undecodable_download_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new(b"<html>blocked</html>".to_vec());
        let service = service(temp_dir.path(), Arc::clone(&fetcher));
        let request = TileRequest::new("https://example.com/anim.gif").unwrap();

        let err = service.populate(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));

        let resource = request.source.fingerprint().resource_path(temp_dir.path());
        assert!(!resource.exists());
        assert_eq!(
            service.lookup(&request.source).unwrap(),
            TileResponse::NoCache
        );
    }

    #[test]
    fn test_lookup_without_cache() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new(Vec::new());
        let service = service(temp_dir.path(), Arc::clone(&fetcher));
        let source = SourceDescriptor::parse("https://example.com/clip.mp4").unwrap();

        assert_eq!(service.lookup(&source).unwrap(), TileResponse::NoCache);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preheat_returns_immediately_and_fills_cache() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new(gif_bytes(5));
        let service = service(temp_dir.path(), Arc::clone(&fetcher));
        let request = TileRequest::new("https://example.com/preheat.gif")
            .unwrap()
            .with_preheat(true);

        assert_eq!(service.handle(&request).unwrap(), TileResponse::Preheating);

        let mut response = TileResponse::NoCache;
        for _ in 0..250 {
            response = service.lookup(&request.source).unwrap();
            if matches!(response, TileResponse::Tiles(_)) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(20));
        }

        let TileResponse::Tiles(tiles) = response else {
            panic!("預熱後應該有分鏡圖");
        };
        assert_eq!(tiles[0].start_index, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_video_without_frames_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let cache_dir = temp_dir.path().join("cache");
        let fetcher = StaticFetcher::new(b"not really a video".to_vec());
        let settings = TilerSettings {
            worker_count: 1,
            // 不輸出任何影格且正常結束
            ffmpeg_bin: "true".to_string(),
            ..TilerSettings::default().with_cache_dir(&cache_dir)
        };
        let service = TileService::new(
            settings,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(AtomicBool::new(false)),
        );
        let request = TileRequest::new("https://example.com/empty.mp4").unwrap();

        let err = service.populate(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Layout(_)));
        assert!(!request.source.fingerprint().resource_path(&cache_dir).exists());

        // 下載檔已刪除，重試會重新下載
        let _ = service.populate(&request);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
