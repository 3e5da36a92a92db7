use super::request::{DEFAULT_FPS, DEFAULT_QUALITY, DEFAULT_WIDTH, RawTileParams, TileRequest};
use super::service::{TileResponse, TileService};
use crate::cache::TileFile;
use crate::config::Config;
use crate::tools::{SourceDescriptor, SourceKind};
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant, SystemTime};

/// 分鏡產生器（互動介面）
///
/// 詢問來源網址與參數後交給 [`TileService`] 處理，並列出產生的分鏡圖
pub struct TileGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl TileGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    /// 產生分鏡圖並等待完成
    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 產生分鏡圖 ===").cyan().bold());

        let raw = self.prompt_params(true)?;
        let request = TileRequest::from_raw(&raw).context("來源網址無效")?;
        let service = self.service()?;

        let spinner = create_spinner(&format!("處理中: {}", request.source.locator));
        let started = Instant::now();
        let result = service.handle(&request);
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                info!(
                    "分鏡處理完成: {} ({:.2}s)",
                    request.source.locator,
                    started.elapsed().as_secs_f64()
                );
                print_response(&response);
                Ok(())
            }
            Err(e) => {
                error!("分鏡處理失敗 {}: {e}", request.source.locator);
                Err(e.into())
            }
        }
    }

    /// 背景預熱，不等待結果
    pub fn preheat(&self) -> Result<()> {
        println!("{}", style("=== 預熱分鏡快取 ===").cyan().bold());

        let mut raw = self.prompt_params(false)?;
        raw.preheat = Some("1".to_string());
        let request = TileRequest::from_raw(&raw).context("來源網址無效")?;

        let response = self.service()?.handle(&request)?;
        print_response(&response);
        Ok(())
    }

    /// 只查詢快取，不下載
    pub fn inspect(&self) -> Result<()> {
        println!("{}", style("=== 查看分鏡快取 ===").cyan().bold());

        let src = prompt_source()?;
        let request = TileRequest::new(&src).context("來源網址無效")?;
        let response = self.service()?.lookup(&request.source)?;
        print_response(&response);
        Ok(())
    }

    fn service(&self) -> Result<TileService> {
        TileService::with_http(
            self.config.settings.clone(),
            Arc::clone(&self.shutdown_signal),
        )
        .context("無法建立下載器")
    }

    fn prompt_params(&self, ask_refresh: bool) -> Result<RawTileParams> {
        let src = prompt_source()?;

        let width: String = Input::new()
            .with_prompt("輸出寬度（需大於 1000）")
            .default(DEFAULT_WIDTH.to_string())
            .interact_text()?;

        let quality: String = Input::new()
            .with_prompt("JPEG 品質 (1-100)")
            .default(DEFAULT_QUALITY.to_string())
            .interact_text()?;

        // 影格率只對影片有意義
        let fps = if SourceDescriptor::parse(&src).is_ok_and(|d| d.kind == SourceKind::Video) {
            let fps: String = Input::new()
                .with_prompt("每秒擷取影格數")
                .default(DEFAULT_FPS.to_string())
                .interact_text()?;
            Some(fps)
        } else {
            None
        };

        let refresh = ask_refresh
            && Confirm::new()
                .with_prompt("忽略快取並重新產生？")
                .default(false)
                .interact()?;

        Ok(RawTileParams {
            src,
            width: Some(width),
            quality: Some(quality),
            fps,
            refresh: refresh.then(|| "1".to_string()),
            preheat: None,
        })
    }
}

fn prompt_source() -> Result<String> {
    let src: String = Input::new()
        .with_prompt("請輸入 GIF 或 MP4 網址")
        .interact_text()?;
    Ok(src.trim().to_string())
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .expect("Invalid spinner template"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_response(response: &TileResponse) {
    match response {
        TileResponse::Tiles(tiles) => print_tiles(tiles),
        TileResponse::NoCache => println!("{}", style("沒有快取").yellow()),
        TileResponse::Preheating => println!("{}", style("預熱中，完成後即可直接取用").green()),
    }
}

fn print_tiles(tiles: &[TileFile]) {
    println!(
        "{}",
        style(format!("共 {} 張分鏡圖：", tiles.len())).green()
    );
    let now = SystemTime::now();
    for tile in tiles {
        println!(
            "  {:>5}  {}  {}",
            style(tile.start_index).dim(),
            tile.path.display(),
            style(format_age(tile.age(now))).dim()
        );
    }
}

fn format_age(age: Option<Duration>) -> String {
    let Some(age) = age else {
        return "-".to_string();
    };
    let minutes = age.as_secs() / 60;
    match minutes {
        0 => "剛剛".to_string(),
        1..60 => format!("{minutes} 分鐘前"),
        60..1440 => format!("{} 小時前", minutes / 60),
        _ => format!("{} 天前", minutes / 1440),
    }
}
