use crate::cache::CacheSweeper;
use crate::component::TileGenerator;
use crate::config::Config;
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_tile_generator(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    let generator = TileGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_preheat(term: &Term, shutdown_signal: &Arc<AtomicBool>, config: &Config) -> Result<()> {
    let generator = TileGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.preheat() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_cache_inspector(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<()> {
    let generator = TileGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.inspect() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_cache_sweep(term: &Term, config: &Config) -> Result<()> {
    let settings = &config.settings;
    let sweeper = CacheSweeper::new(
        &settings.cache_dir,
        settings.cache_retention(),
        settings.sweep_interval(),
    );

    println!("{}", style("=== 清理過期快取 ===").cyan().bold());
    let report = sweeper.sweep();
    println!(
        "{}",
        style(format!(
            "掃描 {} 個檔案，刪除 {} 個，失敗 {} 個",
            report.scanned, report.removed, report.failed
        ))
        .green()
    );

    pause(term)?;
    Ok(())
}
