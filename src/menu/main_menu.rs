use crate::config::save::save_settings;
use crate::config::{Config, SETTINGS_FILE};
use crate::menu::handlers::{
    run_cache_inspector, run_cache_sweep, run_preheat, run_tile_generator,
};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== GIF / MP4 分鏡系統 ===").cyan().bold());
    println!("{}", style("按 ESC 離開").dim());

    let options = vec![
        "產生分鏡",
        "預熱分鏡快取",
        "查看快取",
        "立即清理過期快取",
        "設定",
        "離開",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_tile_generator(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            run_preheat(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(2) => {
            run_cache_inspector(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(3) => {
            run_cache_sweep(term, config)?;
            Ok(true)
        }
        Some(4) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(5) | None => Ok(false), // ESC pressed - exit
        _ => unreachable!(),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style("按 ESC 返回").dim());

        let settings = &config.settings;
        let options = vec![
            format!("快取資料夾 ({})", settings.cache_dir.display()),
            format!("快取保留天數 ({})", settings.cache_expire_days),
            format!("下載逾時秒數 ({})", settings.download_timeout_secs),
            format!("ffmpeg 路徑 ({})", settings.ffmpeg_bin),
            "返回".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇要修改的設定")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let changed = match selection {
            Some(0) => {
                let value = prompt_value("快取資料夾", &config.settings.cache_dir.display())?;
                config.settings.cache_dir = PathBuf::from(value.trim());
                true
            }
            Some(1) => prompt_number("快取保留天數", &mut config.settings.cache_expire_days)?,
            Some(2) => {
                prompt_number("下載逾時秒數", &mut config.settings.download_timeout_secs)?
            }
            Some(3) => {
                let value = prompt_value("ffmpeg 路徑", &config.settings.ffmpeg_bin)?;
                config.settings.ffmpeg_bin = value.trim().to_string();
                true
            }
            Some(4) | None => break, // ESC or back
            _ => unreachable!(),
        };

        if changed {
            save_settings(&config.settings, Path::new(SETTINGS_FILE))?;
            println!("\n{}", style("設定已儲存，部分設定需重新啟動才會生效").green());
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }

    Ok(())
}

fn prompt_value(prompt: &str, current: &dyn std::fmt::Display) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .interact_text()?;
    Ok(value)
}

/// 數值必須大於 0，否則不變更
fn prompt_number(prompt: &str, target: &mut u64) -> Result<bool> {
    let value = prompt_value(prompt, &*target)?;
    match value.trim().parse::<u64>() {
        Ok(number) if number > 0 => {
            *target = number;
            Ok(true)
        }
        _ => {
            println!("{}", style("請輸入大於 0 的整數").yellow());
            std::thread::sleep(std::time::Duration::from_secs(1));
            Ok(false)
        }
    }
}
