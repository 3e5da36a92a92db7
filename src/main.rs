use anyhow::Result;
use console::{Term, style};
use gif_tiler::cache::CacheSweeper;
use gif_tiler::config::Config;
use gif_tiler::init;
use gif_tiler::menu::show_main_menu;
use gif_tiler::signal::setup_shutdown_signal;
use gif_tiler::tools::{check_ffmpeg, ensure_directory_exists};
use log::{info, warn};

fn main() -> Result<()> {
    init::init();
    let term = Term::stdout();
    let shutdown_signal = setup_shutdown_signal()?;

    let mut config = Config::new()?;
    let settings = &config.settings;
    ensure_directory_exists(&settings.cache_dir)?;

    match check_ffmpeg(&settings.ffmpeg_bin) {
        Ok(version) => info!("{version}"),
        Err(e) => warn!("找不到 ffmpeg，MP4 來源將無法處理: {e}"),
    }

    let sweeper = CacheSweeper::new(
        &settings.cache_dir,
        settings.cache_retention(),
        settings.sweep_interval(),
    )
    .spawn()?;

    loop {
        match show_main_menu(&term, &shutdown_signal, &mut config) {
            Ok(true) => {}
            Ok(false) => {
                term.clear_screen()?;
                println!("\n{}", style("再見！").green().bold());
                info!("Program exited normally");
                break;
            }
            Err(e) => {
                warn!("Program error: {e}");
                eprintln!("{} {}", style("錯誤:").red().bold(), e);
                break;
            }
        }
    }

    sweeper.shutdown();
    Ok(())
}
