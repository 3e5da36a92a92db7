pub mod load;
pub mod save;
pub mod types;

pub use load::SETTINGS_FILE;
pub use save::save_settings;
pub use types::{
    Config, DEFAULT_CACHE_DIR, DEFAULT_CACHE_EXPIRE_DAYS, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_FFMPEG_BIN, DEFAULT_MAX_VIDEO_FRAMES, DEFAULT_SWEEP_INTERVAL_SECS, TilerSettings,
};
