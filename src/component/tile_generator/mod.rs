//! 分鏡圖產生元件
//!
//! 流程：
//! A. 正規化請求參數並驗證來源網址
//! B. 下載來源檔（已存在則略過）
//! C. 解碼 GIF 或以 ffmpeg 擷取影片影格
//! D. 計算網格配置並切分為分片
//! E. 平行拼接、壓縮並寫入快取

mod compositor;
mod encoder;
mod main;
mod request;
mod service;

pub use compositor::{Composition, Shard, TileCompositor, plan_shards, render_shard};
pub use encoder::{JpegCodec, PngCodec, TileCodec, encode_with_fallback};
pub use main::TileGenerator;
pub use request::{
    DEFAULT_FPS, DEFAULT_QUALITY, DEFAULT_WIDTH, MIN_WIDTH, RawTileParams, TileRequest,
};
pub use service::{TileResponse, TileService};
