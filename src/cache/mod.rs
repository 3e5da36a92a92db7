//! 本地檔案快取
//!
//! 快取內容只有下載檔與分鏡圖，狀態完全由檔案系統推得

mod listing;
mod sweeper;

pub use listing::{TileFile, list_tiles, parse_tile_name, remove_tiles};
pub use sweeper::{CacheSweeper, SweepReport, SweeperHandle};
