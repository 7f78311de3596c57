//! DHD エクスポートモジュール
//!
//! platform.dhd-dz.com にログインしてエクスポートファイルを取得する

mod scraper;
mod storage;
mod types;

pub use scraper::DhdExporter;
pub use storage::{sanitize_filename, STAGING_DIR};
pub use types::{
    Clock, DateRange, FieldSelectors, FilterValues, FixedClock, SiteConfig, SystemClock,
    DATE_FORMAT,
};
