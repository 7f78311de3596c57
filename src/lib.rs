//! DHD エクスポートサービス
//!
//! - platform.dhd-dz.com にログインしてエクスポートファイル (xlsx) をダウンロード
//! - `POST /export` でダウンロードしたファイルを返すHTTPサーバー
//!
//! # 使用例
//!
//! ```rust,ignore
//! use dhd_export_service::{ExportService, ExportRequest, ExporterConfig};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let template = ExporterConfig::default()
//!         .with_download_path("./downloads")
//!         .with_headless(false);
//!     let mut service = ExportService::new(template);
//!
//!     let request = ExportRequest::new("user@example.com", "password");
//!     let result = service.call(request).await.unwrap();
//!     println!("Export downloaded: {:?}", result.file_path);
//! }
//! ```
//!
//! # サーバー起動例
//!
//! ```rust,ignore
//! use dhd_export_service::http::{start_server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     start_server(ServerConfig::default()).await.unwrap();
//! }
//! ```

pub mod config;
pub mod dhd;
pub mod error;
pub mod http;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::ExporterConfig;
pub use dhd::{Clock, DateRange, DhdExporter, FixedClock, SiteConfig, SystemClock};
pub use error::ExportError;
pub use service::{ExportRequest, ExportResult, ExportService};
pub use traits::Scraper;
