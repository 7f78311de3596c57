//! HTTPエンドポイント
//!
//! - `POST /export` : 認証情報を受け取りエクスポートファイルを返す
//! - `GET /health`  : ヘルスチェック

mod error;
mod extract;
mod handlers;
mod routes;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ExporterConfig;
use crate::service::ExportService;

pub use error::HttpError;
pub use extract::Credentials;
pub use handlers::{EXPORT_FILENAME, XLSX_CONTENT_TYPE};
pub use routes::create_router;

/// サーバー設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 各ジョブのテンプレート設定（認証情報はリクエストから）
    pub exporter: ExporterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            exporter: ExporterConfig::default(),
        }
    }
}

/// サーバーを起動（終了するまで戻らない）
pub async fn start_server(config: ServerConfig) -> std::io::Result<()> {
    let app = create_router(ExportService::new(config.exporter));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("DHD export server listening on http://{}", addr);

    axum::serve(listener, app).await
}
