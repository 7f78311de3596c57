use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::ExportError;

#[async_trait]
pub trait Scraper: Send + Sync {
    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ExportError>;

    /// ログイン実行
    async fn login(&mut self) -> Result<(), ExportError>;

    /// ファイルダウンロード
    async fn download(&mut self) -> Result<PathBuf, ExportError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ExportError>;

    /// 失敗直後、close前に呼ばれる
    async fn on_error(&mut self, _error: &ExportError) {}

    /// initialize → login → download
    async fn run_steps(&mut self) -> Result<PathBuf, ExportError> {
        self.initialize().await?;
        self.login().await?;
        self.download().await
    }

    /// 一括実行。成功・失敗に関わらず必ずcloseする
    async fn execute(&mut self) -> Result<PathBuf, ExportError> {
        let outcome = self.run_steps().await;
        if let Err(e) = &outcome {
            self.on_error(e).await;
        }
        let closed = self.close().await;
        let path = outcome?;
        closed?;
        Ok(path)
    }
}
