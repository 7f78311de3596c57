use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ExporterConfig;
use crate::dhd::DhdExporter;
use crate::error::ExportError;
use crate::traits::Scraper;

/// エクスポートリクエスト
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub email: String,
    pub password: String,
}

impl ExportRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// エクスポート結果
#[derive(Debug)]
pub struct ExportResult {
    pub job_id: Uuid,
    pub file_path: PathBuf,
    pub content: Vec<u8>,
}

impl ExportResult {
    pub async fn load(job_id: Uuid, file_path: PathBuf) -> Result<Self, ExportError> {
        let content = tokio::fs::read(&file_path).await?;
        Ok(Self {
            job_id,
            file_path,
            content,
        })
    }
}

/// tower::Serviceを実装したエクスポートサービス
///
/// ジョブはそれぞれ専用タスクで実行する。呼び出し側のFutureが破棄されても
/// タスクは最後まで走り、ブラウザを必ず閉じる。
#[derive(Debug, Clone)]
pub struct ExportService {
    /// 認証情報以外の設定（リクエストごとに認証情報を差し込む）
    template: ExporterConfig,
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new(ExporterConfig::default())
    }
}

impl ExportService {
    pub fn new(template: ExporterConfig) -> Self {
        Self { template }
    }

    pub fn config_for(&self, req: ExportRequest) -> ExporterConfig {
        self.template
            .clone()
            .with_credentials(req.email, req.password)
    }
}

impl Service<ExportRequest> for ExportService {
    type Response = ExportResult;
    type Error = ExportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExportRequest) -> Self::Future {
        let job_id = Uuid::new_v4();
        info!(%job_id, "Export request received: email={}", req.email);
        let config = self.config_for(req);

        Box::pin(async move {
            let job = tokio::spawn(async move {
                let mut exporter = DhdExporter::new(job_id, config);
                let file_path = exporter.execute().await?;
                ExportResult::load(job_id, file_path).await
            });

            let result = match job.await {
                Ok(result) => result,
                Err(e) => Err(ExportError::Worker(e.to_string())),
            };

            match &result {
                Ok(result) => info!(
                    %job_id,
                    "Export completed: path={:?}, size={}bytes",
                    result.file_path,
                    result.content.len()
                ),
                Err(e) => error!(%job_id, kind = e.kind(), "Export failed: {}", e),
            }

            result
        })
    }
}
