//! ハンドラ

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tower::{Service, ServiceExt};

use super::error::HttpError;
use super::extract::Credentials;
use crate::error::ExportError;
use crate::service::{ExportRequest, ExportResult};

/// レスポンスのファイル名（サイトの提案ファイル名に関わらず固定）
pub const EXPORT_FILENAME: &str = "dhd_export.xlsx";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// `POST /export`
///
/// エクスポートを実行し、取得したファイルをそのまま返す。
pub async fn export<S>(
    State(service): State<S>,
    credentials: Credentials,
) -> Result<Response, HttpError>
where
    S: Service<ExportRequest, Response = ExportResult, Error = ExportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    let request = ExportRequest::new(credentials.email, credentials.password);
    let result = service.oneshot(request).await?;

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        result.content,
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}
