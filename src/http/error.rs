//! HTTPエラーとレスポンスへの変換

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::error::ExportError;

#[derive(Debug, Error)]
pub enum HttpError {
    /// エクスポート失敗。種別はボディの `type` で区別し、ステータスは常に500
    #[error("Error: {message}")]
    Export { message: String, kind: &'static str },

    /// 必須パラメータ不足・不正なボディ
    #[error("{0}")]
    Unprocessable(String),
}

/// JSONエラーボディ
///
/// `detail` は `error` と同じ文字列（既存クライアントが参照するキー）。
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
    status: u16,
    #[serde(rename = "type")]
    error_type: &'static str,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            HttpError::Export { kind, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *kind),
            HttpError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST"),
        };

        let message = self.to_string();
        let body = ErrorBody {
            detail: message.clone(),
            error: message,
            status: status.as_u16(),
            error_type,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ExportError> for HttpError {
    fn from(err: ExportError) -> Self {
        HttpError::Export {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
