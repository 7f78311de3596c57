//! ルーター構築

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tower::Service;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers;
use crate::error::ExportError;
use crate::service::{ExportRequest, ExportResult};

/// ルーターを作成
///
/// エクスポート処理は `Service` として注入する（本番は `ExportService`）。
pub fn create_router<S>(service: S) -> Router
where
    S: Service<ExportRequest, Response = ExportResult, Error = ExportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    Router::new()
        .route("/export", post(handlers::export::<S>))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(service)
}

/// リクエストのスパン
///
/// クエリ文字列には認証情報が入るので、記録するのはパスだけ。
fn request_span(req: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
    )
}
