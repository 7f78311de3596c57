//! 認証情報の取り出し
//!
//! クエリ文字列を優先し、不足分をJSONまたはフォームのボディから補う。

use axum::async_trait;
use axum::extract::{FromRequest, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::Deserialize;

use super::error::HttpError;

#[derive(Debug, Default, Deserialize)]
struct CredentialParams {
    email: Option<String>,
    password: Option<String>,
}

impl CredentialParams {
    fn is_complete(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    fn or(self, other: CredentialParams) -> CredentialParams {
        CredentialParams {
            email: self.email.or(other.email),
            password: self.password.or(other.password),
        }
    }
}

/// `POST /export` の認証情報
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[async_trait]
impl<S> FromRequest<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<CredentialParams>::try_from_uri(req.uri())
            .map_err(|e| HttpError::Unprocessable(e.body_text()))?;

        let params = if query.is_complete() {
            query
        } else {
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();

            let body = if content_type.starts_with("application/json") {
                let Json(body) = Json::<CredentialParams>::from_request(req, state)
                    .await
                    .map_err(|e| HttpError::Unprocessable(e.body_text()))?;
                body
            } else if content_type.starts_with("application/x-www-form-urlencoded") {
                let Form(body) = Form::<CredentialParams>::from_request(req, state)
                    .await
                    .map_err(|e| HttpError::Unprocessable(e.body_text()))?;
                body
            } else {
                CredentialParams::default()
            };
            query.or(body)
        };

        let email = params
            .email
            .ok_or_else(|| HttpError::Unprocessable("missing required parameter: email".into()))?;
        let password = params.password.ok_or_else(|| {
            HttpError::Unprocessable("missing required parameter: password".into())
        })?;

        Ok(Self { email, password })
    }
}
