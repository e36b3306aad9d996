use std::fmt::Display;

use axum::{
    Json,
    body::Bytes,
    extract::{
        FromRequest, Request,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

use postbox_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    /// Same message for unknown user and wrong password.
    #[error("Invalid username/email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Client-facing context only; the cause is logged when constructed.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(context: &str, cause: impl Display) -> Self {
        error!("{}: {:#}", context, cause);
        ApiError::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let redirect_to = matches!(self, ApiError::Unauthorized).then(|| "/login".to_string());
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            redirect_to,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal("An unexpected error occurred", err)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!("Rejected multipart body: {}", rejection.body_text());
        ApiError::bad_request("Invalid form data")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        debug!("Malformed multipart body: {}", err.body_text());
        ApiError::bad_request("Invalid form data")
    }
}

/// JSON request body. Parsed whatever `Content-Type` the client sent, since
/// a bare `fetch` with a string body arrives as `text/plain`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            debug!("Failed to read request body: {}", e.body_text());
            ApiError::bad_request("Invalid data format")
        })?;

        serde_json::from_slice(&bytes).map(JsonBody).map_err(|e| {
            debug!("Rejected JSON body: {}", e);
            ApiError::bad_request("Invalid data format")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_points_to_login() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("boom", "cause").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[derive(Debug, serde::Deserialize)]
    struct Ping {
        id: String,
    }

    async fn extract(content_type: &str, body: &'static str) -> Result<JsonBody<Ping>, ApiError> {
        let req = Request::builder()
            .method("POST")
            .header("content-type", content_type)
            .body(axum::body::Body::from(body))
            .unwrap();
        JsonBody::<Ping>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn json_body_ignores_content_type() {
        let JsonBody(ping) = extract("text/plain;charset=UTF-8", r#"{"id":"a1"}"#).await.unwrap();
        assert_eq!(ping.id, "a1");

        let JsonBody(ping) = extract("application/json", r#"{"id":"b2"}"#).await.unwrap();
        assert_eq!(ping.id, "b2");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        for body in ["", "not json", r#"{"id": 5}"#] {
            let err = extract("application/json", body).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(err.to_string(), "Invalid data format");
        }
    }

    #[test]
    fn internal_hides_cause() {
        let err = ApiError::internal("Failed to save photo", "disk full at /var/secret");
        assert_eq!(err.to_string(), "Failed to save photo");
    }
}
