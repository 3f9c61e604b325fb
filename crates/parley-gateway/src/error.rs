// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error responses for action endpoints.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_core::ParleyError;
use serde::Serialize;

/// A [`ParleyError`] on its way out as `{ok: false, error, code}`.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ParleyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ParleyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ParleyError::Storage { .. } | ParleyError::ResponderUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ParleyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ParleyError::Config(_) | ParleyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "action failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "action rejected");
        }
        let body = ErrorBody {
            ok: false,
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections use the same error body as every other
/// failure.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError(ParleyError::invalid(rejection.body_text()))),
        }
    }
}
