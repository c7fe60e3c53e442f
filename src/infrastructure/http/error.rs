//! HTTP Error Handling
//!
//! 响应体沿用统一格式 { errno, error, data: null }，
//! HTTP 状态码与 errno 一致

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::application::SynthesisError;

/// 统一错误响应格式
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 空文本请求的错误信息，客户端据此还原 EmptyInput
pub const NO_TEXT_MESSAGE: &str = "No text provided";

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const PAYLOAD_TOO_LARGE: i32 = 413;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const BAD_GATEWAY: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge(String),
    BadGateway(String),
    Internal(String),
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, i32, &str) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, errno::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, errno::PAYLOAD_TOO_LARGE, msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, errno::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, errno::INTERNAL_ERROR, msg)
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                errno::SERVICE_UNAVAILABLE,
                msg,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg) = self.parts();

        if status.is_server_error() {
            tracing::error!(errno = code, error = %msg, "Request failed");
        } else {
            tracing::warn!(errno = code, error = %msg, "Bad request");
        }

        (status, Json(ErrorResponse::new(code, msg))).into_response()
    }
}

impl From<SynthesisError> for ApiError {
    fn from(e: SynthesisError) -> Self {
        match e {
            SynthesisError::EmptyInput => ApiError::BadRequest(NO_TEXT_MESSAGE.to_string()),
            SynthesisError::PartialSynthesis { .. } => ApiError::BadGateway(e.to_string()),
            SynthesisError::Assembly(_) => ApiError::Internal(e.to_string()),
            SynthesisError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}
