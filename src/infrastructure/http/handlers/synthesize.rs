//! Synthesize Handler
//!
//! POST /api/tts (/api/synthesize) - 文本合成为一个完整音频文件

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::infrastructure::http::dto::{
    SynthesizeRequest, AUDIO_DURATION_HEADER, CHUNK_COUNT_HEADER,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 请求体被拒绝: 超过大小上限为 413，其余为 400
fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(rejection.body_text())
    } else {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(rejection_to_error)?;

    let artifact = state.synthesis_service.synthesize_document(&req.text).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.mime_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name()),
        )
        .header(header::CONTENT_LENGTH, artifact.len())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(CHUNK_COUNT_HEADER, artifact.chunk_count);
    if let Some(duration_ms) = artifact.duration_ms {
        builder = builder.header(AUDIO_DURATION_HEADER, duration_ms);
    }

    builder
        .body(Body::from(artifact.audio_data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
