//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping          GET   健康检查
//! - /api/tts           POST  文本合成为音频文件
//! - /api/synthesize    POST  同 /api/tts

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/tts", post(handlers::synthesize))
        .route("/synthesize", post(handlers::synthesize))
}
