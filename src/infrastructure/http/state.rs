//! Application State

use std::sync::Arc;

use crate::application::SynthesisService;

/// 应用状态
pub struct AppState {
    pub synthesis_service: Arc<SynthesisService>,
}

impl AppState {
    pub fn new(synthesis_service: Arc<SynthesisService>) -> Self {
        Self { synthesis_service }
    }
}
