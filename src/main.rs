//! Chaptercast - 章节合成服务
//!
//! 启动 HTTP 服务：TTS 客户端 → 并发编排 → 合并器 → /api/tts

use std::sync::Arc;

use chaptercast::application::{ChunkOrchestrator, SynthesisService};
use chaptercast::config::{load_config, print_config, AppConfig};
use chaptercast::infrastructure::adapters::{create_assembler, HttpTtsClient};
use chaptercast::infrastructure::http::{AppState, HttpServer};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},chaptercast={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Chaptercast v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // TTS 引擎
    let tts_engine = Arc::new(
        HttpTtsClient::new(config.tts.to_client_config())
            .map_err(|e| anyhow::anyhow!("Failed to create TTS client: {}", e))?,
    );

    // 合成流水线
    let orchestrator = ChunkOrchestrator::new(config.synthesis.orchestrator_config(), tts_engine);
    let assembler = create_assembler(config.assembly.strategy, config.assembly.demux_config())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create assembler: {}", e))?;
    let synthesis_service = Arc::new(SynthesisService::new(
        config.synthesis.service_config(),
        orchestrator,
        assembler,
    ));

    // HTTP 服务器
    let state = AppState::new(synthesis_service);
    let server = HttpServer::new(config.server.to_http_config(), state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
