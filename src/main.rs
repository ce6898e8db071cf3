use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use customs_audit::api::router::api_router;
use customs_audit::api::ApiContext;
use customs_audit::checklist::ChecklistStore;
use customs_audit::config::{self, EngineConfig};
use customs_audit::llm::GeminiClient;
use customs_audit::pipeline::orchestrator::BatchEngine;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let engine_config = EngineConfig::from_env();
    tracing::info!(
        output_dir = %engine_config.output_dir.display(),
        max_parallel_jobs = engine_config.max_parallel_jobs,
        max_parallel_files = engine_config.max_parallel_files,
        max_inflight_llm = engine_config.max_inflight_llm,
        "engine configuration loaded"
    );

    let Ok(api_key) = std::env::var("LLM_API_KEY") else {
        tracing::error!("LLM_API_KEY environment variable is required");
        std::process::exit(1);
    };

    let llm = Arc::new(GeminiClient::new(api_key, engine_config.request_timeout));
    let checklists = Arc::new(ChecklistStore::new(ChecklistStore::resolve_dir(
        engine_config.checklists_dir.as_deref(),
    )));

    if engine_config.tariff_checks_enabled {
        tracing::warn!(
            "TARIFF_CHECKS_ENABLED is set but no tariff agent is wired into this binary; \
             line-item checks will be skipped"
        );
    }

    let engine = Arc::new(BatchEngine::new(
        llm,
        checklists.clone(),
        None,
        engine_config,
    ));

    let router = api_router(ApiContext::new(engine, checklists));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, router).await
}
