//! Concierge HTTP API
//!
//! 启动: cargo run --bin concierge-web --features web
//! 监听地址来自 [server] 段，可用 CONCIERGE__SERVER__PORT 等覆盖

use std::sync::Arc;

use anyhow::Context;
use concierge::config::load_config_or_default;
use concierge::core::AppBuilder;
use concierge::{observability, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(std::env::args().nth(1).map(Into::into));
    let addr = cfg.server.addr();

    let orchestrator = AppBuilder::new(cfg)
        .build()
        .context("Failed to build orchestrator")?;
    let app = server::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Concierge API: http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
