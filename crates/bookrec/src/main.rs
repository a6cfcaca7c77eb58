//! Recommendation engine warm-up
//!
//! Loads the catalog, reviews and model artifacts once, reports what is
//! available and exits. A non-zero exit status means initialization failed.

use anyhow::Context;
use bookrec_engine::observability::{init_logging, LogFormat};
use bookrec_engine::EngineConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env());

    info!("Starting recommendation engine warm-up");

    // Load configuration
    let config = EngineConfig::load().context("Failed to load engine configuration")?;

    let engine = bookrec_engine::init_engine(config)
        .await
        .context("Failed to initialize recommendation engine")?;

    let stats = engine.stats();
    if !stats.artifacts_missing.is_empty() {
        warn!(
            missing = ?stats.artifacts_missing,
            "Some strategies are disabled until their artifacts are provided"
        );
    }
    info!(stats = %serde_json::to_string(&stats)?, "Recommendation engine ready");

    Ok(())
}
