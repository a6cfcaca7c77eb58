//! Book Recommendation Engine
//!
//! Ranks catalog books for a reader through five independent strategies:
//! popularity cold start, text-similarity search, content-based rating
//! prediction, neighborhood collaborative filtering and latent-factor
//! prediction. All models are fitted offline; the engine only loads and
//! applies them.

pub mod artifacts;
pub mod cold_start;
pub mod collaborative;
pub mod config;
pub mod content_based;
pub mod engine;
pub mod error;
pub mod matrix_factorization;
pub mod observability;
pub mod ranking;
pub mod repository;
pub mod similarity;
pub mod sparse;
pub mod types;

// Re-export key types
pub use artifacts::{ArtifactName, ArtifactStore};
pub use cold_start::ColdStartRanker;
pub use collaborative::NeighborhoodRecommender;
pub use config::EngineConfig;
pub use content_based::ContentScorer;
pub use engine::{EngineStats, RecommenderEngine, SharedEngine};
pub use error::{ArtifactLoadError, RecommendError, Result};
pub use matrix_factorization::{LatentFactorRecommender, SvdModel};
pub use repository::{DataSource, PostgresDataSource, StaticSource};
pub use similarity::SimilaritySearch;
pub use types::*;

/// Connect to the configured database and initialize the engine from it.
pub async fn init_engine(config: EngineConfig) -> Result<RecommenderEngine> {
    let pool = repository::connect_pool(&config.database).await?;
    let source = PostgresDataSource::new(pool.clone());

    let engine = RecommenderEngine::initialize(config, &source).await;
    // the pool is only needed for the bulk loads
    pool.close().await;
    engine
}

#[cfg(test)]
mod tests;
