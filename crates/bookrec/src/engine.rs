//! Engine lifecycle
//!
//! `RecommenderEngine::initialize` performs the expensive startup sequence
//! once: the three table loads run concurrently next to the artifact load,
//! then every strategy is built over shared, read-only state. Nothing is
//! mutated afterwards, so the engine can be shared freely across tasks.

use crate::artifacts::{ArtifactName, ArtifactStore};
use crate::cold_start::ColdStartRanker;
use crate::collaborative::NeighborhoodRecommender;
use crate::config::EngineConfig;
use crate::content_based::ContentScorer;
use crate::error::Result;
use crate::matrix_factorization::LatentFactorRecommender;
use crate::repository::{BookTable, DataSource, ExtendedReviewTable, ReviewTable};
use crate::similarity::SimilaritySearch;
use crate::types::{Book, ExtendedReview, Review};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Table sizes and artifact availability, for readiness reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub books: usize,
    pub reviews: usize,
    pub users: usize,
    pub extended_reviews: usize,
    pub artifacts_available: Vec<ArtifactName>,
    pub artifacts_missing: Vec<ArtifactName>,
}

pub struct RecommenderEngine {
    config: EngineConfig,
    books: Arc<BookTable>,
    reviews: Arc<ReviewTable>,
    extended: Arc<ExtendedReviewTable>,
    artifacts: Arc<ArtifactStore>,
    cold_start: ColdStartRanker,
    similarity: SimilaritySearch,
    content: ContentScorer,
    neighborhood: NeighborhoodRecommender,
    latent: LatentFactorRecommender,
}

async fn timed_load<T, F>(table: &'static str, load: F) -> Result<Vec<T>>
where
    F: Future<Output = Result<Vec<T>>>,
{
    let start = Instant::now();
    let rows = load.await?;
    info!(
        table,
        rows = rows.len(),
        "Loaded in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(rows)
}

impl RecommenderEngine {
    /// Load tables and artifacts, then build every strategy.
    ///
    /// Fails if any table load fails. A missing artifact only disables the
    /// operations that need it.
    pub async fn initialize(config: EngineConfig, source: &dyn DataSource) -> Result<Self> {
        let start = Instant::now();
        info!("Initializing recommendation engine");

        let artifact_config = config.artifacts.clone();
        let artifacts = tokio::task::spawn_blocking(move || ArtifactStore::load(&artifact_config));

        let (books, reviews, extended) = tokio::try_join!(
            timed_load("books", source.fetch_books()),
            timed_load("book_reviews", source.fetch_reviews()),
            timed_load("book_reviews_extended", source.fetch_extended_reviews()),
        )?;
        let artifacts = artifacts.await?;

        let engine = Self::from_parts(config, books, reviews, extended, artifacts);

        let elapsed = start.elapsed();
        info!(
            "Engine initialized in {:.2}s ({} books, {} reviews)",
            elapsed.as_secs_f64(),
            engine.books.len(),
            engine.reviews.len()
        );
        if elapsed > engine.config.init_time_target() {
            warn!(
                "Engine initialization took {:.2}s, exceeds target of {}ms",
                elapsed.as_secs_f64(),
                engine.config.startup.init_time_target_ms
            );
        }
        Ok(engine)
    }

    /// Build an engine from rows and artifacts already in memory.
    pub fn from_parts(
        config: EngineConfig,
        books: Vec<Book>,
        reviews: Vec<Review>,
        extended: Vec<ExtendedReview>,
        mut artifacts: ArtifactStore,
    ) -> Self {
        let books = Arc::new(BookTable::new(books));
        let reviews = Arc::new(ReviewTable::new(reviews));
        let extended = Arc::new(ExtendedReviewTable::new(extended));

        artifacts.enforce_alignment(books.len(), extended.len());
        let artifacts = Arc::new(artifacts);

        Self {
            cold_start: ColdStartRanker::new(books.clone(), config.cold_start.clone()),
            similarity: SimilaritySearch::new(
                books.clone(),
                extended.clone(),
                artifacts.clone(),
                config.search.clone(),
            ),
            content: ContentScorer::new(
                books.clone(),
                reviews.clone(),
                extended.clone(),
                artifacts.clone(),
                config.content.clone(),
            ),
            neighborhood: NeighborhoodRecommender::new(
                books.clone(),
                reviews.clone(),
                artifacts.clone(),
                config.neighborhood.clone(),
            ),
            latent: LatentFactorRecommender::new(
                books.clone(),
                reviews.clone(),
                artifacts.clone(),
                config.latent.clone(),
            ),
            config,
            books,
            reviews,
            extended,
            artifacts,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn books(&self) -> &BookTable {
        &self.books
    }

    pub fn reviews(&self) -> &ReviewTable {
        &self.reviews
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn cold_start(&self) -> &ColdStartRanker {
        &self.cold_start
    }

    pub fn similarity(&self) -> &SimilaritySearch {
        &self.similarity
    }

    pub fn content(&self) -> &ContentScorer {
        &self.content
    }

    pub fn neighborhood(&self) -> &NeighborhoodRecommender {
        &self.neighborhood
    }

    pub fn latent(&self) -> &LatentFactorRecommender {
        &self.latent
    }

    pub fn stats(&self) -> EngineStats {
        let (artifacts_available, artifacts_missing): (Vec<_>, Vec<_>) = ArtifactName::ALL
            .into_iter()
            .partition(|name| self.artifacts.is_available(*name));

        EngineStats {
            books: self.books.len(),
            reviews: self.reviews.len(),
            users: self.reviews.num_users(),
            extended_reviews: self.extended.len(),
            artifacts_available,
            artifacts_missing,
        }
    }
}

/// Process-wide engine handle, initialized at most once.
///
/// Concurrent first callers wait on the same initialization. A failed
/// initialization leaves the handle empty so a later call can retry.
#[derive(Default)]
pub struct SharedEngine {
    cell: OnceCell<Arc<RecommenderEngine>>,
}

impl SharedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<RecommenderEngine>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RecommenderEngine>>,
    {
        self.cell
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<RecommenderEngine>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
