//! Engine configuration
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional `config/bookrec.{toml,yaml,json}` file, a `.env` file and
//! `BOOKREC_`-prefixed environment variables using `__` as the section
//! separator, e.g. `BOOKREC_NEIGHBORHOOD__OVERLAP_PERCENTILE=95`.

use crate::artifacts::ArtifactName;
use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub artifacts: ArtifactConfig,
    pub cold_start: ColdStartConfig,
    pub search: SearchConfig,
    pub content: ContentConfig,
    pub neighborhood: NeighborhoodConfig,
    pub latent: LatentConfig,
    pub startup: StartupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_sec: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/bookrec".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_sec: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding the fitted model artifacts
    pub dir: PathBuf,
    /// Per-artifact file name overrides, keyed by artifact name
    pub files: HashMap<String, String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./models"),
            files: HashMap::new(),
        }
    }
}

impl ArtifactConfig {
    pub fn path_for(&self, name: ArtifactName) -> PathBuf {
        let file = self
            .files
            .get(name.as_str())
            .cloned()
            .unwrap_or_else(|| name.default_file_name());
        self.dir.join(file)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColdStartConfig {
    pub min_average_rating: f64,
    /// Strict lower bound on ratings_count
    pub min_ratings_count: i64,
    pub max_short_pages: i32,
    pub limit: usize,
}

impl Default for ColdStartConfig {
    fn default() -> Self {
        Self {
            min_average_rating: 4.50,
            min_ratings_count: 3000,
            max_short_pages: 300,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Rows selected by partial top-k before truncation
    pub candidate_pool: usize,
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 50,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    pub candidate_pool: usize,
    pub page_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 50,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NeighborhoodConfig {
    /// Target's highest-rated books used to seed the user pool
    pub seed_books: usize,
    /// A rating strictly above this counts as "liked"
    pub like_threshold: f32,
    /// Users below this percentile of overlap count are dropped
    pub overlap_percentile: f32,
    /// Most similar rows kept from the neighborhood matrix
    pub neighbors: usize,
    pub page_size: usize,
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            seed_books: 5,
            like_threshold: 4.0,
            overlap_percentile: 99.0,
            neighbors: 50,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LatentConfig {
    pub candidate_pool: usize,
    pub page_size: usize,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 50,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Initialization slower than this is logged as a warning
    pub init_time_target_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            init_time_target_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/bookrec").required(false))
            .add_source(
                config::Environment::with_prefix("BOOKREC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| RecommendError::Configuration {
                message: e.to_string(),
                key: None,
            })?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| RecommendError::Configuration {
                message: e.to_string(),
                key: None,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(RecommendError::config(
                "database url must be set",
                "BOOKREC_DATABASE__URL",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(RecommendError::config(
                "max_connections must be greater than 0",
                "BOOKREC_DATABASE__MAX_CONNECTIONS",
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(RecommendError::config(
                format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.database.min_connections, self.database.max_connections
                ),
                "BOOKREC_DATABASE__MIN_CONNECTIONS",
            ));
        }
        if !(0.0..=100.0).contains(&self.neighborhood.overlap_percentile) {
            return Err(RecommendError::config(
                format!(
                    "overlap_percentile must be within [0, 100], got {}",
                    self.neighborhood.overlap_percentile
                ),
                "BOOKREC_NEIGHBORHOOD__OVERLAP_PERCENTILE",
            ));
        }
        if self.neighborhood.seed_books == 0 || self.neighborhood.neighbors == 0 {
            return Err(RecommendError::config(
                "seed_books and neighbors must be greater than 0",
                "BOOKREC_NEIGHBORHOOD__NEIGHBORS",
            ));
        }

        let pages = [
            ("BOOKREC_COLD_START__LIMIT", self.cold_start.limit, usize::MAX),
            (
                "BOOKREC_SEARCH__PAGE_SIZE",
                self.search.page_size,
                self.search.candidate_pool,
            ),
            (
                "BOOKREC_CONTENT__PAGE_SIZE",
                self.content.page_size,
                self.content.candidate_pool,
            ),
            (
                "BOOKREC_NEIGHBORHOOD__PAGE_SIZE",
                self.neighborhood.page_size,
                usize::MAX,
            ),
            (
                "BOOKREC_LATENT__PAGE_SIZE",
                self.latent.page_size,
                self.latent.candidate_pool,
            ),
        ];
        for (key, page_size, pool) in pages {
            if page_size == 0 || page_size > pool {
                return Err(RecommendError::config(
                    format!("page size {} must be within 1..={}", page_size, pool),
                    key,
                ));
            }
        }

        Ok(())
    }

    pub fn init_time_target(&self) -> Duration {
        Duration::from_millis(self.startup.init_time_target_ms)
    }
}
