//! Latent-factor recommendations from a pre-fitted biased SVD model
//!
//! The model is trained offline. Here it is only evaluated: every book the
//! user has not rated becomes a placeholder `(user, book, 0.0)` row and the
//! whole placeholder set is pushed through the model's test path.

use crate::artifacts::ArtifactStore;
use crate::config::LatentConfig;
use crate::error::Result;
use crate::repository::{BookTable, ReviewTable};
use crate::types::{BookRecord, Recommendations, Strategy};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Biased matrix factorization:
/// `r̂(u, i) = μ + b_u + b_i + q_i · p_u`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvdModel {
    pub global_mean: f32,
    /// Per-user bias, indexed by inner user id
    pub user_bias: Array1<f32>,
    /// Per-item bias, indexed by inner item id
    pub item_bias: Array1<f32>,
    /// User latent factors: [num_users x factors]
    pub user_factors: Array2<f32>,
    /// Item latent factors: [num_items x factors]
    pub item_factors: Array2<f32>,
    /// Raw user id to inner index
    pub user_id_map: HashMap<String, usize>,
    /// Raw book id to inner index
    pub item_id_map: HashMap<i64, usize>,
    /// (min, max) rating seen at training time
    pub rating_scale: (f32, f32),
}

/// One scored placeholder row
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub user_id: String,
    pub book_id: i64,
    /// Placeholder rating the row was submitted with
    pub actual: f32,
    pub estimate: f32,
    /// True when the user or the book was unknown to the model
    pub was_impossible: bool,
}

impl SvdModel {
    pub fn num_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let users = self.user_factors.nrows();
        let items = self.item_factors.nrows();
        if self.item_factors.ncols() != self.num_factors() {
            return Err(format!(
                "user factors have {} columns but item factors have {}",
                self.num_factors(),
                self.item_factors.ncols()
            ));
        }
        if self.user_bias.len() != users || self.item_bias.len() != items {
            return Err("bias vectors do not match factor rows".to_string());
        }
        if self.user_id_map.values().any(|&idx| idx >= users)
            || self.item_id_map.values().any(|&idx| idx >= items)
        {
            return Err("id map points outside the factor matrices".to_string());
        }
        if self.rating_scale.0 > self.rating_scale.1 {
            return Err(format!("invalid rating scale {:?}", self.rating_scale));
        }
        Ok(())
    }

    /// Estimate one rating.
    ///
    /// An unknown user or item contributes no bias and no factor term; the
    /// estimate then falls back towards the global mean. The result is
    /// clipped to the training rating scale.
    pub fn estimate(&self, user_id: &str, book_id: i64) -> (f32, bool) {
        let user = self.user_id_map.get(user_id).copied();
        let item = self.item_id_map.get(&book_id).copied();

        let mut est = self.global_mean;
        if let Some(u) = user {
            est += self.user_bias[u];
        }
        if let Some(i) = item {
            est += self.item_bias[i];
        }
        if let (Some(u), Some(i)) = (user, item) {
            est += self.item_factors.row(i).dot(&self.user_factors.row(u));
        }

        let (lo, hi) = self.rating_scale;
        (est.clamp(lo, hi), user.is_none() || item.is_none())
    }

    /// Evaluate a batch of `(user, book, rating)` rows.
    pub fn test(&self, rows: &[(String, i64, f32)]) -> Vec<Prediction> {
        rows.iter()
            .map(|(user_id, book_id, actual)| {
                let (estimate, impossible) = self.estimate(user_id, *book_id);
                Prediction {
                    user_id: user_id.clone(),
                    book_id: *book_id,
                    actual: *actual,
                    estimate,
                    was_impossible: impossible,
                }
            })
            .collect()
    }
}

pub struct LatentFactorRecommender {
    books: Arc<BookTable>,
    reviews: Arc<ReviewTable>,
    artifacts: Arc<ArtifactStore>,
    config: LatentConfig,
}

impl LatentFactorRecommender {
    pub fn new(
        books: Arc<BookTable>,
        reviews: Arc<ReviewTable>,
        artifacts: Arc<ArtifactStore>,
        config: LatentConfig,
    ) -> Self {
        Self {
            books,
            reviews,
            artifacts,
            config,
        }
    }

    /// Rank every unrated book by the factor model's estimate.
    pub fn predict(&self, user_id: &str) -> Result<Recommendations> {
        let start = Instant::now();
        let model = self.artifacts.factor_model()?;
        let rated = self.reviews.books_of(user_id);

        let placeholders: Vec<(String, i64, f32)> = self
            .books
            .iter()
            .filter(|book| !rated.contains(&book.book_id))
            .map(|book| (user_id.to_string(), book.book_id, 0.0))
            .collect();

        if placeholders.is_empty() {
            return Ok(Recommendations::new(Strategy::LatentFactor, Vec::new()));
        }

        let mut predictions = model.test(&placeholders);
        // stable sort keeps catalog order among equal estimates
        predictions.sort_by(|a, b| b.estimate.total_cmp(&a.estimate));
        predictions.truncate(self.config.candidate_pool);

        let books: Vec<BookRecord> = predictions
            .iter()
            .filter_map(|p| {
                self.books
                    .find(p.book_id)
                    .map(|book| BookRecord::from(book).with_score(p.estimate))
            })
            .take(self.config.page_size)
            .collect();

        debug!(
            user_id,
            candidates = placeholders.len(),
            returned = books.len(),
            "Latent-factor prediction finished in {:?}",
            start.elapsed()
        );
        Ok(Recommendations::new(Strategy::LatentFactor, books))
    }
}
