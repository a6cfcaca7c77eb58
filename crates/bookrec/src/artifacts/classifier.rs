//! Fitted linear rating model used by content-based scoring

use crate::sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

/// Linear model over the concatenated `[scaled numerics | title tfidf | review tfidf]`
/// feature row: `rating = coef · x + intercept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRatingModel {
    pub coef: Vec<f32>,
    pub intercept: f32,
}

impl LinearRatingModel {
    pub fn new(coef: Vec<f32>, intercept: f32) -> Self {
        Self { coef, intercept }
    }

    pub fn num_features(&self) -> usize {
        self.coef.len()
    }

    /// Predict one score per matrix row.
    pub fn predict(&self, features: &CsrMatrix) -> Result<Vec<f32>, String> {
        if features.num_cols != self.coef.len() {
            return Err(format!(
                "feature width {} does not match model width {}",
                features.num_cols,
                self.coef.len()
            ));
        }

        Ok((0..features.num_rows)
            .map(|row| {
                let view = features.row(row);
                view.indices
                    .iter()
                    .zip(view.values)
                    .map(|(&col, &value)| self.coef[col] * value)
                    .sum::<f32>()
                    + self.intercept
            })
            .collect())
    }
}
