//! Fitted numeric feature scaler

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Width of the numeric block fed to the content classifier:
/// `(book_id_mapped, publisher_mapped, is_ebook_mapped, user_id_mapped,
///   publication_year, ratings_count, average_rating, num_pages)`
pub const NUMERIC_FEATURES: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Array1<f32>, scale: Array1<f32> },
    /// `x * scale + min`
    MinMax { min: Array1<f32>, scale: Array1<f32> },
}

impl Scaler {
    pub fn validate(&self) -> Result<(), String> {
        let (a, b) = match self {
            Scaler::Standard { mean, scale } => (mean.len(), scale.len()),
            Scaler::MinMax { min, scale } => (min.len(), scale.len()),
        };
        if a != b || a != NUMERIC_FEATURES {
            return Err(format!(
                "scaler width {}/{} does not match {} numeric features",
                a, b, NUMERIC_FEATURES
            ));
        }
        Ok(())
    }

    /// Scale a `[rows x NUMERIC_FEATURES]` block in place.
    pub fn transform(&self, mut data: Array2<f32>) -> Array2<f32> {
        for mut row in data.axis_iter_mut(Axis(0)) {
            match self {
                Scaler::Standard { mean, scale } => {
                    // zero-variance columns were fit with scale 1
                    let safe = scale.mapv(|s| if s == 0.0 { 1.0 } else { s });
                    row -= mean;
                    row /= &safe;
                }
                Scaler::MinMax { min, scale } => {
                    row *= scale;
                    row += min;
                }
            }
        }
        data
    }
}
