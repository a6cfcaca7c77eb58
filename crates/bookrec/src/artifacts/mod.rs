//! Fitted model artifacts
//!
//! Every artifact is a bincode-encoded file loaded once at startup. A file
//! that is missing or fails to decode leaves its slot empty and is logged;
//! operations that need it later fail with `ArtifactUnavailable` instead of
//! taking the process down.

pub mod classifier;
pub mod encoder;
pub mod scaler;
pub mod vectorizer;

pub use classifier::LinearRatingModel;
pub use encoder::LabelEncoder;
pub use scaler::{Scaler, NUMERIC_FEATURES};
pub use vectorizer::{normalize_query, TfidfVectorizer};

use crate::config::ArtifactConfig;
use crate::error::{ArtifactLoadError, RecommendError, Result};
use crate::matrix_factorization::SvdModel;
use crate::sparse::CsrMatrix;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// The fixed set of named artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactName {
    BookIdEncoder,
    PublisherEncoder,
    IsEbookEncoder,
    UserIdEncoder,
    TitleSearchVectorizer,
    TitleSearchMatrix,
    DescriptionVectorizer,
    DescriptionMatrix,
    ReviewSearchMatrix,
    TitleContentVectorizer,
    ReviewContentVectorizer,
    Scaler,
    Classifier,
    FactorModel,
}

impl ArtifactName {
    pub const ALL: [ArtifactName; 14] = [
        ArtifactName::BookIdEncoder,
        ArtifactName::PublisherEncoder,
        ArtifactName::IsEbookEncoder,
        ArtifactName::UserIdEncoder,
        ArtifactName::TitleSearchVectorizer,
        ArtifactName::TitleSearchMatrix,
        ArtifactName::DescriptionVectorizer,
        ArtifactName::DescriptionMatrix,
        ArtifactName::ReviewSearchMatrix,
        ArtifactName::TitleContentVectorizer,
        ArtifactName::ReviewContentVectorizer,
        ArtifactName::Scaler,
        ArtifactName::Classifier,
        ArtifactName::FactorModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactName::BookIdEncoder => "book_id_encoder",
            ArtifactName::PublisherEncoder => "publisher_encoder",
            ArtifactName::IsEbookEncoder => "is_ebook_encoder",
            ArtifactName::UserIdEncoder => "user_id_encoder",
            ArtifactName::TitleSearchVectorizer => "title_search_vectorizer",
            ArtifactName::TitleSearchMatrix => "title_search_matrix",
            ArtifactName::DescriptionVectorizer => "description_vectorizer",
            ArtifactName::DescriptionMatrix => "description_matrix",
            ArtifactName::ReviewSearchMatrix => "review_search_matrix",
            ArtifactName::TitleContentVectorizer => "title_content_vectorizer",
            ArtifactName::ReviewContentVectorizer => "review_content_vectorizer",
            ArtifactName::Scaler => "scaler",
            ArtifactName::Classifier => "classifier",
            ArtifactName::FactorModel => "factor_model",
        }
    }

    pub fn default_file_name(&self) -> String {
        format!("{}.bin", self.as_str())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only holder of every fitted artifact.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    pub book_id_encoder: Option<LabelEncoder>,
    pub publisher_encoder: Option<LabelEncoder>,
    pub is_ebook_encoder: Option<LabelEncoder>,
    pub user_id_encoder: Option<LabelEncoder>,
    pub title_search_vectorizer: Option<TfidfVectorizer>,
    pub title_search_matrix: Option<CsrMatrix>,
    pub description_vectorizer: Option<TfidfVectorizer>,
    pub description_matrix: Option<CsrMatrix>,
    pub review_search_matrix: Option<CsrMatrix>,
    pub title_content_vectorizer: Option<TfidfVectorizer>,
    pub review_content_vectorizer: Option<TfidfVectorizer>,
    pub scaler: Option<Scaler>,
    pub classifier: Option<LinearRatingModel>,
    pub factor_model: Option<SvdModel>,
}

fn require<T>(slot: &Option<T>, name: ArtifactName) -> Result<&T> {
    slot.as_ref().ok_or(RecommendError::ArtifactUnavailable(name))
}

/// Structural checks an artifact runs on itself after decoding
trait Validate {
    fn check(&self) -> std::result::Result<(), String>;
}

impl Validate for LabelEncoder {
    fn check(&self) -> std::result::Result<(), String> {
        if self.is_empty() {
            return Err("encoder has no classes".to_string());
        }
        Ok(())
    }
}

impl Validate for TfidfVectorizer {
    fn check(&self) -> std::result::Result<(), String> {
        self.validate()
    }
}

impl Validate for CsrMatrix {
    fn check(&self) -> std::result::Result<(), String> {
        self.validate()
    }
}

impl Validate for Scaler {
    fn check(&self) -> std::result::Result<(), String> {
        self.validate()
    }
}

impl Validate for LinearRatingModel {
    fn check(&self) -> std::result::Result<(), String> {
        if self.coef.len() <= NUMERIC_FEATURES {
            return Err(format!(
                "classifier has {} coefficients, expected more than {}",
                self.coef.len(),
                NUMERIC_FEATURES
            ));
        }
        Ok(())
    }
}

impl Validate for SvdModel {
    fn check(&self) -> std::result::Result<(), String> {
        self.validate()
    }
}

/// Decode one artifact file.
pub fn read_artifact<T: DeserializeOwned>(
    path: &Path,
) -> std::result::Result<T, ArtifactLoadError> {
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Encode one artifact file.
pub fn write_artifact<T: Serialize>(
    path: &Path,
    artifact: &T,
) -> std::result::Result<(), ArtifactLoadError> {
    let bytes = bincode::serialize(artifact)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn load_or_warn<T: DeserializeOwned + Validate>(
    config: &ArtifactConfig,
    name: ArtifactName,
) -> Option<T> {
    let path = config.path_for(name);
    let loaded = read_artifact::<T>(&path).and_then(|artifact| {
        artifact
            .check()
            .map(|_| artifact)
            .map_err(ArtifactLoadError::Invalid)
    });

    match loaded {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            warn!(artifact = %name, path = %path.display(), "Failed to load artifact: {}", e);
            None
        }
    }
}

impl ArtifactStore {
    /// Load every artifact from disk. Never fails; see the module docs.
    pub fn load(config: &ArtifactConfig) -> Self {
        let start = Instant::now();

        let store = Self {
            book_id_encoder: load_or_warn(config, ArtifactName::BookIdEncoder),
            publisher_encoder: load_or_warn(config, ArtifactName::PublisherEncoder),
            is_ebook_encoder: load_or_warn(config, ArtifactName::IsEbookEncoder),
            user_id_encoder: load_or_warn(config, ArtifactName::UserIdEncoder),
            title_search_vectorizer: load_or_warn(config, ArtifactName::TitleSearchVectorizer),
            title_search_matrix: load_or_warn(config, ArtifactName::TitleSearchMatrix),
            description_vectorizer: load_or_warn(config, ArtifactName::DescriptionVectorizer),
            description_matrix: load_or_warn(config, ArtifactName::DescriptionMatrix),
            review_search_matrix: load_or_warn(config, ArtifactName::ReviewSearchMatrix),
            title_content_vectorizer: load_or_warn(config, ArtifactName::TitleContentVectorizer),
            review_content_vectorizer: load_or_warn(
                config,
                ArtifactName::ReviewContentVectorizer,
            ),
            scaler: load_or_warn(config, ArtifactName::Scaler),
            classifier: load_or_warn(config, ArtifactName::Classifier),
            factor_model: load_or_warn(config, ArtifactName::FactorModel),
        };

        info!(
            "Artifacts loaded in {:.2}s ({}/{} available)",
            start.elapsed().as_secs_f64(),
            store.available().len(),
            ArtifactName::ALL.len()
        );
        store
    }

    /// Drop artifacts that are individually valid but inconsistent with the
    /// loaded tables or with each other.
    ///
    /// Row `i` of a catalog-aligned matrix must be catalog row `i`; a count
    /// mismatch means the artifacts were built from a different load.
    pub fn enforce_alignment(&mut self, catalog_rows: usize, extended_rows: usize) {
        if let (Some(classifier), Some(title), Some(review)) = (
            self.classifier.as_ref(),
            self.title_content_vectorizer.as_ref(),
            self.review_content_vectorizer.as_ref(),
        ) {
            let expected = NUMERIC_FEATURES + title.num_features() + review.num_features();
            if classifier.num_features() != expected {
                warn!(
                    artifact = %ArtifactName::Classifier,
                    "Classifier has {} coefficients but the content features have {}; disabling it",
                    classifier.num_features(),
                    expected
                );
                self.classifier = None;
            }
        }

        for (name, slot, expected) in [
            (
                ArtifactName::TitleSearchMatrix,
                &mut self.title_search_matrix,
                catalog_rows,
            ),
            (
                ArtifactName::DescriptionMatrix,
                &mut self.description_matrix,
                catalog_rows,
            ),
            (
                ArtifactName::ReviewSearchMatrix,
                &mut self.review_search_matrix,
                extended_rows,
            ),
        ] {
            if let Some(matrix) = slot.as_ref() {
                if matrix.num_rows != expected {
                    warn!(
                        artifact = %name,
                        "Matrix has {} rows but its table has {}; disabling it",
                        matrix.num_rows,
                        expected
                    );
                    *slot = None;
                }
            }
        }
    }

    pub fn available(&self) -> Vec<ArtifactName> {
        ArtifactName::ALL
            .into_iter()
            .filter(|name| self.is_available(*name))
            .collect()
    }

    pub fn is_available(&self, name: ArtifactName) -> bool {
        match name {
            ArtifactName::BookIdEncoder => self.book_id_encoder.is_some(),
            ArtifactName::PublisherEncoder => self.publisher_encoder.is_some(),
            ArtifactName::IsEbookEncoder => self.is_ebook_encoder.is_some(),
            ArtifactName::UserIdEncoder => self.user_id_encoder.is_some(),
            ArtifactName::TitleSearchVectorizer => self.title_search_vectorizer.is_some(),
            ArtifactName::TitleSearchMatrix => self.title_search_matrix.is_some(),
            ArtifactName::DescriptionVectorizer => self.description_vectorizer.is_some(),
            ArtifactName::DescriptionMatrix => self.description_matrix.is_some(),
            ArtifactName::ReviewSearchMatrix => self.review_search_matrix.is_some(),
            ArtifactName::TitleContentVectorizer => self.title_content_vectorizer.is_some(),
            ArtifactName::ReviewContentVectorizer => self.review_content_vectorizer.is_some(),
            ArtifactName::Scaler => self.scaler.is_some(),
            ArtifactName::Classifier => self.classifier.is_some(),
            ArtifactName::FactorModel => self.factor_model.is_some(),
        }
    }

    pub fn book_id_encoder(&self) -> Result<&LabelEncoder> {
        require(&self.book_id_encoder, ArtifactName::BookIdEncoder)
    }

    pub fn publisher_encoder(&self) -> Result<&LabelEncoder> {
        require(&self.publisher_encoder, ArtifactName::PublisherEncoder)
    }

    pub fn is_ebook_encoder(&self) -> Result<&LabelEncoder> {
        require(&self.is_ebook_encoder, ArtifactName::IsEbookEncoder)
    }

    pub fn user_id_encoder(&self) -> Result<&LabelEncoder> {
        require(&self.user_id_encoder, ArtifactName::UserIdEncoder)
    }

    pub fn title_content_vectorizer(&self) -> Result<&TfidfVectorizer> {
        require(
            &self.title_content_vectorizer,
            ArtifactName::TitleContentVectorizer,
        )
    }

    pub fn review_content_vectorizer(&self) -> Result<&TfidfVectorizer> {
        require(
            &self.review_content_vectorizer,
            ArtifactName::ReviewContentVectorizer,
        )
    }

    pub fn scaler(&self) -> Result<&Scaler> {
        require(&self.scaler, ArtifactName::Scaler)
    }

    pub fn classifier(&self) -> Result<&LinearRatingModel> {
        require(&self.classifier, ArtifactName::Classifier)
    }

    pub fn factor_model(&self) -> Result<&SvdModel> {
        require(&self.factor_model, ArtifactName::FactorModel)
    }

    /// Vectorizer and matrix of a text-search space. A missing half is a
    /// vectorization failure, not a generic unavailability.
    pub fn search_space(
        &self,
        vectorizer: ArtifactName,
        matrix: ArtifactName,
    ) -> Result<(&TfidfVectorizer, &CsrMatrix)> {
        let v = match vectorizer {
            ArtifactName::TitleSearchVectorizer => self.title_search_vectorizer.as_ref(),
            ArtifactName::DescriptionVectorizer => self.description_vectorizer.as_ref(),
            _ => None,
        };
        let m = match matrix {
            ArtifactName::TitleSearchMatrix => self.title_search_matrix.as_ref(),
            ArtifactName::DescriptionMatrix => self.description_matrix.as_ref(),
            _ => None,
        };

        match (v, m) {
            (Some(v), Some(m)) => Ok((v, m)),
            (None, _) => Err(RecommendError::Vectorization(format!(
                "{} is not loaded",
                vectorizer
            ))),
            (_, None) => Err(RecommendError::Vectorization(format!(
                "{} is not loaded",
                matrix
            ))),
        }
    }

    pub fn review_search_matrix(&self) -> Result<&CsrMatrix> {
        self.review_search_matrix.as_ref().ok_or_else(|| {
            RecommendError::Vectorization(format!(
                "{} is not loaded",
                ArtifactName::ReviewSearchMatrix
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseVector;

    #[test]
    fn test_missing_directory_yields_empty_store() {
        let config = ArtifactConfig {
            dir: "/nonexistent/bookrec-models".into(),
            ..Default::default()
        };
        let store = ArtifactStore::load(&config);

        assert!(store.available().is_empty());
        assert!(matches!(
            store.classifier(),
            Err(RecommendError::ArtifactUnavailable(ArtifactName::Classifier))
        ));
        assert!(matches!(
            store.search_space(
                ArtifactName::TitleSearchVectorizer,
                ArtifactName::TitleSearchMatrix
            ),
            Err(RecommendError::Vectorization(_))
        ));
    }

    #[test]
    fn test_load_roundtrip_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let encoder = LabelEncoder::new(["u1", "u2"]);
        write_artifact(&config.path_for(ArtifactName::UserIdEncoder), &encoder).unwrap();
        std::fs::write(config.path_for(ArtifactName::Scaler), b"not bincode").unwrap();

        let store = ArtifactStore::load(&config);
        assert_eq!(store.available(), vec![ArtifactName::UserIdEncoder]);
        assert_eq!(store.user_id_encoder().unwrap().lookup("u2"), Some(1));
        assert!(store.scaler().is_err());
    }

    #[test]
    fn test_invalid_matrix_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut matrix = CsrMatrix::from_rows(2, &[SparseVector::from_dense(&[1.0, 0.0])]);
        matrix.indptr.push(7);
        write_artifact(&config.path_for(ArtifactName::TitleSearchMatrix), &matrix).unwrap();

        let store = ArtifactStore::load(&config);
        assert!(!store.is_available(ArtifactName::TitleSearchMatrix));
    }

    #[test]
    fn test_alignment_drops_classifier_of_wrong_width() {
        let mut store = ArtifactStore {
            classifier: Some(LinearRatingModel::new(vec![0.0; 12], 0.0)),
            title_content_vectorizer: Some(TfidfVectorizer::new(Default::default(), vec![])),
            review_content_vectorizer: Some(TfidfVectorizer::new(Default::default(), vec![])),
            ..Default::default()
        };
        store.enforce_alignment(0, 0);
        assert!(store.classifier.is_none());
    }

    #[test]
    fn test_alignment_drops_mismatched_matrices() {
        let mut store = ArtifactStore {
            title_search_matrix: Some(CsrMatrix::empty(3, 4)),
            review_search_matrix: Some(CsrMatrix::empty(2, 4)),
            ..Default::default()
        };
        store.enforce_alignment(4, 2);

        assert!(store.title_search_matrix.is_none());
        assert!(store.review_search_matrix.is_some());
    }
}
