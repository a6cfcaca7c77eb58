//! Content-Based Filtering
//!
//! Scores every book a user has not reviewed with a fitted rating model over
//! categorical encodings, numeric catalog attributes and two TF-IDF text
//! blocks (normalized title, aggregated review text).

use crate::artifacts::encoder::{book_key, ebook_key};
use crate::artifacts::{ArtifactName, ArtifactStore, NUMERIC_FEATURES};
use crate::config::ContentConfig;
use crate::error::{RecommendError, Result};
use crate::repository::{BookTable, ExtendedReviewTable, ReviewTable};
use crate::sparse::{CsrMatrix, SparseVector};
use crate::types::{Book, BookRecord, Recommendations, Strategy};
use ndarray::Array2;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A candidate book joined with its review text
struct Candidate<'a> {
    book: &'a Book,
    review_text: &'a str,
}

pub struct ContentScorer {
    books: Arc<BookTable>,
    reviews: Arc<ReviewTable>,
    extended: Arc<ExtendedReviewTable>,
    artifacts: Arc<ArtifactStore>,
    config: ContentConfig,
}

impl ContentScorer {
    pub fn new(
        books: Arc<BookTable>,
        reviews: Arc<ReviewTable>,
        extended: Arc<ExtendedReviewTable>,
        artifacts: Arc<ArtifactStore>,
        config: ContentConfig,
    ) -> Self {
        Self {
            books,
            reviews,
            extended,
            artifacts,
            config,
        }
    }

    /// Rank unvisited books for `user_id` by predicted rating.
    ///
    /// Fails with `UnknownCategory` when the user, or a candidate's
    /// publisher or format, is outside the fitted vocabularies. Candidate
    /// books unknown to the book encoder are skipped.
    pub fn predict(&self, user_id: &str) -> Result<Recommendations> {
        let start = Instant::now();
        let artifacts = &self.artifacts;

        let book_encoder = artifacts.book_id_encoder()?;
        let publisher_encoder = artifacts.publisher_encoder()?;
        let ebook_encoder = artifacts.is_ebook_encoder()?;
        let user_mapped = artifacts
            .user_id_encoder()?
            .encode(ArtifactName::UserIdEncoder, user_id)?;
        let title_vectorizer = artifacts.title_content_vectorizer()?;
        let review_vectorizer = artifacts.review_content_vectorizer()?;
        let scaler = artifacts.scaler()?;
        let classifier = artifacts.classifier()?;

        let reviewed = self.reviews.books_of(user_id);
        let candidates: Vec<(Candidate<'_>, usize)> = self
            .books
            .iter()
            .filter(|book| !reviewed.contains(&book.book_id))
            .filter_map(|book| {
                self.extended.find(book.book_id).map(|r| Candidate {
                    book,
                    review_text: r.text(),
                })
            })
            .filter_map(|c| book_encoder.lookup(&book_key(c.book.book_id)).map(|idx| (c, idx)))
            .collect();

        if candidates.is_empty() {
            return Ok(Recommendations::new(Strategy::ContentBased, Vec::new()));
        }

        let mut numeric = Array2::<f32>::zeros((candidates.len(), NUMERIC_FEATURES));
        for (i, (candidate, book_mapped)) in candidates.iter().enumerate() {
            let book = candidate.book;
            let publisher_mapped =
                publisher_encoder.encode(ArtifactName::PublisherEncoder, &book.publisher)?;
            let ebook_mapped =
                ebook_encoder.encode(ArtifactName::IsEbookEncoder, ebook_key(book.is_ebook))?;

            let features = [
                *book_mapped as f32,
                publisher_mapped as f32,
                ebook_mapped as f32,
                user_mapped as f32,
                book.publication_year as f32,
                book.ratings_count as f32,
                book.average_rating as f32,
                book.num_pages as f32,
            ];
            for (j, value) in features.into_iter().enumerate() {
                numeric[[i, j]] = value;
            }
        }
        let scaled = scaler.transform(numeric);

        let rows: Vec<SparseVector> = candidates
            .iter()
            .zip(scaled.rows())
            .map(|((candidate, _), numeric_row)| {
                let numeric_row: Vec<f32> = numeric_row.to_vec();
                SparseVector::concat(&[
                    &SparseVector::from_dense(&numeric_row),
                    &title_vectorizer.transform(&candidate.book.mod_title),
                    &review_vectorizer.transform(candidate.review_text),
                ])
            })
            .collect();

        let width =
            NUMERIC_FEATURES + title_vectorizer.num_features() + review_vectorizer.num_features();
        let features = CsrMatrix::from_rows(width, &rows);
        let scores = classifier
            .predict(&features)
            .map_err(RecommendError::Internal)?;

        let mut scored: Vec<(&Book, f32)> = candidates
            .iter()
            .map(|(c, _)| c.book)
            .zip(scores)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config.candidate_pool);

        let books: Vec<BookRecord> = scored
            .into_iter()
            .take(self.config.page_size)
            .map(|(book, score)| BookRecord::from(book).with_score(score))
            .collect();

        debug!(
            user_id,
            candidates = candidates.len(),
            shape = ?features.shape(),
            "Content scoring finished in {:?}",
            start.elapsed()
        );
        Ok(Recommendations::new(Strategy::ContentBased, books))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{LabelEncoder, LinearRatingModel, Scaler};
    use crate::tests::fixtures::{book, extended, fit_vectorizer, review};
    use crate::types::{ExtendedReview, Review};
    use ndarray::Array1;

    struct Fixture {
        books: Vec<Book>,
        reviews: Vec<Review>,
        extended: Vec<ExtendedReview>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                books: vec![
                    book(1, "Dune").rated(4.2, 900),
                    book(2, "Emma").rated(3.9, 400),
                    book(3, "Ulysses").rated(3.7, 300),
                    book(4, "Beloved").rated(4.4, 800).ebook(),
                ],
                reviews: vec![
                    review("reader", 1, 5.0),
                    review("reader", 2, 3.0),
                    review("other", 3, 4.0),
                ],
                extended: vec![
                    extended(1, "desert spice"),
                    extended(2, "marriage village"),
                    extended(3, "dublin day"),
                    extended(4, "memory ghost"),
                ],
            }
        }

        /// Model whose score is the scaled average rating
        fn scorer(self) -> ContentScorer {
            let title = fit_vectorizer(&["dune", "emma", "ulysses", "beloved"]);
            let review = fit_vectorizer(&["desert spice", "marriage village", "dublin day"]);

            let width = NUMERIC_FEATURES + title.num_features() + review.num_features();
            let mut coef = vec![0.0; width];
            coef[6] = 1.0;

            let artifacts = ArtifactStore {
                // fitted before any book past id 4 existed
                book_id_encoder: Some(LabelEncoder::new((1..=4).map(book_key))),
                publisher_encoder: Some(LabelEncoder::new(["Penguin"])),
                is_ebook_encoder: Some(LabelEncoder::new(["false", "true"])),
                user_id_encoder: Some(LabelEncoder::new(["other", "reader"])),
                title_content_vectorizer: Some(title),
                review_content_vectorizer: Some(review),
                scaler: Some(Scaler::Standard {
                    mean: Array1::zeros(NUMERIC_FEATURES),
                    scale: Array1::ones(NUMERIC_FEATURES),
                }),
                classifier: Some(LinearRatingModel::new(coef, 0.0)),
                ..Default::default()
            };

            ContentScorer::new(
                Arc::new(BookTable::new(self.books)),
                Arc::new(ReviewTable::new(self.reviews)),
                Arc::new(ExtendedReviewTable::new(self.extended)),
                Arc::new(artifacts),
                ContentConfig::default(),
            )
        }
    }

    #[test]
    fn test_reviewed_books_are_excluded() {
        let result = Fixture::new().scorer().predict("reader").unwrap();
        let ids: Vec<i64> = result.books.iter().map(|b| b.book_id).collect();

        assert_eq!(ids, vec![4, 3]);
        assert!((result.books[0].score.unwrap() - 4.4).abs() < 1e-5);
    }

    #[test]
    fn test_books_without_review_text_are_skipped() {
        let mut fixture = Fixture::new();
        fixture.extended.retain(|e| e.book_id != 4);

        let result = fixture.scorer().predict("reader").unwrap();
        assert_eq!(result.books.len(), 1);
        assert_eq!(result.books[0].book_id, 3);
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        let err = Fixture::new().scorer().predict("stranger").unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory {
                encoder: ArtifactName::UserIdEncoder,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_publisher_fails_whole_call() {
        let mut fixture = Fixture::new();
        fixture.books[3] = fixture.books[3].clone().published_by("Small Press");

        let err = fixture.scorer().predict("reader").unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory {
                encoder: ArtifactName::PublisherEncoder,
                ..
            }
        ));
    }

    #[test]
    fn test_books_outside_encoder_are_dropped() {
        let mut fixture = Fixture::new();
        fixture.books.push(book(5, "Unseen").rated(5.0, 10));
        fixture.extended.push(extended(5, "brand new"));

        let scorer = fixture.scorer();
        let result = scorer.predict("reader").unwrap();
        assert!(result.books.iter().all(|b| b.book_id != 5));
    }

    #[test]
    fn test_missing_artifacts_are_unavailable() {
        let scorer = ContentScorer {
            artifacts: Arc::new(ArtifactStore::default()),
            ..Fixture::new().scorer()
        };
        assert!(matches!(
            scorer.predict("reader"),
            Err(RecommendError::ArtifactUnavailable(_))
        ));
    }
}
