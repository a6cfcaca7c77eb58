//! Text-similarity search over precomputed TF-IDF spaces
//!
//! Title and description search project a free-text query into a fitted
//! vectorizer space and pick the nearest catalog rows. Review similarity
//! starts from a book's own review-text rows instead of a query.

use crate::artifacts::{normalize_query, ArtifactName, ArtifactStore};
use crate::config::SearchConfig;
use crate::error::{RecommendError, Result};
use crate::ranking::{top_k_sorted, top_k_unordered};
use crate::repository::{BookTable, ExtendedReviewTable};
use crate::types::{BookRecord, Recommendations, Strategy};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct SimilaritySearch {
    books: Arc<BookTable>,
    extended: Arc<ExtendedReviewTable>,
    artifacts: Arc<ArtifactStore>,
    config: SearchConfig,
}

impl SimilaritySearch {
    pub fn new(
        books: Arc<BookTable>,
        extended: Arc<ExtendedReviewTable>,
        artifacts: Arc<ArtifactStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            books,
            extended,
            artifacts,
            config,
        }
    }

    pub fn by_title(&self, title: &str) -> Result<Recommendations> {
        self.search(
            title,
            ArtifactName::TitleSearchVectorizer,
            ArtifactName::TitleSearchMatrix,
            Strategy::TitleSearch,
        )
    }

    pub fn by_description(&self, description: &str) -> Result<Recommendations> {
        self.search(
            description,
            ArtifactName::DescriptionVectorizer,
            ArtifactName::DescriptionMatrix,
            Strategy::DescriptionSearch,
        )
    }

    /// Nearest catalog rows to a free-text query.
    ///
    /// The candidate pool comes from a partial selection, so the order of
    /// the returned page is unspecified. Its membership is deterministic
    /// except for ties at the pool boundary.
    fn search(
        &self,
        text: &str,
        vectorizer: ArtifactName,
        matrix: ArtifactName,
        strategy: Strategy,
    ) -> Result<Recommendations> {
        let start = Instant::now();
        let (vectorizer, matrix) = self.artifacts.search_space(vectorizer, matrix)?;

        let query = vectorizer.transform(&normalize_query(text));
        if query.dim != matrix.num_cols {
            return Err(RecommendError::Vectorization(format!(
                "query has {} features but the matrix has {} columns",
                query.dim, matrix.num_cols
            )));
        }

        let similarity = matrix.cosine_similarity(&query);
        let books: Vec<BookRecord> = top_k_unordered(&similarity, self.config.candidate_pool)
            .into_iter()
            .filter_map(|row| {
                self.books
                    .row(row)
                    .map(|book| BookRecord::from(book).with_score(similarity[row]))
            })
            .take(self.config.page_size)
            .collect();

        debug!(
            ?strategy,
            rows = similarity.len(),
            returned = books.len(),
            "Text search finished in {:?}",
            start.elapsed()
        );
        Ok(Recommendations::new(strategy, books))
    }

    /// Books whose aggregated review text is closest to `book_id`'s.
    ///
    /// Returns every match ordered by rank (0 = most similar); the caller
    /// pages. A book without review text yields an empty list.
    pub fn by_review_similarity(&self, book_id: i64) -> Result<Recommendations> {
        let positions = self.extended.positions(book_id);
        if positions.is_empty() {
            debug!(book_id, "No review text for book");
            return Ok(Recommendations::new(Strategy::ReviewSimilarity, Vec::new()));
        }

        let matrix = self.artifacts.review_search_matrix()?;

        // a column scores the best similarity over the book's own rows
        let mut similarity = vec![f32::NEG_INFINITY; matrix.num_rows];
        for &pos in positions {
            if pos >= matrix.num_rows {
                return Err(RecommendError::Internal(format!(
                    "review row {} outside matrix of {} rows",
                    pos, matrix.num_rows
                )));
            }
            let query = matrix.row(pos).to_vector(matrix.num_cols);
            for (best, s) in similarity.iter_mut().zip(matrix.cosine_similarity(&query)) {
                *best = best.max(s);
            }
        }

        let nearest = top_k_sorted(
            &similarity,
            0..similarity.len(),
            self.config.candidate_pool,
        );

        let mut seen = HashSet::new();
        let books: Vec<BookRecord> = nearest
            .into_iter()
            .filter_map(|row| self.extended.row(row).map(|r| (r.book_id, similarity[row])))
            .filter(|(id, _)| seen.insert(*id))
            .filter_map(|(id, score)| self.books.find(id).map(|book| (book, score)))
            .enumerate()
            .map(|(rank, (book, score))| BookRecord::from(book).with_score(score).with_rank(rank))
            .collect();

        Ok(Recommendations::new(Strategy::ReviewSimilarity, books))
    }
}
