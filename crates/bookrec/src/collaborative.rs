//! Neighborhood Collaborative Filtering
//!
//! User-based and item-based recommendations over sparse rating matrices
//! restricted to a relevant neighborhood, plus the simpler "top users'
//! choice" co-occurrence list.
//!
//! Matrix rows and columns are encoder indices, so row `i` of the user-item
//! matrix is the user whose encoded id is `i`.

use crate::artifacts::encoder::book_key;
use crate::artifacts::{ArtifactName, ArtifactStore};
use crate::config::NeighborhoodConfig;
use crate::error::Result;
use crate::ranking::{percentile, top_k_sorted};
use crate::repository::{BookTable, ReviewTable};
use crate::sparse::CsrMatrix;
use crate::types::{BookRecord, Recommendations, Review, Strategy};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct NeighborhoodRecommender {
    books: Arc<BookTable>,
    reviews: Arc<ReviewTable>,
    artifacts: Arc<ArtifactStore>,
    config: NeighborhoodConfig,
}

/// Occurrence counts in first-seen order, so ties stay deterministic
#[derive(Default)]
struct BookCounts {
    order: Vec<i64>,
    counts: HashMap<i64, usize>,
}

impl BookCounts {
    fn add(&mut self, book_id: i64) {
        let count = self.counts.entry(book_id).or_insert(0);
        if *count == 0 {
            self.order.push(book_id);
        }
        *count += 1;
    }
}

impl NeighborhoodRecommender {
    pub fn new(
        books: Arc<BookTable>,
        reviews: Arc<ReviewTable>,
        artifacts: Arc<ArtifactStore>,
        config: NeighborhoodConfig,
    ) -> Self {
        Self {
            books,
            reviews,
            artifacts,
            config,
        }
    }

    /// The user's highest-rated books, at most `seed_books` of them.
    fn seed_books(&self, user_id: &str) -> Vec<i64> {
        let mut rated: Vec<&Review> = self.reviews.for_user(user_id).collect();
        rated.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        rated
            .into_iter()
            .take(self.config.seed_books)
            .map(|r| r.book_id)
            .collect()
    }

    /// Users who liked at least one of the user's seed books, first-seen order.
    fn like_minded(&self, user_id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.seed_books(user_id)
            .into_iter()
            .flat_map(|book_id| self.reviews.for_book(book_id))
            .filter(|r| r.rating > self.config.like_threshold)
            .map(|r| r.user_id.as_str())
            .filter(|user| seen.insert(*user))
            .collect()
    }

    /// Popularity-adjusted co-occurrence: `count * (count / ratings_count)`.
    ///
    /// Books in `exclude` are dropped, and so is every later book sharing a
    /// title with one already kept.
    fn popularity_ranked(&self, counts: BookCounts, exclude: &HashSet<i64>) -> Vec<BookRecord> {
        let mut scored: Vec<(BookRecord, f32)> = counts
            .order
            .iter()
            .filter(|id| !exclude.contains(*id))
            .filter_map(|id| self.books.find(*id).map(|book| (book, counts.counts[id])))
            .map(|(book, count)| {
                let count = count as f32;
                let score = count * (count / book.ratings_count.max(1) as f32);
                (BookRecord::from(book), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut titles = HashSet::new();
        scored
            .into_iter()
            .filter(|(record, _)| titles.insert(record.title.clone()))
            .take(self.config.page_size)
            .map(|(record, score)| record.with_score(score))
            .collect()
    }

    /// Recommend what the user's nearest neighbors read.
    ///
    /// The neighborhood is bounded twice: first to users who liked one of
    /// the target's seed books, then to those whose overlap with the
    /// target's whole history reaches the configured percentile.
    pub fn user_based(&self, user_id: &str) -> Result<Recommendations> {
        let start = Instant::now();
        let user_encoder = self.artifacts.user_id_encoder()?;
        let book_encoder = self.artifacts.book_id_encoder()?;
        let target_row = user_encoder.encode(ArtifactName::UserIdEncoder, user_id)?;

        let rated = self.reviews.books_of(user_id);
        let pool = self.like_minded(user_id);
        if rated.is_empty() || pool.is_empty() {
            return Ok(Recommendations::new(Strategy::UserSimilarity, Vec::new()));
        }

        let overlap: Vec<(&str, f32)> = pool
            .iter()
            .map(|&user| {
                let shared = self
                    .reviews
                    .for_user(user)
                    .filter(|r| rated.contains(&r.book_id))
                    .count();
                (user, shared as f32)
            })
            .collect();
        let counts: Vec<f32> = overlap.iter().map(|(_, c)| *c).collect();
        let threshold = percentile(&counts, self.config.overlap_percentile).unwrap_or(0.0);

        let mut neighborhood: HashSet<&str> = overlap
            .into_iter()
            .filter(|(_, c)| *c >= threshold)
            .map(|(user, _)| user)
            .collect();
        neighborhood.insert(user_id);

        let triplets = neighborhood.iter().flat_map(|&user| {
            let row = user_encoder.lookup(user);
            self.reviews.for_user(user).filter_map(move |r| {
                let col = book_encoder.lookup(&book_key(r.book_id))?;
                Some((row?, col, r.rating))
            })
        });
        let matrix = CsrMatrix::from_triplets((user_encoder.len(), book_encoder.len()), triplets);

        let query = matrix.row(target_row).to_vector(matrix.num_cols);
        let similarity = matrix.cosine_similarity(&query);
        let nearest = top_k_sorted(&similarity, matrix.populated_rows(), self.config.neighbors);

        let mut counts = BookCounts::default();
        for user in nearest.iter().filter_map(|&row| user_encoder.decode(row)) {
            for review in self.reviews.for_user(user) {
                counts.add(review.book_id);
            }
        }
        let books = self.popularity_ranked(counts, &rated);

        debug!(
            user_id,
            pool = pool.len(),
            neighborhood = neighborhood.len(),
            shape = ?matrix.shape(),
            returned = books.len(),
            "User-based recommendation finished in {:?}",
            start.elapsed()
        );
        Ok(Recommendations::new(Strategy::UserSimilarity, books))
    }

    /// Recommend books rated most like `book_id` by the readers who rated it.
    ///
    /// `rank` is the position in descending similarity; `score` is the
    /// cosine similarity itself.
    pub fn item_based(&self, book_id: i64) -> Result<Recommendations> {
        let start = Instant::now();
        let user_encoder = self.artifacts.user_id_encoder()?;
        let book_encoder = self.artifacts.book_id_encoder()?;
        let target_row = book_encoder.encode(ArtifactName::BookIdEncoder, &book_key(book_id))?;

        let readers = self.reviews.users_of(book_id);
        if readers.is_empty() {
            return Ok(Recommendations::new(Strategy::ItemSimilarity, Vec::new()));
        }

        let triplets = readers.iter().flat_map(|&user| {
            let col = user_encoder.lookup(user);
            self.reviews.for_user(user).filter_map(move |r| {
                let row = book_encoder.lookup(&book_key(r.book_id))?;
                Some((row, col?, r.rating))
            })
        });
        let matrix = CsrMatrix::from_triplets((book_encoder.len(), user_encoder.len()), triplets);

        let query = matrix.row(target_row).to_vector(matrix.num_cols);
        let similarity = matrix.cosine_similarity(&query);
        let nearest = top_k_sorted(
            &similarity,
            matrix.populated_rows().filter(|&row| row != target_row),
            self.config.neighbors,
        );

        let books: Vec<BookRecord> = nearest
            .into_iter()
            .filter_map(|row| {
                let id: i64 = book_encoder.decode(row)?.parse().ok()?;
                let book = self.books.find(id)?;
                Some(BookRecord::from(book).with_score(similarity[row]))
            })
            .enumerate()
            .map(|(rank, record)| record.with_rank(rank))
            .take(self.config.page_size)
            .collect();

        debug!(
            book_id,
            readers = readers.len(),
            shape = ?matrix.shape(),
            returned = books.len(),
            "Item-based recommendation finished in {:?}",
            start.elapsed()
        );
        Ok(Recommendations::new(Strategy::ItemSimilarity, books))
    }

    /// Books most often read by users who liked the user's favorites.
    pub fn top_users_choice(&self, user_id: &str) -> Result<Recommendations> {
        let rated = self.reviews.books_of(user_id);
        let pool = self.like_minded(user_id);

        let mut counts = BookCounts::default();
        for &user in &pool {
            for review in self.reviews.for_user(user) {
                counts.add(review.book_id);
            }
        }

        let books = self.popularity_ranked(counts, &rated);
        debug!(user_id, pool = pool.len(), returned = books.len(), "Top users' choice");
        Ok(Recommendations::new(Strategy::TopUsersChoice, books))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::LabelEncoder;
    use crate::error::RecommendError;
    use crate::tests::fixtures::{book, book_encoder, review, user_encoder};
    use crate::types::Book;

    fn recommender(books: Vec<Book>, reviews: Vec<Review>) -> NeighborhoodRecommender {
        let artifacts = ArtifactStore {
            book_id_encoder: Some(book_encoder(&books)),
            user_id_encoder: Some(user_encoder(&reviews)),
            ..Default::default()
        };
        NeighborhoodRecommender::new(
            Arc::new(BookTable::new(books)),
            Arc::new(ReviewTable::new(reviews)),
            Arc::new(artifacts),
            NeighborhoodConfig::default(),
        )
    }

    fn library() -> (Vec<Book>, Vec<Review>) {
        let books = vec![
            book(1, "Dune").rated(4.3, 100),
            book(2, "Emma").rated(4.0, 50),
            book(3, "Ulysses").rated(3.8, 10),
            book(4, "Beloved").rated(4.1, 20),
            book(5, "Beloved").rated(4.1, 40),
            book(6, "Walden").rated(3.9, 1000),
        ];
        let reviews = vec![
            review("target", 1, 5.0),
            review("target", 2, 4.0),
            review("ann", 1, 5.0),
            review("ann", 2, 4.0),
            review("ann", 3, 5.0),
            review("ann", 4, 4.0),
            review("bob", 1, 4.5),
            review("bob", 3, 3.0),
            review("bob", 5, 5.0),
            review("cid", 6, 5.0),
            review("cid", 3, 2.0),
        ];
        (books, reviews)
    }

    #[test]
    fn test_user_based_excludes_known_books() {
        let (books, reviews) = library();
        let result = recommender(books, reviews).user_based("target").unwrap();

        let ids: Vec<i64> = result.books.iter().map(|b| b.book_id).collect();
        assert!(!ids.contains(&1));
        assert!(!ids.contains(&2));
        assert!(!ids.contains(&6));
        assert_eq!(ids.first(), Some(&3));
    }

    #[test]
    fn test_user_based_without_like_minded_readers_is_empty() {
        let books = vec![book(1, "Dune"), book(2, "Emma")];
        // the only other reader of Dune did not like it
        let reviews = vec![review("t", 1, 2.0), review("o", 1, 3.0), review("o", 2, 5.0)];

        let result = recommender(books, reviews).user_based("t").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_user_based_unknown_user() {
        let (books, reviews) = library();
        let err = recommender(books, reviews).user_based("ghost").unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory {
                encoder: ArtifactName::UserIdEncoder,
                ..
            }
        ));
    }

    #[test]
    fn test_item_based_ranks_by_similarity() {
        let (books, reviews) = library();
        let result = recommender(books, reviews).item_based(1).unwrap();

        assert!(result.books.iter().all(|b| b.book_id != 1));
        assert_eq!(result.books[0].rank, Some(0));
        for pair in result.books.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            assert!(pair[0].rank < pair[1].rank);
        }
        // Walden is only read by cid, who never read Dune
        assert!(result.books.iter().all(|b| b.book_id != 6));
    }

    #[test]
    fn test_item_based_ranks_stay_contiguous_past_missing_books() {
        let books = vec![book(1, "Dune"), book(2, "Emma"), book(3, "Ulysses")];
        let reviews = vec![
            review("a", 1, 5.0),
            review("a", 2, 4.0),
            review("a", 9, 5.0),
            review("b", 1, 4.0),
            review("b", 3, 5.0),
            review("b", 9, 4.0),
        ];
        // book 9 is known to the encoder but absent from the catalog
        let artifacts = ArtifactStore {
            book_id_encoder: Some(LabelEncoder::new([1, 2, 3, 9].map(book_key))),
            user_id_encoder: Some(user_encoder(&reviews)),
            ..Default::default()
        };
        let recommender = NeighborhoodRecommender::new(
            Arc::new(BookTable::new(books)),
            Arc::new(ReviewTable::new(reviews)),
            Arc::new(artifacts),
            NeighborhoodConfig::default(),
        );

        let result = recommender.item_based(1).unwrap();

        assert!(result.books.iter().all(|b| b.book_id != 9));
        let ranks: Vec<Option<usize>> = result.books.iter().map(|b| b.rank).collect();
        assert_eq!(ranks, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_item_based_unknown_book() {
        let (books, reviews) = library();
        let err = recommender(books, reviews).item_based(404).unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory {
                encoder: ArtifactName::BookIdEncoder,
                ..
            }
        ));
    }

    #[test]
    fn test_item_based_unread_book_is_empty() {
        let (mut books, reviews) = library();
        books.push(book(7, "Unread"));
        let result = recommender(books, reviews).item_based(7).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_top_users_choice_scores_and_dedupes_titles() {
        let (books, reviews) = library();
        let result = recommender(books, reviews).top_users_choice("target").unwrap();

        let ids: Vec<i64> = result.books.iter().map(|b| b.book_id).collect();
        // Ulysses: 2 * 2/10; Beloved(4): 1 * 1/20; Beloved(5): 1 * 1/40 dropped as duplicate title
        assert_eq!(ids, vec![3, 4]);
        assert!((result.books[0].score.unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_top_users_choice_without_history() {
        let (books, reviews) = library();
        let result = recommender(books, reviews).top_users_choice("nobody").unwrap();
        assert!(result.is_empty());
    }
}
