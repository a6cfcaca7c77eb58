//! Catalog, review and extended-review repositories
//!
//! The backing store is only touched during startup: each table is fetched
//! in bulk once and kept in memory for the lifetime of the engine.

mod postgres;
mod tables;

pub use postgres::{connect_pool, PostgresDataSource};
pub use tables::{BookTable, ExtendedReviewTable, ReviewTable};

use crate::error::Result;
use crate::types::{Book, ExtendedReview, Review};
use async_trait::async_trait;

/// Bulk-fetch capability over the three fixed queries.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_books(&self) -> Result<Vec<Book>>;
    async fn fetch_reviews(&self) -> Result<Vec<Review>>;
    async fn fetch_extended_reviews(&self) -> Result<Vec<ExtendedReview>>;
}

/// Data source over rows already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub books: Vec<Book>,
    pub reviews: Vec<Review>,
    pub extended_reviews: Vec<ExtendedReview>,
}

impl StaticSource {
    pub fn new(
        books: Vec<Book>,
        reviews: Vec<Review>,
        extended_reviews: Vec<ExtendedReview>,
    ) -> Self {
        Self {
            books,
            reviews,
            extended_reviews,
        }
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn fetch_books(&self) -> Result<Vec<Book>> {
        Ok(self.books.clone())
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>> {
        Ok(self.reviews.clone())
    }

    async fn fetch_extended_reviews(&self) -> Result<Vec<ExtendedReview>> {
        Ok(self.extended_reviews.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{book, extended, review};

    #[test]
    fn test_static_source_returns_rows_as_given() {
        let source = StaticSource::new(
            vec![book(1, "Dune"), book(2, "Emma")],
            vec![review("u1", 1, 5.0), review("u1", 1, 5.0)],
            vec![extended(2, "matchmaking")],
        );

        let books = tokio_test::block_on(source.fetch_books()).unwrap();
        let reviews = tokio_test::block_on(source.fetch_reviews()).unwrap();
        let extended = tokio_test::block_on(source.fetch_extended_reviews()).unwrap();

        assert_eq!(books.len(), 2);
        // deduplication happens in ReviewTable, not in the source
        assert_eq!(reviews.len(), 2);
        assert_eq!(extended[0].book_id, 2);
    }
}
