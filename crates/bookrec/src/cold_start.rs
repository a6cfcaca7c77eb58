//! Cold Start Handling
//!
//! Popularity lists for users without any history: threshold-and-sort
//! filters over the static catalog, no personalization.

use crate::config::ColdStartConfig;
use crate::repository::BookTable;
use crate::types::{Book, BookRecord, Recommendations, Strategy};
use std::sync::Arc;

pub struct ColdStartRanker {
    books: Arc<BookTable>,
    config: ColdStartConfig,
}

impl ColdStartRanker {
    pub fn new(books: Arc<BookTable>, config: ColdStartConfig) -> Self {
        Self { books, config }
    }

    /// Highly rated and widely rated books, best average first.
    pub fn top_by_average_rating(&self) -> Recommendations {
        Recommendations::new(Strategy::TopRated, self.ranked(|_| true))
    }

    pub fn top_short_books(&self) -> Recommendations {
        let max_pages = self.config.max_short_pages;
        Recommendations::new(
            Strategy::TopShort,
            self.ranked(|book| book.num_pages <= max_pages),
        )
    }

    pub fn top_paper_books(&self) -> Recommendations {
        Recommendations::new(Strategy::TopPaper, self.ranked(|book| !book.is_ebook))
    }

    pub fn top_ebooks(&self) -> Recommendations {
        Recommendations::new(Strategy::TopEbook, self.ranked(|book| book.is_ebook))
    }

    fn is_popular(&self, book: &Book) -> bool {
        book.average_rating >= self.config.min_average_rating
            && book.ratings_count > self.config.min_ratings_count
    }

    fn ranked(&self, extra: impl Fn(&Book) -> bool) -> Vec<BookRecord> {
        let mut selected: Vec<&Book> = self
            .books
            .iter()
            .filter(|book| self.is_popular(book) && extra(book))
            .collect();

        // stable: equal averages keep catalog order
        selected.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));

        selected
            .into_iter()
            .take(self.config.limit)
            .map(BookRecord::from)
            .collect()
    }
}
