//! Catalog rows and recommendation result types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Immutable catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    pub publisher: String,
    pub publication_year: i32,
    pub average_rating: f64,
    pub ratings_count: i64,
    pub num_pages: i32,
    pub is_ebook: bool,
    pub image_url: String,
    pub url: String,
    /// Normalized title tokens, input of the content title vectorizer
    pub mod_title: String,
}

/// One user's rating of one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub user_id: String,
    pub book_id: i64,
    pub rating: f32,
    pub review_text: Option<String>,
}

/// Aggregated, preprocessed review text of one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExtendedReview {
    pub book_id: i64,
    pub combined_processed_review: Option<String>,
}

impl ExtendedReview {
    pub fn text(&self) -> &str {
        self.combined_processed_review.as_deref().unwrap_or("")
    }
}

/// Retrieval strategy that produced a result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TopRated,
    TopShort,
    TopPaper,
    TopEbook,
    TitleSearch,
    DescriptionSearch,
    ReviewSimilarity,
    ContentBased,
    UserSimilarity,
    TopUsersChoice,
    ItemSimilarity,
    LatentFactor,
}

/// Book record handed back to the service layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub book_id: i64,
    pub title: String,
    pub publication_year: i32,
    pub publisher: String,
    pub average_rating: f64,
    pub image_url: String,
    pub url: String,
    pub num_pages: i32,
    /// Predicted rating, popularity score or similarity, depending on strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Position-based rank, 0 = best
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_has_book: Option<bool>,
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.book_id,
            title: book.title.clone(),
            publication_year: book.publication_year,
            publisher: book.publisher.clone(),
            average_rating: book.average_rating,
            image_url: book.image_url.clone(),
            url: book.url.clone(),
            num_pages: book.num_pages,
            score: None,
            rank: None,
            user_has_book: None,
        }
    }
}

impl BookRecord {
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = Some(rank);
        self
    }
}

/// Mark every record with whether its book is already in the user's library.
pub fn annotate_ownership(records: &mut [BookRecord], owned_book_ids: &HashSet<i64>) {
    for record in records.iter_mut() {
        record.user_has_book = Some(owned_book_ids.contains(&record.book_id));
    }
}

/// Result list plus the status message the service layer shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub strategy: Strategy,
    pub books: Vec<BookRecord>,
    pub message: String,
}

impl Recommendations {
    pub fn new(strategy: Strategy, books: Vec<BookRecord>) -> Self {
        let message = if books.is_empty() {
            "No recommendations found.".to_string()
        } else {
            "Recommendations fetched successfully.".to_string()
        };
        Self {
            strategy,
            books,
            message,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
