//! In-memory tables built once from the bulk loads

use crate::types::{Book, ExtendedReview, Review};
use std::collections::{HashMap, HashSet};

/// Catalog rows in load order.
///
/// Row `i` here is row `i` of every catalog-aligned feature matrix; the
/// order must never be changed after load.
#[derive(Debug, Default)]
pub struct BookTable {
    rows: Vec<Book>,
    by_id: HashMap<i64, usize>,
}

impl BookTable {
    pub fn new(rows: Vec<Book>) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (idx, book) in rows.iter().enumerate() {
            by_id.entry(book.book_id).or_insert(idx);
        }
        Self { rows, by_id }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&Book> {
        self.rows.get(idx)
    }

    pub fn find(&self, book_id: i64) -> Option<&Book> {
        self.by_id.get(&book_id).map(|&idx| &self.rows[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Book> {
        self.rows.iter()
    }
}

/// Rating rows with per-user and per-book indexes.
#[derive(Debug, Default)]
pub struct ReviewTable {
    rows: Vec<Review>,
    by_user: HashMap<String, Vec<usize>>,
    by_book: HashMap<i64, Vec<usize>>,
}

impl ReviewTable {
    /// Duplicate `(user_id, book_id)` pairs are collapsed, first row wins.
    pub fn new(rows: Vec<Review>) -> Self {
        let mut seen: HashSet<(String, i64)> = HashSet::with_capacity(rows.len());
        let rows: Vec<Review> = rows
            .into_iter()
            .filter(|r| seen.insert((r.user_id.clone(), r.book_id)))
            .collect();

        let mut by_user: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_book: HashMap<i64, Vec<usize>> = HashMap::new();
        for (idx, review) in rows.iter().enumerate() {
            by_user.entry(review.user_id.clone()).or_default().push(idx);
            by_book.entry(review.book_id).or_default().push(idx);
        }

        Self {
            rows,
            by_user,
            by_book,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn for_user<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a Review> + 'a {
        self.by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    pub fn for_book(&self, book_id: i64) -> impl Iterator<Item = &Review> {
        self.by_book
            .get(&book_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    /// Book ids the user has reviewed.
    pub fn books_of(&self, user_id: &str) -> HashSet<i64> {
        self.for_user(user_id).map(|r| r.book_id).collect()
    }

    pub fn users_of(&self, book_id: i64) -> HashSet<&str> {
        self.for_book(book_id).map(|r| r.user_id.as_str()).collect()
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }
}

/// Aggregated review text; row `i` is row `i` of the review feature matrix.
#[derive(Debug, Default)]
pub struct ExtendedReviewTable {
    rows: Vec<ExtendedReview>,
    by_book: HashMap<i64, Vec<usize>>,
}

impl ExtendedReviewTable {
    pub fn new(rows: Vec<ExtendedReview>) -> Self {
        let mut by_book: HashMap<i64, Vec<usize>> = HashMap::new();
        for (idx, review) in rows.iter().enumerate() {
            by_book.entry(review.book_id).or_default().push(idx);
        }
        Self { rows, by_book }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&ExtendedReview> {
        self.rows.get(idx)
    }

    /// Row positions holding text for `book_id`.
    pub fn positions(&self, book_id: i64) -> &[usize] {
        self.by_book.get(&book_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First text row for `book_id`, the one joined into content scoring.
    pub fn find(&self, book_id: i64) -> Option<&ExtendedReview> {
        self.positions(book_id).first().map(|&idx| &self.rows[idx])
    }
}
