//! PostgreSQL-backed data source

use super::DataSource;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::types::{Book, ExtendedReview, Review};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

const BOOKS_QUERY: &str = r#"
    SELECT
        book_id::BIGINT AS book_id,
        COALESCE(title_without_series, '') AS title,
        COALESCE(publisher, '') AS publisher,
        COALESCE(publication_year, 0)::INT AS publication_year,
        COALESCE(average_rating, 0)::DOUBLE PRECISION AS average_rating,
        COALESCE(ratings_count, 0)::BIGINT AS ratings_count,
        COALESCE(num_pages, 0)::INT AS num_pages,
        COALESCE(is_ebook, FALSE)::BOOLEAN AS is_ebook,
        COALESCE(image_url, '') AS image_url,
        COALESCE(url, '') AS url,
        COALESCE(mod_title, '') AS mod_title
    FROM books
"#;

const REVIEWS_QUERY: &str = r#"
    SELECT DISTINCT
        user_id::TEXT AS user_id,
        book_id::BIGINT AS book_id,
        rating::REAL AS rating,
        review_text
    FROM book_reviews
"#;

const EXTENDED_REVIEWS_QUERY: &str = r#"
    SELECT
        book_id::BIGINT AS book_id,
        combined_processed_review
    FROM book_reviews_extended
"#;

/// Build the connection pool the bulk loads lease from.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        "Connecting to database with max {} connections",
        config.max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_sec))
        .connect(&config.url)
        .await?;

    info!("Database connection pool established");
    Ok(pool)
}

/// Each fetch leases one pooled connection. The lease is returned to the
/// pool when it drops, on success and on error alike.
pub struct PostgresDataSource {
    pool: PgPool,
}

impl PostgresDataSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for PostgresDataSource {
    async fn fetch_books(&self) -> Result<Vec<Book>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, Book>(BOOKS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, Review>(REVIEWS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn fetch_extended_reviews(&self) -> Result<Vec<ExtendedReview>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ExtendedReview>(EXTENDED_REVIEWS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }
}
