//! Properties every strategy must hold regardless of data

use super::fixtures::{book, extended, fitted_engine, review};
use crate::artifacts::ArtifactName;
use crate::engine::RecommenderEngine;
use crate::error::RecommendError;
use std::collections::HashSet;

fn library() -> RecommenderEngine {
    let titles = [
        "Dune",
        "Dune Messiah",
        "Emma",
        "Persuasion",
        "Ulysses",
        "Dubliners",
        "Beloved",
        "Jazz",
        "Walden",
        "Middlemarch",
    ];
    let books = titles
        .iter()
        .enumerate()
        .map(|(i, t)| book(i as i64 + 1, t).rated(3.5 + i as f64 * 0.1, 100 + i as i64 * 50))
        .collect();

    let readers = ["ana", "ben", "cai", "dee", "eli", "fay"];
    let mut reviews = Vec::new();
    for (u, user) in readers.iter().enumerate() {
        for b in 0..10i64 {
            if (b as usize + u) % 3 != 0 {
                let rating = 1.0 + ((b as usize * 7 + u * 3) % 5) as f32;
                reviews.push(review(user, b + 1, rating));
            }
        }
    }

    let extended = (1..=10)
        .map(|id| extended(id, &format!("theme{} shared words {}", id % 3, id)))
        .collect();

    fitted_engine(books, reviews, extended)
}

fn reviewed_by(engine: &RecommenderEngine, user: &str) -> HashSet<i64> {
    engine.reviews().books_of(user)
}

#[test]
fn test_personalized_lists_exclude_reviewed_books() {
    let engine = library();
    for user in ["ana", "ben", "cai", "dee", "eli", "fay"] {
        let reviewed = reviewed_by(&engine, user);

        let lists = [
            engine.content().predict(user).unwrap(),
            engine.neighborhood().user_based(user).unwrap(),
            engine.neighborhood().top_users_choice(user).unwrap(),
            engine.latent().predict(user).unwrap(),
        ];
        for list in &lists {
            assert!(
                list.books.iter().all(|b| !reviewed.contains(&b.book_id)),
                "{:?} returned a book {} already reviewed",
                list.strategy,
                user
            );
            assert!(list.books.len() <= 10);
        }
    }
}

#[test]
fn test_item_based_never_returns_subject() {
    let engine = library();
    for book_id in 1..=10 {
        let result = engine.neighborhood().item_based(book_id).unwrap();
        assert!(result.books.iter().all(|b| b.book_id != book_id));
    }
}

#[test]
fn test_unknown_subjects_raise_unknown_category() {
    let engine = library();

    for result in [
        engine.content().predict("zed"),
        engine.neighborhood().user_based("zed"),
    ] {
        assert!(matches!(
            result,
            Err(RecommendError::UnknownCategory {
                encoder: ArtifactName::UserIdEncoder,
                ..
            })
        ));
    }

    let err = engine.neighborhood().item_based(999).unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn test_review_similarity_rank_follows_similarity() {
    let engine = library();
    for book_id in 1..=10 {
        let result = engine.similarity().by_review_similarity(book_id).unwrap();
        assert!(!result.is_empty());
        for pair in result.books.windows(2) {
            assert!(pair[0].rank < pair[1].rank);
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[test]
fn test_title_search_returns_same_set_twice() {
    let engine = library();
    let ids = |query: &str| -> HashSet<i64> {
        engine
            .similarity()
            .by_title(query)
            .unwrap()
            .books
            .iter()
            .map(|b| b.book_id)
            .collect()
    };

    assert_eq!(ids("dune"), ids("dune"));
    assert_eq!(ids("Walden!"), ids("walden"));
}

#[test]
fn test_description_search_is_bounded() {
    let engine = library();
    let result = engine.similarity().by_description("penguin").unwrap();
    assert_eq!(result.books.len(), 10);
}
