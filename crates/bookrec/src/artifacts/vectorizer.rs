//! TF-IDF text vectorizer (inference only)

use crate::sparse::SparseVector;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Tokens are runs of two or more word characters.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("valid token pattern"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 ]").expect("valid query pattern"));

/// Lowercase and strip everything except ASCII letters, digits and spaces.
pub fn normalize_query(text: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&text.to_lowercase(), "")
        .into_owned()
}

/// Fitted TF-IDF vectorizer
///
/// Vocabulary and IDF weights come from the offline fit; `transform` projects
/// new text into that fixed feature space. Out-of-vocabulary terms are
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term (or space-joined n-gram) to column index
    pub vocabulary: HashMap<String, usize>,
    /// IDF weight per column
    pub idf: Vec<f32>,
    pub lowercase: bool,
    /// Inclusive (min_n, max_n)
    pub ngram_range: (usize, usize),
    pub stop_words: HashSet<String>,
    pub sublinear_tf: bool,
    /// L2-normalize output rows
    pub normalize: bool,
}

impl TfidfVectorizer {
    pub fn new(vocabulary: HashMap<String, usize>, idf: Vec<f32>) -> Self {
        Self {
            vocabulary,
            idf,
            lowercase: true,
            ngram_range: (1, 1),
            stop_words: HashSet::new(),
            sublinear_tf: false,
            normalize: true,
        }
    }

    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram range ({}, {})", min_n, max_n));
        }
        if let Some((term, idx)) = self.vocabulary.iter().find(|(_, &i)| i >= self.idf.len()) {
            return Err(format!(
                "term '{}' maps to column {} beyond {} idf weights",
                term,
                idx,
                self.idf.len()
            ));
        }
        Ok(())
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.contains(*t))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Project one document into the fitted feature space.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&col) = self.vocabulary.get(&term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = SparseVector::from_pairs(
            self.num_features(),
            counts.into_iter().map(|(col, count)| {
                let tf = if self.sublinear_tf {
                    1.0 + count.ln()
                } else {
                    count
                };
                (col, tf * self.idf[col])
            }),
        );

        if self.normalize {
            let norm = vector.norm();
            if norm > 0.0 {
                vector.values.iter_mut().for_each(|v| *v /= norm);
            }
        }
        vector
    }

    pub fn transform_batch<'a>(
        &self,
        texts: impl IntoIterator<Item = &'a str>,
    ) -> Vec<SparseVector> {
        texts.into_iter().map(|t| self.transform(t)).collect()
    }
}
