//! Fixed-vocabulary categorical encoder

use super::ArtifactName;
use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bijection between raw category values and dense indices.
///
/// Index `i` is the position of the value in the sorted class list, the same
/// numbering the offline training pipeline used. The vocabulary never changes
/// after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "EncoderClasses", into = "EncoderClasses")]
pub struct LabelEncoder {
    classes: Vec<String>,
    lookup: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct EncoderClasses {
    classes: Vec<String>,
}

impl From<EncoderClasses> for LabelEncoder {
    fn from(raw: EncoderClasses) -> Self {
        Self::new(raw.classes)
    }
}

impl From<LabelEncoder> for EncoderClasses {
    fn from(encoder: LabelEncoder) -> Self {
        Self {
            classes: encoder.classes,
        }
    }
}

impl LabelEncoder {
    /// Build from any iterator of values; classes are sorted and de-duplicated.
    pub fn new<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();

        let lookup = classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.clone(), idx))
            .collect();

        Self { classes, lookup }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Index of `value`, or `None` when it was never seen at training time.
    pub fn lookup(&self, value: &str) -> Option<usize> {
        self.lookup.get(value).copied()
    }

    /// Like [`lookup`](Self::lookup) but an unknown value is an error.
    pub fn encode(&self, encoder: ArtifactName, value: &str) -> Result<usize> {
        self.lookup(value)
            .ok_or_else(|| RecommendError::unknown(encoder, value))
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

/// Canonical text form of a book id inside the book encoder
pub fn book_key(book_id: i64) -> String {
    book_id.to_string()
}

/// Canonical text form of the e-book flag inside the format encoder
pub fn ebook_key(is_ebook: bool) -> &'static str {
    if is_ebook {
        "true"
    } else {
        "false"
    }
}
