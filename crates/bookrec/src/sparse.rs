//! Compressed sparse row matrices and vectors
//!
//! Every feature space in the engine (TF-IDF matrices, neighborhood rating
//! matrices, classifier inputs) is stored as CSR. Rows are addressed
//! positionally, so row `i` of a catalog-aligned matrix is catalog row `i`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single sparse row with sorted, unique column indices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub dim: usize,
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from unsorted (column, value) pairs; duplicate columns are summed.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f32)>) -> Self {
        let mut merged: BTreeMap<usize, f32> = BTreeMap::new();
        for (col, value) in pairs {
            *merged.entry(col).or_insert(0.0) += value;
        }

        let mut vector = Self::new(dim);
        for (col, value) in merged {
            if value != 0.0 {
                vector.indices.push(col);
                vector.values.push(value);
            }
        }
        vector
    }

    pub fn from_dense(values: &[f32]) -> Self {
        Self::from_pairs(values.len(), values.iter().copied().enumerate())
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Horizontal concatenation; column offsets follow the order of `parts`.
    pub fn concat(parts: &[&SparseVector]) -> Self {
        let dim = parts.iter().map(|p| p.dim).sum();
        let mut out = Self::new(dim);
        let mut offset = 0;
        for part in parts {
            for (&col, &value) in part.indices.iter().zip(&part.values) {
                out.indices.push(offset + col);
                out.values.push(value);
            }
            offset += part.dim;
        }
        out
    }

    pub fn to_dense(&self) -> Vec<f32> {
        let mut dense = vec![0.0; self.dim];
        for (&col, &value) in self.indices.iter().zip(&self.values) {
            dense[col] = value;
        }
        dense
    }
}

/// Borrowed view of one CSR row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f32],
}

impl RowView<'_> {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn to_vector(&self, dim: usize) -> SparseVector {
        SparseVector {
            dim,
            indices: self.indices.to_vec(),
            values: self.values.to_vec(),
        }
    }
}

/// Sparse matrix in compressed sparse row layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    pub num_rows: usize,
    pub num_cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub data: Vec<f32>,
}

impl CsrMatrix {
    pub fn empty(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            indptr: vec![0; num_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from coordinate triplets. Duplicate coordinates are summed.
    /// The shape grows to fit the largest index seen, at least `min_shape`.
    pub fn from_triplets(
        min_shape: (usize, usize),
        triplets: impl IntoIterator<Item = (usize, usize, f32)>,
    ) -> Self {
        let mut rows: BTreeMap<usize, BTreeMap<usize, f32>> = BTreeMap::new();
        let (mut num_rows, mut num_cols) = min_shape;

        for (row, col, value) in triplets {
            num_rows = num_rows.max(row + 1);
            num_cols = num_cols.max(col + 1);
            *rows.entry(row).or_default().entry(col).or_insert(0.0) += value;
        }

        let mut matrix = Self::empty(num_rows, num_cols);
        matrix.indptr.clear();
        matrix.indptr.push(0);
        let mut populated = rows.into_iter().peekable();
        for row in 0..num_rows {
            if let Some((_, cols)) = populated.next_if(|(r, _)| *r == row) {
                for (col, value) in cols {
                    matrix.indices.push(col);
                    matrix.data.push(value);
                }
            }
            matrix.indptr.push(matrix.indices.len());
        }
        matrix
    }

    pub fn from_rows(num_cols: usize, rows: &[SparseVector]) -> Self {
        let mut matrix = Self::empty(0, num_cols);
        matrix.num_rows = rows.len();
        for row in rows {
            matrix.indices.extend_from_slice(&row.indices);
            matrix.data.extend_from_slice(&row.values);
            matrix.indptr.push(matrix.indices.len());
        }
        matrix
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn row(&self, row: usize) -> RowView<'_> {
        let (start, end) = (self.indptr[row], self.indptr[row + 1]);
        RowView {
            indices: &self.indices[start..end],
            values: &self.data[start..end],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        let view = self.row(row);
        view.indices
            .binary_search(&col)
            .map(|pos| view.values[pos])
            .unwrap_or(0.0)
    }

    /// Check CSR structural invariants after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        if self.indptr.len() != self.num_rows + 1 {
            return Err(format!(
                "indptr length {} does not match {} rows",
                self.indptr.len(),
                self.num_rows
            ));
        }
        if self.indices.len() != self.data.len() {
            return Err("indices and data lengths differ".to_string());
        }
        if self.indptr.first() != Some(&0) || self.indptr.last() != Some(&self.data.len()) {
            return Err("indptr does not span data".to_string());
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err("indptr is not monotonic".to_string());
        }
        if let Some(bad) = self.indices.iter().find(|&&c| c >= self.num_cols) {
            return Err(format!("column {} out of bounds ({})", bad, self.num_cols));
        }
        Ok(())
    }

    /// Cosine similarity between `query` and every row of the matrix.
    ///
    /// Rows (or queries) with zero norm score 0.
    pub fn cosine_similarity(&self, query: &SparseVector) -> Vec<f32> {
        let mut similarities = vec![0.0f32; self.num_rows];
        let query_norm = query.norm();
        if query_norm == 0.0 {
            return similarities;
        }

        let mut dense_query = vec![0.0f32; self.num_cols.max(query.dim)];
        for (&col, &value) in query.indices.iter().zip(&query.values) {
            dense_query[col] = value;
        }

        for (row, similarity) in similarities.iter_mut().enumerate() {
            let view = self.row(row);
            let mut dot = 0.0f32;
            let mut norm_sq = 0.0f32;
            for (&col, &value) in view.indices.iter().zip(view.values) {
                dot += value * dense_query[col];
                norm_sq += value * value;
            }
            if norm_sq > 0.0 {
                *similarity = dot / (norm_sq.sqrt() * query_norm);
            }
        }

        similarities
    }

    /// Rows that hold at least one stored value.
    pub fn populated_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_rows).filter(move |&r| self.indptr[r] != self.indptr[r + 1])
    }
}
