//! Term-frequency similarity index.
//!
//! Texts are tokenised into lowercase alphanumeric runs and stored as
//! normalised term-frequency vectors. Search is a linear cosine scan.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// An indexed text with an identifier and free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryItem {
    /// Caller-chosen identifier.
    pub id: String,
    /// Indexed text.
    pub text: String,
    /// Arbitrary metadata carried through search results.
    pub meta: Map<String, Value>,
}

type TermVector = HashMap<String, f64>;

/// In-memory TF index with cosine ranking.
#[derive(Debug, Default)]
pub struct TinyVectorIndex {
    items: Vec<MemoryItem>,
    vectors: Vec<TermVector>,
}

impl TinyVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item.
    pub fn add(&mut self, item: MemoryItem) {
        self.vectors.push(term_frequencies(&item.text));
        self.items.push(item);
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns up to `k` items with a positive score, best first.
    ///
    /// Equal scores keep insertion order.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<(&MemoryItem, f64)> {
        let q = term_frequencies(query);
        let mut scored: Vec<(&MemoryItem, f64)> = self
            .items
            .iter()
            .zip(&self.vectors)
            .map(|(item, v)| (item, cosine(&q, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored.retain(|(_, score)| *score > 0.0);
        scored
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn term_frequencies(text: &str) -> TermVector {
    let tokens = tokenize(text);
    let mut tf = TermVector::new();
    for token in &tokens {
        *tf.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    if !tokens.is_empty() {
        let inv = 1.0 / tokens.len() as f64;
        for v in tf.values_mut() {
            *v *= inv;
        }
    }
    tf
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(k, va)| b.get(k).map(|vb| va * vb))
        .sum();
    let norm = |v: &TermVector| v.values().map(|x| x * x).sum::<f64>().sqrt();
    let (na, nb) = (norm(a), norm(b));
    if na <= 0.0 || nb <= 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
