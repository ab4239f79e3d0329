//! TF-IDF vectorization and all-pairs cosine similarity.
//!
//! Weights follow the usual smoothed formulation:
//! - tf: raw term count in the document
//! - idf: `ln((1 + n) / (1 + df)) + 1`
//! - each document vector is L2-normalized, so cosine similarity is a plain dot product.
//!
//! Documents without any vocabulary term keep a zero vector; their similarity to every other
//! document is 0.

use crate::textprep;
use kwcannibal_core::PageRecord;
use std::collections::BTreeMap;

/// Sparse vector: `(term id, weight)` sorted by term id.
pub type SparseVec = Vec<(usize, f64)>;

/// Vocabulary and smoothed idf weights fitted on one corpus.
#[derive(Debug, Clone)]
pub(crate) struct TfidfModel {
    /// Sorted vocabulary; a term's position is its id.
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfModel {
    pub(crate) fn fit(docs: &[Vec<String>]) -> Self {
        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for toks in docs {
            let mut seen: Vec<&str> = toks.iter().map(|t| t.as_str()).collect();
            seen.sort_unstable();
            seen.dedup();
            for t in seen {
                *df.entry(t).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        let vocabulary = df.keys().map(|t| t.to_string()).collect();
        let idf = df
            .values()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();
        Self { vocabulary, idf }
    }

    fn term_id(&self, term: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|v| v.as_str().cmp(term))
            .ok()
    }

    /// L2-normalized tf-idf vector of one tokenized document. Out-of-vocabulary terms are ignored.
    pub(crate) fn vectorize(&self, tokens: &[String]) -> SparseVec {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for t in tokens {
            if let Some(id) = self.term_id(t) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }
        let mut v: SparseVec = counts
            .into_iter()
            .map(|(id, tf)| (id, tf * self.idf[id]))
            .collect();
        l2_normalize(&mut v);
        v
    }
}

fn l2_normalize(v: &mut SparseVec) {
    let norm = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in v.iter_mut() {
            *w /= norm;
        }
    }
}

/// Dot product of two id-sorted sparse vectors.
fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut acc = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                acc += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    acc
}

/// Cosine similarity of two sparse vectors; 0 when either is a zero vector.
pub fn cosine(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let na = sparse_dot(a, a).sqrt();
    let nb = sparse_dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (sparse_dot(a, b) / (na * nb)).clamp(0.0, 1.0)
}

/// Square, symmetric similarity matrix indexed by `PageRecord::index`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn from_vectors(vectors: &[SparseVec]) -> Self {
        let n = vectors.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let s = cosine(&vectors[i], &vectors[j]);
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Similarity of pages `i` and `j`, or `None` when either is out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.n || j >= self.n {
            return None;
        }
        self.values.get(i * self.n + j).copied()
    }
}

/// Vectorize every page's `full_content` and compute all-pairs cosine similarity.
///
/// Row/column `i` of the result is the page whose `index == i`; the corpus must be in index
/// order (see `corpus::build_corpus`).
pub fn compute_similarity(corpus: &[PageRecord]) -> SimilarityMatrix {
    let docs: Vec<Vec<String>> = corpus
        .iter()
        .map(|p| textprep::tokenize(&p.full_content))
        .collect();
    let model = TfidfModel::fit(&docs);
    let vectors: Vec<SparseVec> = docs.iter().map(|toks| model.vectorize(toks)).collect();
    SimilarityMatrix::from_vectors(&vectors)
}
