use crate::config::VectorizerConfig;
use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Word runs of two or more characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

/// Build the text fed to the vectorizer from a ticket's title and description.
///
/// Both parts are trimmed; when both are present they are joined by a single
/// space, otherwise whichever one is non-empty is returned (possibly "").
pub fn build_text(title: Option<&str>, description: Option<&str>) -> String {
    let title = title.unwrap_or("").trim();
    let description = description.unwrap_or("").trim();

    match (title.is_empty(), description.is_empty()) {
        (false, false) => format!("{} {}", title, description),
        (false, true) => title.to_string(),
        (true, false) => description.to_string(),
        (true, true) => String::new(),
    }
}

/// Sparse feature vector: strictly increasing indices with their values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseVector {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Dot product via a merge over the sorted indices
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Dense values, used where a matrix library wants rows
    pub fn to_dense(&self, n_features: usize) -> Vec<f64> {
        let mut dense = vec![0.0; n_features];
        for (idx, value) in self.iter() {
            if idx < n_features {
                dense[idx] = value;
            }
        }
        dense
    }
}

/// Cosine similarity of two non-negative vectors, in [0, 1]. Zero vectors score 0.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(0.0, 1.0)
}

/// TF-IDF vectorizer over word n-grams.
///
/// Fit once on the training texts; afterwards the vocabulary and IDF weights
/// are frozen and `transform` maps any text into the same feature space.
/// Terms never seen during fitting contribute nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: VectorizerConfig,

    /// Vocabulary mapping (term -> index), indices follow term order
    vocabulary: BTreeMap<String, usize>,

    /// Smoothed inverse document frequency per feature index
    idf: Vec<f64>,

    /// Number of documents seen by `fit`
    n_documents: usize,
}

impl TfidfVectorizer {
    /// Fit vocabulary and IDF weights on a corpus
    pub fn fit(config: VectorizerConfig, documents: &[String]) -> Result<Self> {
        if documents.is_empty() {
            return Err(AppError::Training(
                "Cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }
        if config.ngram_range.0 == 0 || config.ngram_range.0 > config.ngram_range.1 {
            return Err(AppError::Configuration(format!(
                "Invalid n-gram range {:?}",
                config.ngram_range
            )));
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = extract_terms(&config, doc).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let min_df = config.min_doc_freq.max(1);
        let kept: BTreeMap<String, usize> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df)
            .collect();

        let n_docs = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (idx, (term, df)) in kept.into_iter().enumerate() {
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, idx);
        }

        Ok(Self {
            config,
            vocabulary,
            idf,
            n_documents: documents.len(),
        })
    }

    /// Transform one text into an L2-normalized TF-IDF vector
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in extract_terms(&self.config, text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = SparseVector {
            indices: Vec::with_capacity(counts.len()),
            values: Vec::with_capacity(counts.len()),
        };
        for (idx, tf) in counts {
            vector.indices.push(idx);
            vector.values.push(tf * self.idf[idx]);
        }

        let norm = vector.norm();
        if norm > 0.0 {
            for value in vector.values.iter_mut() {
                *value /= norm;
            }
        }
        vector
    }

    /// Transform many texts in parallel, preserving order
    pub fn transform_batch(&self, texts: &[String]) -> Vec<SparseVector> {
        texts.par_iter().map(|text| self.transform(text)).collect()
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&idx| self.idf[idx])
    }
}

/// Tokenize and expand into n-grams (space-joined)
fn extract_terms(config: &VectorizerConfig, text: &str) -> Vec<String> {
    let text = if config.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    let words: Vec<&str> = TOKEN_PATTERN.find_iter(&text).map(|m| m.as_str()).collect();

    let mut terms = Vec::new();
    for n in config.ngram_range.0..=config.ngram_range.1 {
        for window in words.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "Invoice not received".to_string(),
            "Error 500 on dashboard".to_string(),
            "Add export to CSV".to_string(),
        ]
    }

    #[test]
    fn test_build_text_policy() {
        assert_eq!(build_text(Some(" Title "), Some(" Body ")), "Title Body");
        assert_eq!(build_text(Some("Title"), Some("   ")), "Title");
        assert_eq!(build_text(None, Some("Body")), "Body");
        assert_eq!(build_text(Some(""), None), "");
        assert_eq!(build_text(None, None), "");
    }

    #[test]
    fn test_ngram_extraction() {
        let config = VectorizerConfig::default();
        let terms = extract_terms(&config, "Database connection ERROR a");

        assert!(terms.contains(&"database".to_string()));
        assert!(terms.contains(&"connection error".to_string()));
        // single-character tokens are dropped
        assert!(!terms.iter().any(|t| t == "a" || t.ends_with(" a")));
        assert_eq!(terms.len(), 5);
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary() {
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &corpus()).unwrap();

        assert!(vectorizer.contains_term("invoice"));
        assert!(vectorizer.contains_term("error 500"));
        assert!(vectorizer.contains_term("to csv"));
        assert_eq!(vectorizer.vocab_size(), vectorizer.n_features());
        assert_eq!(vectorizer.n_documents(), 3);

        let indices: Vec<usize> = vectorizer.vocabulary.values().copied().collect();
        assert_eq!(indices, (0..vectorizer.vocab_size()).collect::<Vec<_>>());
    }

    #[test]
    fn test_idf_smoothing() {
        let docs = vec!["billing issue".to_string(), "billing question".to_string()];
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &docs).unwrap();

        // ln(3/3) + 1 for a term in every document, ln(3/2) + 1 otherwise
        assert!((vectorizer.idf("billing").unwrap() - 1.0).abs() < 1e-12);
        assert!((vectorizer.idf("issue").unwrap() - (1.5f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_unit_length() {
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &corpus()).unwrap();
        let vector = vectorizer.transform("Invoice not received for order");

        assert!(vector.nnz() > 0);
        assert!((vector.norm() - 1.0).abs() < 1e-9);
        assert!(vector.indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unknown_terms_are_ignored() {
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &corpus()).unwrap();
        let vector = vectorizer.transform("Payment failed");

        assert!(vector.is_zero());
        assert_eq!(vector.nnz(), 0);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let result = TfidfVectorizer::fit(VectorizerConfig::default(), &[]);
        assert!(matches!(result, Err(AppError::Training(_))));
    }

    #[test]
    fn test_cosine_similarity() {
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &corpus()).unwrap();
        let a = vectorizer.transform("Error 500 on dashboard");
        let b = vectorizer.transform("dashboard error 500");
        let c = vectorizer.transform("Add export to CSV");

        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &b) > 0.0);
        assert_eq!(cosine_similarity(&a, &c), 0.0);
        assert_eq!(cosine_similarity(&a, &SparseVector::default()), 0.0);
    }

    #[test]
    fn test_transform_batch_preserves_order() {
        let vectorizer = TfidfVectorizer::fit(VectorizerConfig::default(), &corpus()).unwrap();
        let texts = corpus();
        let batch = vectorizer.transform_batch(&texts);

        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(batch.iter()) {
            assert_eq!(&vectorizer.transform(text), vector);
        }
    }
}
