//! Offline embedding provider producing deterministic, content-aware vectors.

use crate::embeddings::provider::EmbeddingProvider;
use pitchsim_core::AppResult;
use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "our", "your", "you", "we",
];

/// Hashing provider for tests and runs without network access.
///
/// Each significant word contributes its frequency to one dimension and the
/// square root of its frequency to one dimension per character trigram.
/// Texts that share vocabulary land close together; the vectors carry no
/// real semantics.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let lower = text.to_lowercase();
        let mut frequencies: BTreeMap<&str, usize> = BTreeMap::new();
        for word in lower
            .split_whitespace()
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(w))
        {
            *frequencies.entry(word).or_default() += 1;
        }

        for (word, freq) in frequencies {
            let freq = freq as f32;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(&trigram, 37)] += freq.sqrt();
            }

            vector[self.bucket(word, 31)] += freq;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        vector
    }

    fn bucket(&self, token: &str, multiplier: u64) -> usize {
        let hash = token
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
