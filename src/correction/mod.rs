//! Post-transcription text correction
//!
//! Correction is a lossy enhancement: a corrector may change a right word
//! into a wrong one, and it never fails. The worst case is returning the
//! input unchanged.

pub mod lexicon;
pub mod llm;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{CorrectionConfig, CorrectionMode};

pub use lexicon::{LexiconCorrector, WordFrequencies};
pub use llm::LlmCorrector;

/// Heuristic spelling/grammar pass over a transcript
#[async_trait]
pub trait TextCorrector: Send + Sync {
    async fn correct(&self, text: &str) -> String;

    fn name(&self) -> &'static str;
}

/// Leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCorrector;

#[async_trait]
impl TextCorrector for NoopCorrector {
    async fn correct(&self, text: &str) -> String {
        text.to_string()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Create the corrector selected in the configuration
pub fn create_corrector(config: &CorrectionConfig) -> Result<Arc<dyn TextCorrector>> {
    match config.mode {
        CorrectionMode::Lexicon => Ok(Arc::new(LexiconCorrector::from_config(config)?)),
        CorrectionMode::Llm => Ok(Arc::new(LlmCorrector::new(&config.llm)?)),
        CorrectionMode::None => Ok(Arc::new(NoopCorrector)),
    }
}

/// Number of whitespace-separated words that differ between two texts
pub fn count_changed_words(before: &str, after: &str) -> usize {
    let before: Vec<&str> = before.split_whitespace().collect();
    let after: Vec<&str> = after.split_whitespace().collect();

    let differing = before
        .iter()
        .zip(after.iter())
        .filter(|(a, b)| a != b)
        .count();
    differing + before.len().abs_diff(after.len())
}
