//! Tag extraction and sentiment scoring seams
//!
//! The pipeline only depends on the two traits below. `HashtagExtractor` and
//! `LexiconScorer` are the stock implementations used by the runtime binary.

use regex::Regex;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

/// Failure raised by a tag extractor or sentiment scorer
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// The collaborator returned an error
    Failed(String),
    /// The collaborator panicked
    Panicked(String),
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::Failed(msg) => write!(f, "collaborator failed: {}", msg),
            CollaboratorError::Panicked(msg) => write!(f, "collaborator panicked: {}", msg),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Turns post text into an ordered list of tags
///
/// Called once per post from every worker, so it should be cheap and free of
/// side effects.
pub trait TagExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<String>, CollaboratorError>;
}

/// Scores text, ideally within [-1, 1] where 0 means neutral/unknown
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Result<f64, CollaboratorError>;
}

impl<F> TagExtractor for F
where
    F: Fn(&str) -> Result<Vec<String>, CollaboratorError> + Send + Sync,
{
    fn extract(&self, text: &str) -> Result<Vec<String>, CollaboratorError> {
        self(text)
    }
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> Result<f64, CollaboratorError> + Send + Sync,
{
    fn score(&self, text: &str) -> Result<f64, CollaboratorError> {
        self(text)
    }
}

/// Run a collaborator call, turning a panic into a [`CollaboratorError`]
///
/// Keeps a misbehaving extractor or scorer from taking down the worker or
/// aggregator task that called it.
pub fn guarded<T, F>(call: F) -> Result<T, CollaboratorError>
where
    F: FnOnce() -> Result<T, CollaboratorError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(CollaboratorError::Panicked(msg))
        }
    }
}

/// Extracts `#word` hashtags, lowercased, in the order they appear
///
/// A hashtag matches `#\w+`: `#` followed by one or more Unicode word
/// characters. A lone `#` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashtagExtractor;

impl HashtagExtractor {
    pub fn new() -> Self {
        Self
    }
}

static HASHTAG_PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn hashtag_pattern() -> Result<&'static Regex, CollaboratorError> {
    HASHTAG_PATTERN
        .get_or_init(|| Regex::new(r"#\w+"))
        .as_ref()
        .map_err(|e| CollaboratorError::Failed(format!("hashtag pattern: {}", e)))
}

impl TagExtractor for HashtagExtractor {
    fn extract(&self, text: &str) -> Result<Vec<String>, CollaboratorError> {
        let pattern = hashtag_pattern()?;
        Ok(pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect())
    }
}

/// Word-list sentiment heuristic
///
/// Counts how many positive and negative words occur in the lowercased text
/// (each word at most once, substring match) and returns
/// `(pos - neg) / max(1, pos + neg)`, or 0.0 when nothing matched.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    positive: BTreeSet<String>,
    negative: BTreeSet<String>,
}

const POSITIVE_WORDS: [&str; 5] = ["bueno", "feliz", "amo", "lindo", "rápido"];
const NEGATIVE_WORDS: [&str; 5] = ["malo", "triste", "odio", "feo", "lento"];

impl LexiconScorer {
    pub fn new<P, N, S>(positive: P, negative: N) -> Self
    where
        P: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positive: positive.into_iter().map(|w| w.into().to_lowercase()).collect(),
            negative: negative.into_iter().map(|w| w.into().to_lowercase()).collect(),
        }
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new(POSITIVE_WORDS, NEGATIVE_WORDS)
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<f64, CollaboratorError> {
        let lowered = text.to_lowercase();
        let pos = self.positive.iter().filter(|w| lowered.contains(w.as_str())).count();
        let neg = self.negative.iter().filter(|w| lowered.contains(w.as_str())).count();

        if pos == 0 && neg == 0 {
            return Ok(0.0);
        }

        Ok((pos as f64 - neg as f64) / (pos + neg).max(1) as f64)
    }
}
