//! Endpoint extractors and the caller-owned registry that dispatches them.
//!
//! Two extractors ship with apiscout: a deterministic regex scanner
//! ([`RegexExtractor`]) and a semantic analyzer backed by an
//! OpenRouter-compatible chat API ([`LlmExtractor`]). Both take a window of
//! source text and return window-relative [`RawCandidate`] findings; the
//! coordinator attaches provenance and handles retries, timeouts, and
//! concurrency.

mod llm;
mod pattern;

use apiscout_chunker::Window;
use apiscout_shared::{RawCandidate, Result};
use tracing::debug;

pub use llm::LlmExtractor;
pub use pattern::RegexExtractor;

/// Name of the regex extractor in occurrence provenance and statistics.
pub const EXTRACTOR_REGEX: &str = "regex";

/// Name of the LLM extractor in occurrence provenance and statistics.
pub const EXTRACTOR_LLM: &str = "llm";

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// A registered extractor. Dispatch is an exhaustive enum rather than a
/// trait object because the LLM variant suspends on network I/O.
pub enum Extractor {
    /// Deterministic pattern-matching extractor. Purely local, no I/O.
    Regex(RegexExtractor),
    /// Semantic extractor calling out to an LLM provider.
    Llm(LlmExtractor),
}

impl Extractor {
    /// Stable extractor name used in provenance, statistics, and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regex(_) => EXTRACTOR_REGEX,
            Self::Llm(_) => EXTRACTOR_LLM,
        }
    }

    /// True when invocations count against the coordinator's concurrency
    /// limit. Pure local computation runs unthrottled.
    pub fn throttled(&self) -> bool {
        matches!(self, Self::Llm(_))
    }

    /// Run this extractor against one window.
    ///
    /// `context` carries the tail of the preceding window for the semantic
    /// analyzer; the regex extractor ignores it. Same window, same
    /// extractor produces the same candidates up to the LLM's own
    /// non-determinism.
    pub async fn extract(&self, window: &Window, context: &str) -> Result<Vec<RawCandidate>> {
        match self {
            Self::Regex(extractor) => Ok(extractor.extract(window)),
            Self::Llm(extractor) => extractor.extract(window, context).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Caller-owned, ordered collection of extractors with lifecycle tied to
/// one analysis run.
///
/// Registration order is the deterministic tie-break everywhere downstream:
/// auth field aggregation, occurrence sorting, and failure reporting all
/// resolve ties by the order extractors were registered, never by task
/// completion order.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Extractor>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Append an extractor. Its registration index is final.
    pub fn register(&mut self, extractor: Extractor) {
        debug!(
            extractor = extractor.name(),
            index = self.extractors.len(),
            "registered extractor"
        );
        self.extractors.push(extractor);
    }

    /// Number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// True when no extractor is registered.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Extractor at a registration index.
    pub fn get(&self, index: usize) -> Option<&Extractor> {
        self.extractors.get(index)
    }

    /// Iterate extractors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Extractor> {
        self.extractors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).map(Extractor::name), Some(EXTRACTOR_REGEX));
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn regex_extractor_is_not_throttled() {
        let extractor = Extractor::Regex(RegexExtractor::new());
        assert!(!extractor.throttled());
        assert_eq!(extractor.name(), "regex");
    }
}
