//! Core domain types for apiscout endpoint inventories.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Method value for candidates whose HTTP verb could not be determined.
/// Participates in identity and merge logic as its own category.
pub const METHOD_UNKNOWN: &str = "UNKNOWN";

// ---------------------------------------------------------------------------
// AuthInfo
// ---------------------------------------------------------------------------

/// Authentication details attached to a candidate or endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Whether authentication appears to be required.
    #[serde(default)]
    pub required: bool,

    /// Auth scheme (e.g., "Bearer", "apiKey", "token").
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Where the credential is applied: "header", "query", or "body".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// RawCandidate
// ---------------------------------------------------------------------------

/// An extractor-local endpoint finding, line-numbered relative to the
/// window that produced it. Window and extractor provenance are attached
/// by the coordinator, not carried here.
///
/// The serde defaults mirror the LLM response contract: only `path` is
/// mandatory per entry; everything else degrades to a conservative value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Path as found in source, possibly containing template placeholders.
    pub path: String,

    /// HTTP verb, upper or lower case, or [`METHOD_UNKNOWN`].
    #[serde(default = "default_method")]
    pub method: String,

    /// Extractor confidence in `[0.0, 1.0]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Free-text evidence of how the endpoint is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_context: Option<String>,

    /// 1-based line number relative to the producing window. `0` means
    /// "somewhere in this window" and resolves to the window start.
    #[serde(default)]
    pub line_number: u32,

    /// Authentication details, if the extractor inferred any.
    #[serde(default)]
    pub auth: AuthInfo,
}

fn default_method() -> String {
    METHOD_UNKNOWN.to_string()
}

fn default_confidence() -> f64 {
    0.8
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// One provenance entry on a reconciled endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Absolute 1-based line number in the original file.
    pub line: u32,

    /// Name of the extractor that produced this sighting.
    pub extractor: String,

    /// Free-text evidence carried over from the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_context: Option<String>,
}

/// A reconciled endpoint in the final inventory. No two endpoints in one
/// inventory share the same `(path, method)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Canonical path with template variables rewritten to `{param}`.
    pub path: String,

    /// Authoritative HTTP verb, or [`METHOD_UNKNOWN`].
    pub method: String,

    /// Maximum confidence among the merged candidates.
    pub confidence: f64,

    /// Aggregated authentication details.
    pub auth: AuthInfo,

    /// True when both an UNKNOWN and a concrete method were observed for
    /// this path.
    #[serde(default)]
    pub method_conflict: bool,

    /// Every contributing sighting, sorted by line then extractor
    /// registration order. Never empty.
    pub occurrences: Vec<Occurrence>,
}

// ---------------------------------------------------------------------------
// Run-level report
// ---------------------------------------------------------------------------

/// A recoverable, localized extraction failure: one (extractor, window)
/// invocation that was retried up to the configured bound and still failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Extractor that failed.
    pub extractor: String,

    /// First line of the window the invocation covered.
    pub start_line: u32,

    /// Last line of the window the invocation covered.
    pub end_line: u32,

    /// Number of attempts made before giving up.
    pub attempts: u32,

    /// Human-readable failure reason (timeout, transport, parse).
    pub reason: String,
}

/// Aggregate statistics for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Total endpoints in the final inventory.
    pub total_endpoints: usize,

    /// Endpoints each extractor contributed at least one sighting to,
    /// keyed by extractor name.
    #[serde(default)]
    pub findings_by_extractor: BTreeMap<String, usize>,

    /// Endpoints corroborated by more than one extractor.
    pub combined_findings: usize,

    /// Endpoints with `auth.required == true`.
    pub endpoints_with_auth: usize,

    /// Failed (extractor, window) invocations per extractor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures_by_extractor: BTreeMap<String, usize>,

    /// Candidates dropped for failing shape validation, per extractor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub malformed_candidates: BTreeMap<String, usize>,
}

/// The run-level output envelope returned by the analysis facade and
/// serialized by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Input path or label the run was performed on.
    pub source: String,

    /// SHA-256 of the analyzed source text, for provenance.
    pub content_hash: String,

    /// When the report was produced.
    pub generated_at: DateTime<Utc>,

    /// Aggregate statistics.
    pub summary: Summary,

    /// The deduplicated, confidence-scored endpoint inventory.
    pub endpoints: Vec<Endpoint>,

    /// Detail records for every failed (extractor, window) pair.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}
