//! Canonicalization of collected candidates into comparable form.
//!
//! Rewrites template interpolation of any bracket style to one placeholder
//! token, separates query strings from the identity, and translates
//! window-relative line numbers into original-file coordinates. Candidates
//! with no literal path text are dropped here — they carry no actionable
//! location information.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use apiscout_shared::{AuthInfo, METHOD_UNKNOWN};

use crate::coordinator::CollectedCandidate;

/// The placeholder token every template variable is rewritten to. Two
/// paths differing only in variable names normalize identically.
pub const PATH_PARAM: &str = "{param}";

// ---------------------------------------------------------------------------
// Rewrite patterns (compiled once)
// ---------------------------------------------------------------------------

/// `${expr}` template-literal interpolation.
static DOLLAR_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("dollar-brace regex"));

/// `{{var}}` double-brace placeholders. Must run before the single-brace
/// rewrite or the inner braces are matched on their own.
static DOUBLE_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").expect("double-brace regex"));

/// `{var}` single-brace placeholders.
static SINGLE_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("single-brace regex"));

/// `/:param` Express-style path parameters.
static COLON_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/:[A-Za-z_][A-Za-z0-9_]*").expect("colon-param regex"));

/// Runs of slashes collapse to one.
static DUP_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/{2,}").expect("duplicate-slash regex"));

// ---------------------------------------------------------------------------
// NormalizedCandidate
// ---------------------------------------------------------------------------

/// A candidate after path canonicalization and absolute-line translation.
/// Derived from a [`CollectedCandidate`], never mutated afterward.
#[derive(Debug, Clone)]
pub struct NormalizedCandidate {
    /// Path with all template variables rewritten to [`PATH_PARAM`].
    pub canonical_path: String,
    /// Upper-cased method, or [`METHOD_UNKNOWN`].
    pub method: String,
    /// 1-based line number in the original file, clamped into the
    /// producing window's range.
    pub absolute_line: u32,
    /// Extractor confidence, unchanged.
    pub confidence: f64,
    /// Usage evidence; carries the split-off query string when one existed.
    pub usage_context: Option<String>,
    /// Authentication details, unchanged.
    pub auth: AuthInfo,
    /// Name of the producing extractor.
    pub extractor: &'static str,
    /// Registration index of the producing extractor.
    pub extractor_index: usize,
}

/// Canonicalize one collected candidate. Returns `None` when the path
/// resolves to no literal text.
pub fn normalize(collected: CollectedCandidate) -> Option<NormalizedCandidate> {
    let (canonical_path, query) = canonical_path(&collected.raw.path)?;

    let normalized = NormalizedCandidate {
        canonical_path,
        method: normalize_method(&collected.raw.method),
        absolute_line: absolute_line(
            collected.window_start,
            collected.window_end,
            collected.raw.line_number,
        ),
        confidence: collected.raw.confidence,
        usage_context: merge_context(collected.raw.usage_context, query),
        auth: collected.raw.auth,
        extractor: collected.extractor,
        extractor_index: collected.extractor_index,
    };

    trace!(
        path = %normalized.canonical_path,
        method = %normalized.method,
        line = normalized.absolute_line,
        "normalized candidate"
    );

    Some(normalized)
}

/// Rewrite a raw path into canonical form, splitting off any query string.
/// Returns `None` for paths with no literal text.
pub fn canonical_path(raw: &str) -> Option<(String, Option<String>)> {
    let mut path = raw.trim().trim_matches(['`', '\'', '"']).to_string();
    if path.is_empty() {
        return None;
    }

    // The query string never participates in identity, but is kept as
    // usage evidence.
    let query = match path.find('?') {
        Some(idx) => {
            let query = path[idx..].to_string();
            path.truncate(idx);
            Some(query)
        }
        None => None,
    };

    let path = DOLLAR_BRACE_RE.replace_all(&path, PATH_PARAM);
    let path = DOUBLE_BRACE_RE.replace_all(&path, PATH_PARAM);
    let path = SINGLE_BRACE_RE.replace_all(&path, PATH_PARAM);
    let path = COLON_PARAM_RE.replace_all(&path, format!("/{PATH_PARAM}"));
    let mut path = collapse_slashes(&path);

    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    // Purely symbolic paths ("${base}", "/{param}/{param}") locate nothing.
    let stripped = path.replace(PATH_PARAM, "");
    let has_literal = stripped.chars().any(|c| c != '/');
    if path.is_empty() || (!has_literal && path.contains(PATH_PARAM)) {
        return None;
    }

    Some((path, query))
}

/// Collapse duplicate slashes, leaving a URL scheme separator intact.
fn collapse_slashes(path: &str) -> String {
    if let Some(idx) = path.find("://") {
        let (scheme, rest) = path.split_at(idx + 3);
        format!("{scheme}{}", DUP_SLASH_RE.replace_all(rest, "/"))
    } else {
        DUP_SLASH_RE.replace_all(path, "/").into_owned()
    }
}

/// Upper-case a method string; empty means unknown.
fn normalize_method(raw: &str) -> String {
    let method = raw.trim().to_ascii_uppercase();
    if method.is_empty() {
        METHOD_UNKNOWN.to_string()
    } else {
        method
    }
}

/// Translate a window-relative line into original-file coordinates.
/// Extractor line numbers are advisory: out-of-window values clamp to the
/// window end, and zero resolves to the window start.
fn absolute_line(window_start: u32, window_end: u32, relative: u32) -> u32 {
    (window_start + relative.saturating_sub(1)).min(window_end)
}

/// Fold a split-off query string into the usage context.
fn merge_context(context: Option<String>, query: Option<String>) -> Option<String> {
    match (context, query) {
        (Some(ctx), Some(query)) => Some(format!("{ctx} (query {query})")),
        (None, Some(query)) => Some(format!("query {query}")),
        (ctx, None) => ctx,
    }
}
