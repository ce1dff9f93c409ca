//! Deterministic regex-based endpoint extraction.
//!
//! Scans a window's text for API call sites (axios, fetch, jQuery,
//! `url:`/`endpoint:`/`path:` properties, WebSocket constructors, bare
//! `/api/...` literals), gates matches through an endpoint-likeness filter,
//! and infers method and auth requirements from the surrounding characters.
//! No network I/O; same window always produces the same candidates.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use apiscout_chunker::Window;
use apiscout_shared::{AuthInfo, METHOD_UNKNOWN, RawCandidate};

/// Confidence assigned to every regex finding; the semantic analyzer
/// scores its own.
const REGEX_CONFIDENCE: f64 = 0.7;

/// Characters of surrounding text inspected for method and auth hints.
const CONTEXT_RADIUS: usize = 100;

// ---------------------------------------------------------------------------
// Pattern tables (compiled once)
// ---------------------------------------------------------------------------

/// Call-site patterns. Capture group 1 is the path literal.
static ENDPOINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Axios
        r#"(?i)axios\s*\.\s*(?:get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#,
        r#"(?i)axios\s*\(\s*\{\s*url:\s*['"`]([^'"`]+)['"`]"#,
        // Fetch
        r#"(?i)fetch\s*\(\s*['"`]([^'"`]+)['"`]"#,
        // jQuery
        r#"(?i)\$\.ajax\s*\(\s*\{\s*url:\s*['"`]([^'"`]+)['"`]"#,
        r#"(?i)\$\.(?:get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#,
        // WebSocket
        r#"(?i)new\s+WebSocket\s*\(\s*['"`]([^'"`]+)['"`]"#,
        // Common property names
        r#"(?i)\burl\s*:\s*['"`]([^'"`]+)['"`]"#,
        r#"(?i)\bendpoint\s*:\s*['"`]([^'"`]+)['"`]"#,
        r#"(?i)\bpath\s*:\s*['"`]([^'"`]+)['"`]"#,
        // Bare API path literals
        r#"['"`](/api/[^'"`]+)['"`]"#,
        r#"['"`](/v\d+/[^'"`]+)['"`]"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("endpoint pattern"))
    .collect()
});

/// Endpoint-likeness gate: a path must match at least one of these to be
/// reported. Template syntax is still raw at this stage, so the
/// parameterized-route patterns accept `{x}`, `{{x}}`, `${x}`, and `:x`.
static API_HINTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/api/",
        r"(?i)/v\d+/",
        r"(?i)/graphql",
        r"(?i)/rest/",
        r"(?i)/auth/",
        r"(?i)/oauth2?/",
        r"(?i)/rpc/",
        r"(?i)/webhook",
        r"(?i)/data",
        r"(?i)/service",
        r"(?i)/events?/",
        r"(?i)/users?/",
        // Parameterized routes, any placeholder style
        r"(?i)/\w+/\$?\{+\w+\}+",
        r"(?i)/\{\{\w+\}\}",
        r"(?i)/:\w+",
        r"(?i)/ml[-/]",
        r"(?i)/sync",
        r"(?i)/reports?/",
        r"(?i)/tasks/",
        r"(?i)/export/",
        r"(?i)/version-info/",
        r"(?i)/features/",
        r"(?i)/preferences",
        r"(?i)/profile$",
        r"(?i)/activity/",
        r"(?i)/mfa/",
        r"(?i)/challenge$",
        r"(?i)/predict$",
        r"(?i)/token$",
        r"(?i)/refresh$",
        r"(?i)/revoke$",
        r"(?i)/test$",
        // Streaming/WebSocket surfaces
        r"(?i)/ws$",
        r"(?i)/ws/",
        r"(?i)/event-stream",
        r"(?i)/socket",
        r"(?i)/stream",
        // Common single-segment endpoints
        r"(?i)^/login$",
        r"(?i)^/logout$",
        r"(?i)^/register$",
        r"(?i)^/oauth$",
        r"(?i)^/verify$",
        r"(?i)^/upload$",
        r"(?i)^/search$",
        r"(?i)^/download$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("api hint pattern"))
    .collect()
});

/// Static assets are never endpoints, whatever the path shape suggests.
static STATIC_ASSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(js|css|html|png|jpg|jpeg|gif|svg|pdf|txt|xml)$").expect("asset regex")
});

/// Auth signal patterns with the scheme and credential location they imply.
static AUTH_PATTERNS: LazyLock<Vec<(Regex, &'static str, &'static str)>> = LazyLock::new(|| {
    [
        (r#"(?i)Authorization\s*:\s*['"`]?Bearer"#, "Bearer", "header"),
        (r"(?i)X-API-Key", "apiKey", "header"),
        (r"(?i)api[_-]?key", "apiKey", "query"),
        (r"(?i)token\s*:", "token", "body"),
    ]
    .iter()
    .map(|(p, t, l)| (Regex::new(p).expect("auth pattern"), *t, *l))
    .collect()
});

/// Fallback auth keyword scan when no specific scheme matched.
static GENERIC_AUTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)auth|token|jwt|apikey").expect("generic auth regex"));

/// HTTP verb mentioned near the call site.
static METHOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(get|post|put|delete|patch)\b").expect("method regex"));

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Find API endpoints in a window using regex pattern matching.
#[derive(Debug, Default)]
pub struct RegexExtractor;

impl RegexExtractor {
    /// Create the extractor. Pattern tables are process-wide statics.
    pub fn new() -> Self {
        Self
    }

    /// Scan one window. Line numbers in the returned candidates are
    /// relative to the window.
    pub fn extract(&self, window: &Window) -> Vec<RawCandidate> {
        let text = window.text.as_str();
        let mut candidates = Vec::new();
        let mut seen_paths: HashSet<String> = HashSet::new();

        for pattern in ENDPOINT_PATTERNS.iter() {
            for captures in pattern.captures_iter(text) {
                let Some(path_match) = captures.get(1) else {
                    continue;
                };
                let path = path_match.as_str().trim().to_string();

                // Property patterns match arbitrary strings; require
                // something path-like before gating.
                if !(path.contains('/') || path.to_ascii_lowercase().contains("api")) {
                    continue;
                }

                if !is_api_endpoint(&path) || seen_paths.contains(&path) {
                    continue;
                }
                seen_paths.insert(path.clone());

                let position = path_match.start();
                let context = context_slice(text, position, CONTEXT_RADIUS);
                let line = line_at(text, position);

                // The call's own line is the most reliable verb signal;
                // the wider context is a fallback.
                let method = METHOD_RE
                    .captures(line)
                    .or_else(|| METHOD_RE.captures(context))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_ascii_uppercase())
                    .unwrap_or_else(|| METHOD_UNKNOWN.to_string());

                let line_number = line_of(text, position);

                trace!(%path, %method, line_number, "regex candidate");

                candidates.push(RawCandidate {
                    path,
                    method,
                    confidence: REGEX_CONFIDENCE,
                    usage_context: Some(line.trim().to_string()),
                    line_number,
                    auth: detect_auth(context),
                });
            }
        }

        candidates
    }
}

/// Whether a raw path string is likely an API endpoint.
fn is_api_endpoint(path: &str) -> bool {
    let path = path.trim_matches(['`', '\'', '"']);
    if STATIC_ASSET_RE.is_match(path) {
        return false;
    }
    API_HINTS.iter().any(|p| p.is_match(path))
}

/// Detect authentication requirements from surrounding code.
fn detect_auth(context: &str) -> AuthInfo {
    for (pattern, auth_type, location) in AUTH_PATTERNS.iter() {
        if pattern.is_match(context) {
            return AuthInfo {
                required: true,
                auth_type: Some((*auth_type).to_string()),
                location: Some((*location).to_string()),
            };
        }
    }

    if GENERIC_AUTH_RE.is_match(context) {
        return AuthInfo {
            required: true,
            auth_type: None,
            location: None,
        };
    }

    AuthInfo::default()
}

/// A slice of up to `radius` characters on each side of `position`,
/// snapped outward to char boundaries.
fn context_slice(text: &str, position: usize, radius: usize) -> &str {
    let mut start = position.saturating_sub(radius);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + radius).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

/// 1-based line number of a byte position within the window text.
fn line_of(text: &str, position: usize) -> u32 {
    text[..position].bytes().filter(|&b| b == b'\n').count() as u32 + 1
}

/// The full source line containing a byte position.
fn line_at(text: &str, position: usize) -> &str {
    let start = text[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[position..]
        .find('\n')
        .map(|i| position + i)
        .unwrap_or(text.len());
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(text: &str) -> Window {
        Window {
            start_line: 1,
            end_line: text.lines().count().max(1) as u32,
            text: text.to_string(),
        }
    }

    #[test]
    fn finds_axios_call_with_method() {
        let js = r#"
async function loadUsers() {
  const res = await axios.get('/api/v1/users');
  return res.data;
}
"#;
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].path, "/api/v1/users");
        assert_eq!(candidates[0].method, "GET");
        assert_eq!(candidates[0].line_number, 3);
        assert_eq!(candidates[0].confidence, 0.7);
    }

    #[test]
    fn finds_fetch_with_template_literal_path() {
        let js = "const r = await fetch(`/api/v2/export/${type}`, { method: 'POST' });";
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].path, "/api/v2/export/${type}");
        assert_eq!(candidates[0].method, "POST");
    }

    #[test]
    fn finds_websocket_endpoint() {
        let js = "const socket = new WebSocket('/ws/events');";
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].path, "/ws/events");
    }

    #[test]
    fn detects_bearer_auth_in_context() {
        let js = r#"
fetch('/api/v1/profile', {
  headers: { Authorization: 'Bearer ' + token }
});
"#;
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        let auth = &candidates[0].auth;
        assert!(auth.required);
        assert_eq!(auth.auth_type.as_deref(), Some("Bearer"));
        assert_eq!(auth.location.as_deref(), Some("header"));
    }

    #[test]
    fn generic_auth_keyword_sets_required_only() {
        let js = "jwt.refresh(); fetch('/api/v1/reports/daily');";
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].auth.required);
        assert!(candidates[0].auth.auth_type.is_none());
    }

    #[test]
    fn rejects_static_assets_and_plain_pages() {
        let js = r#"
fetch('/assets/logo.svg');
fetch('/static/app.js');
const nav = { url: '/about' };
"#;
        let candidates = RegexExtractor::new().extract(&window(js));
        assert!(candidates.is_empty());
    }

    #[test]
    fn deduplicates_repeated_paths_within_a_window() {
        let js = r#"
axios.get('/api/v1/users');
axios.get('/api/v1/users');
fetch('/api/v1/users');
"#;
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn line_numbers_are_window_relative() {
        let js = "// header\n// comment\n\nconst url = fetch('/api/v1/tasks/next');";
        let candidates = RegexExtractor::new().extract(&window(js));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].line_number, 4);
    }

    #[test]
    fn gate_accepts_parameterized_and_ws_paths() {
        assert!(is_api_endpoint("/users/{userId}"));
        assert!(is_api_endpoint("/users/${userId}/profile"));
        assert!(is_api_endpoint("/users/{{userId}}/preferences"));
        assert!(is_api_endpoint("/orders/:orderId"));
        assert!(is_api_endpoint("/ws"));
        assert!(is_api_endpoint("/event-stream"));
        assert!(is_api_endpoint("/login"));
    }

    #[test]
    fn gate_rejects_non_api_paths() {
        assert!(!is_api_endpoint("/about"));
        assert!(!is_api_endpoint("/contact"));
        assert!(!is_api_endpoint("/images/logo.svg"));
        assert!(!is_api_endpoint("/downloads/handbook.pdf"));
    }
}
