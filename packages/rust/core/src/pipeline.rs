//! End-to-end analysis facade: source text → windows → extraction →
//! normalization → reconciliation → report.
//!
//! This is the only operation the core exposes to the surrounding CLI.
//! Argument parsing and result serialization are the caller's concern.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use apiscout_chunker::{SourceText, split};
use apiscout_extractors::ExtractorRegistry;
use apiscout_shared::{AnalysisReport, AnalyzeConfig, Endpoint, Result, Summary};

use crate::coordinator::{self, PartialFailure};
use crate::normalize;
use crate::reconcile;

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for reporting analysis status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the analysis completes.
    fn done(&self, report: &AnalysisReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &AnalysisReport) {}
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Run the full analysis over one source text.
///
/// 1. Validate configuration (fatal on violation, before any extraction)
/// 2. Split into windows
/// 3. Run every extractor over every window
/// 4. Normalize candidates
/// 5. Reconcile into the final inventory
#[instrument(skip_all, fields(source = %label, lines = source.total_lines()))]
pub async fn analyze(
    label: &str,
    source: &SourceText,
    config: &AnalyzeConfig,
    registry: ExtractorRegistry,
    progress: &dyn ProgressReporter,
) -> Result<AnalysisReport> {
    config.validate()?;

    let content_hash = compute_hash(source.text());

    progress.phase("Splitting source into windows");
    let windows = split(source, config.window_size, config.overlap)?;

    // Degenerate input short-circuits to an empty inventory without
    // invoking any extractor.
    if windows.is_empty() {
        info!("empty source, returning empty inventory");
        let report = AnalysisReport {
            source: label.to_string(),
            content_hash,
            generated_at: Utc::now(),
            summary: Summary::default(),
            endpoints: Vec::new(),
            failures: Vec::new(),
        };
        progress.done(&report);
        return Ok(report);
    }

    progress.phase("Running extractors");
    let registry = Arc::new(registry);
    let windows = Arc::new(windows);
    let collected = coordinator::collect(Arc::clone(&registry), windows, config).await;

    progress.phase("Normalizing candidates");
    let normalized: Vec<_> = collected
        .candidates
        .into_iter()
        .filter_map(normalize::normalize)
        .collect();

    progress.phase("Reconciling endpoints");
    let endpoints = reconcile::reconcile(normalized);

    let summary = build_summary(&endpoints, &collected.failures, collected.malformed);
    let report = AnalysisReport {
        source: label.to_string(),
        content_hash,
        generated_at: Utc::now(),
        summary,
        endpoints,
        failures: collected.failures.into_iter().map(Into::into).collect(),
    };

    info!(
        endpoints = report.summary.total_endpoints,
        combined = report.summary.combined_findings,
        failures = report.failures.len(),
        "analysis complete"
    );
    progress.done(&report);

    Ok(report)
}

/// Compute run statistics from the final inventory and failure records.
fn build_summary(
    endpoints: &[Endpoint],
    failures: &[PartialFailure],
    malformed_candidates: BTreeMap<String, usize>,
) -> Summary {
    let mut findings_by_extractor: BTreeMap<String, usize> = BTreeMap::new();
    let mut combined_findings = 0;
    let mut endpoints_with_auth = 0;

    for endpoint in endpoints {
        let extractors: BTreeSet<&str> = endpoint
            .occurrences
            .iter()
            .map(|o| o.extractor.as_str())
            .collect();
        if extractors.len() > 1 {
            combined_findings += 1;
        }
        for name in extractors {
            *findings_by_extractor.entry(name.to_string()).or_default() += 1;
        }
        if endpoint.auth.required {
            endpoints_with_auth += 1;
        }
    }

    let mut failures_by_extractor: BTreeMap<String, usize> = BTreeMap::new();
    for failure in failures {
        *failures_by_extractor
            .entry(failure.extractor.to_string())
            .or_default() += 1;
    }

    Summary {
        total_endpoints: endpoints.len(),
        findings_by_extractor,
        combined_findings,
        endpoints_with_auth,
        failures_by_extractor,
        malformed_candidates,
    }
}

/// Compute SHA-256 hash of the analyzed source text.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use apiscout_extractors::{Extractor, LlmExtractor, RegexExtractor};
    use apiscout_shared::{METHOD_UNKNOWN, OpenRouterConfig, PromptsConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AnalyzeConfig {
        AnalyzeConfig {
            window_size: 100,
            overlap: 20,
            concurrency: 4,
            timeout: Duration::from_secs(5),
            retries: 0,
            run_timeout: None,
        }
    }

    fn regex_only_registry() -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));
        registry
    }

    fn llm_extractor(server_uri: &str) -> LlmExtractor {
        let openrouter = OpenRouterConfig {
            api_key_env: "UNUSED".into(),
            base_url: server_uri.to_string(),
            model: "test/model".into(),
        };
        LlmExtractor::with_api_key(&openrouter, &PromptsConfig::default(), "sk-test".into())
            .expect("build extractor")
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    /// 250 filler lines with an export call at line 92.
    fn export_fixture() -> SourceText {
        let mut lines: Vec<String> = (1..=250).map(|n| format!("// filler line {n}")).collect();
        lines[91] = "await fetch(`/api/v2/export/{{type}}`);".into();
        SourceText::new(lines.join("\n"))
    }

    #[tokio::test]
    async fn empty_source_short_circuits() {
        let report = analyze(
            "empty.js",
            &SourceText::new(""),
            &test_config(),
            regex_only_registry(),
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert_eq!(report.summary.total_endpoints, 0);
        assert!(report.endpoints.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_fatal_before_extraction() {
        let mut config = test_config();
        config.overlap = config.window_size;

        let err = analyze(
            "app.js",
            &SourceText::new("fetch('/api/v1/users');"),
            &config,
            regex_only_registry(),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("config error"));
    }

    #[tokio::test]
    async fn regex_only_end_to_end() {
        let js = r#"
axios.get('/api/v1/users');
axios.post('/api/v1/reports/daily');
// ------------------------------------------------------------------
// session token rotation happens on a timer, not per request
// ------------------------------------------------------------------
fetch('/oauth2/token');
"#;
        let report = analyze(
            "app.js",
            &SourceText::new(js),
            &test_config(),
            regex_only_registry(),
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert_eq!(report.summary.total_endpoints, 3);
        assert_eq!(report.summary.findings_by_extractor.get("regex"), Some(&3));
        assert_eq!(report.summary.combined_findings, 0);

        // Output ordering: path ascending, then method.
        let keys: Vec<(&str, &str)> = report
            .endpoints
            .iter()
            .map(|e| (e.path.as_str(), e.method.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("/api/v1/reports/daily", "POST"),
                ("/api/v1/users", "GET"),
                ("/oauth2/token", "UNKNOWN"),
            ]
        );
    }

    #[tokio::test]
    async fn overlapping_window_merge_scenario() {
        // 250-line file, window 100, overlap 20 → [1–100], [81–180],
        // [161–250]. The export call at absolute line 92 is visible to the
        // regex extractor in windows 1 and 2; the LLM reports it only for
        // window 2 at relative line 8 (absolute 88). All sightings merge
        // into a single endpoint.
        let server = MockServer::start().await;

        let export_doc = r#"{"endpoints": [{
            "path": "/api/v2/export/${type}",
            "method": "POST",
            "confidence": 0.9,
            "usage_context": "export trigger",
            "line_number": 8
        }]}"#;
        let empty_doc = r#"{"endpoints": []}"#;

        // Line 120 exists only in window 2, line 50 only in window 1,
        // line 200 only in window 3.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 120"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(export_doc)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(empty_doc)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(empty_doc)))
            .mount(&server)
            .await;

        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));
        registry.register(Extractor::Llm(llm_extractor(&server.uri())));

        let report = analyze(
            "bundle.js",
            &export_fixture(),
            &test_config(),
            registry,
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
        assert_eq!(report.summary.total_endpoints, 1);
        assert_eq!(report.summary.combined_findings, 1);

        let endpoint = &report.endpoints[0];
        assert_eq!(endpoint.path, "/api/v2/export/{param}");
        // Regex saw no verb near the call, the LLM reported POST: the
        // concrete method wins and the merge is flagged.
        assert_eq!(endpoint.method, "POST");
        assert!(endpoint.method_conflict);
        assert_eq!(endpoint.confidence, 0.9);

        let sightings: Vec<(u32, &str)> = endpoint
            .occurrences
            .iter()
            .map(|o| (o.line, o.extractor.as_str()))
            .collect();
        assert_eq!(sightings, vec![(88, "llm"), (92, "regex")]);
    }

    #[tokio::test]
    async fn llm_failure_on_one_window_is_isolated() {
        // Window 2 gets a provider error; windows 1 and 3 succeed. The
        // regex extractor still covers window 2, and the run reports
        // exactly one failure.
        let server = MockServer::start().await;

        let w1_doc = r#"{"endpoints": [{"path": "/api/v1/alpha", "method": "GET"}]}"#;
        let w3_doc = r#"{"endpoints": [{"path": "/api/v1/gamma", "method": "GET"}]}"#;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(w1_doc)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 120"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("filler line 200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(w3_doc)))
            .mount(&server)
            .await;

        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));
        registry.register(Extractor::Llm(llm_extractor(&server.uri())));

        let report = analyze(
            "bundle.js",
            &export_fixture(),
            &test_config(),
            registry,
            &SilentProgress,
        )
        .await
        .expect("analyze");

        let paths: Vec<&str> = report.endpoints.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/api/v1/alpha"));
        assert!(paths.contains(&"/api/v1/gamma"));
        // The regex finding on the failed window survives.
        assert!(paths.contains(&"/api/v2/export/{param}"));

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].extractor, "llm");
        assert_eq!(report.failures[0].start_line, 81);
        assert_eq!(report.failures[0].end_line, 180);
        assert_eq!(report.summary.failures_by_extractor.get("llm"), Some(&1));
    }

    #[tokio::test]
    async fn failed_invocations_are_retried_up_to_the_bound() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2) // initial attempt + one retry
            .mount(&server)
            .await;

        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Llm(llm_extractor(&server.uri())));

        let mut config = test_config();
        config.retries = 1;

        let report = analyze(
            "tiny.js",
            &SourceText::new("fetch('/api/v1/users');"),
            &config,
            registry,
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].attempts, 2);
    }

    #[tokio::test]
    async fn run_deadline_returns_best_effort_inventory() {
        // The LLM never answers inside the deadline; regex findings are
        // still returned instead of aborting the run.
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body(r#"{"endpoints": []}"#))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));
        registry.register(Extractor::Llm(llm_extractor(&server.uri())));

        let mut config = test_config();
        config.run_timeout = Some(Duration::from_millis(500));

        let report = analyze(
            "slow.js",
            &SourceText::new("fetch('/api/v1/users');"),
            &config,
            registry,
            &SilentProgress,
        )
        .await
        .expect("analyze");

        let paths: Vec<&str> = report.endpoints.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/api/v1/users"));
        assert_eq!(report.summary.findings_by_extractor.get("llm"), None);
    }

    #[tokio::test]
    async fn malformed_candidates_are_counted_not_fatal() {
        let server = MockServer::start().await;

        // Confidence outside [0, 1] and an empty path are dropped; the
        // valid entry survives.
        let doc = r#"{"endpoints": [
            {"path": "/api/v1/good", "method": "GET", "confidence": 0.9},
            {"path": "/api/v1/bad", "method": "GET", "confidence": 3.5},
            {"path": "", "method": "GET"}
        ]}"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(doc)))
            .mount(&server)
            .await;

        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Llm(llm_extractor(&server.uri())));

        let report = analyze(
            "tiny.js",
            &SourceText::new("const x = 1;"),
            &test_config(),
            registry,
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert_eq!(report.summary.total_endpoints, 1);
        assert_eq!(report.endpoints[0].path, "/api/v1/good");
        assert_eq!(report.summary.malformed_candidates.get("llm"), Some(&2));
    }

    #[tokio::test]
    async fn fetch_without_verb_context_yields_unknown_method() {
        let js = "fetch('/graphql');";
        let report = analyze(
            "app.js",
            &SourceText::new(js),
            &test_config(),
            regex_only_registry(),
            &SilentProgress,
        )
        .await
        .expect("analyze");

        assert_eq!(report.endpoints.len(), 1);
        assert_eq!(report.endpoints[0].method, METHOD_UNKNOWN);
    }
}
