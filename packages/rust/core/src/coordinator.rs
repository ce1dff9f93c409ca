//! Concurrent dispatch of extractors over windows.
//!
//! Every registered extractor is invoked against every window exactly once
//! per run. Invocations are independent tasks; a semaphore bounds how many
//! throttled (LLM) invocations are outstanding at a time, while local
//! extractors run unthrottled. A failing (extractor, window) pair is
//! retried up to the configured bound and then recorded as a partial
//! failure — it never aborts sibling work.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use apiscout_chunker::Window;
use apiscout_extractors::ExtractorRegistry;
use apiscout_shared::{AnalyzeConfig, FailureRecord, RawCandidate};

// ---------------------------------------------------------------------------
// Collection types
// ---------------------------------------------------------------------------

/// A raw candidate tagged with the window and extractor that produced it.
#[derive(Debug, Clone)]
pub struct CollectedCandidate {
    /// The extractor's finding, line-numbered relative to the window.
    pub raw: RawCandidate,
    /// First line of the producing window in the original file.
    pub window_start: u32,
    /// Last line of the producing window in the original file.
    pub window_end: u32,
    /// Name of the producing extractor.
    pub extractor: &'static str,
    /// Registration index of the producing extractor.
    pub extractor_index: usize,
}

/// One (extractor, window) invocation that failed after all retries.
#[derive(Debug, Clone)]
pub struct PartialFailure {
    /// Name of the failing extractor.
    pub extractor: &'static str,
    /// First line of the window the invocation covered.
    pub start_line: u32,
    /// Last line of the window the invocation covered.
    pub end_line: u32,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Failure reason (timeout, transport, parse).
    pub reason: String,
}

impl From<PartialFailure> for FailureRecord {
    fn from(failure: PartialFailure) -> Self {
        Self {
            extractor: failure.extractor.to_string(),
            start_line: failure.start_line,
            end_line: failure.end_line,
            attempts: failure.attempts,
            reason: failure.reason,
        }
    }
}

/// Everything the coordinator gathered for one run.
#[derive(Debug, Default)]
pub struct Collected {
    /// Shape-valid candidates across all successful invocations.
    pub candidates: Vec<CollectedCandidate>,
    /// Invocations that failed after all retries.
    pub failures: Vec<PartialFailure>,
    /// Candidates dropped for failing shape validation, per extractor.
    pub malformed: BTreeMap<String, usize>,
}

/// Result of one spawned (extractor, window) task.
enum TaskOutcome {
    Completed { candidates: Vec<RawCandidate> },
    Failed(PartialFailure),
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Run every registered extractor over every window and gather the results.
///
/// Candidates are appended to the collection buffer one settled task at a
/// time; nothing reads the buffer until all tasks for the run have settled
/// or the run deadline has expired. When the deadline expires, in-flight
/// tasks are aborted and whatever was collected so far is returned.
pub async fn collect(
    registry: Arc<ExtractorRegistry>,
    windows: Arc<Vec<Window>>,
    config: &AnalyzeConfig,
) -> Collected {
    let total_pairs = registry.len() * windows.len();
    info!(
        extractors = registry.len(),
        windows = windows.len(),
        total_pairs,
        concurrency = config.concurrency,
        "dispatching extraction tasks"
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency as usize));
    let mut handles: Vec<(usize, usize, JoinHandle<TaskOutcome>)> =
        Vec::with_capacity(total_pairs);

    for extractor_index in 0..registry.len() {
        for window_index in 0..windows.len() {
            let registry = Arc::clone(&registry);
            let windows = Arc::clone(&windows);
            let semaphore = Arc::clone(&semaphore);
            let timeout = config.timeout;
            let retries = config.retries;
            let overlap = config.overlap;

            let handle = tokio::spawn(async move {
                let extractor = registry
                    .get(extractor_index)
                    .expect("extractor index in range");
                let window = &windows[window_index];

                // Surrounding context for the semantic analyzer: the shared
                // overlap region from the preceding window.
                let context = if window_index > 0 {
                    windows[window_index - 1].tail(overlap as usize)
                } else {
                    String::new()
                };

                let _permit = if extractor.throttled() {
                    Some(semaphore.acquire_owned().await.expect("semaphore closed"))
                } else {
                    None
                };

                let mut attempts = 0u32;
                loop {
                    attempts += 1;
                    let reason =
                        match tokio::time::timeout(timeout, extractor.extract(window, &context))
                            .await
                        {
                            Ok(Ok(candidates)) => {
                                return TaskOutcome::Completed { candidates };
                            }
                            Ok(Err(e)) => e.to_string(),
                            Err(_) => format!("timed out after {:?}", timeout),
                        };

                    if attempts > retries {
                        return TaskOutcome::Failed(PartialFailure {
                            extractor: extractor.name(),
                            start_line: window.start_line,
                            end_line: window.end_line,
                            attempts,
                            reason,
                        });
                    }

                    warn!(
                        extractor = extractor.name(),
                        window_start = window.start_line,
                        attempt = attempts,
                        %reason,
                        "extractor invocation failed, retrying"
                    );
                }
            });

            handles.push((extractor_index, window_index, handle));
        }
    }

    settle(registry, windows, config, handles).await
}

/// Await all spawned tasks, appending each outcome to the run's buffers.
async fn settle(
    registry: Arc<ExtractorRegistry>,
    windows: Arc<Vec<Window>>,
    config: &AnalyzeConfig,
    handles: Vec<(usize, usize, JoinHandle<TaskOutcome>)>,
) -> Collected {
    let deadline = config
        .run_timeout
        .map(|limit| tokio::time::Instant::now() + limit);

    let mut collected = Collected::default();
    let mut handles = handles.into_iter();

    while let Some((extractor_index, window_index, mut handle)) = handles.next() {
        let extractor_name = registry
            .get(extractor_index)
            .expect("extractor index in range")
            .name();
        let window = &windows[window_index];

        let joined = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        settled = collected.candidates.len(),
                        "run deadline reached, abandoning in-flight extraction work"
                    );
                    handle.abort();
                    for (_, _, rest) in handles.by_ref() {
                        rest.abort();
                    }
                    break;
                }
            },
            None => (&mut handle).await,
        };

        match joined {
            Ok(TaskOutcome::Completed { candidates }) => {
                for raw in candidates {
                    if let Err(problem) = validate_candidate(&raw) {
                        debug!(
                            extractor = extractor_name,
                            path = %raw.path,
                            problem,
                            "dropping malformed candidate"
                        );
                        *collected
                            .malformed
                            .entry(extractor_name.to_string())
                            .or_default() += 1;
                        continue;
                    }
                    collected.candidates.push(CollectedCandidate {
                        raw,
                        window_start: window.start_line,
                        window_end: window.end_line,
                        extractor: extractor_name,
                        extractor_index,
                    });
                }
            }
            Ok(TaskOutcome::Failed(failure)) => {
                warn!(
                    extractor = failure.extractor,
                    window_start = failure.start_line,
                    attempts = failure.attempts,
                    reason = %failure.reason,
                    "extractor invocation failed permanently"
                );
                collected.failures.push(failure);
            }
            Err(join_error) => {
                collected.failures.push(PartialFailure {
                    extractor: extractor_name,
                    start_line: window.start_line,
                    end_line: window.end_line,
                    attempts: 1,
                    reason: format!("task error: {join_error}"),
                });
            }
        }
    }

    info!(
        candidates = collected.candidates.len(),
        failures = collected.failures.len(),
        "extraction complete"
    );

    collected
}

/// Basic shape validation for extractor output. Violations drop the
/// candidate, never the run.
fn validate_candidate(candidate: &RawCandidate) -> std::result::Result<(), &'static str> {
    if candidate.path.trim().is_empty() {
        return Err("empty path");
    }
    if !candidate.confidence.is_finite() || !(0.0..=1.0).contains(&candidate.confidence) {
        return Err("confidence outside [0, 1]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use apiscout_extractors::{Extractor, RegexExtractor};
    use apiscout_shared::AuthInfo;

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

    fn candidate(path: &str, confidence: f64) -> RawCandidate {
        RawCandidate {
            path: path.into(),
            method: "GET".into(),
            confidence,
            usage_context: None,
            line_number: 1,
            auth: AuthInfo::default(),
        }
    }

    #[test]
    fn shape_validation_drops_bad_candidates() {
        assert!(validate_candidate(&candidate("/api/users", 0.7)).is_ok());
        assert!(validate_candidate(&candidate("", 0.7)).is_err());
        assert!(validate_candidate(&candidate("   ", 0.7)).is_err());
        assert!(validate_candidate(&candidate("/api/users", 1.3)).is_err());
        assert!(validate_candidate(&candidate("/api/users", -0.1)).is_err());
        assert!(validate_candidate(&candidate("/api/users", f64::NAN)).is_err());
    }

    #[tokio::test]
    async fn collects_candidates_with_window_provenance() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Extractor::Regex(RegexExtractor::new()));

        let windows = vec![
            Window {
                start_line: 1,
                end_line: 2,
                text: "// nothing here\n// still nothing".into(),
            },
            Window {
                start_line: 3,
                end_line: 4,
                text: "// more filler\nfetch('/api/v1/users');".into(),
            },
        ];

        let collected = collect(
            Arc::new(registry),
            Arc::new(windows),
            &test_config(),
        )
        .await;

        assert!(collected.failures.is_empty());
        assert_eq!(collected.candidates.len(), 1);
        let found = &collected.candidates[0];
        assert_eq!(found.raw.path, "/api/v1/users");
        assert_eq!(found.window_start, 3);
        assert_eq!(found.window_end, 4);
        assert_eq!(found.extractor, "regex");
        assert_eq!(found.extractor_index, 0);
        assert_eq!(found.raw.line_number, 2);
    }

    #[tokio::test]
    async fn empty_registry_settles_cleanly() {
        let registry = ExtractorRegistry::new();
        let windows = vec![Window {
            start_line: 1,
            end_line: 1,
            text: "fetch('/api/v1/users');".into(),
        }];

        let collected = collect(
            Arc::new(registry),
            Arc::new(windows),
            &test_config(),
        )
        .await;

        assert!(collected.candidates.is_empty());
        assert!(collected.failures.is_empty());
    }
}
