//! Grouping, conflict resolution, and merge of normalized candidates.
//!
//! Candidates sharing an identity key `(canonical_path, method)` merge into
//! one endpoint. Method is part of identity — the same path frequently
//! serves multiple verbs — with one exception resolved in a second pass: an
//! UNKNOWN-method sighting folds into a same-path concrete-method group
//! when the attribution is unambiguous, and the merge is flagged as a
//! method conflict. The final ordering is fixed and independent of
//! extractor scheduling, so repeated runs over the same candidates are
//! byte-identical.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use apiscout_shared::{AuthInfo, Endpoint, METHOD_UNKNOWN, Occurrence};

use crate::normalize::NormalizedCandidate;

/// Merge normalized candidates into the final endpoint inventory.
pub fn reconcile(candidates: Vec<NormalizedCandidate>) -> Vec<Endpoint> {
    let mut groups: BTreeMap<(String, String), Vec<NormalizedCandidate>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry((
                candidate.canonical_path.clone(),
                candidate.method.clone(),
            ))
            .or_default()
            .push(candidate);
    }

    // Second pass: resolve UNKNOWN-method groups against same-path
    // concrete groups.
    let mut conflicts: BTreeSet<(String, String)> = BTreeSet::new();
    let unknown_paths: Vec<String> = groups
        .keys()
        .filter(|(_, method)| method.as_str() == METHOD_UNKNOWN)
        .map(|(path, _)| path.clone())
        .collect();

    for path in unknown_paths {
        let concrete: Vec<String> = groups
            .keys()
            .filter(|(p, method)| *p == path && method.as_str() != METHOD_UNKNOWN)
            .map(|(_, method)| method.clone())
            .collect();

        match concrete.as_slice() {
            [] => {}
            [method] => {
                // Exactly one concrete verb for this path: the UNKNOWN
                // sightings are the same endpoint seen less precisely. The
                // concrete method is authoritative.
                let folded = groups
                    .remove(&(path.clone(), METHOD_UNKNOWN.to_string()))
                    .expect("unknown group exists");
                debug!(%path, method = %method, folded = folded.len(), "folding unknown-method sightings");
                groups
                    .get_mut(&(path.clone(), method.clone()))
                    .expect("concrete group exists")
                    .extend(folded);
                conflicts.insert((path, method.clone()));
            }
            _ => {
                // Multiple concrete verbs: the UNKNOWN sighting cannot be
                // attributed to one of them and stays its own endpoint,
                // flagged as unresolved.
                conflicts.insert((path, METHOD_UNKNOWN.to_string()));
            }
        }
    }

    let mut endpoints: Vec<Endpoint> = groups
        .into_iter()
        .map(|((path, method), group)| merge_group(path, method, group, &conflicts))
        .collect();

    // Fixed output order, independent of extractor scheduling: path
    // ascending, then method with UNKNOWN last.
    endpoints.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| (a.method == METHOD_UNKNOWN).cmp(&(b.method == METHOD_UNKNOWN)))
            .then_with(|| a.method.cmp(&b.method))
    });

    endpoints
}

/// Merge one identity group into an endpoint record.
fn merge_group(
    path: String,
    method: String,
    mut group: Vec<NormalizedCandidate>,
    conflicts: &BTreeSet<(String, String)>,
) -> Endpoint {
    // A single confident detection is never down-weighted by weaker
    // corroboration of the same endpoint.
    let confidence = group.iter().map(|c| c.confidence).fold(0.0_f64, f64::max);

    // Auth fields resolve in extractor-registration order, then line order.
    let mut by_registration: Vec<&NormalizedCandidate> = group.iter().collect();
    by_registration.sort_by_key(|c| (c.extractor_index, c.absolute_line));
    let auth = AuthInfo {
        required: by_registration.iter().any(|c| c.auth.required),
        auth_type: by_registration
            .iter()
            .find_map(|c| c.auth.auth_type.clone()),
        location: by_registration.iter().find_map(|c| c.auth.location.clone()),
    };

    // Occurrences sort by line, then registration order. Identical
    // sightings produced twice through overlapping windows collapse.
    group.sort_by(|a, b| {
        a.absolute_line
            .cmp(&b.absolute_line)
            .then_with(|| a.extractor_index.cmp(&b.extractor_index))
    });
    let mut occurrences: Vec<Occurrence> = group
        .into_iter()
        .map(|c| Occurrence {
            line: c.absolute_line,
            extractor: c.extractor.to_string(),
            usage_context: c.usage_context,
        })
        .collect();
    occurrences.dedup();

    let method_conflict = conflicts.contains(&(path.clone(), method.clone()));

    Endpoint {
        path,
        method,
        confidence,
        auth,
        method_conflict,
        occurrences,
    }
}
