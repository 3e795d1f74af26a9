use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::file_import_graph;
use crate::severity_rules::cycle_length_severity;
use repograph_core::{finding_id, CollaborationMetadata, Finding, Result};
use repograph_graph::{strongly_connected_components, GraphAlgorithms};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Detects circular dependencies in the file-level import graph via
/// strongly connected components; components of size two or more are
/// cycles.
#[derive(Debug, Default)]
pub struct CircularDependencyDetector;

impl Detector for CircularDependencyDetector {
    fn name(&self) -> &'static str {
        "CircularDependencyDetector"
    }

    fn description(&self) -> &'static str {
        "Finds circular import chains between files"
    }

    fn category(&self) -> &'static str {
        "architecture"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let algorithms = GraphAlgorithms::new(ctx.store);
        let (nodes, edges) = file_import_graph(ctx.store);
        let projection_name = format!("imports-{}", Uuid::new_v4().simple());
        let projection = algorithms.create_projection_from_edges(&projection_name, &nodes, &edges)?;

        let mut findings = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();

        for component in strongly_connected_components(&projection) {
            if component.len() < 2 {
                continue;
            }
            let cycle: Vec<String> = component
                .iter()
                .filter_map(|id| ctx.store.node_by_id(*id))
                .map(|node| node.file_path().to_string())
                .collect();
            let normalized = normalize_cycle(&cycle);
            if !seen.insert(normalized.clone()) {
                continue;
            }

            let cycle_length = normalized.len();
            let severity = cycle_length_severity(cycle_length);
            let display: Vec<&str> = normalized
                .iter()
                .take(5)
                .map(|p| p.rsplit('/').next().unwrap_or(p))
                .collect();
            let mut description = format!("Found circular import chain: {}", display.join(" -> "));
            if cycle_length > 5 {
                description.push_str(&format!(" ... ({cycle_length} files total)"));
            }

            let enricher = ctx.enricher();
            for path in &normalized {
                enricher.try_flag(
                    path,
                    self.name(),
                    0.9,
                    &["import_cycle".to_string()],
                    severity,
                );
            }

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Circular dependency involving {cycle_length} files"),
            );
            finding.id = finding_id(self.name(), &normalized[0], cycle_length as u32);
            finding.description = description;
            finding.affected_nodes = normalized.clone();
            finding.affected_files = normalized.clone();
            finding
                .graph_context
                .insert("cycleLength".into(), json!(cycle_length));
            finding
                .graph_context
                .insert("cycleFiles".into(), json!(normalized));
            finding.suggested_fix = Some(suggest_fix(cycle_length).to_string());
            finding.estimated_effort = Some(estimate_effort(cycle_length).to_string());
            finding.collaboration = Some(CollaborationMetadata {
                detector: self.name().to_string(),
                confidence: 0.9,
                evidence: vec!["import_cycle".into()],
            });
            findings.push(finding);
        }

        debug!(count = findings.len(), "circular dependency detection done");
        Ok(findings)
    }
}

/// Normalize a cycle to canonical form by rotating it to start at the
/// lexicographically minimum element. Directionality is preserved: A->B->C
/// and B->C->A collapse to one key, A->C->B stays distinct.
pub fn normalize_cycle(cycle: &[String]) -> Vec<String> {
    if cycle.is_empty() {
        return Vec::new();
    }
    let min_index = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[min_index..]
        .iter()
        .chain(cycle[..min_index].iter())
        .cloned()
        .collect()
}

fn suggest_fix(cycle_length: usize) -> &'static str {
    if cycle_length >= 5 {
        "Extract shared interfaces into a separate module, or break the coupling with dependency inversion"
    } else {
        "Merge the coupled modules, extract their common dependency, or defer the import to call time"
    }
}

fn estimate_effort(cycle_length: usize) -> &'static str {
    if cycle_length >= 10 {
        "Large (2-4 days)"
    } else if cycle_length >= 5 {
        "Medium (1-2 days)"
    } else {
        "Small (2-4 hours)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cycle(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rotations_collapse() {
        let a = normalize_cycle(&cycle(&["a.py", "b.py", "c.py"]));
        let b = normalize_cycle(&cycle(&["b.py", "c.py", "a.py"]));
        let c = normalize_cycle(&cycle(&["c.py", "a.py", "b.py"]));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, cycle(&["a.py", "b.py", "c.py"]));
    }

    #[test]
    fn reversal_stays_distinct_beyond_length_two() {
        let forward = normalize_cycle(&cycle(&["a.py", "b.py", "c.py"]));
        let reverse = normalize_cycle(&cycle(&["c.py", "b.py", "a.py"]));
        assert_ne!(forward, reverse);

        let two_forward = normalize_cycle(&cycle(&["a.py", "b.py"]));
        let two_reverse = normalize_cycle(&cycle(&["b.py", "a.py"]));
        assert_eq!(two_forward, two_reverse);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(items in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let once = normalize_cycle(&items);
            let twice = normalize_cycle(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn any_rotation_normalizes_identically(
            items in proptest::collection::vec("[a-z]{1,8}", 1..8),
            shift in 0usize..8,
        ) {
            let shift = shift % items.len();
            let rotated: Vec<String> = items[shift..]
                .iter()
                .chain(items[..shift].iter())
                .cloned()
                .collect();
            prop_assert_eq!(normalize_cycle(&items), normalize_cycle(&rotated));
        }
    }
}
