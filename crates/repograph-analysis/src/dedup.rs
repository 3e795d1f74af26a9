use repograph_core::{DedupStats, Finding};
use std::collections::HashMap;
use tracing::debug;

/// Detector pairs known to report the same underlying issue.
const OVERLAPPING_DETECTORS: &[(&str, &str)] = &[
    ("DeadCodeDetector", "ExternalLinterDetector"),
    ("GodClassDetector", "DegreeCentralityDetector"),
    ("FeatureEnvyDetector", "DegreeCentralityDetector"),
    ("ArchitecturalBottleneckDetector", "InfluentialCodeDetector"),
];

/// Merges findings from overlapping detectors that target the same entity
/// within a small line window. The surviving finding keeps the worst
/// severity and the union of evidence and files.
pub struct FindingDeduplicator {
    line_proximity: u32,
}

impl Default for FindingDeduplicator {
    fn default() -> Self {
        Self { line_proximity: 5 }
    }
}

impl FindingDeduplicator {
    pub fn new(line_proximity: u32) -> Self {
        Self { line_proximity }
    }

    pub fn merge_duplicates(&self, findings: Vec<Finding>) -> (Vec<Finding>, DedupStats) {
        let original_count = findings.len();
        let mut merged: Vec<Finding> = Vec::with_capacity(findings.len());
        // Index of kept findings by primary entity.
        let mut by_entity: HashMap<String, Vec<usize>> = HashMap::new();

        for finding in findings {
            let Some(entity) = finding.primary_node().map(str::to_string) else {
                merged.push(finding);
                continue;
            };

            let duplicate_of = by_entity.get(&entity).and_then(|indices| {
                indices
                    .iter()
                    .copied()
                    .find(|&i| self.overlaps(&merged[i], &finding))
            });

            match duplicate_of {
                Some(index) => {
                    let target = &mut merged[index];
                    debug!(
                        kept = %target.detector,
                        absorbed = %finding.detector,
                        entity = %entity,
                        "merging duplicate finding"
                    );
                    target.severity = target.severity.max(finding.severity);
                    target.merged_from.push(finding.id.clone());
                    for file in finding.affected_files {
                        if !target.affected_files.contains(&file) {
                            target.affected_files.push(file);
                        }
                    }
                    for node in finding.affected_nodes {
                        if !target.affected_nodes.contains(&node) {
                            target.affected_nodes.push(node);
                        }
                    }
                    // Union of evidence, namespaced by the absorbed
                    // detector so nothing is overwritten.
                    for (key, value) in finding.graph_context {
                        target
                            .graph_context
                            .entry(format!("{}.{key}", finding.detector))
                            .or_insert(value);
                    }
                }
                None => {
                    let index = merged.len();
                    merged.push(finding);
                    by_entity.entry(entity).or_default().push(index);
                }
            }
        }

        let stats = DedupStats {
            original_count,
            merged_count: merged.len(),
            duplicates_removed: original_count - merged.len(),
        };
        (merged, stats)
    }

    fn overlaps(&self, kept: &Finding, candidate: &Finding) -> bool {
        if kept.detector == candidate.detector {
            return false;
        }
        if !known_overlap(&kept.detector, &candidate.detector) {
            return false;
        }
        match (kept.line_start, candidate.line_start) {
            (Some(a), Some(b)) => a.abs_diff(b) <= self.line_proximity,
            // Entity identity alone is enough when lines are absent.
            _ => true,
        }
    }
}

fn known_overlap(a: &str, b: &str) -> bool {
    OVERLAPPING_DETECTORS
        .iter()
        .any(|(x, y)| (a == *x && b == *y) || (a == *y && b == *x))
}
