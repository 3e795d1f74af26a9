use repograph_core::Finding;
use std::collections::HashSet;
use tracing::debug;

/// Detectors whose findings can be root causes, with the detector sets
/// their damage cascades into.
const CASCADES: &[(&str, &[&str])] = &[
    (
        "GodClassDetector",
        &[
            "ShotgunSurgeryDetector",
            "InappropriateIntimacyDetector",
            "FeatureEnvyDetector",
            "CircularDependencyDetector",
            "DegreeCentralityDetector",
        ],
    ),
    (
        "CircularDependencyDetector",
        &[
            "ModuleCohesionDetector",
            "ArchitecturalBottleneckDetector",
            "ShotgunSurgeryDetector",
        ],
    ),
];

/// Marks root-cause findings whose affected files overlap other findings
/// from their cascading detector set, and annotates the cascading findings
/// back to their cause.
#[derive(Debug, Default)]
pub struct RootCauseAnalyzer;

impl RootCauseAnalyzer {
    pub fn annotate(&self, findings: &mut [Finding]) {
        let mut cascading_marks: Vec<(usize, String)> = Vec::new();
        let mut root_marks: Vec<(usize, u32)> = Vec::new();

        for (root_index, root) in findings.iter().enumerate() {
            let Some((_, cascade_set)) = CASCADES
                .iter()
                .find(|(detector, _)| *detector == root.detector)
            else {
                continue;
            };
            let root_files: HashSet<&String> = root.affected_files.iter().collect();

            let mut cascading = 0u32;
            for (other_index, other) in findings.iter().enumerate() {
                if other_index == root_index || !cascade_set.contains(&other.detector.as_str()) {
                    continue;
                }
                if other.affected_files.iter().any(|f| root_files.contains(f)) {
                    cascading += 1;
                    cascading_marks.push((other_index, root.detector.clone()));
                }
            }

            if cascading > 0 {
                root_marks.push((root_index, cascading));
            }
        }

        for (index, cascading) in root_marks {
            let finding = &mut findings[index];
            finding.is_root_cause = true;
            finding.cascading_count = cascading;
            finding.impact_score = impact_score(finding, cascading);
            debug!(
                detector = %finding.detector,
                cascading,
                impact = finding.impact_score,
                "marked root cause"
            );
        }
        for (index, root_detector) in cascading_marks {
            let finding = &mut findings[index];
            finding.caused_by_root_cause = true;
            finding.root_cause_detector = Some(root_detector);
        }
    }
}

/// Compound impact: the root cause's own severity weighted against how much
/// it explains.
fn impact_score(finding: &Finding, cascading: u32) -> f64 {
    (finding.severity.rank() as f64 + 1.0) * 10.0 + cascading as f64 * 5.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use repograph_core::Severity;

    fn finding(detector: &str, files: &[&str], severity: Severity) -> Finding {
        let mut f = Finding::new(detector, severity, detector);
        f.id = format!("{detector}-{}", files.join("-"));
        f.affected_files = files.iter().map(|s| s.to_string()).collect();
        f.affected_nodes = f.affected_files.clone();
        f
    }

    #[test]
    fn god_class_becomes_root_cause_of_overlapping_findings() {
        let mut findings = vec![
            finding("GodClassDetector", &["big.py"], Severity::High),
            finding("ShotgunSurgeryDetector", &["big.py", "other.py"], Severity::Medium),
            finding("FeatureEnvyDetector", &["big.py"], Severity::Low),
            finding("LazyClassDetector", &["small.py"], Severity::Low),
        ];
        RootCauseAnalyzer.annotate(&mut findings);

        assert!(findings[0].is_root_cause);
        assert_eq!(findings[0].cascading_count, 2);
        assert!(findings[0].impact_score > 0.0);
        assert!(findings[1].caused_by_root_cause);
        assert_eq!(
            findings[1].root_cause_detector.as_deref(),
            Some("GodClassDetector")
        );
        assert!(findings[2].caused_by_root_cause);
        assert!(!findings[3].is_root_cause);
        assert!(!findings[3].caused_by_root_cause);
    }

    #[test]
    fn no_overlap_means_no_root_cause() {
        let mut findings = vec![
            finding("GodClassDetector", &["big.py"], Severity::High),
            finding("ShotgunSurgeryDetector", &["unrelated.py"], Severity::Medium),
        ];
        RootCauseAnalyzer.annotate(&mut findings);
        assert!(!findings[0].is_root_cause);
        assert!(!findings[1].caused_by_root_cause);
    }

    #[test]
    fn impact_grows_with_cascade_size() {
        let base = finding("GodClassDetector", &["a.py"], Severity::High);
        assert!(impact_score(&base, 3) > impact_score(&base, 1));
        let critical = finding("GodClassDetector", &["a.py"], Severity::Critical);
        assert!(impact_score(&critical, 1) > impact_score(&base, 1));
    }

    proptest! {
        /// Root causes imply cascading counterparts and vice versa.
        #[test]
        fn root_cause_linkage_is_consistent(
            specs in proptest::collection::vec(
                ("(GodClassDetector|ShotgunSurgeryDetector|FeatureEnvyDetector|LazyClassDetector)",
                 proptest::collection::vec("[a-c]\\.py", 1..3)),
                0..10,
            )
        ) {
            let mut findings: Vec<Finding> = specs
                .iter()
                .map(|(detector, files)| {
                    let refs: Vec<&str> = files.iter().map(String::as_str).collect();
                    finding(detector, &refs, Severity::Medium)
                })
                .collect();
            RootCauseAnalyzer.annotate(&mut findings);

            for root in findings.iter().filter(|f| f.is_root_cause) {
                let has_counterpart = findings.iter().any(|g| {
                    g.caused_by_root_cause
                        && g.affected_files.iter().any(|f| root.affected_files.contains(f))
                });
                prop_assert!(has_counterpart);
                prop_assert!(root.cascading_count > 0);
            }
            for cascading in findings.iter().filter(|f| f.caused_by_root_cause) {
                let has_root = findings.iter().any(|g| {
                    g.is_root_cause
                        && g.affected_files
                            .iter()
                            .any(|f| cascading.affected_files.contains(f))
                });
                prop_assert!(has_root);
            }
        }
    }
}
