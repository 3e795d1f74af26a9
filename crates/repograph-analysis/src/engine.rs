use crate::dedup::FindingDeduplicator;
use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{file_import_graph, methods_of, repository_classes, repository_files};
use crate::detectors::default_detectors;
use crate::root_cause::RootCauseAnalyzer;
use crate::scoring::{
    overall_score, score_architecture, score_quality, score_structure, score_to_grade,
};
use chrono::Utc;
use repograph_core::{
    CancelToken, Finding, FindingsSummary, HealthReport, MetricsBreakdown, RelType,
    RepographConfig, RepographError, Result,
};
use repograph_graph::{louvain_communities, GraphAlgorithms, GraphEnricher, GraphStore};
use serde_json::Value;
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates detection, scoring and grading. Detector order is fixed;
/// collaborating detectors receive the findings accumulated so far.
pub struct AnalysisEngine<'a> {
    store: &'a GraphStore,
    config: RepographConfig,
    repo_path: std::path::PathBuf,
    detectors: Vec<Box<dyn Detector>>,
    deduplicator: FindingDeduplicator,
    root_cause: RootCauseAnalyzer,
    cancel: CancelToken,
}

/// Removes transient detector metadata on every exit path, unless the
/// operator asked to retain it for hotspot queries.
struct MetadataCleanup<'a> {
    store: &'a GraphStore,
    keep: bool,
}

impl Drop for MetadataCleanup<'_> {
    fn drop(&mut self) {
        if self.keep {
            info!("keeping detector metadata in graph for hotspot queries");
            return;
        }
        match GraphEnricher::new(self.store).cleanup() {
            Ok(removed) if removed > 0 => {
                info!(removed, "cleaned up detector metadata");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to clean up detector metadata"),
        }
    }
}

impl<'a> AnalysisEngine<'a> {
    pub fn new(store: &'a GraphStore, config: RepographConfig, repo_path: &Path) -> Self {
        Self {
            store,
            config,
            repo_path: repo_path.to_path_buf(),
            detectors: default_detectors(),
            deduplicator: FindingDeduplicator::default(),
            root_cause: RootCauseAnalyzer,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the detector roster (used by tests and embedders).
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the complete analysis and produce the health report.
    pub fn analyze(&self) -> Result<HealthReport> {
        info!("starting codebase analysis");
        let _cleanup = MetadataCleanup {
            store: self.store,
            keep: self.config.analysis.keep_metadata,
        };

        let findings = self.run_detectors()?;

        let (mut findings, dedup_stats) = self.deduplicator.merge_duplicates(findings);
        if dedup_stats.duplicates_removed > 0 {
            info!(
                removed = dedup_stats.duplicates_removed,
                "deduplicated findings"
            );
        }

        self.root_cause.annotate(&mut findings);

        let metrics = self.calculate_metrics(&findings);
        let structure_score = score_structure(&metrics);
        let quality_score = score_quality(&metrics);
        let architecture_score = score_architecture(&metrics);
        let overall = overall_score(structure_score, quality_score, architecture_score);
        let grade = score_to_grade(overall);

        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.detector.cmp(&b.detector))
                .then_with(|| a.id.cmp(&b.id))
        });
        let findings_summary = FindingsSummary::from_findings(&findings);

        info!(
            grade = grade.as_str(),
            overall_score = overall,
            total_findings = findings.len(),
            "analysis complete"
        );

        Ok(HealthReport {
            grade,
            overall_score: overall,
            structure_score,
            quality_score,
            architecture_score,
            metrics,
            findings_summary,
            findings,
            analyzed_at: Utc::now(),
            dedup_stats: Some(dedup_stats),
        })
    }

    fn run_detectors(&self) -> Result<Vec<Finding>> {
        let ctx = AnalysisContext::new(self.store, &self.config, &self.repo_path);
        let mut all_findings: Vec<Finding> = Vec::new();
        let mut degraded = false;

        for detector in &self.detectors {
            if self.cancel.is_cancelled() {
                // The cleanup guard drops metadata before this propagates.
                return Err(RepographError::Cancelled);
            }

            let name = detector.name();
            info!(detector = name, "running detector");
            let previous: &[Finding] = if detector.collaborates() {
                &all_findings
            } else {
                &[]
            };

            match detector.detect(&ctx, previous) {
                Ok(findings) => {
                    info!(detector = name, count = findings.len(), "detector complete");
                    all_findings.extend(findings);
                }
                Err(e) => {
                    degraded = true;
                    error!(detector = name, error = %e, "detector failed, continuing");
                }
            }
        }

        if degraded {
            warn!(degraded = true, "analysis completed with failed detectors");
        }
        Ok(all_findings)
    }

    fn calculate_metrics(&self, findings: &[Finding]) -> MetricsBreakdown {
        let stats = self.store.stats();
        let count_by = |detector: &str| findings.iter().filter(|f| f.detector == detector).count();

        let circular_dependencies = count_by("CircularDependencyDetector");
        let god_class_count = count_by("GodClassDetector");
        let dead_code_items = count_by("DeadCodeDetector");
        let bottleneck_count = count_by("ArchitecturalBottleneckDetector");

        let total_nodes = stats.classes + stats.functions;
        let dead_code_percentage = if total_nodes > 0 {
            dead_code_items as f64 / total_nodes as f64
        } else {
            0.0
        };

        let duplication_findings = findings
            .iter()
            .filter(|f| {
                f.detector == "ExternalLinterDetector"
                    && f.graph_context
                        .get("code")
                        .and_then(Value::as_str)
                        .map(|c| c.to_lowercase().contains("dup"))
                        .unwrap_or(false)
            })
            .count();
        let duplication_percentage = if stats.files > 0 {
            (duplication_findings as f64 / stats.files as f64).min(1.0)
        } else {
            0.0
        };

        let total_loc: usize = repository_files(self.store)
            .iter()
            .map(|f| f.u64_prop("loc") as usize)
            .sum();

        let classes = repository_classes(self.store);
        let abstract_count = classes.iter().filter(|c| c.bool_prop("isAbstract")).count();
        let abstraction_ratio = if classes.is_empty() {
            0.5
        } else {
            abstract_count as f64 / classes.len() as f64
        };

        MetricsBreakdown {
            total_files: stats.files,
            total_classes: stats.classes,
            total_functions: stats.functions,
            total_loc,
            modularity: self.calculate_modularity(),
            avg_coupling: self.calculate_avg_coupling(),
            circular_dependencies,
            bottleneck_count,
            dead_code_percentage,
            duplication_percentage,
            god_class_count,
            layer_violations: self.count_layer_violations(),
            boundary_violations: self.count_boundary_violations(),
            abstraction_ratio,
        }
    }

    /// Louvain over the file import graph; a graph without imports falls
    /// back to the neutral 0.65 a well-structured small repo would score.
    fn calculate_modularity(&self) -> f64 {
        let algorithms = GraphAlgorithms::new(self.store);
        let (nodes, edges) = file_import_graph(self.store);
        let projection_name = format!("modularity-{}", Uuid::new_v4().simple());
        let result = algorithms
            .create_projection_from_edges(&projection_name, &nodes, &edges)
            .ok()
            .and_then(|projection| louvain_communities(&projection));

        match result {
            Some(communities) => communities.modularity.clamp(0.0, 1.0),
            None => 0.65,
        }
    }

    /// Average outgoing call count over classes that make calls at all,
    /// mirroring the reference coupling query.
    fn calculate_avg_coupling(&self) -> f64 {
        let mut per_class = Vec::new();
        for class in repository_classes(self.store) {
            let calls: usize = methods_of(self.store, &class)
                .iter()
                .map(|m| self.store.outgoing(m.id, RelType::Calls).len())
                .sum();
            if calls > 0 {
                per_class.push(calls as f64);
            }
        }
        if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().sum::<f64>() / per_class.len() as f64
        }
    }

    /// Imports from a lower layer back into a higher one, per the ordered
    /// `analysis.layers` prefix list. No configuration, no violations.
    fn count_layer_violations(&self) -> usize {
        let layers = &self.config.analysis.layers;
        if layers.is_empty() {
            return 0;
        }
        let layer_of = |path: &str| layers.iter().position(|prefix| path.starts_with(prefix));

        let (_, edges) = file_import_graph(self.store);
        edges
            .iter()
            .filter(|(source, target)| {
                let source_layer = self
                    .store
                    .node_by_id(*source)
                    .and_then(|n| layer_of(n.file_path()));
                let target_layer = self
                    .store
                    .node_by_id(*target)
                    .and_then(|n| layer_of(n.file_path()));
                matches!((source_layer, target_layer), (Some(s), Some(t)) if s > t)
            })
            .count()
    }

    /// Private-name imports from other modules, and relative imports that
    /// climb past the package root.
    fn count_boundary_violations(&self) -> usize {
        self.store
            .relationships(RelType::Imports)
            .iter()
            .filter(|rel| {
                let private_reach = rel
                    .props
                    .get("importedName")
                    .and_then(Value::as_str)
                    .map(|name| name.starts_with('_') && !name.starts_with("__"))
                    .unwrap_or(false)
                    && rel
                        .props
                        .get("fromModule")
                        .and_then(Value::as_str)
                        .map(|m| !m.is_empty())
                        .unwrap_or(false);
                let deep_relative = rel
                    .props
                    .get("relativeLevel")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    >= 2;
                private_reach || deep_relative
            })
            .count()
    }
}
