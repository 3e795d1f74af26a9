use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use repograph_graph::{harmonic_centrality, score_percentile, GraphAlgorithms};
use serde_json::json;
use uuid::Uuid;

/// Uses harmonic centrality over the call graph: functions above the 95th
/// percentile are central coordinators whose complexity matters more than
/// average.
#[derive(Debug, Default)]
pub struct CoreUtilityDetector;

impl Detector for CoreUtilityDetector {
    fn name(&self) -> &'static str {
        "CoreUtilityDetector"
    }

    fn description(&self) -> &'static str {
        "Finds central coordinator functions"
    }

    fn category(&self) -> &'static str {
        "architecture"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let algorithms = GraphAlgorithms::new(ctx.store);
        let projection_name = format!("harmonic-{}", Uuid::new_v4().simple());
        let scores = algorithms.scoped(
            &projection_name,
            NodeLabel::Function,
            RelType::Calls,
            |projection| Ok(harmonic_centrality(projection)),
        )?;

        let Some(p95) = score_percentile(&scores, 95.0) else {
            return Ok(Vec::new());
        };
        if p95 == 0.0 {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for (id, score) in &scores {
            if *score < p95 || *score == 0.0 {
                continue;
            }
            let Some(func) = ctx.store.node_by_id(*id) else {
                continue;
            };

            let complexity = func.u64_prop("complexity");
            let severity = if complexity >= 15 {
                Severity::Medium
            } else {
                Severity::Low
            };
            let name = func.name().to_string();

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Core utility: {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' coordinates a large share of the call graph (harmonic \
                 centrality {score:.3}, p95 {p95:.3})."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("harmonicCentrality".into(), json!(score));
            finding
                .graph_context
                .insert("p95Harmonic".into(), json!(p95));
            finding
                .graph_context
                .insert("complexity".into(), json!(complexity));
            finding.suggested_fix = Some(format!(
                "Keep '{name}' simple and well documented; its reach makes it a common cause \
                 of regressions."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}
