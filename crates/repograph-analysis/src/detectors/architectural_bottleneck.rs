use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use repograph_graph::{betweenness_centrality, score_statistics, GraphAlgorithms};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// Detects functions sitting on many shortest call paths: architectural
/// bottlenecks every execution flow squeezes through.
#[derive(Debug, Default)]
pub struct ArchitecturalBottleneckDetector;

impl Detector for ArchitecturalBottleneckDetector {
    fn name(&self) -> &'static str {
        "ArchitecturalBottleneckDetector"
    }

    fn description(&self) -> &'static str {
        "Finds functions on many shortest call paths"
    }

    fn category(&self) -> &'static str {
        "architecture"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let algorithms = GraphAlgorithms::new(ctx.store);
        if !algorithms.is_available() {
            return Ok(Vec::new());
        }

        let projection_name = format!("calls-{}", Uuid::new_v4().simple());
        let scores = algorithms.scoped(
            &projection_name,
            NodeLabel::Function,
            RelType::Calls,
            |projection| Ok(betweenness_centrality(projection)),
        )?;

        let Some((mean, stdev)) = score_statistics(&scores) else {
            return Ok(Vec::new());
        };
        let threshold = mean + 2.0 * stdev;

        let mut findings = Vec::new();
        for (id, score) in &scores {
            // Write the score back so later queries can rank by it.
            if *score > 0.0 {
                ctx.store
                    .set_node_property(*id, "betweennessScore", json!(score))?;
            }
            if *score <= threshold || *score == 0.0 || stdev == 0.0 {
                continue;
            }
            let Some(func) = ctx.store.node_by_id(*id) else {
                continue;
            };

            let complexity = func.u64_prop("complexity");
            let severity = if complexity >= 20 {
                Severity::High
            } else if complexity >= 10 {
                Severity::Medium
            } else {
                Severity::Low
            };
            let name = func.name().to_string();

            ctx.enricher().try_flag(
                func.qualified_name(),
                self.name(),
                0.8,
                &["high_betweenness".to_string()],
                severity,
            );

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Architectural bottleneck: {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' lies on an outsized share of call paths (betweenness \
                 {score:.2}, mean {mean:.2}); failures or slowness here propagate widely."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("betweenness".into(), json!(score));
            finding
                .graph_context
                .insert("meanBetweenness".into(), json!(mean));
            finding
                .graph_context
                .insert("complexity".into(), json!(complexity));
            finding.suggested_fix = Some(format!(
                "Split responsibilities of '{name}' or add an alternative path so it stops \
                 being a single choke point."
            ));
            findings.push(finding);
        }

        debug!(count = findings.len(), "bottleneck detection done");
        Ok(findings)
    }
}
