use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use repograph_graph::{pagerank, score_statistics, GraphAlgorithms};
use serde_json::json;
use uuid::Uuid;

/// Ranks functions by incoming calls via PageRank; highly ranked functions
/// are load-bearing and deserve extra test and review attention.
#[derive(Debug, Default)]
pub struct InfluentialCodeDetector;

impl Detector for InfluentialCodeDetector {
    fn name(&self) -> &'static str {
        "InfluentialCodeDetector"
    }

    fn description(&self) -> &'static str {
        "Finds load-bearing functions via PageRank"
    }

    fn category(&self) -> &'static str {
        "architecture"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let algorithms = GraphAlgorithms::new(ctx.store);
        let projection_name = format!("pagerank-{}", Uuid::new_v4().simple());
        let ranks = algorithms.scoped(
            &projection_name,
            NodeLabel::Function,
            RelType::Calls,
            |projection| Ok(pagerank(projection, 30)),
        )?;

        let Some((mean, stdev)) = score_statistics(&ranks) else {
            return Ok(Vec::new());
        };
        if stdev == 0.0 {
            return Ok(Vec::new());
        }
        let threshold = mean + 2.0 * stdev;

        let mut findings = Vec::new();
        for (id, rank) in &ranks {
            ctx.store.set_node_property(*id, "pagerank", json!(rank))?;
            if *rank <= threshold {
                continue;
            }
            let Some(func) = ctx.store.node_by_id(*id) else {
                continue;
            };

            let complexity = func.u64_prop("complexity");
            let severity = if complexity >= 15 {
                Severity::High
            } else {
                Severity::Medium
            };
            let name = func.name().to_string();

            ctx.enricher().try_flag(
                func.qualified_name(),
                self.name(),
                0.75,
                &["high_pagerank".to_string()],
                severity,
            );

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Influential function: {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' is among the most-depended-on code (pagerank {rank:.4}, \
                 mean {mean:.4}); a defect here affects most of the system."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding.graph_context.insert("pagerank".into(), json!(rank));
            finding
                .graph_context
                .insert("meanPagerank".into(), json!(mean));
            finding
                .graph_context
                .insert("complexity".into(), json!(complexity));
            finding.suggested_fix = Some(format!(
                "Harden '{name}' with thorough tests and keep its interface small and stable."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}
