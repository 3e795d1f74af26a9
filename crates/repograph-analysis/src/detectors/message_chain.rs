use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;

/// Detects long `.`/`()` access chains recorded by the extractor as
/// `maxChainDepth`.
#[derive(Debug, Default)]
pub struct MessageChainDetector;

impl Detector for MessageChainDetector {
    fn name(&self) -> &'static str {
        "MessageChainDetector"
    }

    fn description(&self) -> &'static str {
        "Finds deep attribute and call chains"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let min_depth = ctx.overrides().get_u64("message-chain", "min_chain_depth", 4) as u32;

        let mut findings = Vec::new();
        for func in repository_functions(ctx.store) {
            let depth = func.u64_prop("maxChainDepth") as u32;
            if depth < min_depth {
                continue;
            }

            let severity = if depth >= 7 {
                Severity::Critical
            } else if depth >= 5 {
                Severity::High
            } else {
                Severity::Medium
            };
            let name = func.name().to_string();

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Message chain of depth {depth} in {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' navigates a {depth}-link object chain; each link couples it \
                 to another structure."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("chainDepth".into(), json!(depth));
            finding.suggested_fix = Some(
                "Introduce a delegate method on the nearest object so the caller asks for what \
                 it needs directly."
                    .into(),
            );
            findings.push(finding);
        }

        Ok(findings)
    }
}
