use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{class_of, repository_functions};
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use serde_json::json;

/// Detects methods that use other classes more than their own, suggesting
/// the method belongs elsewhere.
#[derive(Debug, Default)]
pub struct FeatureEnvyDetector;

impl Detector for FeatureEnvyDetector {
    fn name(&self) -> &'static str {
        "FeatureEnvyDetector"
    }

    fn description(&self) -> &'static str {
        "Finds methods envious of other classes' data"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let threshold_ratio = ctx.overrides().get_f64("feature-envy", "threshold_ratio", 2.0);
        let min_external = ctx.overrides().get_u64("feature-envy", "min_external_uses", 3);

        let mut findings = Vec::new();

        for method in repository_functions(ctx.store) {
            if !method.bool_prop("isMethod") {
                continue;
            }
            let Some(owner) = class_of(ctx.store, &method) else {
                continue;
            };

            let mut internal = 0u64;
            let mut external = 0u64;
            for rel_type in [RelType::Uses, RelType::Calls] {
                for (_, target) in ctx.store.outgoing(method.id, rel_type) {
                    if target.label == NodeLabel::File {
                        continue;
                    }
                    // A target inside the owner class (its attributes or
                    // methods) counts as internal use.
                    let target_parent = ctx
                        .store
                        .incoming(target.id, RelType::Contains)
                        .into_iter()
                        .map(|(_, parent)| parent.id)
                        .find(|id| *id == owner.id);
                    let belongs_to_owner = target_parent.is_some()
                        || target
                            .qualified_name()
                            .starts_with(&format!("{}.", owner.qualified_name()));
                    if belongs_to_owner || target.id == owner.id {
                        internal += 1;
                    } else {
                        external += 1;
                    }
                }
            }

            if external < min_external {
                continue;
            }
            if internal > 0 && (external as f64) <= internal as f64 * threshold_ratio {
                continue;
            }

            let ratio = if internal > 0 {
                external as f64 / internal as f64
            } else {
                f64::INFINITY
            };
            let severity = if ratio > 5.0 || internal == 0 {
                Severity::High
            } else if ratio > 3.0 {
                Severity::Medium
            } else {
                Severity::Low
            };

            let name = method.name().to_string();
            ctx.enricher().try_flag(
                method.qualified_name(),
                self.name(),
                0.7,
                &["external_over_internal_uses".to_string()],
                severity,
            );

            let mut finding =
                Finding::new(self.name(), severity, format!("Feature envy: {name}"));
            finding.id = finding_id(self.name(), method.file_path(), method.line_start());
            finding.description = format!(
                "Method '{name}' in class '{}' uses external classes {external} times compared \
                 to {internal} internal uses.",
                owner.name()
            );
            finding.affected_nodes = vec![
                method.qualified_name().to_string(),
                owner.qualified_name().to_string(),
            ];
            finding.affected_files = vec![method.file_path().to_string()];
            finding.line_start = Some(method.line_start());
            finding.line_end = Some(method.line_end());
            finding
                .graph_context
                .insert("internalUses".into(), json!(internal));
            finding
                .graph_context
                .insert("externalUses".into(), json!(external));
            if ratio.is_finite() {
                finding.graph_context.insert("ratio".into(), json!(ratio));
            }
            finding
                .graph_context
                .insert("ownerClass".into(), json!(owner.qualified_name()));
            finding.suggested_fix = Some(format!(
                "Move '{name}' closer to the data it uses, or pass the needed values in \
                 explicitly."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}
