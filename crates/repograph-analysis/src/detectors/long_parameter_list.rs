use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;

/// Detects functions taking more parameters than a reader can track.
/// `self` and `cls` do not count.
#[derive(Debug, Default)]
pub struct LongParameterListDetector;

impl Detector for LongParameterListDetector {
    fn name(&self) -> &'static str {
        "LongParameterListDetector"
    }

    fn description(&self) -> &'static str {
        "Finds functions with too many parameters"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let max_params = ctx.overrides().get_u64("long-parameter-list", "max_params", 5);

        let mut findings = Vec::new();
        for func in repository_functions(ctx.store) {
            let params: Vec<String> = func
                .string_list("parameters")
                .into_iter()
                .filter(|p| p != "self" && p != "cls")
                .collect();
            let count = params.len() as u64;
            if count <= max_params {
                continue;
            }

            let severity = if count >= 10 {
                Severity::Critical
            } else if count >= 8 {
                Severity::High
            } else {
                Severity::Medium
            };
            let name = func.name().to_string();

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("{name} takes {count} params"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' takes {count} parameters ({}); callers must keep them in \
                 positional order.",
                params.join(", ")
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("paramCount".into(), json!(count));
            finding
                .graph_context
                .insert("parameters".into(), json!(params));
            finding.suggested_fix = Some(format!(
                "Group related parameters of '{name}' into a parameter object or dataclass."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AnalysisContext;
    use repograph_core::{Entity, EntityKind, GraphConfig, RepographConfig};
    use repograph_graph::GraphStore;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn function_with_params(name: &str, line: u32, params: &[&str]) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("a.py::{name}:{line}"),
            file_path: "a.py".into(),
            line_start: line,
            line_end: line + 2,
            docstring: None,
            kind: EntityKind::Function {
                parameters: params.iter().map(|p| p.to_string()).collect(),
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity: 1,
                is_async: false,
                is_method: false,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    fn detect(entities: &[Entity]) -> Vec<Finding> {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        store.batch_create_nodes(entities).unwrap();
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(&store, &config, Path::new("."));
        LongParameterListDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn five_params_stay_quiet() {
        let findings = detect(&[function_with_params(
            "ok",
            1,
            &["a", "b", "c", "d", "e"],
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn six_params_are_medium() {
        let findings = detect(&[function_with_params(
            "wide",
            1,
            &["a", "b", "c", "d", "e", "f"],
        )]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].graph_context["paramCount"], serde_json::json!(6));
    }

    #[test]
    fn eight_params_are_high_and_ten_critical() {
        let findings = detect(&[
            function_with_params("wide", 1, &["a", "b", "c", "d", "e", "f", "g", "h"]),
            function_with_params(
                "wider",
                10,
                &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"],
            ),
        ]);
        assert_eq!(findings.len(), 2);
        let high = findings.iter().find(|f| f.title.contains("8")).unwrap();
        assert_eq!(high.severity, Severity::High);
        let critical = findings.iter().find(|f| f.title.contains("11")).unwrap();
        assert_eq!(critical.severity, Severity::Critical);
    }

    #[test]
    fn self_and_cls_do_not_count() {
        // Seven raw parameters, six after dropping self.
        let findings = detect(&[function_with_params(
            "method",
            1,
            &["self", "a", "b", "c", "d", "e", "f"],
        )]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].graph_context["paramCount"], serde_json::json!(6));

        // Five meaningful params after dropping cls is at the threshold.
        let findings = detect(&[function_with_params(
            "classmethod",
            1,
            &["cls", "a", "b", "c", "d", "e"],
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn threshold_is_configurable() {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        store
            .batch_create_nodes(&[function_with_params("ok", 1, &["a", "b", "c"])])
            .unwrap();
        let mut config = RepographConfig::default();
        config
            .detectors
            .set("long-parameter-list", "max_params", serde_json::json!(2));
        let ctx = AnalysisContext::new(&store, &config, Path::new("."));
        let findings = LongParameterListDetector.detect(&ctx, &[]).unwrap();
        assert_eq!(findings.len(), 1);
    }
}
