use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{repository_files, repository_functions};
use repograph_core::{finding_id, Finding, Result, Severity};
use repograph_graph::NodeRecord;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Detects functions missing type hints and files with low overall
/// annotation coverage.
#[derive(Debug, Default)]
pub struct TypeHintCoverageDetector;

fn countable_params(func: &NodeRecord) -> Vec<String> {
    func.string_list("parameters")
        .into_iter()
        .filter(|p| p != "self" && p != "cls" && !p.starts_with('*'))
        .collect()
}

fn typed_param_count(func: &NodeRecord) -> usize {
    func.props
        .get("parameterTypes")
        .and_then(Value::as_object)
        .map(|m| m.len())
        .unwrap_or(0)
}

impl Detector for TypeHintCoverageDetector {
    fn name(&self) -> &'static str {
        "TypeHintCoverageDetector"
    }

    fn description(&self) -> &'static str {
        "Finds untyped functions and low-coverage files"
    }

    fn category(&self) -> &'static str {
        "typing"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let file_threshold =
            ctx.overrides().get_f64("type-hint-coverage", "file_coverage_pct", 25.0);

        let mut findings = Vec::new();
        let mut per_file: HashMap<String, (usize, usize)> = HashMap::new();

        for func in repository_functions(ctx.store) {
            let name = func.name().to_string();
            if name.starts_with("test_") || func.file_path().is_empty() {
                continue;
            }

            let params = countable_params(&func);
            let typed = typed_param_count(&func);
            let has_return = func.props.get("returnType").is_some() || name == "__init__";
            let fully_typed = typed >= params.len() && has_return;

            let entry = per_file.entry(func.file_path().to_string()).or_insert((0, 0));
            entry.1 += 1;
            if fully_typed {
                entry.0 += 1;
            }

            if fully_typed || (params.is_empty() && has_return) {
                continue;
            }

            let complexity = func.u64_prop("complexity");
            let is_private = name.starts_with('_');
            let severity = if complexity >= 10 {
                Severity::High
            } else if !is_private {
                Severity::Medium
            } else {
                Severity::Low
            };

            let missing: Vec<String> = {
                let typed_names: Vec<String> = func
                    .props
                    .get("parameterTypes")
                    .and_then(Value::as_object)
                    .map(|m| m.keys().cloned().collect())
                    .unwrap_or_default();
                params
                    .iter()
                    .filter(|p| !typed_names.contains(p))
                    .cloned()
                    .collect()
            };

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Missing type hints: {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Function '{name}' lacks annotations for {} and {}.",
                if missing.is_empty() {
                    "no parameters".to_string()
                } else {
                    format!("parameters ({})", missing.join(", "))
                },
                if func.props.get("returnType").is_some() {
                    "nothing else"
                } else {
                    "its return type"
                }
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("coverageType".into(), json!("function"));
            finding
                .graph_context
                .insert("missingParams".into(), json!(missing));
            finding.suggested_fix =
                Some(format!("Annotate '{name}' so tooling can check its callers."));
            findings.push(finding);
        }

        for file in repository_files(ctx.store) {
            let Some(&(typed, total)) = per_file.get(file.file_path()) else {
                continue;
            };
            if total < 3 {
                continue;
            }
            let coverage_pct = typed as f64 / total as f64 * 100.0;
            if coverage_pct >= file_threshold {
                continue;
            }

            let path = file.file_path().to_string();
            let mut finding = Finding::new(
                self.name(),
                Severity::High,
                format!("Low type hint coverage in {path}"),
            );
            finding.id = finding_id(self.name(), &path, 0);
            finding.description = format!(
                "Only {typed} of {total} functions in '{path}' are fully annotated \
                 ({coverage_pct:.0}%)."
            );
            finding.affected_nodes = vec![path.clone()];
            finding.affected_files = vec![path];
            finding
                .graph_context
                .insert("coverageType".into(), json!("file_coverage"));
            finding
                .graph_context
                .insert("coveragePct".into(), json!(coverage_pct));
            finding.suggested_fix =
                Some("Annotate the public functions first, then enable a type checker.".into());
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AnalysisContext;
    use repograph_core::{Entity, EntityKind, GraphConfig, RepographConfig, Severity};
    use repograph_graph::GraphStore;
    use std::path::Path;

    fn function(
        name: &str,
        line: u32,
        params: &[&str],
        typed: &[(&str, &str)],
        return_type: Option<&str>,
        complexity: u32,
    ) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("m.py::{name}:{line}"),
            file_path: "m.py".into(),
            line_start: line,
            line_end: line + 3,
            docstring: None,
            kind: EntityKind::Function {
                parameters: params.iter().map(|p| p.to_string()).collect(),
                parameter_types: typed
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                return_type: return_type.map(str::to_string),
                complexity,
                is_async: false,
                is_method: false,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    fn file_node() -> Entity {
        Entity {
            name: "m.py".into(),
            qualified_name: "m.py".into(),
            file_path: "m.py".into(),
            line_start: 1,
            line_end: 50,
            docstring: None,
            kind: EntityKind::File {
                language: "python".into(),
                loc: 50,
                hash: String::new(),
                last_modified: None,
                exports: vec![],
            },
        }
    }

    fn detect(entities: Vec<Entity>) -> Vec<Finding> {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        store.batch_create_nodes(&entities).unwrap();
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(&store, &config, Path::new("."));
        TypeHintCoverageDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn fully_typed_functions_are_skipped() {
        let findings = detect(vec![function(
            "run",
            1,
            &["self", "count"],
            &[("count", "int")],
            Some("None"),
            1,
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn complex_untyped_function_is_high() {
        let findings = detect(vec![function("run", 1, &["count"], &[], None, 12)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(
            findings[0].graph_context["missingParams"],
            serde_json::json!(["count"])
        );
    }

    #[test]
    fn public_untyped_function_is_medium_and_private_low() {
        let findings = detect(vec![
            function("run", 1, &["count"], &[], None, 2),
            function("_helper", 10, &["count"], &[], None, 2),
        ]);
        assert_eq!(findings.len(), 2);
        let public = findings.iter().find(|f| f.title.contains("run")).unwrap();
        assert_eq!(public.severity, Severity::Medium);
        let private = findings.iter().find(|f| f.title.contains("_helper")).unwrap();
        assert_eq!(private.severity, Severity::Low);
    }

    #[test]
    fn init_needs_no_return_annotation() {
        let findings = detect(vec![function(
            "__init__",
            1,
            &["self", "count"],
            &[("count", "int")],
            None,
            1,
        )]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_functions_are_skipped() {
        let findings = detect(vec![function("test_run", 1, &["count"], &[], None, 2)]);
        assert!(findings.is_empty());
    }

    #[test]
    fn low_file_coverage_is_reported_high() {
        let findings = detect(vec![
            file_node(),
            function("one", 1, &["a"], &[], None, 1),
            function("two", 10, &["b"], &[], None, 1),
            function("three", 20, &["c"], &[], None, 1),
        ]);
        let file_finding = findings
            .iter()
            .find(|f| f.graph_context.get("coverageType") == Some(&serde_json::json!("file_coverage")))
            .expect("file coverage finding");
        assert_eq!(file_finding.severity, Severity::High);
        assert_eq!(
            file_finding.graph_context["coveragePct"],
            serde_json::json!(0.0)
        );
    }

    #[test]
    fn small_files_skip_the_coverage_check() {
        let findings = detect(vec![
            file_node(),
            function("one", 1, &["a"], &[], None, 1),
            function("two", 10, &["b"], &[], None, 1),
        ]);
        assert!(findings
            .iter()
            .all(|f| f.graph_context.get("coverageType") != Some(&serde_json::json!("file_coverage"))));
    }
}
