use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{methods_of, repository_classes};
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use serde_json::json;

/// Detects classes whose methods mostly delegate to one other object: a
/// single outgoing call and trivial complexity per method.
#[derive(Debug, Default)]
pub struct MiddleManDetector;

impl Detector for MiddleManDetector {
    fn name(&self) -> &'static str {
        "MiddleManDetector"
    }

    fn description(&self) -> &'static str {
        "Finds classes that mostly delegate"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let min_methods = ctx.overrides().get_u64("middle-man", "min_methods", 3) as usize;
        let delegation_ratio = ctx.overrides().get_f64("middle-man", "delegation_ratio", 0.5);

        let mut findings = Vec::new();

        for class in repository_classes(ctx.store) {
            let methods: Vec<_> = methods_of(ctx.store, &class)
                .into_iter()
                .filter(|m| {
                    let name = m.name();
                    !(name.starts_with("__") && name.ends_with("__"))
                })
                .collect();
            if methods.len() < min_methods {
                continue;
            }

            let delegating = methods
                .iter()
                .filter(|m| {
                    m.u64_prop("complexity") <= 1
                        && ctx.store.outgoing(m.id, RelType::Calls).len() == 1
                })
                .count();
            let ratio = delegating as f64 / methods.len() as f64;
            if ratio < delegation_ratio {
                continue;
            }

            let severity = if ratio >= 0.8 {
                Severity::Medium
            } else {
                Severity::Low
            };
            let name = class.name().to_string();

            ctx.enricher().try_flag(
                class.qualified_name(),
                self.name(),
                0.6,
                &["delegating_methods".to_string()],
                severity,
            );

            let mut finding =
                Finding::new(self.name(), severity, format!("Middle man: {name}"));
            finding.id = finding_id(self.name(), class.file_path(), class.line_start());
            finding.description = format!(
                "{delegating} of {} methods in '{name}' only delegate a single call; the class \
                 adds little behavior of its own.",
                methods.len()
            );
            finding.affected_nodes = vec![class.qualified_name().to_string()];
            finding.affected_files = vec![class.file_path().to_string()];
            finding.line_start = Some(class.line_start());
            finding.line_end = Some(class.line_end());
            finding
                .graph_context
                .insert("delegatingMethods".into(), json!(delegating));
            finding
                .graph_context
                .insert("totalMethods".into(), json!(methods.len()));
            finding
                .graph_context
                .insert("delegationRatio".into(), json!(ratio));
            finding.suggested_fix = Some(format!(
                "Let callers talk to the delegate directly, or fold real behavior into '{name}'."
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
    use repograph_core::{Entity, EntityKind, GraphConfig, Relationship, RepographConfig};
    use repograph_graph::GraphStore;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn class(name: &str) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("a.py::{name}:1"),
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 30,
            docstring: None,
            kind: EntityKind::Class {
                is_abstract: false,
                complexity: 1,
                decorators: vec![],
            },
        }
    }

    fn method(class: &str, name: &str, line: u32, complexity: u32) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("a.py::{class}:1.{name}:{line}"),
            file_path: "a.py".into(),
            line_start: line,
            line_end: line + 2,
            docstring: None,
            kind: EntityKind::Function {
                parameters: vec!["self".into()],
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity,
                is_async: false,
                is_method: true,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    /// Store with one class; each (method, complexity, call_count) spec
    /// wires that many outgoing calls.
    fn store_with(methods: &[(&str, u32, usize)]) -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let mut entities = vec![class("Facade")];
        let mut rels = Vec::new();
        for (i, (name, complexity, calls)) in methods.iter().enumerate() {
            let line = 2 + i as u32 * 3;
            entities.push(method("Facade", name, line, *complexity));
            let qname = format!("a.py::Facade:1.{name}:{line}");
            rels.push(Relationship::new(
                "a.py::Facade:1",
                qname.clone(),
                RelType::Contains,
            ));
            for c in 0..*calls {
                rels.push(
                    Relationship::new(qname.clone(), format!("delegate.target_{c}"), RelType::Calls)
                        .with_property("callName", json!(format!("target_{c}"))),
                );
            }
        }
        let ids = store.batch_create_nodes(&entities).unwrap();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    fn detect(store: &GraphStore) -> Vec<Finding> {
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(store, &config, Path::new("."));
        MiddleManDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn fully_delegating_class_is_medium() {
        let store = store_with(&[("get_a", 1, 1), ("get_b", 1, 1), ("get_c", 1, 1)]);
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(
            findings[0].graph_context["delegatingMethods"],
            json!(3)
        );
    }

    #[test]
    fn half_delegating_class_is_low() {
        let store = store_with(&[
            ("get_a", 1, 1),
            ("get_b", 1, 1),
            ("compute", 5, 3),
            ("render", 4, 0),
        ]);
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
        assert_eq!(findings[0].graph_context["delegationRatio"], json!(0.5));
    }

    #[test]
    fn complex_methods_do_not_count_as_delegation() {
        // One call each, but real branching logic behind it.
        let store = store_with(&[("a", 5, 1), ("b", 6, 1), ("c", 7, 1)]);
        assert!(detect(&store).is_empty());
    }

    #[test]
    fn small_classes_are_skipped() {
        let store = store_with(&[("get_a", 1, 1), ("get_b", 1, 1)]);
        assert!(detect(&store).is_empty());
    }

    #[test]
    fn dunder_methods_are_ignored() {
        // Three delegating methods once __init__ and __repr__ are excluded
        // from the ratio.
        let store = store_with(&[
            ("__init__", 1, 1),
            ("__repr__", 1, 1),
            ("get_a", 1, 1),
            ("get_b", 1, 1),
            ("get_c", 1, 1),
        ]);
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].graph_context["totalMethods"], json!(3));
    }
}
