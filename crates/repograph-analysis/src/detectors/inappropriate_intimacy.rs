use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{class_of, methods_of, repository_classes};
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use repograph_graph::NodeId;
use serde_json::json;
use std::collections::HashMap;

/// Detects pairs of classes that reach into each other's internals
/// excessively.
#[derive(Debug, Default)]
pub struct InappropriateIntimacyDetector;

impl Detector for InappropriateIntimacyDetector {
    fn name(&self) -> &'static str {
        "InappropriateIntimacyDetector"
    }

    fn description(&self) -> &'static str {
        "Finds class pairs referencing each other's internals"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let min_each_way =
            ctx.overrides().get_u64("inappropriate-intimacy", "min_each_way", 3) as usize;

        let classes = repository_classes(ctx.store);
        // cross_references[(a, b)] = references from a's methods into b.
        let mut cross_references: HashMap<(NodeId, NodeId), usize> = HashMap::new();

        for class in &classes {
            for method in methods_of(ctx.store, class) {
                for rel_type in [RelType::Calls, RelType::Uses] {
                    for (_, target) in ctx.store.outgoing(method.id, rel_type) {
                        let target_class = if target.label == repograph_core::NodeLabel::Class {
                            Some(target.clone())
                        } else {
                            class_of(ctx.store, &target)
                        };
                        if let Some(other) = target_class {
                            if other.id != class.id {
                                *cross_references.entry((class.id, other.id)).or_insert(0) += 1;
                            }
                        }
                    }
                }
            }
        }

        let mut findings = Vec::new();
        for class in &classes {
            for other in &classes {
                if class.id >= other.id {
                    continue;
                }
                let forward = cross_references
                    .get(&(class.id, other.id))
                    .copied()
                    .unwrap_or(0);
                let backward = cross_references
                    .get(&(other.id, class.id))
                    .copied()
                    .unwrap_or(0);
                if forward < min_each_way || backward < min_each_way {
                    continue;
                }

                let total = forward + backward;
                let severity = if total >= min_each_way * 4 {
                    Severity::High
                } else {
                    Severity::Medium
                };

                for qname in [class.qualified_name(), other.qualified_name()] {
                    ctx.enricher().try_flag(
                        qname,
                        self.name(),
                        0.7,
                        &["mutual_internal_access".to_string()],
                        severity,
                    );
                }

                let mut finding = Finding::new(
                    self.name(),
                    severity,
                    format!(
                        "Inappropriate intimacy: {} and {}",
                        class.name(),
                        other.name()
                    ),
                );
                finding.id = finding_id(self.name(), class.file_path(), class.line_start());
                finding.description = format!(
                    "Classes '{}' and '{}' reference each other's internals {forward} and \
                     {backward} times.",
                    class.name(),
                    other.name()
                );
                finding.affected_nodes = vec![
                    class.qualified_name().to_string(),
                    other.qualified_name().to_string(),
                ];
                finding.affected_files = vec![
                    class.file_path().to_string(),
                    other.file_path().to_string(),
                ];
                finding.affected_files.dedup();
                finding
                    .graph_context
                    .insert("forwardReferences".into(), json!(forward));
                finding
                    .graph_context
                    .insert("backwardReferences".into(), json!(backward));
                finding.suggested_fix = Some(
                    "Merge the two classes, or move the shared state into a third type both \
                     can depend on."
                        .into(),
                );
                findings.push(finding);
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AnalysisContext;
    use repograph_core::{Entity, EntityKind, GraphConfig, Relationship, RepographConfig, Severity};
    use repograph_graph::GraphStore;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn class(file: &str, name: &str) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("{file}::{name}:1"),
            file_path: file.into(),
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

    fn method(file: &str, class: &str, name: &str) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("{file}::{class}:1.{name}:5"),
            file_path: file.into(),
            line_start: 5,
            line_end: 8,
            docstring: None,
            kind: EntityKind::Function {
                parameters: vec!["self".into()],
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity: 1,
                is_async: false,
                is_method: true,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    /// Two classes whose single methods reference each other the given
    /// number of times in each direction.
    fn mutual_store(forward: usize, backward: usize) -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let entities = vec![
            class("a.py", "Order"),
            method("a.py", "Order", "total"),
            class("b.py", "Invoice"),
            method("b.py", "Invoice", "amount"),
        ];
        let mut rels = vec![
            Relationship::new("a.py::Order:1", "a.py::Order:1.total:5", RelType::Contains),
            Relationship::new("b.py::Invoice:1", "b.py::Invoice:1.amount:5", RelType::Contains),
        ];
        for _ in 0..forward {
            rels.push(Relationship::new(
                "a.py::Order:1.total:5",
                "b.py::Invoice:1.amount:5",
                RelType::Calls,
            ));
        }
        for _ in 0..backward {
            rels.push(Relationship::new(
                "b.py::Invoice:1.amount:5",
                "a.py::Order:1.total:5",
                RelType::Uses,
            ));
        }
        let ids = store.batch_create_nodes(&entities).unwrap();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    fn detect(store: &GraphStore) -> Vec<Finding> {
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(store, &config, Path::new("."));
        InappropriateIntimacyDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn mutual_references_over_threshold_are_medium() {
        let findings = detect(&mutual_store(3, 3));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(
            findings[0].graph_context["forwardReferences"],
            serde_json::json!(3)
        );
        assert_eq!(
            findings[0].graph_context["backwardReferences"],
            serde_json::json!(3)
        );
    }

    #[test]
    fn heavy_mutual_traffic_is_high() {
        // 6 + 6 reaches four times the per-direction minimum.
        let findings = detect(&mutual_store(6, 6));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn one_way_dependency_is_fine() {
        assert!(detect(&mutual_store(8, 0)).is_empty());
    }

    #[test]
    fn light_mutual_traffic_is_fine() {
        assert!(detect(&mutual_store(2, 2)).is_empty());
    }

    #[test]
    fn both_classes_and_files_are_reported() {
        let findings = detect(&mutual_store(3, 3));
        assert_eq!(findings[0].affected_nodes.len(), 2);
        assert!(findings[0]
            .affected_files
            .contains(&"a.py".to_string()));
        assert!(findings[0]
            .affected_files
            .contains(&"b.py".to_string()));
    }
}
