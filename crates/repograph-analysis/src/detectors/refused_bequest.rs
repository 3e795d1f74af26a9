use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use repograph_graph::NodeId;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Detects child classes that override parent methods while rarely calling
/// the parent implementation: inherited behavior is being refused.
#[derive(Debug, Default)]
pub struct RefusedBequestDetector;

fn is_exempt_parent(name: &str) -> bool {
    name.is_empty()
        || name == "ABC"
        || name.ends_with("Protocol")
        || name.ends_with("Interface")
        || name.contains("Mixin")
}

impl Detector for RefusedBequestDetector {
    fn name(&self) -> &'static str {
        "RefusedBequestDetector"
    }

    fn description(&self) -> &'static str {
        "Finds subclasses overriding without calling the parent"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        // Group OVERRIDES edges by (child class, parent class).
        struct Group {
            child_class: String,
            parent_class: String,
            file: String,
            line: u32,
            overridden: Vec<(NodeId, String)>,
        }
        let mut groups: HashMap<(String, String), Group> = HashMap::new();

        for rel in ctx.store.relationships(RelType::Overrides) {
            let child_class = rel
                .props
                .get("childClass")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let parent_class = rel
                .props
                .get("parentClass")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let method_name = rel
                .props
                .get("methodName")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let Some(child_method) = ctx.store.node_by_id(rel.source) else {
                continue;
            };

            let group = groups
                .entry((child_class.clone(), parent_class.clone()))
                .or_insert_with(|| Group {
                    child_class,
                    parent_class,
                    file: child_method.file_path().to_string(),
                    line: child_method.line_start(),
                    overridden: Vec::new(),
                });
            group.line = group.line.min(child_method.line_start());
            group.overridden.push((child_method.id, method_name));
        }

        let mut findings = Vec::new();
        for group in groups.into_values() {
            if is_exempt_parent(&group.parent_class) {
                continue;
            }
            // Abstract parents are meant to be overridden wholesale.
            if let Some(parent) = ctx
                .store
                .nodes_with_label(repograph_core::NodeLabel::Class)
                .into_iter()
                .find(|c| c.name() == group.parent_class)
            {
                if parent.bool_prop("isAbstract") {
                    continue;
                }
            }

            let overridden_count = group.overridden.len();
            let parent_calls = group
                .overridden
                .iter()
                .filter(|(method_id, method_name)| {
                    ctx.store
                        .outgoing(*method_id, RelType::Calls)
                        .into_iter()
                        .any(|(rel, _)| {
                            rel.str_prop("callName")
                                .map(|call| {
                                    call.starts_with("super")
                                        || call.ends_with(method_name.as_str())
                                            && call.contains('.')
                                })
                                .unwrap_or(false)
                        })
                })
                .count();

            let ratio = parent_calls as f64 / overridden_count as f64;
            let severity = if ratio == 0.0 {
                Severity::High
            } else if ratio < 0.34 {
                Severity::Medium
            } else if ratio < 0.67 {
                Severity::Low
            } else {
                continue;
            };

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!(
                    "Refused bequest: {} overrides {}",
                    group.child_class, group.parent_class
                ),
            );
            finding.id = finding_id(self.name(), &group.file, group.line);
            finding.description = format!(
                "'{}' overrides {overridden_count} methods of '{}' but calls the parent \
                 implementation in {parent_calls} of them.",
                group.child_class, group.parent_class
            );
            finding.affected_nodes = group
                .overridden
                .iter()
                .filter_map(|(id, _)| {
                    ctx.store
                        .node_by_id(*id)
                        .map(|n| n.qualified_name().to_string())
                })
                .collect();
            finding.affected_files = vec![group.file.clone()];
            finding.line_start = Some(group.line);
            finding
                .graph_context
                .insert("overriddenCount".into(), json!(overridden_count));
            finding
                .graph_context
                .insert("parentCallCount".into(), json!(parent_calls));
            finding
                .graph_context
                .insert("parentClass".into(), json!(group.parent_class));
            finding.suggested_fix = Some(format!(
                "Prefer composition over inheritance for '{}', or narrow the parent interface.",
                group.child_class
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}
